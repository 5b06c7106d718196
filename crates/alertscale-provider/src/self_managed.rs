//! Groups on a provider without native scaling policies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use alertscale_core::{
    Capacity, Metadata, ProviderError, ProviderKind, RetryPolicy, ScaleError, ScaleResult,
};

use crate::client::{SelfManagedApi, SelfManagedGroupRecord};
use crate::cooldown::{self, CauseMatcher, CooldownState};
use crate::group::{ResizableGroup, debug_group};
use crate::retry::throttled_call;

/// A group that can only be moved by a signed instance delta.
///
/// Cooldown state comes from the group's event log over a trailing
/// lookback window.
pub struct SelfManagedGroup {
    name: String,
    identifier: String,
    capacity: Capacity,
    metadata: Metadata,
    client: Arc<dyn SelfManagedApi>,
    retry: RetryPolicy,
    causes: CauseMatcher,
    lookback: Duration,
}

impl SelfManagedGroup {
    pub fn new(
        record: SelfManagedGroupRecord,
        client: Arc<dyn SelfManagedApi>,
        retry: RetryPolicy,
        causes: CauseMatcher,
        lookback: Duration,
    ) -> Self {
        Self {
            capacity: record.capacity(),
            metadata: record.metadata(),
            name: record.name,
            identifier: record.id,
            client,
            retry,
            causes,
            lookback,
        }
    }
}

impl fmt::Debug for SelfManagedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_group(
            f,
            "SelfManagedGroup",
            &self.name,
            &self.identifier,
            self.capacity,
            &self.metadata,
        )
    }
}

#[async_trait]
impl ResizableGroup for SelfManagedGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::SelfManaged
    }

    fn capacity(&self) -> Capacity {
        self.capacity
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    async fn resize(&self, new_size: u32) -> ScaleResult<()> {
        let current = self.capacity.desired;
        let client = &self.client;
        let id = self.identifier.as_str();

        let result = if new_size > current {
            let delta = new_size - current;
            throttled_call(&self.retry, "scale_up", move || client.scale_up(id, delta)).await
        } else if new_size < current {
            let delta = current - new_size;
            throttled_call(&self.retry, "scale_down", move || client.scale_down(id, delta)).await
        } else {
            debug!(group = %self.name, size = current, "resize is a no-op");
            return Ok(());
        };

        result.map_err(|source| ScaleError::Resize {
            group: self.name.clone(),
            source,
        })?;

        info!(group = %self.name, from = current, to = new_size, "group rescaled");
        Ok(())
    }

    async fn is_cooling_down(&self, cooldown: Duration) -> ScaleResult<bool> {
        let to = Utc::now();
        let from = chrono::Duration::from_std(self.lookback)
            .ok()
            .and_then(|lookback| to.checked_sub_signed(lookback))
            .ok_or_else(|| ScaleError::Cooldown {
                group: self.name.clone(),
                source: ProviderError::InvalidResponse(format!(
                    "event lookback of {}s is out of range",
                    self.lookback.as_secs()
                )),
            })?;

        let client = &self.client;
        let id = self.identifier.as_str();
        let events = throttled_call(&self.retry, "group_events", move || {
            client.group_events(id, from, to)
        })
        .await
        .map_err(|source| ScaleError::Cooldown {
            group: self.name.clone(),
            source,
        })?;

        let latest = cooldown::latest_event(&events, &self.causes);
        let state = cooldown::evaluate(latest, cooldown, Utc::now());

        if let CooldownState::CoolingDown { remaining } = state {
            warn!(
                group = ?self,
                remaining_secs = remaining.as_secs(),
                "cooldown has not elapsed"
            );
        } else {
            debug!(group = %self.name, events = events.len(), "no recent scaling events");
        }

        Ok(state.is_cooling())
    }
}
