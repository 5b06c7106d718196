//! Policies that run a provider-native scaling policy by name.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use alertscale_core::{Capacity, Filters, ProviderKind, RetryPolicy, ScaleError, ScaleResult};
use alertscale_provider::client::{
    DelegatedApi, NativeAdjustmentType, NativePolicy, NativePolicyType,
};
use alertscale_provider::{ResizableGroup, throttled_call};

use crate::policy::ScalingPolicy;

/// Why a delegated policy will not run against a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    /// The group is not managed by the delegated provider.
    WrongProvider(ProviderKind),
    /// The group has no native policy by this name.
    NotFound,
    /// Only simple fixed-step policies are run.
    UnsupportedType(NativePolicyType),
    /// The native policy carries no scaling adjustment.
    NoAdjustment,
    /// Exact-capacity policy whose target is the current size.
    AlreadyAtTarget(u32),
    AtMaximum(u32),
    AtMinimum(u32),
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::WrongProvider(kind) => write!(f, "group is managed by the {kind} provider"),
            Refusal::NotFound => write!(f, "native policy not found on group"),
            Refusal::UnsupportedType(t) => {
                write!(f, "unsupported native policy type {}", String::from(t.clone()))
            }
            Refusal::NoAdjustment => write!(f, "native policy has no scaling adjustment"),
            Refusal::AlreadyAtTarget(n) => write!(f, "group already at policy target of {n}"),
            Refusal::AtMaximum(n) => write!(f, "group already at maximum size of {n}"),
            Refusal::AtMinimum(n) => write!(f, "group already at minimum size of {n}"),
        }
    }
}

/// Decide whether `native` may run against a group at `capacity`.
pub fn check_native_policy(native: &NativePolicy, capacity: Capacity) -> Result<(), Refusal> {
    if native.policy_type != NativePolicyType::SimpleScaling {
        return Err(Refusal::UnsupportedType(native.policy_type.clone()));
    }
    let adjustment = native.scaling_adjustment.ok_or(Refusal::NoAdjustment)?;

    if native.adjustment_type == Some(NativeAdjustmentType::ExactCapacity)
        && adjustment == i64::from(capacity.desired)
    {
        return Err(Refusal::AlreadyAtTarget(capacity.desired));
    }
    if adjustment > 0 && capacity.is_at_max() {
        return Err(Refusal::AtMaximum(capacity.max));
    }
    if adjustment < 0 && capacity.is_at_min() {
        return Err(Refusal::AtMinimum(capacity.min));
    }
    Ok(())
}

/// Runs a named native policy on matching groups. The provider computes
/// the new size and applies its own cooldown.
pub struct DelegatedPolicy {
    monitor_name: String,
    filters: Filters,
    native_name: String,
    client: Arc<dyn DelegatedApi>,
    retry: RetryPolicy,
}

impl DelegatedPolicy {
    pub fn new(
        monitor_name: impl Into<String>,
        filters: Filters,
        native_name: impl Into<String>,
        client: Arc<dyn DelegatedApi>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            monitor_name: monitor_name.into(),
            filters,
            native_name: native_name.into(),
            client,
            retry,
        }
    }

    /// Name of the provider-native policy this runs.
    pub fn native_name(&self) -> &str {
        &self.native_name
    }

    /// Look up the native policy on `group` and check it against the
    /// group's capacity.
    pub async fn refusal(&self, group: &dyn ResizableGroup) -> ScaleResult<Option<Refusal>> {
        if group.provider() != ProviderKind::Delegated {
            return Ok(Some(Refusal::WrongProvider(group.provider())));
        }

        let client = &self.client;
        let group_name = group.name();
        let native_name = self.native_name.as_str();

        let native = throttled_call(&self.retry, "describe_policy", move || {
            client.describe_policy(group_name, native_name)
        })
        .await
        .map_err(|source| ScaleError::PolicyLookup {
            group: group_name.to_string(),
            policy: self.native_name.clone(),
            source,
        })?;

        Ok(match native {
            None => Some(Refusal::NotFound),
            Some(native) => check_native_policy(&native, group.capacity()).err(),
        })
    }
}

impl fmt::Debug for DelegatedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedPolicy")
            .field("name", &self.native_name)
            .field("monitor", &self.monitor_name)
            .field("filters", &self.filters)
            .finish()
    }
}

#[async_trait]
impl ScalingPolicy for DelegatedPolicy {
    fn monitor_name(&self) -> &str {
        &self.monitor_name
    }

    fn filters(&self) -> &Filters {
        &self.filters
    }

    async fn should_execute(&self, group: &dyn ResizableGroup) -> ScaleResult<bool> {
        match self.refusal(group).await? {
            None => Ok(true),
            Some(reason) => {
                warn!(
                    policy = %self.monitor_name,
                    native_policy = %self.native_name,
                    group = %group.name(),
                    %reason,
                    "unable to execute policy"
                );
                Ok(false)
            }
        }
    }

    async fn scale(&self, group: &dyn ResizableGroup) -> ScaleResult<bool> {
        if !self.should_execute(group).await? {
            return Ok(false);
        }

        let client = &self.client;
        let group_name = group.name();
        let native_name = self.native_name.as_str();

        throttled_call(&self.retry, "execute_policy", move || {
            client.execute_policy(group_name, native_name, true)
        })
        .await
        .map_err(|source| ScaleError::PolicyExecution {
            group: group_name.to_string(),
            policy: self.native_name.clone(),
            source,
        })?;

        info!(
            policy = %self.monitor_name,
            native_policy = %self.native_name,
            group = %group_name,
            "executed native policy"
        );
        Ok(true)
    }
}
