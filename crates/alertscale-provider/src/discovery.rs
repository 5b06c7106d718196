//! Group discovery across providers.
//!
//! Lists every group each configured provider knows about and wraps
//! the records as [`GroupRef`]s. A provider whose listing fails
//! contributes no groups; the other provider's groups are still
//! returned.

use std::sync::Arc;

use tracing::{error, info};

use alertscale_core::{CooldownSettings, ProviderResult, RetryPolicy};

use crate::client::{DelegatedApi, SelfManagedApi};
use crate::cooldown::CauseMatcher;
use crate::delegated::DelegatedGroup;
use crate::group::GroupRef;
use crate::paging::collect_pages;
use crate::retry::throttled_call;
use crate::self_managed::SelfManagedGroup;

/// Provider clients available to a run. Either may be absent.
#[derive(Clone, Default)]
pub struct GroupSources {
    pub delegated: Option<Arc<dyn DelegatedApi>>,
    pub self_managed: Option<Arc<dyn SelfManagedApi>>,
}

pub async fn list_delegated_groups(
    client: &Arc<dyn DelegatedApi>,
    retry: &RetryPolicy,
    settings: &CooldownSettings,
) -> ProviderResult<Vec<GroupRef>> {
    let records = collect_pages(retry, "describe_groups", move |token| {
        client.describe_groups(token)
    })
    .await?;

    let causes = CauseMatcher::new(settings.delegated_causes.iter().cloned());
    Ok(records
        .into_iter()
        .map(|record| {
            Arc::new(DelegatedGroup::new(
                record,
                client.clone(),
                *retry,
                causes.clone(),
            )) as GroupRef
        })
        .collect())
}

pub async fn list_self_managed_groups(
    client: &Arc<dyn SelfManagedApi>,
    retry: &RetryPolicy,
    settings: &CooldownSettings,
) -> ProviderResult<Vec<GroupRef>> {
    let records = throttled_call(retry, "list_groups", move || client.list_groups()).await?;

    let causes = CauseMatcher::new(settings.self_managed_causes.iter().cloned());
    Ok(records
        .into_iter()
        .map(|record| {
            Arc::new(SelfManagedGroup::new(
                record,
                client.clone(),
                *retry,
                causes.clone(),
                settings.event_lookback,
            )) as GroupRef
        })
        .collect())
}

/// List groups from every configured provider.
pub async fn discover_groups(
    sources: &GroupSources,
    retry: &RetryPolicy,
    settings: &CooldownSettings,
) -> Vec<GroupRef> {
    let mut groups = Vec::new();

    if let Some(client) = &sources.delegated {
        match list_delegated_groups(client, retry, settings).await {
            Ok(found) => {
                info!(provider = "delegated", count = found.len(), "groups discovered");
                groups.extend(found);
            }
            Err(e) => error!(provider = "delegated", error = %e, "unable to list groups"),
        }
    }

    if let Some(client) = &sources.self_managed {
        match list_self_managed_groups(client, retry, settings).await {
            Ok(found) => {
                info!(provider = "self_managed", count = found.len(), "groups discovered");
                groups.extend(found);
            }
            Err(e) => error!(provider = "self_managed", error = %e, "unable to list groups"),
        }
    }

    groups
}
