//! Groups on a provider that runs scaling policies natively.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use alertscale_core::{
    Capacity, Metadata, ProviderKind, ProviderResult, RetryPolicy, ScaleError, ScaleResult,
};

use crate::client::{DelegatedApi, DelegatedGroupRecord, ScalingActivity};
use crate::cooldown::{self, CauseMatcher, CooldownState};
use crate::group::{ResizableGroup, debug_group};
use crate::paging::collect_pages;
use crate::retry::throttled_call;

/// A group whose desired capacity can be set directly.
///
/// Cooldown state comes from the provider's scaling-activity history.
pub struct DelegatedGroup {
    name: String,
    identifier: String,
    capacity: Capacity,
    metadata: Metadata,
    client: Arc<dyn DelegatedApi>,
    retry: RetryPolicy,
    causes: CauseMatcher,
}

impl DelegatedGroup {
    pub fn new(
        record: DelegatedGroupRecord,
        client: Arc<dyn DelegatedApi>,
        retry: RetryPolicy,
        causes: CauseMatcher,
    ) -> Self {
        Self {
            capacity: record.capacity(),
            metadata: record.metadata(),
            name: record.auto_scaling_group_name,
            identifier: record.auto_scaling_group_arn,
            client,
            retry,
            causes,
        }
    }

    async fn activities(&self) -> ProviderResult<Vec<ScalingActivity>> {
        let client = &self.client;
        let name = self.name.as_str();
        collect_pages(&self.retry, "describe_scaling_activities", move |token| {
            client.describe_scaling_activities(name, token)
        })
        .await
    }
}

impl fmt::Debug for DelegatedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_group(
            f,
            "DelegatedGroup",
            &self.name,
            &self.identifier,
            self.capacity,
            &self.metadata,
        )
    }
}

#[async_trait]
impl ResizableGroup for DelegatedGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Delegated
    }

    fn capacity(&self) -> Capacity {
        self.capacity
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    async fn resize(&self, new_size: u32) -> ScaleResult<()> {
        let client = &self.client;
        let name = self.name.as_str();

        throttled_call(&self.retry, "set_desired_capacity", move || {
            client.set_desired_capacity(name, new_size)
        })
        .await
        .map_err(|source| ScaleError::Resize {
            group: self.name.clone(),
            source,
        })?;

        info!(
            group = %self.name,
            from = self.capacity.desired,
            to = new_size,
            "desired capacity set"
        );
        Ok(())
    }

    async fn is_cooling_down(&self, cooldown: Duration) -> ScaleResult<bool> {
        let activities = self.activities().await.map_err(|source| ScaleError::Cooldown {
            group: self.name.clone(),
            source,
        })?;

        let latest = cooldown::latest_activity(&activities, &self.causes);
        let state = cooldown::evaluate(latest, cooldown, Utc::now());

        match state {
            CooldownState::Idle => {
                debug!(group = %self.name, activities = activities.len(), "no recent scaling activity");
            }
            CooldownState::InFlight => {
                warn!(group = ?self, "scaling activity still ongoing");
            }
            CooldownState::CoolingDown { remaining } => {
                warn!(
                    group = ?self,
                    remaining_secs = remaining.as_secs(),
                    "cooldown has not elapsed"
                );
            }
        }

        Ok(state.is_cooling())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDelegatedApi;
    use alertscale_core::{ProviderError, tag_map};
    use chrono::TimeDelta;

    fn record() -> DelegatedGroupRecord {
        serde_json::from_value(serde_json::json!({
            "AutoScalingGroupName": "web-prod",
            "AutoScalingGroupARN": "arn:web-prod",
            "MinSize": 1,
            "DesiredCapacity": 3,
            "MaxSize": 10,
            "Tags": [{"Key": "environment", "Value": "prod"}]
        }))
        .unwrap()
    }

    fn group(api: &Arc<MockDelegatedApi>) -> DelegatedGroup {
        DelegatedGroup::new(
            record(),
            api.clone(),
            RetryPolicy::default(),
            CauseMatcher::new(["changing the desired capacity"]),
        )
    }

    fn activity(cause: &str, ended_ago: Option<i64>) -> ScalingActivity {
        ScalingActivity {
            activity_id: String::new(),
            cause: cause.to_string(),
            start_time: Utc::now() - TimeDelta::hours(1),
            end_time: ended_ago.map(|secs| Utc::now() - TimeDelta::seconds(secs)),
        }
    }

    #[test]
    fn built_from_record() {
        let api = Arc::new(MockDelegatedApi::new());
        let group = group(&api);

        assert_eq!(group.name(), "web-prod");
        assert_eq!(group.identifier(), "arn:web-prod");
        assert_eq!(group.capacity(), Capacity::new(1, 3, 10));
        assert_eq!(group.metadata(), &tag_map([("environment", "prod")]));
        assert_eq!(group.provider(), ProviderKind::Delegated);
    }

    #[tokio::test]
    async fn resize_sets_desired_capacity() {
        let api = Arc::new(MockDelegatedApi::new());
        group(&api).resize(5).await.unwrap();
        assert_eq!(api.calls(), vec!["set_desired_capacity web-prod 5"]);
    }

    #[tokio::test]
    async fn resize_failure_is_scale_error() {
        let api = Arc::new(MockDelegatedApi::new());
        api.fail_resize("web-prod", ProviderError::from_code("ValidationError", "bad"));

        let err = group(&api).resize(5).await.unwrap_err();
        assert!(matches!(err, ScaleError::Resize { .. }));
        assert_eq!(err.group(), "web-prod");
    }

    #[tokio::test(start_paused = true)]
    async fn resize_retries_throttles() {
        let api = Arc::new(MockDelegatedApi::new());
        api.throttle_next(2);

        group(&api).resize(4).await.unwrap();
        assert_eq!(api.calls().len(), 3);
    }

    #[tokio::test]
    async fn cooling_down_after_recent_activity() {
        let api = Arc::new(MockDelegatedApi::new());
        api.set_activities(
            "web-prod",
            vec![vec![activity("changing the desired capacity from 2 to 3", Some(60))]],
        );

        assert!(group(&api).is_cooling_down(Duration::from_secs(600)).await.unwrap());
        assert!(!group(&api).is_cooling_down(Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn ongoing_activity_is_cooling_down() {
        let api = Arc::new(MockDelegatedApi::new());
        api.set_activities(
            "web-prod",
            vec![vec![activity("changing the desired capacity from 3 to 4", None)]],
        );

        assert!(group(&api).is_cooling_down(Duration::ZERO).await.unwrap());
    }

    #[tokio::test]
    async fn unrelated_activity_does_not_block() {
        let api = Arc::new(MockDelegatedApi::new());
        api.set_activities(
            "web-prod",
            vec![vec![activity("an instance was terminated in response to a health check", None)]],
        );

        assert!(!group(&api).is_cooling_down(Duration::from_secs(600)).await.unwrap());
    }

    #[tokio::test]
    async fn activity_history_is_paginated() {
        let api = Arc::new(MockDelegatedApi::new());
        api.set_activities(
            "web-prod",
            vec![
                vec![activity("launching a new instance", Some(10))],
                vec![activity("changing the desired capacity from 1 to 3", Some(100))],
            ],
        );

        assert!(group(&api).is_cooling_down(Duration::from_secs(600)).await.unwrap());
        assert_eq!(
            api.calls(),
            vec![
                "describe_scaling_activities web-prod -",
                "describe_scaling_activities web-prod 1",
            ]
        );
    }

    #[tokio::test]
    async fn history_failure_is_scale_error() {
        let api = Arc::new(MockDelegatedApi::new());
        api.fail_activities(ProviderError::Transport("timeout".to_string()));

        let err = group(&api)
            .is_cooling_down(Duration::from_secs(600))
            .await
            .unwrap_err();
        assert!(matches!(err, ScaleError::Cooldown { .. }));
    }
}
