//! Policies that compute the new size themselves.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use alertscale_core::{Capacity, ConfigError, CooldownSettings, Filters, ScaleResult};
use alertscale_provider::ResizableGroup;

use crate::adjustment::{Adjustment, bound};
use crate::policy::ScalingPolicy;

/// Resizes matching groups by an adjustment expression, gated by a
/// cooldown checked against the group's own scaling history.
pub struct SelfManagedPolicy {
    monitor_name: String,
    filters: Filters,
    adjustment: Adjustment,
    cooldown: Duration,
}

impl SelfManagedPolicy {
    /// Fails if `adjustment` is not a valid expression.
    pub fn new(
        monitor_name: impl Into<String>,
        filters: Filters,
        adjustment: &str,
        cooldown: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            monitor_name: monitor_name.into(),
            filters,
            adjustment: adjustment.parse()?,
            cooldown,
        })
    }

    /// Like [`new`](Self::new), with the configured default cooldown.
    pub fn with_default_cooldown(
        monitor_name: impl Into<String>,
        filters: Filters,
        adjustment: &str,
        settings: &CooldownSettings,
    ) -> Result<Self, ConfigError> {
        Self::new(monitor_name, filters, adjustment, settings.default_cooldown)
    }

    pub fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// The bounded size this policy would move a group at `capacity` to.
    pub fn target_size(&self, capacity: Capacity) -> u32 {
        bound(self.adjustment.apply(capacity.desired), capacity.min, capacity.max)
    }
}

impl fmt::Debug for SelfManagedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfManagedPolicy")
            .field("monitor", &self.monitor_name)
            .field("filters", &self.filters)
            .field("adjustment", &self.adjustment.to_string())
            .field("cooldown_secs", &self.cooldown.as_secs())
            .finish()
    }
}

#[async_trait]
impl ScalingPolicy for SelfManagedPolicy {
    fn monitor_name(&self) -> &str {
        &self.monitor_name
    }

    fn filters(&self) -> &Filters {
        &self.filters
    }

    async fn should_execute(&self, group: &dyn ResizableGroup) -> ScaleResult<bool> {
        let capacity = group.capacity();
        let target = self.target_size(capacity);

        if target == capacity.max && capacity.is_at_max() {
            warn!(
                policy = %self.monitor_name,
                group = %group.name(),
                max = capacity.max,
                "group already at maximum size"
            );
            return Ok(false);
        }
        if target == capacity.min && capacity.is_at_min() {
            warn!(
                policy = %self.monitor_name,
                group = %group.name(),
                min = capacity.min,
                "group already at minimum size"
            );
            return Ok(false);
        }
        if target == capacity.desired {
            warn!(
                policy = %self.monitor_name,
                group = %group.name(),
                desired = capacity.desired,
                adjustment = %self.adjustment,
                "adjustment does not change group size"
            );
            return Ok(false);
        }
        if group.is_cooling_down(self.cooldown).await? {
            warn!(
                policy = %self.monitor_name,
                group = %group.name(),
                cooldown_secs = self.cooldown.as_secs(),
                "group is cooling down"
            );
            return Ok(false);
        }

        Ok(true)
    }

    async fn scale(&self, group: &dyn ResizableGroup) -> ScaleResult<bool> {
        if !self.should_execute(group).await? {
            return Ok(false);
        }

        let capacity = group.capacity();
        let target = self.target_size(capacity);
        info!(
            policy = %self.monitor_name,
            group = %group.name(),
            from = capacity.desired,
            to = target,
            "scaling group"
        );
        group.resize(target).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertscale_core::tag_map;
    use alertscale_provider::GroupRef;
    use alertscale_provider::mock::MockGroup;

    const COOLDOWN: Duration = Duration::from_secs(300);

    fn policy(adjustment: &str) -> SelfManagedPolicy {
        SelfManagedPolicy::new("cpu-high", tag_map([("environment", "prod")]), adjustment, COOLDOWN)
            .unwrap()
    }

    fn group(min: u32, desired: u32, max: u32) -> MockGroup {
        MockGroup::new("web", Capacity::new(min, desired, max))
    }

    #[test]
    fn rejects_malformed_adjustment_at_construction() {
        let err = SelfManagedPolicy::new("cpu-high", Filters::new(), "two", COOLDOWN).unwrap_err();
        assert_eq!(err, ConfigError::InvalidAdjustment("two".to_string()));
    }

    #[test]
    fn default_cooldown_comes_from_settings() {
        let settings = CooldownSettings::default();
        let p = SelfManagedPolicy::with_default_cooldown("cpu-high", Filters::new(), "+1", &settings)
            .unwrap();
        assert_eq!(p.cooldown(), settings.default_cooldown);
    }

    #[test]
    fn target_size_is_bounded() {
        assert_eq!(policy("+100").target_size(Capacity::new(1, 3, 10)), 10);
        assert_eq!(policy("-100").target_size(Capacity::new(1, 3, 10)), 1);
        assert_eq!(policy("10%").target_size(Capacity::new(1, 5, 10)), 6);
        assert_eq!(policy("-20%").target_size(Capacity::new(1, 5, 10)), 4);
        assert_eq!(policy("7").target_size(Capacity::new(1, 5, 10)), 7);
    }

    #[tokio::test]
    async fn refuses_when_already_at_maximum() {
        let g = group(1, 10, 10);
        let p = policy("+100");

        assert!(!p.should_execute(&g).await.unwrap());
        assert!(p.execute(&[g.into_ref()]).await.is_empty());
    }

    #[tokio::test]
    async fn refuses_when_already_at_minimum() {
        let g = group(2, 2, 10);
        assert!(!policy("-1").should_execute(&g).await.unwrap());
    }

    #[tokio::test]
    async fn refuses_exact_target_equal_to_desired() {
        let g = group(1, 2, 10);
        assert!(!policy("2").should_execute(&g).await.unwrap());
        assert_eq!(g.cooldown_checks(), 0);
    }

    #[tokio::test]
    async fn refuses_while_cooling_down() {
        let g = group(1, 2, 10).cooling_down();
        let p = policy("+1");

        assert!(!p.should_execute(&g).await.unwrap());
        assert_eq!(g.cooldown_checks(), 1);
        assert!(!p.scale(&g).await.unwrap());
        assert!(g.resizes().is_empty());
    }

    #[tokio::test]
    async fn cooldown_check_failure_is_an_error() {
        let g = group(1, 2, 10).failing_cooldown();
        let err = policy("+1").should_execute(&g).await.unwrap_err();
        assert!(matches!(err, alertscale_core::ScaleError::Cooldown { .. }));
    }

    #[tokio::test]
    async fn scales_to_bounded_target() {
        let g = group(1, 5, 10);
        assert!(policy("+20").scale(&g).await.unwrap());
        assert_eq!(g.resizes(), vec![10]);

        let g = group(1, 5, 10);
        assert!(policy("-20%").scale(&g).await.unwrap());
        assert_eq!(g.resizes(), vec![4]);
    }

    #[tokio::test]
    async fn huge_adjustment_clamps_to_maximum() {
        let p = policy("99999999999999999999");
        let g = group(1, 2, 10);

        assert!(p.scale(&g).await.unwrap());
        assert_eq!(g.resizes(), vec![10]);

        let g = group(1, 2, 10);
        assert!(policy("-99999999999999999999%").scale(&g).await.unwrap());
        assert_eq!(g.resizes(), vec![1]);
    }

    #[tokio::test]
    async fn failing_group_does_not_stop_the_rest() {
        let groups: Vec<GroupRef> = vec![
            MockGroup::new("a", Capacity::new(1, 2, 10)).into_ref(),
            MockGroup::new("b", Capacity::new(1, 2, 10)).failing_resize().into_ref(),
            MockGroup::new("c", Capacity::new(1, 2, 10)).into_ref(),
        ];

        let scaled = policy("+1").execute(&groups).await;

        let names: Vec<&str> = scaled.iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn approved_targets_are_in_bounds_and_change_size() {
        let adjustments = ["0", "1", "5", "12", "+1", "-1", "+3", "-7", "10%", "+50%", "-50%", "-100%", "200%"];
        for min in 0..4 {
            for max in min..8 {
                for desired in min..=max {
                    for expr in adjustments {
                        let p = policy(expr);
                        let g = group(min, desired, max);
                        if p.should_execute(&g).await.unwrap() {
                            let target = p.target_size(g.capacity());
                            assert!(
                                (min..=max).contains(&target) && target != desired,
                                "{expr} on {min}/{desired}/{max} gave {target}"
                            );
                        }
                    }
                }
            }
        }
    }
}
