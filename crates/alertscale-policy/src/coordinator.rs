//! Matches policies to groups and runs them.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use alertscale_core::WorkerLimits;
use alertscale_provider::GroupRef;

use crate::policy::{ExecuteOptions, PolicyRef};

/// Each policy with the groups its filters select, in policy order.
pub type PolicyGroups = Vec<(PolicyRef, Vec<GroupRef>)>;

/// Pair every policy with the groups it matches.
///
/// A group may appear under several policies. A policy that matches
/// nothing is still present, with an empty list.
pub fn map_policies_to_groups(policies: &[PolicyRef], groups: &[GroupRef]) -> PolicyGroups {
    policies
        .iter()
        .map(|policy| {
            let matched = groups
                .iter()
                .filter(|group| policy.matches(group.as_ref()))
                .cloned()
                .collect();
            (Arc::clone(policy), matched)
        })
        .collect()
}

enum Outcome {
    Finished(Vec<GroupRef>),
    Cancelled,
    Panicked(String),
}

/// Runs a batch of policies with bounded concurrency.
///
/// Holds no state between runs.
#[derive(Debug, Clone, Default)]
pub struct Coordinator {
    limits: WorkerLimits,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Coordinator {
    pub fn new(limits: WorkerLimits) -> Self {
        Self {
            limits,
            shutdown: None,
        }
    }

    /// Stop starting new policies and group attempts once `shutdown`
    /// turns `true`. Work already in flight finishes.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn execute_options(&self) -> ExecuteOptions {
        let options = ExecuteOptions::new(self.limits.group_workers);
        match &self.shutdown {
            Some(rx) => options.with_shutdown(rx.clone()),
            None => options,
        }
    }

    /// Execute each policy against its groups and return the policies
    /// that resized at least one group, in mapping order.
    ///
    /// A policy that panics is logged and counted as not executed.
    pub async fn execute_all(&self, mapping: PolicyGroups) -> Vec<PolicyRef> {
        let semaphore = Arc::new(Semaphore::new(self.limits.policy_workers.max(1)));
        let options = self.execute_options();
        let mut tasks = JoinSet::new();

        for (index, (policy, groups)) in mapping.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let options = options.clone();

            tasks.spawn(async move {
                let matched = groups.len();
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, policy, matched, Outcome::Cancelled);
                };
                if options.is_cancelled() {
                    return (index, policy, matched, Outcome::Cancelled);
                }

                let run = AssertUnwindSafe(policy.execute_with(&groups, &options))
                    .catch_unwind()
                    .await;
                let outcome = match run {
                    Ok(scaled) => Outcome::Finished(scaled),
                    Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
                };
                (index, policy, matched, outcome)
            });
        }

        let mut finished = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => finished.push(result),
                Err(e) => error!(error = %e, "policy task failed"),
            }
        }
        finished.sort_by_key(|(index, ..)| *index);

        let mut executed = Vec::new();
        for (_, policy, matched, outcome) in finished {
            let monitor = policy.monitor_name();
            match outcome {
                Outcome::Finished(scaled) if !scaled.is_empty() => {
                    info!(
                        policy = %monitor,
                        matched,
                        scaled = scaled.len(),
                        "policy executed"
                    );
                    executed.push(policy);
                }
                Outcome::Finished(_) if matched > 0 => {
                    warn!(policy = %monitor, matched, "policy matched groups but resized none");
                }
                Outcome::Finished(_) => {
                    debug!(policy = %monitor, "policy matched no groups");
                }
                Outcome::Cancelled => {
                    debug!(policy = %monitor, "run cancelled, policy not executed");
                }
                Outcome::Panicked(message) => {
                    error!(policy = %monitor, panic = %message, "policy execution panicked");
                }
            }
        }
        executed
    }

    /// Match `policies` to `groups` and execute them.
    pub async fn run(&self, policies: &[PolicyRef], groups: &[GroupRef]) -> Vec<PolicyRef> {
        let mapping = map_policies_to_groups(policies, groups);
        let executed = self.execute_all(mapping).await;
        info!(
            policies = policies.len(),
            groups = groups.len(),
            executed = executed.len(),
            "scaling run complete"
        );
        executed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ScalingPolicy;
    use crate::self_managed::SelfManagedPolicy;
    use alertscale_core::{Capacity, Filters, ScaleResult, tag_map};
    use alertscale_provider::ResizableGroup;
    use alertscale_provider::mock::MockGroup;
    use async_trait::async_trait;
    use std::time::Duration;

    fn self_managed(monitor: &str, env: &str, adjustment: &str) -> PolicyRef {
        Arc::new(
            SelfManagedPolicy::new(
                monitor,
                tag_map([("environment", env)]),
                adjustment,
                Duration::from_secs(300),
            )
            .unwrap(),
        )
    }

    fn tagged(name: &str, env: &str, desired: u32) -> Arc<MockGroup> {
        Arc::new(
            MockGroup::new(name, Capacity::new(1, desired, 10))
                .with_tags([("environment", env), ("hostclass", "x")]),
        )
    }

    fn monitors(policies: &[PolicyRef]) -> Vec<&str> {
        policies.iter().map(|p| p.monitor_name()).collect()
    }

    #[derive(Debug)]
    struct Panics(Filters);

    #[async_trait]
    impl ScalingPolicy for Panics {
        fn monitor_name(&self) -> &str {
            "panics"
        }
        fn filters(&self) -> &Filters {
            &self.0
        }
        async fn should_execute(&self, _group: &dyn ResizableGroup) -> ScaleResult<bool> {
            panic!("broken policy state")
        }
        async fn scale(&self, group: &dyn ResizableGroup) -> ScaleResult<bool> {
            self.should_execute(group).await
        }
    }

    #[test]
    fn maps_by_tags_and_keeps_unmatched_policies() {
        let prod = tagged("web-prod", "prod", 2);
        let staging = tagged("web-staging", "staging", 2);
        let groups: Vec<GroupRef> = vec![prod as GroupRef, staging];
        let policies = vec![
            self_managed("prod-high", "prod", "+1"),
            self_managed("qa-high", "qa", "+1"),
            Arc::new(Panics(Filters::new())) as PolicyRef,
        ];

        let mapping = map_policies_to_groups(&policies, &groups);

        let shape: Vec<(&str, Vec<&str>)> = mapping
            .iter()
            .map(|(p, gs)| (p.monitor_name(), gs.iter().map(|g| g.name()).collect()))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("prod-high", vec!["web-prod"]),
                ("qa-high", vec![]),
                ("panics", vec!["web-prod", "web-staging"]),
            ]
        );
    }

    #[tokio::test]
    async fn reports_only_policies_that_resized() {
        let prod = tagged("web-prod", "prod", 2);
        let staging = tagged("web-staging", "staging", 10);
        let groups: Vec<GroupRef> = vec![prod.clone() as GroupRef, staging.clone()];
        let policies = vec![
            self_managed("prod-high", "prod", "+1"),
            self_managed("staging-high", "staging", "+1"),
            self_managed("qa-high", "qa", "+1"),
        ];

        let executed = Coordinator::default().run(&policies, &groups).await;

        assert_eq!(monitors(&executed), vec!["prod-high"]);
        assert_eq!(prod.resizes(), vec![3]);
        assert!(staging.resizes().is_empty());
    }

    #[tokio::test]
    async fn panicking_policy_does_not_stop_the_others() {
        let groups: Vec<GroupRef> = vec![tagged("web-prod", "prod", 2) as GroupRef];
        let policies = vec![
            Arc::new(Panics(Filters::new())) as PolicyRef,
            self_managed("prod-high", "prod", "+1"),
        ];

        let executed = Coordinator::default().run(&policies, &groups).await;

        assert_eq!(monitors(&executed), vec!["prod-high"]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_policies_report_in_input_order() {
        let slow = Arc::new(
            MockGroup::new("slow", Capacity::new(1, 2, 10))
                .with_tags([("environment", "slow")])
                .with_resize_delay(Duration::from_secs(5)),
        );
        let fast = tagged("fast", "fast", 2);
        let groups: Vec<GroupRef> = vec![slow.clone() as GroupRef, fast];
        let policies = vec![
            self_managed("slow-high", "slow", "+1"),
            self_managed("fast-high", "fast", "+1"),
        ];
        let limits = WorkerLimits {
            policy_workers: 2,
            group_workers: 1,
        };

        let executed = Coordinator::new(limits).run(&policies, &groups).await;

        assert_eq!(monitors(&executed), vec!["slow-high", "fast-high"]);
    }

    #[tokio::test]
    async fn shutdown_before_run_executes_nothing() {
        let prod = tagged("web-prod", "prod", 2);
        let groups: Vec<GroupRef> = vec![prod.clone() as GroupRef];
        let policies = vec![self_managed("prod-high", "prod", "+1")];
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let executed = Coordinator::default()
            .with_shutdown(rx)
            .run(&policies, &groups)
            .await;

        assert!(executed.is_empty());
        assert!(prod.resizes().is_empty());
    }
}
