//! The policy abstraction and the shared per-batch execution loop.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::sync::watch;
use tracing::{debug, error};

use alertscale_core::{Filters, ScaleResult, filters_match};
use alertscale_provider::{GroupRef, ResizableGroup};

/// A scaling rule derived from one triggered alert.
#[async_trait]
pub trait ScalingPolicy: Send + Sync + fmt::Debug {
    /// Name of the alert this policy came from.
    fn monitor_name(&self) -> &str;

    fn filters(&self) -> &Filters;

    /// True iff every filter entry appears, with an equal value, in the
    /// group's metadata.
    fn matches(&self, group: &dyn ResizableGroup) -> bool {
        filters_match(self.filters(), group.metadata())
    }

    /// Whether this policy should act on `group` right now.
    async fn should_execute(&self, group: &dyn ResizableGroup) -> ScaleResult<bool>;

    /// Check and, if warranted, act on a single group.
    ///
    /// `Ok(true)` means the group was resized.
    async fn scale(&self, group: &dyn ResizableGroup) -> ScaleResult<bool>;

    /// Act on every group one at a time, returning the ones resized.
    async fn execute(&self, groups: &[GroupRef]) -> Vec<GroupRef> {
        self.execute_with(groups, &ExecuteOptions::default()).await
    }

    /// [`execute`](Self::execute) with explicit worker limits and
    /// cancellation.
    async fn execute_with(&self, groups: &[GroupRef], options: &ExecuteOptions) -> Vec<GroupRef> {
        execute_groups(self, groups, options).await
    }
}

/// Shared handle to a policy.
pub type PolicyRef = Arc<dyn ScalingPolicy>;

/// Limits and cancellation for executing a policy over its groups.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Groups scaled concurrently within one policy.
    pub group_workers: usize,
    /// When the value turns `true`, no new group attempts start.
    pub shutdown: Option<watch::Receiver<bool>>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            group_workers: 1,
            shutdown: None,
        }
    }
}

impl ExecuteOptions {
    pub fn new(group_workers: usize) -> Self {
        Self {
            group_workers,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// Run `policy` against each group and return the groups it resized,
/// in input order.
///
/// Each group is attempted independently: an error is logged and the
/// group left out of the result. Up to `group_workers` attempts run at
/// once.
pub async fn execute_groups<P>(
    policy: &P,
    groups: &[GroupRef],
    options: &ExecuteOptions,
) -> Vec<GroupRef>
where
    P: ScalingPolicy + ?Sized,
{
    let workers = options.group_workers.max(1);

    // Built up front so each future has a concrete lifetime; futures
    // are lazy, so nothing starts until the stream polls it.
    let mut attempts = Vec::with_capacity(groups.len());
    for group in groups {
        attempts.push(attempt(policy, group, options));
    }

    let outcomes: Vec<Option<GroupRef>> = stream::iter(attempts).buffered(workers).collect().await;

    outcomes.into_iter().flatten().collect()
}

async fn attempt<P>(policy: &P, group: &GroupRef, options: &ExecuteOptions) -> Option<GroupRef>
where
    P: ScalingPolicy + ?Sized,
{
    if options.is_cancelled() {
        debug!(
            policy = %policy.monitor_name(),
            group = %group.name(),
            "run cancelled, group not attempted"
        );
        return None;
    }

    match policy.scale(group.as_ref()).await {
        Ok(true) => Some(Arc::clone(group)),
        Ok(false) => None,
        Err(e) => {
            error!(
                policy = %policy.monitor_name(),
                group = %group.name(),
                error = %e,
                "unable to scale group"
            );
            None
        }
    }
}
