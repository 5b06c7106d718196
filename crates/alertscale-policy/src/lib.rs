//! alertscale-policy: turns triggered alerts into bounded group resizes.
//!
//! A policy is derived from an alert (outside this crate) and carries
//! tag filters that select the groups it applies to. Two kinds exist:
//!
//! - [`DelegatedPolicy`]: names a policy the provider runs itself. The
//!   provider applies the adjustment and honours its own cooldown.
//! - [`SelfManagedPolicy`]: carries an adjustment expression and a
//!   cooldown. The new size is computed here and applied with
//!   [`ResizableGroup::resize`](alertscale_provider::ResizableGroup::resize).
//!
//! # Adjustment expressions
//!
//! ```text
//! "4"      new size = 4
//! "+2"     new size = desired + 2        ("-2" subtracts)
//! "10%"    new size = desired + ceil(10% of desired)
//! "-20%"   new size = desired - ceil(20% of desired)
//! ```
//!
//! Every result is clamped into `[min, max]` before it is compared with
//! the current size or applied.
//!
//! # Run
//!
//! ```text
//! Coordinator::run(policies, groups)
//!   ├── map_policies_to_groups()      tag filters, conjunctive exact match
//!   └── execute_all()                 one task per policy, bounded
//!       └── execute_groups()          per group: should_execute → resize
//! ```
//!
//! Failures are contained at the smallest scope: a group that cannot be
//! scaled is logged and skipped, a policy that fails does not stop the
//! others, and `run` only reports which policies resized something.

pub mod adjustment;
pub mod coordinator;
pub mod delegated;
pub mod policy;
pub mod self_managed;

pub use adjustment::{Adjustment, bound, resolve};
pub use coordinator::{Coordinator, PolicyGroups, map_policies_to_groups};
pub use delegated::{DelegatedPolicy, Refusal, check_native_policy};
pub use policy::{ExecuteOptions, PolicyRef, ScalingPolicy, execute_groups};
pub use self_managed::SelfManagedPolicy;
