//! alertscale-provider: the seam between scaling policies and cloud
//! providers.
//!
//! Policies never talk to a provider directly. They see
//! [`ResizableGroup`]s, built from provider-native records plus an
//! injected client:
//!
//! ```text
//! discover_groups()
//!   ├── DelegatedApi    → DelegatedGroup    (provider runs policies natively)
//!   └── SelfManagedApi  → SelfManagedGroup  (raw scale-up / scale-down)
//!
//! ResizableGroup
//!   ├── resize(n)            → throttled_call(provider primitive)
//!   └── is_cooling_down(cd)  → provider history → cooldown::evaluate()
//! ```
//!
//! Every provider call goes through [`throttled_call`], which retries
//! rate-limited responses with Fibonacci backoff (1s, 1s, 2s, 3s, 5s …,
//! capped) inside a fixed wall-clock budget.

pub mod client;
pub mod cooldown;
pub mod delegated;
pub mod discovery;
pub mod group;
pub mod paging;
pub mod retry;
pub mod self_managed;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use client::{
    DelegatedApi, DelegatedGroupRecord, GroupEvent, NativeAdjustmentType, NativePolicy,
    NativePolicyType, Page, ScalingActivity, SelfManagedApi, SelfManagedGroupRecord,
};
pub use cooldown::{CauseMatcher, CooldownState, LatestScaling};
pub use delegated::DelegatedGroup;
pub use discovery::{GroupSources, discover_groups};
pub use group::{GroupRef, ResizableGroup};
pub use paging::collect_pages;
pub use retry::{FibonacciBackoff, throttled_call};
pub use self_managed::SelfManagedGroup;
