//! The resizable group abstraction policies operate on.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use alertscale_core::{Capacity, Metadata, ProviderKind, ScaleResult};

/// A provider-managed pool of instances with min/desired/max capacity.
///
/// Built fresh from a provider listing on every run. The reported
/// capacity is a snapshot: it is not refreshed after [`resize`], so
/// callers must not expect it to reflect the new size.
///
/// [`resize`]: ResizableGroup::resize
#[async_trait]
pub trait ResizableGroup: Send + Sync + fmt::Debug {
    /// Display name.
    fn name(&self) -> &str;

    /// Provider-unique identifier.
    fn identifier(&self) -> &str;

    fn provider(&self) -> ProviderKind;

    fn capacity(&self) -> Capacity;

    fn metadata(&self) -> &Metadata;

    /// Set the group's desired capacity to `new_size`.
    async fn resize(&self, new_size: u32) -> ScaleResult<()>;

    /// Whether the group scaled within the last `cooldown`, or is
    /// scaling right now. Read-only.
    async fn is_cooling_down(&self, cooldown: Duration) -> ScaleResult<bool>;
}

/// Shared handle to a group; a group may be matched by several policies.
pub type GroupRef = Arc<dyn ResizableGroup>;

/// Debug output shared by the group implementations.
pub(crate) fn debug_group(
    f: &mut fmt::Formatter<'_>,
    type_name: &str,
    name: &str,
    identifier: &str,
    capacity: Capacity,
    metadata: &Metadata,
) -> fmt::Result {
    f.debug_struct(type_name)
        .field("name", &name)
        .field("id", &identifier)
        .field("min_size", &capacity.min)
        .field("desired_size", &capacity.desired)
        .field("max_size", &capacity.max)
        .field("metadata", metadata)
        .finish()
}
