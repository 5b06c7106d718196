//! Hand-written provider mocks for tests.
//!
//! Each mock records its calls as short strings (`"scale_up sig-1 3"`)
//! so tests can assert on exactly what reached the provider.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use alertscale_core::{
    Capacity, Metadata, ProviderError, ProviderKind, ProviderResult, ScaleError, ScaleResult,
    tag_map,
};

use crate::client::{
    DelegatedApi, DelegatedGroupRecord, GroupEvent, NativePolicy, Page, ScalingActivity,
    SelfManagedApi, SelfManagedGroupRecord,
};
use crate::group::{GroupRef, ResizableGroup};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn page_at<T: Clone>(pages: &[Vec<T>], token: Option<&str>) -> Page<T> {
    let index = token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
    let items = pages.get(index).cloned().unwrap_or_default();
    if index + 1 < pages.len() {
        Page::with_next(items, (index + 1).to_string())
    } else {
        Page::last(items)
    }
}

// ── Delegated provider ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockDelegatedApi {
    calls: Mutex<Vec<String>>,
    throttles_left: AtomicU32,
    resize_failures: Mutex<HashMap<String, ProviderError>>,
    execute_failures: Mutex<HashMap<String, ProviderError>>,
    activities: Mutex<HashMap<String, Vec<Vec<ScalingActivity>>>>,
    activity_failure: Mutex<Option<ProviderError>>,
    policies: Mutex<HashMap<(String, String), NativePolicy>>,
    lookup_failure: Mutex<Option<ProviderError>>,
    group_pages: Mutex<Vec<Vec<DelegatedGroupRecord>>>,
    listing_failure: Mutex<Option<ProviderError>>,
}

impl MockDelegatedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// The next `n` calls of any kind fail with a throttle.
    pub fn throttle_next(&self, n: u32) {
        self.throttles_left.store(n, Ordering::SeqCst);
    }

    pub fn fail_resize(&self, group: &str, err: ProviderError) {
        lock(&self.resize_failures).insert(group.to_string(), err);
    }

    pub fn fail_execute(&self, group: &str, err: ProviderError) {
        lock(&self.execute_failures).insert(group.to_string(), err);
    }

    /// Activity history for a group, one inner vec per page.
    pub fn set_activities(&self, group: &str, pages: Vec<Vec<ScalingActivity>>) {
        lock(&self.activities).insert(group.to_string(), pages);
    }

    pub fn fail_activities(&self, err: ProviderError) {
        *lock(&self.activity_failure) = Some(err);
    }

    pub fn set_policy(&self, group: &str, policy: NativePolicy) {
        lock(&self.policies).insert((group.to_string(), policy.name.clone()), policy);
    }

    pub fn fail_policy_lookup(&self, err: ProviderError) {
        *lock(&self.lookup_failure) = Some(err);
    }

    pub fn set_group_pages(&self, pages: Vec<Vec<DelegatedGroupRecord>>) {
        *lock(&self.group_pages) = pages;
    }

    pub fn fail_listing(&self, err: ProviderError) {
        *lock(&self.listing_failure) = Some(err);
    }

    fn record(&self, call: String) -> ProviderResult<()> {
        lock(&self.calls).push(call);
        let throttled = self
            .throttles_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            Err(ProviderError::Throttled {
                code: "Throttling".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DelegatedApi for MockDelegatedApi {
    async fn set_desired_capacity(&self, group_name: &str, desired: u32) -> ProviderResult<()> {
        self.record(format!("set_desired_capacity {group_name} {desired}"))?;
        match lock(&self.resize_failures).get(group_name) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn describe_scaling_activities(
        &self,
        group_name: &str,
        next_token: Option<String>,
    ) -> ProviderResult<Page<ScalingActivity>> {
        let token = next_token.as_deref().unwrap_or("-");
        self.record(format!("describe_scaling_activities {group_name} {token}"))?;
        if let Some(err) = lock(&self.activity_failure).clone() {
            return Err(err);
        }
        let activities = lock(&self.activities);
        let pages = activities.get(group_name).map(Vec::as_slice).unwrap_or_default();
        Ok(page_at(pages, next_token.as_deref()))
    }

    async fn describe_policy(
        &self,
        group_name: &str,
        policy_name: &str,
    ) -> ProviderResult<Option<NativePolicy>> {
        self.record(format!("describe_policy {group_name} {policy_name}"))?;
        if let Some(err) = lock(&self.lookup_failure).clone() {
            return Err(err);
        }
        Ok(lock(&self.policies)
            .get(&(group_name.to_string(), policy_name.to_string()))
            .cloned())
    }

    async fn execute_policy(
        &self,
        group_name: &str,
        policy_name: &str,
        honor_cooldown: bool,
    ) -> ProviderResult<()> {
        self.record(format!(
            "execute_policy {group_name} {policy_name} honor_cooldown={honor_cooldown}"
        ))?;
        match lock(&self.execute_failures).get(group_name) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn describe_groups(
        &self,
        next_token: Option<String>,
    ) -> ProviderResult<Page<DelegatedGroupRecord>> {
        let token = next_token.as_deref().unwrap_or("-");
        self.record(format!("describe_groups {token}"))?;
        if let Some(err) = lock(&self.listing_failure).clone() {
            return Err(err);
        }
        Ok(page_at(&lock(&self.group_pages), next_token.as_deref()))
    }
}

// ── Self-managed provider ──────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockSelfManagedApi {
    calls: Mutex<Vec<String>>,
    scaling_failures: Mutex<HashMap<String, ProviderError>>,
    events: Mutex<HashMap<String, Vec<GroupEvent>>>,
    event_failure: Mutex<Option<ProviderError>>,
    event_windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    groups: Mutex<Vec<SelfManagedGroupRecord>>,
    listing_failure: Mutex<Option<ProviderError>>,
}

impl MockSelfManagedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn fail_scaling(&self, group_id: &str, err: ProviderError) {
        lock(&self.scaling_failures).insert(group_id.to_string(), err);
    }

    pub fn set_events(&self, group_id: &str, events: Vec<GroupEvent>) {
        lock(&self.events).insert(group_id.to_string(), events);
    }

    pub fn fail_events(&self, err: ProviderError) {
        *lock(&self.event_failure) = Some(err);
    }

    /// `(from, to)` of every event-log request.
    pub fn event_windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        lock(&self.event_windows).clone()
    }

    pub fn set_groups(&self, groups: Vec<SelfManagedGroupRecord>) {
        *lock(&self.groups) = groups;
    }

    pub fn fail_listing(&self, err: ProviderError) {
        *lock(&self.listing_failure) = Some(err);
    }

    fn scale(&self, call: String, group_id: &str) -> ProviderResult<()> {
        lock(&self.calls).push(call);
        match lock(&self.scaling_failures).get(group_id) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SelfManagedApi for MockSelfManagedApi {
    async fn scale_up(&self, group_id: &str, adjustment: u32) -> ProviderResult<()> {
        self.scale(format!("scale_up {group_id} {adjustment}"), group_id)
    }

    async fn scale_down(&self, group_id: &str, adjustment: u32) -> ProviderResult<()> {
        self.scale(format!("scale_down {group_id} {adjustment}"), group_id)
    }

    async fn group_events(
        &self,
        group_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ProviderResult<Vec<GroupEvent>> {
        lock(&self.calls).push(format!("group_events {group_id}"));
        lock(&self.event_windows).push((from, to));
        if let Some(err) = lock(&self.event_failure).clone() {
            return Err(err);
        }
        Ok(lock(&self.events).get(group_id).cloned().unwrap_or_default())
    }

    async fn list_groups(&self) -> ProviderResult<Vec<SelfManagedGroupRecord>> {
        lock(&self.calls).push("list_groups".to_string());
        if let Some(err) = lock(&self.listing_failure).clone() {
            return Err(err);
        }
        Ok(lock(&self.groups).clone())
    }
}

// ── Group ──────────────────────────────────────────────────────────

/// An in-memory group with scripted cooldown and resize behaviour.
#[derive(Debug)]
pub struct MockGroup {
    name: String,
    capacity: Capacity,
    metadata: Metadata,
    cooling: bool,
    cooldown_failure: Option<ProviderError>,
    resize_failure: Option<ProviderError>,
    resize_delay: Duration,
    resizes: Mutex<Vec<u32>>,
    cooldown_checks: AtomicU32,
}

impl MockGroup {
    pub fn new(name: &str, capacity: Capacity) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            metadata: Metadata::new(),
            cooling: false,
            cooldown_failure: None,
            resize_failure: None,
            resize_delay: Duration::ZERO,
            resizes: Mutex::new(Vec::new()),
            cooldown_checks: AtomicU32::new(0),
        }
    }

    pub fn with_tags<'a>(mut self, tags: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.metadata = tag_map(tags);
        self
    }

    pub fn cooling_down(mut self) -> Self {
        self.cooling = true;
        self
    }

    pub fn failing_cooldown(mut self) -> Self {
        self.cooldown_failure = Some(ProviderError::Transport("history unavailable".to_string()));
        self
    }

    pub fn failing_resize(mut self) -> Self {
        self.resize_failure = Some(ProviderError::from_code("ValidationError", "resize rejected"));
        self
    }

    /// Make each resize take `delay` before completing.
    pub fn with_resize_delay(mut self, delay: Duration) -> Self {
        self.resize_delay = delay;
        self
    }

    /// Sizes passed to `resize`, in call order (failed calls included).
    pub fn resizes(&self) -> Vec<u32> {
        lock(&self.resizes).clone()
    }

    pub fn cooldown_checks(&self) -> u32 {
        self.cooldown_checks.load(Ordering::SeqCst)
    }

    pub fn into_ref(self) -> GroupRef {
        std::sync::Arc::new(self)
    }
}

#[async_trait]
impl ResizableGroup for MockGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier(&self) -> &str {
        &self.name
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
        if !self.resize_delay.is_zero() {
            tokio::time::sleep(self.resize_delay).await;
        }
        lock(&self.resizes).push(new_size);
        match &self.resize_failure {
            Some(err) => Err(ScaleError::Resize {
                group: self.name.clone(),
                source: err.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn is_cooling_down(&self, _cooldown: Duration) -> ScaleResult<bool> {
        self.cooldown_checks.fetch_add(1, Ordering::SeqCst);
        match &self.cooldown_failure {
            Some(err) => Err(ScaleError::Cooldown {
                group: self.name.clone(),
                source: err.clone(),
            }),
            None => Ok(self.cooling),
        }
    }
}
