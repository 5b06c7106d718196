//! Provider client interfaces and provider-native record types.
//!
//! Transport clients (HTTP, SDKs, credentials) live outside this crate
//! and implement [`DelegatedApi`] or [`SelfManagedApi`]. Records mirror
//! the JSON shapes the providers return, so clients can deserialize
//! responses straight into them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use alertscale_core::{Capacity, Metadata, ProviderResult, tag_map};

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` (or empty) on the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A final page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    pub fn with_next(items: Vec<T>, next_token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(next_token.into()),
        }
    }
}

// ── Delegated provider ─────────────────────────────────────────────

/// Client for a provider that understands scaling policies natively.
#[async_trait]
pub trait DelegatedApi: Send + Sync {
    async fn set_desired_capacity(&self, group_name: &str, desired: u32) -> ProviderResult<()>;

    /// Recent scaling activity, most recent first.
    async fn describe_scaling_activities(
        &self,
        group_name: &str,
        next_token: Option<String>,
    ) -> ProviderResult<Page<ScalingActivity>>;

    /// Look up a named native policy. `Ok(None)` if the group has no
    /// policy by that name.
    async fn describe_policy(
        &self,
        group_name: &str,
        policy_name: &str,
    ) -> ProviderResult<Option<NativePolicy>>;

    async fn execute_policy(
        &self,
        group_name: &str,
        policy_name: &str,
        honor_cooldown: bool,
    ) -> ProviderResult<()>;

    async fn describe_groups(
        &self,
        next_token: Option<String>,
    ) -> ProviderResult<Page<DelegatedGroupRecord>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DelegatedGroupRecord {
    pub auto_scaling_group_name: String,
    #[serde(rename = "AutoScalingGroupARN")]
    pub auto_scaling_group_arn: String,
    pub min_size: u32,
    pub desired_capacity: u32,
    pub max_size: u32,
    #[serde(default)]
    pub tags: Vec<DelegatedTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DelegatedTag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl DelegatedGroupRecord {
    pub fn capacity(&self) -> Capacity {
        Capacity::new(self.min_size, self.desired_capacity, self.max_size)
    }

    pub fn metadata(&self) -> Metadata {
        tag_map(self.tags.iter().map(|t| (t.key.as_str(), t.value.as_str())))
    }
}

/// A long-running scaling activity on a delegated group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScalingActivity {
    #[serde(default)]
    pub activity_id: String,
    /// Free-text reason the provider recorded for the activity.
    pub cause: String,
    pub start_time: DateTime<Utc>,
    /// `None` while the activity is still running.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// A provider-native scaling policy as returned by `describe_policy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NativePolicy {
    #[serde(rename = "PolicyName")]
    pub name: String,
    pub policy_type: NativePolicyType,
    #[serde(default)]
    pub adjustment_type: Option<NativeAdjustmentType>,
    #[serde(default)]
    pub scaling_adjustment: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NativePolicyType {
    SimpleScaling,
    StepScaling,
    TargetTrackingScaling,
    Other(String),
}

impl From<String> for NativePolicyType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SimpleScaling" => NativePolicyType::SimpleScaling,
            "StepScaling" => NativePolicyType::StepScaling,
            "TargetTrackingScaling" => NativePolicyType::TargetTrackingScaling,
            _ => NativePolicyType::Other(s),
        }
    }
}

impl From<NativePolicyType> for String {
    fn from(t: NativePolicyType) -> Self {
        match t {
            NativePolicyType::SimpleScaling => "SimpleScaling".to_string(),
            NativePolicyType::StepScaling => "StepScaling".to_string(),
            NativePolicyType::TargetTrackingScaling => "TargetTrackingScaling".to_string(),
            NativePolicyType::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NativeAdjustmentType {
    ChangeInCapacity,
    ExactCapacity,
    PercentChangeInCapacity,
    Other(String),
}

impl From<String> for NativeAdjustmentType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ChangeInCapacity" => NativeAdjustmentType::ChangeInCapacity,
            "ExactCapacity" => NativeAdjustmentType::ExactCapacity,
            "PercentChangeInCapacity" => NativeAdjustmentType::PercentChangeInCapacity,
            _ => NativeAdjustmentType::Other(s),
        }
    }
}

impl From<NativeAdjustmentType> for String {
    fn from(t: NativeAdjustmentType) -> Self {
        match t {
            NativeAdjustmentType::ChangeInCapacity => "ChangeInCapacity".to_string(),
            NativeAdjustmentType::ExactCapacity => "ExactCapacity".to_string(),
            NativeAdjustmentType::PercentChangeInCapacity => "PercentChangeInCapacity".to_string(),
            NativeAdjustmentType::Other(s) => s,
        }
    }
}

// ── Self-managed provider ──────────────────────────────────────────

/// Client for a provider with no native policies: capacity only moves
/// through explicit scale-up / scale-down calls.
#[async_trait]
pub trait SelfManagedApi: Send + Sync {
    async fn scale_up(&self, group_id: &str, adjustment: u32) -> ProviderResult<()>;

    async fn scale_down(&self, group_id: &str, adjustment: u32) -> ProviderResult<()>;

    /// Event log entries created between `from` and `to`.
    async fn group_events(
        &self,
        group_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ProviderResult<Vec<GroupEvent>>;

    async fn list_groups(&self) -> ProviderResult<Vec<SelfManagedGroupRecord>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfManagedGroupRecord {
    pub id: String,
    pub name: String,
    pub capacity: SelfManagedCapacity,
    #[serde(default)]
    pub compute: Option<SelfManagedCompute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfManagedCapacity {
    pub minimum: u32,
    pub target: u32,
    pub maximum: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfManagedCompute {
    #[serde(default)]
    pub launch_specification: Option<LaunchSpecification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpecification {
    #[serde(default)]
    pub tags: Vec<SelfManagedTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfManagedTag {
    pub tag_key: String,
    #[serde(default)]
    pub tag_value: String,
}

impl SelfManagedGroupRecord {
    pub fn capacity(&self) -> Capacity {
        Capacity::new(
            self.capacity.minimum,
            self.capacity.target,
            self.capacity.maximum,
        )
    }

    pub fn metadata(&self) -> Metadata {
        let tags = self
            .compute
            .as_ref()
            .and_then(|c| c.launch_specification.as_ref())
            .map(|spec| spec.tags.as_slice())
            .unwrap_or_default();
        tag_map(tags.iter().map(|t| (t.tag_key.as_str(), t.tag_value.as_str())))
    }
}

/// A discrete event-log line on a self-managed group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEvent {
    pub event_type: String,
    #[serde(default)]
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegated_record_from_provider_json() {
        let json = r#"{
            "AutoScalingGroupName": "web-prod",
            "AutoScalingGroupARN": "arn:aws:autoscaling:us-east-1:1:autoScalingGroup:abc",
            "MinSize": 1,
            "DesiredCapacity": 3,
            "MaxSize": 10,
            "Tags": [
                {"Key": "environment", "Value": "prod"},
                {"Key": "hostclass", "Value": "web"}
            ]
        }"#;
        let record: DelegatedGroupRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.capacity(), Capacity::new(1, 3, 10));
        let metadata = record.metadata();
        assert_eq!(metadata.get("environment").map(String::as_str), Some("prod"));
        assert_eq!(metadata.get("hostclass").map(String::as_str), Some("web"));
    }

    #[test]
    fn delegated_record_without_tags() {
        let json = r#"{
            "AutoScalingGroupName": "bare",
            "AutoScalingGroupARN": "arn:bare",
            "MinSize": 0,
            "DesiredCapacity": 0,
            "MaxSize": 2
        }"#;
        let record: DelegatedGroupRecord = serde_json::from_str(json).unwrap();
        assert!(record.metadata().is_empty());
    }

    #[test]
    fn self_managed_record_from_provider_json() {
        let json = r#"{
            "id": "sig-1234",
            "name": "batch-prod",
            "capacity": {"minimum": 2, "target": 4, "maximum": 8, "unit": "instance"},
            "compute": {
                "launchSpecification": {
                    "tags": [{"tagKey": "hostclass", "tagValue": "batch"}]
                }
            }
        }"#;
        let record: SelfManagedGroupRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.capacity(), Capacity::new(2, 4, 8));
        assert_eq!(
            record.metadata().get("hostclass").map(String::as_str),
            Some("batch")
        );
    }

    #[test]
    fn self_managed_record_without_compute() {
        let json = r#"{
            "id": "sig-1",
            "name": "empty",
            "capacity": {"minimum": 0, "target": 0, "maximum": 0}
        }"#;
        let record: SelfManagedGroupRecord = serde_json::from_str(json).unwrap();
        assert!(record.metadata().is_empty());
    }

    #[test]
    fn native_policy_types_parse() {
        let json = r#"{
            "PolicyName": "scale-out",
            "PolicyType": "SimpleScaling",
            "AdjustmentType": "ChangeInCapacity",
            "ScalingAdjustment": 2
        }"#;
        let policy: NativePolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.policy_type, NativePolicyType::SimpleScaling);
        assert_eq!(
            policy.adjustment_type,
            Some(NativeAdjustmentType::ChangeInCapacity)
        );
        assert_eq!(policy.scaling_adjustment, Some(2));

        let json = r#"{"PolicyName": "tt", "PolicyType": "TargetTrackingScaling"}"#;
        let policy: NativePolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.policy_type, NativePolicyType::TargetTrackingScaling);
        assert_eq!(policy.scaling_adjustment, None);

        assert_eq!(
            NativePolicyType::from("Predictive".to_string()),
            NativePolicyType::Other("Predictive".to_string())
        );
    }

    #[test]
    fn activity_without_end_time() {
        let json = r#"{
            "ActivityId": "a-1",
            "Cause": "At 2024-01-01T00:00:00Z a user request explicitly set group desired capacity changing the desired capacity from 1 to 2.",
            "StartTime": "2024-01-01T00:00:00Z"
        }"#;
        let activity: ScalingActivity = serde_json::from_str(json).unwrap();
        assert!(activity.end_time.is_none());
    }
}
