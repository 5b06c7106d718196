//! Cooldown evaluation from provider scaling history.
//!
//! A group is cooling down when its most recent scaling-related event
//! ended less than `cooldown` ago, or has not ended at all. Which
//! history entries count as scaling-related is decided by matching
//! provider free text against a configurable phrase set.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::client::{GroupEvent, ScalingActivity};

/// Phrases that identify scaling-related history entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CauseMatcher {
    phrases: Vec<String>,
}

impl CauseMatcher {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases.into_iter().map(Into::into).collect(),
        }
    }

    /// True if `text` contains any phrase.
    pub fn matches(&self, text: &str) -> bool {
        self.phrases.iter().any(|p| text.contains(p.as_str()))
    }

    /// True if the event type equals, or the message contains, any phrase.
    pub fn matches_event(&self, event: &GroupEvent) -> bool {
        self.phrases
            .iter()
            .any(|p| event.event_type == *p || event.message.contains(p.as_str()))
    }
}

/// The most recent scaling-related entry in a group's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatestScaling {
    /// Started but not yet finished.
    InFlight,
    Finished(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    /// No recent scaling; the group may be resized.
    Idle,
    InFlight,
    CoolingDown { remaining: Duration },
}

impl CooldownState {
    pub fn is_cooling(&self) -> bool {
        !matches!(self, CooldownState::Idle)
    }
}

/// Decide the cooldown state at `now`.
///
/// An entry that finished exactly `cooldown` ago no longer blocks.
pub fn evaluate(
    latest: Option<LatestScaling>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> CooldownState {
    let ended = match latest {
        None => return CooldownState::Idle,
        Some(LatestScaling::InFlight) => return CooldownState::InFlight,
        Some(LatestScaling::Finished(ended)) => ended,
    };

    let until = chrono::Duration::from_std(cooldown)
        .ok()
        .and_then(|cd| ended.checked_add_signed(cd));

    match until {
        Some(until) if until <= now => CooldownState::Idle,
        Some(until) => CooldownState::CoolingDown {
            remaining: (until - now).to_std().unwrap_or_default(),
        },
        // Cooldown too large to represent: it cannot have elapsed.
        None => CooldownState::CoolingDown {
            remaining: cooldown,
        },
    }
}

/// First matching activity. Activities are listed most recent first.
pub fn latest_activity(
    activities: &[ScalingActivity],
    matcher: &CauseMatcher,
) -> Option<LatestScaling> {
    activities
        .iter()
        .find(|a| matcher.matches(&a.cause))
        .map(|a| match a.end_time {
            Some(end) => LatestScaling::Finished(end),
            None => LatestScaling::InFlight,
        })
}

/// Newest matching event, whatever order the log came back in.
pub fn latest_event(events: &[GroupEvent], matcher: &CauseMatcher) -> Option<LatestScaling> {
    events
        .iter()
        .filter(|e| matcher.matches_event(e))
        .map(|e| e.created_at)
        .max()
        .map(LatestScaling::Finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn activity(cause: &str, end: Option<DateTime<Utc>>) -> ScalingActivity {
        ScalingActivity {
            activity_id: String::new(),
            cause: cause.to_string(),
            start_time: now() - TimeDelta::hours(2),
            end_time: end,
        }
    }

    fn event(event_type: &str, message: &str, at: DateTime<Utc>) -> GroupEvent {
        GroupEvent {
            event_type: event_type.to_string(),
            message: message.to_string(),
            created_at: at,
        }
    }

    #[test]
    fn no_history_is_idle() {
        assert_eq!(
            evaluate(None, Duration::from_secs(600), now()),
            CooldownState::Idle
        );
    }

    #[test]
    fn in_flight_is_cooling() {
        let state = evaluate(Some(LatestScaling::InFlight), Duration::ZERO, now());
        assert_eq!(state, CooldownState::InFlight);
        assert!(state.is_cooling());
    }

    #[test]
    fn recent_finish_is_cooling() {
        let ended = now() - TimeDelta::seconds(100);
        let state = evaluate(
            Some(LatestScaling::Finished(ended)),
            Duration::from_secs(600),
            now(),
        );
        assert_eq!(
            state,
            CooldownState::CoolingDown {
                remaining: Duration::from_secs(500)
            }
        );
    }

    #[test]
    fn old_finish_is_idle() {
        let ended = now() - TimeDelta::seconds(601);
        let state = evaluate(
            Some(LatestScaling::Finished(ended)),
            Duration::from_secs(600),
            now(),
        );
        assert_eq!(state, CooldownState::Idle);
    }

    #[test]
    fn boundary_is_idle() {
        let ended = now() - TimeDelta::seconds(600);
        let state = evaluate(
            Some(LatestScaling::Finished(ended)),
            Duration::from_secs(600),
            now(),
        );
        assert_eq!(state, CooldownState::Idle);
    }

    #[test]
    fn latest_activity_uses_first_match() {
        let matcher = CauseMatcher::new(["changing the desired capacity"]);
        let activities = vec![
            activity("an instance was taken out of service", None),
            activity(
                "user request explicitly set group desired capacity changing the desired capacity from 2 to 3",
                Some(now() - TimeDelta::seconds(30)),
            ),
            activity(
                "changing the desired capacity from 1 to 2",
                Some(now() - TimeDelta::hours(1)),
            ),
        ];

        assert_eq!(
            latest_activity(&activities, &matcher),
            Some(LatestScaling::Finished(now() - TimeDelta::seconds(30)))
        );
    }

    #[test]
    fn unmatched_activity_is_ignored() {
        let matcher = CauseMatcher::new(["changing the desired capacity"]);
        let activities = vec![activity("health check failed", None)];
        assert_eq!(latest_activity(&activities, &matcher), None);
    }

    #[test]
    fn latest_event_takes_newest_match() {
        let matcher = CauseMatcher::new(["Scale", "Update"]);
        let events = vec![
            event("Scale", "scaled up by 2", now() - TimeDelta::minutes(40)),
            event("Info", "instance healthy", now() - TimeDelta::minutes(1)),
            event("Update", "group updated", now() - TimeDelta::minutes(10)),
        ];

        assert_eq!(
            latest_event(&events, &matcher),
            Some(LatestScaling::Finished(now() - TimeDelta::minutes(10)))
        );
    }

    #[test]
    fn event_message_can_match() {
        let matcher = CauseMatcher::new(["Scale"]);
        let e = event("GROUP_LOG", "Scale down requested", now());
        assert!(matcher.matches_event(&e));
        assert!(!matcher.matches_event(&event("GROUP_LOG", "healthy", now())));
    }
}
