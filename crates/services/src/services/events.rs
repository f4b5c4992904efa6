//! The normalized event fanned out to live subscribers.

use chrono::{DateTime, Utc};
use db::types::MovementType;
use serde::{Deserialize, Serialize};
use utils::pubsub::Topic;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveEventKind {
    Location,
    Arrival,
    Exit,
    Resume,
    OtpVerified,
}

/// Carries its own `recorded_at` so consumers can order by event time
/// rather than delivery time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    pub kind: LiveEventKind,
    pub task_id: Uuid,
    pub staff_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_type: Option<MovementType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl LiveEvent {
    /// Every event reaches exactly these three audiences.
    pub fn topics(&self) -> [Topic; 3] {
        [
            Topic::Task(self.task_id),
            Topic::AdminTracking,
            Topic::AdminStaff(self.staff_id),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_derived_from_the_event() {
        let task_id = Uuid::new_v4();
        let staff_id = Uuid::new_v4();
        let event = LiveEvent {
            kind: LiveEventKind::Location,
            task_id,
            staff_id,
            lat: Some(12.0),
            lng: Some(77.0),
            battery_percent: None,
            movement_type: None,
            address: None,
            city: None,
            exit_reason: None,
            recorded_at: Utc::now(),
        };
        assert_eq!(
            event.topics(),
            [
                Topic::Task(task_id),
                Topic::AdminTracking,
                Topic::AdminStaff(staff_id),
            ]
        );
    }

    #[test]
    fn empty_fields_are_omitted_from_json() {
        let event = LiveEvent {
            kind: LiveEventKind::Resume,
            task_id: Uuid::nil(),
            staff_id: Uuid::nil(),
            lat: None,
            lng: None,
            battery_percent: None,
            movement_type: None,
            address: None,
            city: None,
            exit_reason: None,
            recorded_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "resume");
        assert!(json.get("lat").is_none());
        assert!(json.get("exit_reason").is_none());
    }
}
