use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Task lifecycle. Transition validity is enforced by
/// [`crate::models::task::Task::update_status`], not by the type itself.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "reopened")]
    Reopened,
}

impl TaskStatus {
    /// The only legal moves: the linear chain assigned → pending → scheduled
    /// → in_progress → completed, reopening a completed task, and resuming a
    /// reopened one.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Assigned, Pending)
                | (Pending, Scheduled)
                | (Scheduled, InProgress)
                | (InProgress, Completed)
                | (Completed, Reopened)
                | (Reopened, InProgress)
        )
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MovementType {
    #[sea_orm(string_value = "drive")]
    Drive,
    #[sea_orm(string_value = "walk")]
    Walk,
    #[sea_orm(string_value = "stop")]
    Stop,
}

/// The four independent proof-gathering gates on a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProgressStep {
    ReachedLocation,
    PhotoProof,
    FormFilled,
    OtpVerified,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn transition_table_accepts_the_chain() {
        use TaskStatus::*;
        assert!(Assigned.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Scheduled));
        assert!(Scheduled.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Reopened));
        assert!(Reopened.can_transition_to(InProgress));
    }

    #[test]
    fn transition_table_rejects_everything_else() {
        use TaskStatus::*;
        assert!(!Assigned.can_transition_to(InProgress));
        assert!(!Assigned.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Assigned));
        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Scheduled));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Reopened.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn unrecognized_status_strings_are_rejected() {
        assert!(TaskStatus::from_str("in_progress").is_ok());
        assert!(TaskStatus::from_str("cancelled").is_err());
        assert!(TaskStatus::from_str("").is_err());
    }

    #[test]
    fn progress_step_names_round_trip() {
        assert_eq!(
            ProgressStep::from_str("reached_location").unwrap(),
            ProgressStep::ReachedLocation
        );
        assert_eq!(ProgressStep::OtpVerified.to_string(), "otp_verified");
    }
}
