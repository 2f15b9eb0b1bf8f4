use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GrantStatus {
    Researching,
    Eligible,
    Preparing,
    Submitted,
    UnderReview,
    Awarded,
    Declined,
    /// Any status outside the tracked lifecycle (e.g. `withdrawn`).
    Other(String),
}

impl GrantStatus {
    pub const ACTIVE: [GrantStatus; 5] = [
        GrantStatus::Researching,
        GrantStatus::Eligible,
        GrantStatus::Preparing,
        GrantStatus::Submitted,
        GrantStatus::UnderReview,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            GrantStatus::Researching => "researching",
            GrantStatus::Eligible => "eligible",
            GrantStatus::Preparing => "preparing",
            GrantStatus::Submitted => "submitted",
            GrantStatus::UnderReview => "under_review",
            GrantStatus::Awarded => "awarded",
            GrantStatus::Declined => "declined",
            GrantStatus::Other(value) => value,
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, GrantStatus::Awarded | GrantStatus::Declined)
    }
}

impl From<&str> for GrantStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "researching" => GrantStatus::Researching,
            "eligible" => GrantStatus::Eligible,
            "preparing" => GrantStatus::Preparing,
            "submitted" => GrantStatus::Submitted,
            "under_review" => GrantStatus::UnderReview,
            "awarded" => GrantStatus::Awarded,
            "declined" => GrantStatus::Declined,
            _ => GrantStatus::Other(value.trim().to_string()),
        }
    }
}

impl From<String> for GrantStatus {
    fn from(value: String) -> Self {
        GrantStatus::from(value.as_str())
    }
}

impl From<GrantStatus> for String {
    fn from(value: GrantStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority `{other}`")),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A funding record as the backend returns it; soft-deleted rows never get here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub id: Uuid,
    pub title: String,
    pub funder: String,
    pub status: GrantStatus,
    pub priority: Priority,
    pub amount_requested: Option<f64>,
    pub amount_awarded: Option<f64>,
    pub deadline_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEntry {
    pub id: Uuid,
    pub grant_id: Option<Uuid>,
    pub stage: String,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: Uuid,
    pub grant_id: Option<Uuid>,
    pub milestone: String,
    pub percent_complete: i32,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub body: String,
    pub usage_count: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub total_grants: usize,
    pub total_requested: f64,
    pub total_awarded: f64,
    pub awarded_count: usize,
    pub decided_count: usize,
    pub success_rate: f64,
    pub active_applications: usize,
    pub upcoming_deadlines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: GrantStatus,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_known_values_and_keeps_unknown() {
        assert_eq!(GrantStatus::from("under_review"), GrantStatus::UnderReview);
        assert_eq!(GrantStatus::from(" Awarded "), GrantStatus::Awarded);
        assert_eq!(
            GrantStatus::from("withdrawn"),
            GrantStatus::Other("withdrawn".to_string())
        );
        assert_eq!(GrantStatus::from("withdrawn").to_string(), "withdrawn");
    }

    #[test]
    fn unknown_status_keeps_backend_text() {
        assert_eq!(
            GrantStatus::from("Withdrawn"),
            GrantStatus::Other("Withdrawn".to_string())
        );
        assert_eq!(GrantStatus::from("On Hold").to_string(), "On Hold");
    }

    #[test]
    fn lifecycle_classes_do_not_overlap() {
        for status in GrantStatus::ACTIVE {
            assert!(!status.is_decided());
        }
        assert!(GrantStatus::Awarded.is_decided());
        assert!(!GrantStatus::Declined.is_active());
        let other = GrantStatus::Other("withdrawn".to_string());
        assert!(!other.is_active() && !other.is_decided());
    }

    #[test]
    fn priorities_are_ordered() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::High < Priority::Urgent);
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("someday".parse::<Priority>().is_err());
    }

    #[test]
    fn status_serializes_as_plain_string() {
        let json = serde_json::to_string(&GrantStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
        let back: GrantStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(back, GrantStatus::Other("paused".to_string()));
    }
}
