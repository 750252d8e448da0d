//! Record types stored in the collections.
//!
//! Every record serializes with camelCase keys (the shape the browser client
//! kept in local storage). Reading is forgiving: missing fields take their
//! defaults, numbers may arrive as strings, enum labels match
//! case-insensitively.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::util::{
    de_id, de_lenient_f64, de_lenient_string, de_lenient_u32, de_null_default, de_progress,
    parse_date,
};

/// Enum whose wire form is a fixed display label ("In Progress", "lead").
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident (default $default:ident) {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Comma-separated list of accepted labels, for error messages.
            pub fn labels() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| format!("'{}' must be one of: {}", wanted, Self::labels()))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
                if raw.trim().is_empty() {
                    return Ok(Self::default());
                }
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

labelled_enum! {
    pub enum ClientType (default Client) {
        Client => "Client",
        Supplier => "Supplier",
        Partner => "Partner",
    }
}

labelled_enum! {
    pub enum ClientStatus (default Active) {
        Active => "Active",
        Inactive => "Inactive",
        Prospect => "Prospect",
        Lead => "Lead",
    }
}

labelled_enum! {
    /// How a client found us.
    pub enum LeadSource (default Other) {
        Website => "Website",
        Referral => "Referral",
        ColdCall => "Cold Call",
        SocialMedia => "Social Media",
        Other => "Other",
    }
}

labelled_enum! {
    /// Pipeline stage of a proposal.
    pub enum ProposalStatus (default Lead) {
        Lead => "lead",
        Bidding => "bidding",
        Signature => "signature",
        Hold => "hold",
        Approved => "approved",
        Rejected => "rejected",
    }
}

labelled_enum! {
    pub enum Priority (default Medium) {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Urgent => "Urgent",
    }
}

labelled_enum! {
    pub enum ProjectStatus (default Planning) {
        Planning => "Planning",
        InProgress => "In Progress",
        OnHold => "On Hold",
        Completed => "Completed",
        Cancelled => "Cancelled",
    }
}

labelled_enum! {
    pub enum PhaseStatus (default NotStarted) {
        NotStarted => "Not Started",
        InProgress => "In Progress",
        Completed => "Completed",
        OnHold => "On Hold",
    }
}

labelled_enum! {
    pub enum TaskStatus (default Pending) {
        Pending => "Pending",
        InProgress => "In Progress",
        Completed => "Completed",
        OnHold => "On Hold",
        Cancelled => "Cancelled",
    }
}

labelled_enum! {
    pub enum EmployeeStatus (default Active) {
        Active => "Active",
        Inactive => "Inactive",
    }
}

/// Optional enum field where a blank string means "not set".
fn de_opt_label<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = String>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Client {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub industry: String,
    pub contact_person: String,
    pub status: ClientStatus,
    #[serde(deserialize_with = "de_lenient_u32")]
    pub total_projects: u32,
    #[serde(deserialize_with = "de_lenient_f64")]
    pub total_revenue: f64,
    #[serde(deserialize_with = "de_null_default")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_contact: Option<String>,
    pub notes: String,
    #[serde(
        deserialize_with = "de_opt_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub source: Option<LeadSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Proposal {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub title: String,
    /// Client name (or id) as typed on the form.
    pub client: String,
    pub address: String,
    pub status: ProposalStatus,
    /// Ordered phase names.
    #[serde(deserialize_with = "de_null_default")]
    pub phases: Vec<String>,
    #[serde(alias = "value", deserialize_with = "de_lenient_f64")]
    pub total_value: f64,
    pub signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<String>,
    pub priority: Priority,
    pub description: String,
    pub project_type: String,
    pub contact_email: String,
    #[serde(deserialize_with = "de_lenient_string")]
    pub contact_phone: String,
    #[serde(deserialize_with = "de_lenient_string")]
    pub budget: String,
    #[serde(deserialize_with = "de_lenient_string")]
    pub timeline: String,
    #[serde(deserialize_with = "de_null_default")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectPhase {
    pub name: String,
    pub status: PhaseStatus,
    #[serde(deserialize_with = "de_progress")]
    pub progress: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Milestone {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    pub client: String,
    pub status: ProjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(deserialize_with = "de_lenient_f64")]
    pub budget: f64,
    #[serde(deserialize_with = "de_progress")]
    pub progress: u8,
    /// Team member names.
    #[serde(deserialize_with = "de_null_default")]
    pub team: Vec<String>,
    #[serde(deserialize_with = "de_null_default")]
    pub phases: Vec<ProjectPhase>,
    #[serde(deserialize_with = "de_null_default")]
    pub milestones: Vec<Milestone>,
    pub description: String,
    pub priority: Priority,
}

impl Project {
    /// Whole days between start and end date.
    pub fn duration_days(&self) -> Option<i64> {
        let start = parse_date(self.start_date.as_deref()?)?;
        let end = parse_date(self.end_date.as_deref()?)?;
        Some((end - start).num_days().abs())
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        if self.status == ProjectStatus::Completed {
            return false;
        }
        self.end_date
            .as_deref()
            .and_then(parse_date)
            .is_some_and(|end| today > end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeLog {
    pub user: String,
    pub start_time: String,
    pub end_time: String,
    /// Minutes.
    #[serde(deserialize_with = "de_lenient_u32")]
    pub duration: u32,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub assignee: String,
    pub project: String,
    pub priority: Priority,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(deserialize_with = "de_null_default")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "de_null_default")]
    pub time_logs: Vec<TimeLog>,
    #[serde(deserialize_with = "de_lenient_f64")]
    pub estimated_hours: f64,
    #[serde(deserialize_with = "de_lenient_f64")]
    pub actual_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl Task {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        if self.status == TaskStatus::Completed {
            return false;
        }
        self.due_date
            .as_deref()
            .and_then(parse_date)
            .is_some_and(|due| today > due)
    }

    /// Rough completion percentage implied by the status.
    pub fn progress(&self) -> u8 {
        match self.status {
            TaskStatus::Completed => 100,
            TaskStatus::InProgress => 50,
            TaskStatus::OnHold => 25,
            TaskStatus::Pending | TaskStatus::Cancelled => 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Employee {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub department: String,
    pub status: EmployeeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_date: Option<String>,
    /// Number of projects the employee is assigned to.
    #[serde(deserialize_with = "de_lenient_u32")]
    pub projects: u32,
}

/// The signed-in user's own profile card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub company: String,
    pub role: String,
    pub bio: String,
    pub timezone: String,
    pub language: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "User".to_string(),
            email: "user@example.com".to_string(),
            phone: String::new(),
            address: String::new(),
            company: "ClientCore".to_string(),
            role: "User".to_string(),
            bio: String::new(),
            timezone: "UTC-5 (Eastern Time)".to_string(),
            language: "English".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationPrefs {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
    pub weekly: bool,
    pub marketing: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            sms: false,
            weekly: true,
            marketing: false,
        }
    }
}
