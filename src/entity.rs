//! Per-collection behavior behind the generic repository.
//!
//! Each record type says which collection it lives in, how it is tidied and
//! validated before a write, what side effects a write has, and which fields
//! list queries may search, filter and sort on.

use std::fmt;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::error::CrmError;
use crate::pipeline::{self, ProposalPatch};
use crate::store::Collection;
use crate::types::{Client, Employee, Project, Proposal, Task, TaskStatus};
use crate::util::{contains_ci, now_rfc3339, numeric_id};
use crate::validation::{FieldError, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Client,
    Proposal,
    Project,
    Task,
    Employee,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Client,
        EntityKind::Proposal,
        EntityKind::Project,
        EntityKind::Task,
        EntityKind::Employee,
    ];

    pub fn collection(&self) -> Collection {
        match self {
            EntityKind::Client => Collection::Clients,
            EntityKind::Proposal => Collection::Proposals,
            EntityKind::Project => Collection::Projects,
            EntityKind::Task => Collection::Tasks,
            EntityKind::Employee => Collection::Employees,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Client => "Client",
            EntityKind::Proposal => "Proposal",
            EntityKind::Project => "Project",
            EntityKind::Task => "Task",
            EntityKind::Employee => "Employee",
        }
    }

    /// First path segment of the REST routes.
    pub fn path(&self) -> &'static str {
        self.collection().as_str()
    }

    pub fn from_path(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path() == segment)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for EntityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label().to_lowercase())
    }
}

pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Legacy input keys and the field each one stands for.
    const FIELD_ALIASES: &'static [(&'static str, &'static str)] = &[];

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Trim and canonicalize fields. Runs before validation.
    fn normalize(&mut self) {}

    fn validate(&self) -> Vec<FieldError>;

    /// Email that must be unique within the collection, with the conflict
    /// message to report.
    fn unique_email(&self) -> Option<(&str, &'static str)> {
        None
    }

    /// Side effects of a write. `previous` is `None` on create.
    fn on_write(&mut self, _previous: Option<&Self>) -> Result<(), CrmError> {
        Ok(())
    }

    /// Text fields a `search` query looks at.
    fn search_fields(&self) -> Vec<&str>;

    fn matches_search(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.search_fields()
            .into_iter()
            .any(|field| contains_ci(field, &needle))
    }

    /// Text value of a filterable or sortable field.
    fn field_text(&self, field: &str) -> Option<String>;

    /// Numeric value of a sortable field. `createdAt` is the id timestamp.
    fn field_number(&self, field: &str) -> Option<f64> {
        match field {
            "createdAt" | "id" => numeric_id(self.id()).map(|n| n as f64),
            _ => None,
        }
    }

    /// Computed read-only fields added to API responses.
    fn derived_fields(&self, _today: NaiveDate) -> Map<String, Value> {
        Map::new()
    }
}

// =============================================================================
// Client
// =============================================================================

impl Entity for Client {
    const KIND: EntityKind = EntityKind::Client;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.phone = self.phone.trim().to_string();
        self.industry = self.industry.trim().to_string();
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut v = Validator::new();
        v.length("name", &self.name, 2, 100, "Name must be between 2 and 100 characters")
            .optional_email("email", &self.email, "Please provide a valid email")
            .max_length("industry", &self.industry, 100, "Industry cannot exceed 100 characters")
            .max_length("notes", &self.notes, 1000, "Notes cannot exceed 1000 characters")
            .non_negative("totalRevenue", self.total_revenue, "Total revenue cannot be negative");
        v.into_errors()
    }

    fn unique_email(&self) -> Option<(&str, &'static str)> {
        Some((self.email.as_str(), "Client with this email already exists"))
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.name.as_str(),
            self.email.as_str(),
            self.industry.as_str(),
            self.contact_person.as_str(),
        ]
    }

    fn field_text(&self, field: &str) -> Option<String> {
        Some(match field {
            "name" => self.name.clone(),
            "email" => self.email.clone(),
            "type" => self.client_type.as_str().to_string(),
            "status" => self.status.as_str().to_string(),
            "industry" => self.industry.clone(),
            "contactPerson" => self.contact_person.clone(),
            _ => return None,
        })
    }

    fn field_number(&self, field: &str) -> Option<f64> {
        match field {
            "totalRevenue" => Some(self.total_revenue),
            "totalProjects" => Some(f64::from(self.total_projects)),
            "createdAt" | "id" => numeric_id(&self.id).map(|n| n as f64),
            _ => None,
        }
    }
}

// =============================================================================
// Proposal
// =============================================================================

impl Entity for Proposal {
    const KIND: EntityKind = EntityKind::Proposal;
    const FIELD_ALIASES: &'static [(&'static str, &'static str)] = &[("value", "totalValue")];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        self.client = self.client.trim().to_string();
        self.address = self.address.trim().to_string();
        self.description = self.description.trim().to_string();
        if self.signed && self.signed_at.is_none() {
            self.signed_at = Some(now_rfc3339());
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut v = Validator::new();
        v.length("title", &self.title, 2, 200, "Title must be between 2 and 200 characters")
            .required("client", &self.client, "Client is required")
            .max_length("address", &self.address, 500, "Address cannot exceed 500 characters")
            .max_length(
                "description",
                &self.description,
                2000,
                "Description cannot exceed 2000 characters",
            )
            .non_negative("totalValue", self.total_value, "Total value cannot be negative");
        v.into_errors()
    }

    fn on_write(&mut self, previous: Option<&Self>) -> Result<(), CrmError> {
        match previous {
            None => ProposalPatch::entering(self.status).apply(self),
            Some(prev) if prev.status != self.status => {
                pipeline::transition(prev.status, self.status)?.apply(self);
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.title.as_str(),
            self.client.as_str(),
            self.address.as_str(),
            self.description.as_str(),
            self.project_type.as_str(),
            self.contact_email.as_str(),
        ]
    }

    fn matches_search(&self, query: &str) -> bool {
        pipeline::matches_query(self, query)
    }

    fn field_text(&self, field: &str) -> Option<String> {
        Some(match field {
            "title" => self.title.clone(),
            "client" => self.client.clone(),
            "status" => self.status.as_str().to_string(),
            "priority" => self.priority.as_str().to_string(),
            "projectType" => self.project_type.clone(),
            _ => return None,
        })
    }

    fn field_number(&self, field: &str) -> Option<f64> {
        match field {
            "totalValue" | "value" => Some(self.total_value),
            "createdAt" | "id" => numeric_id(&self.id).map(|n| n as f64),
            _ => None,
        }
    }
}

// =============================================================================
// Project
// =============================================================================

impl Entity for Project {
    const KIND: EntityKind = EntityKind::Project;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.client = self.client.trim().to_string();
        blank_to_none(&mut self.start_date);
        blank_to_none(&mut self.end_date);
        self.progress = self.progress.min(100);
        for phase in &mut self.phases {
            phase.progress = phase.progress.min(100);
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut v = Validator::new();
        v.length("name", &self.name, 1, 200, "Name must be between 1 and 200 characters")
            .max_length(
                "description",
                &self.description,
                2000,
                "Description cannot exceed 2000 characters",
            )
            .date("startDate", self.start_date.as_deref(), "Valid start date is required")
            .date("endDate", self.end_date.as_deref(), "Valid end date is required")
            .non_negative("budget", self.budget, "Budget cannot be negative");

        let start = self.start_date.as_deref().and_then(crate::util::parse_date);
        let end = self.end_date.as_deref().and_then(crate::util::parse_date);
        if let (Some(start), Some(end)) = (start, end) {
            v.check("endDate", end >= start, "End date cannot be before start date");
        }
        for (i, phase) in self.phases.iter().enumerate() {
            v.required(&format!("phases[{}].name", i), &phase.name, "Phase name is required");
        }
        for (i, milestone) in self.milestones.iter().enumerate() {
            v.required(
                &format!("milestones[{}].title", i),
                &milestone.title,
                "Milestone title is required",
            );
        }
        v.into_errors()
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.name.as_str(),
            self.description.as_str(),
            self.client.as_str(),
        ]
    }

    fn field_text(&self, field: &str) -> Option<String> {
        Some(match field {
            "name" => self.name.clone(),
            "client" => self.client.clone(),
            "status" => self.status.as_str().to_string(),
            "priority" => self.priority.as_str().to_string(),
            "startDate" => self.start_date.clone().unwrap_or_default(),
            "endDate" => self.end_date.clone().unwrap_or_default(),
            _ => return None,
        })
    }

    fn field_number(&self, field: &str) -> Option<f64> {
        match field {
            "budget" => Some(self.budget),
            "progress" => Some(f64::from(self.progress)),
            "createdAt" | "id" => numeric_id(&self.id).map(|n| n as f64),
            _ => None,
        }
    }

    fn derived_fields(&self, today: NaiveDate) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("durationDays".to_string(), json!(self.duration_days()));
        fields.insert("isOverdue".to_string(), json!(self.is_overdue(today)));
        fields
    }
}

// =============================================================================
// Task
// =============================================================================

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        self.assignee = self.assignee.trim().to_string();
        blank_to_none(&mut self.due_date);
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut v = Validator::new();
        v.length("title", &self.title, 2, 200, "Title must be between 2 and 200 characters")
            .max_length(
                "description",
                &self.description,
                2000,
                "Description cannot exceed 2000 characters",
            )
            .date("dueDate", self.due_date.as_deref(), "Valid due date is required")
            .non_negative(
                "estimatedHours",
                self.estimated_hours,
                "Estimated hours cannot be negative",
            )
            .non_negative("actualHours", self.actual_hours, "Actual hours cannot be negative");
        v.into_errors()
    }

    fn on_write(&mut self, previous: Option<&Self>) -> Result<(), CrmError> {
        let was_completed = previous.is_some_and(|p| p.status == TaskStatus::Completed);
        if self.status == TaskStatus::Completed && !was_completed {
            self.completed_at = Some(now_rfc3339());
        }
        Ok(())
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.description.as_str()]
    }

    fn field_text(&self, field: &str) -> Option<String> {
        Some(match field {
            "title" => self.title.clone(),
            "status" => self.status.as_str().to_string(),
            "priority" => self.priority.as_str().to_string(),
            "assignee" => self.assignee.clone(),
            "project" => self.project.clone(),
            "dueDate" => self.due_date.clone().unwrap_or_default(),
            _ => return None,
        })
    }

    fn field_number(&self, field: &str) -> Option<f64> {
        match field {
            "estimatedHours" => Some(self.estimated_hours),
            "actualHours" => Some(self.actual_hours),
            "createdAt" | "id" => numeric_id(&self.id).map(|n| n as f64),
            _ => None,
        }
    }

    fn derived_fields(&self, today: NaiveDate) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("isOverdue".to_string(), json!(self.is_overdue(today)));
        fields.insert("progress".to_string(), json!(self.progress()));
        fields
    }
}

// =============================================================================
// Employee
// =============================================================================

impl Entity for Employee {
    const KIND: EntityKind = EntityKind::Employee;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.department = self.department.trim().to_string();
        blank_to_none(&mut self.join_date);
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut v = Validator::new();
        v.length("name", &self.name, 2, 50, "Name must be between 2 and 50 characters")
            .email("email", &self.email, "Please provide a valid email")
            .date("joinDate", self.join_date.as_deref(), "Valid join date is required");
        v.into_errors()
    }

    fn unique_email(&self) -> Option<(&str, &'static str)> {
        Some((self.email.as_str(), "Employee with this email already exists"))
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.name.as_str(),
            self.email.as_str(),
            self.role.as_str(),
            self.department.as_str(),
        ]
    }

    fn field_text(&self, field: &str) -> Option<String> {
        Some(match field {
            "name" => self.name.clone(),
            "email" => self.email.clone(),
            "role" => self.role.clone(),
            "department" => self.department.clone(),
            "status" => self.status.as_str().to_string(),
            "joinDate" => self.join_date.clone().unwrap_or_default(),
            _ => return None,
        })
    }
}

fn blank_to_none(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
        *value = None;
    }
}
