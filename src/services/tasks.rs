// Tasks service
// Status changes and time logging.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::json;

use crate::entity::EntityKind;
use crate::error::CrmError;
use crate::repository::Repository;
use crate::store::Storage;
use crate::types::{Task, TaskStatus, TimeLog};
use crate::validation::{FieldError, Validator};

/// Change a task's status. Entering Completed stamps `completedAt`.
pub fn change_status(storage: &Storage, id: &str, status: TaskStatus) -> Result<Task, CrmError> {
    Repository::<Task>::new(storage)
        .update(id, json!({ "status": status }))?
        .ok_or_else(|| CrmError::not_found(EntityKind::Task, id))
}

/// A time entry as submitted by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeLogInput {
    pub user: String,
    pub start_time: String,
    pub end_time: String,
    pub description: String,
}

fn parse_instant(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).ok()
}

/// Append a time log and add its duration to `actualHours`.
pub fn log_time(storage: &Storage, id: &str, input: TimeLogInput) -> Result<Task, CrmError> {
    let start = parse_instant(&input.start_time);
    let end = parse_instant(&input.end_time);

    let mut v = Validator::new();
    v.check("startTime", start.is_some(), "Valid start time is required")
        .check("endTime", end.is_some(), "Valid end time is required");
    let (Some(start), Some(end)) = (start, end) else {
        return Err(CrmError::Validation(v.into_errors()));
    };
    if end < start {
        return Err(CrmError::Validation(vec![FieldError::new(
            "endTime",
            "End time must be after start time",
        )]));
    }

    let minutes = ((end - start).num_seconds() as f64 / 60.0).round() as u32;
    let entry = TimeLog {
        user: input.user,
        start_time: start.to_rfc3339(),
        end_time: end.to_rfc3339(),
        duration: minutes,
        description: input.description,
    };

    let task = Repository::<Task>::new(storage)
        .update_with(id, |task| {
            task.time_logs.push(entry);
            task.actual_hours += f64::from(minutes) / 60.0;
            Ok(())
        })?
        .ok_or_else(|| CrmError::not_found(EntityKind::Task, id))?;
    log::info!("Logged {} minute(s) on task {}", minutes, id);
    Ok(task)
}
