// Projects service

use crate::entity::EntityKind;
use crate::error::CrmError;
use crate::repository::Repository;
use crate::store::Storage;
use crate::types::{Project, ProjectStatus};
use crate::util::clamp_progress;

/// Set a project's progress, clamped to 0–100. Reaching 100 completes it.
pub fn update_progress(storage: &Storage, id: &str, progress: f64) -> Result<Project, CrmError> {
    let project = Repository::<Project>::new(storage)
        .update_with(id, |project| {
            project.progress = clamp_progress(progress);
            if project.progress == 100 {
                project.status = ProjectStatus::Completed;
            }
            Ok(())
        })?
        .ok_or_else(|| CrmError::not_found(EntityKind::Project, id))?;
    log::info!("Project {} progress set to {}%", id, project.progress);
    Ok(project)
}
