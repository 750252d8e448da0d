// Proposals service
// Stage moves and the kanban board.

use serde_json::{json, Value};

use crate::entity::EntityKind;
use crate::error::CrmError;
use crate::pipeline::PipelineBoard;
use crate::repository::Repository;
use crate::store::Storage;
use crate::types::{Proposal, ProposalStatus};

/// Move a proposal to another stage. Entering `approved` signs it.
pub fn change_status(storage: &Storage, id: &str, status: ProposalStatus) -> Result<Proposal, CrmError> {
    let patch: Value = json!({ "status": status });
    let proposal = Repository::<Proposal>::new(storage)
        .update(id, patch)?
        .ok_or_else(|| CrmError::not_found(EntityKind::Proposal, id))?;
    log::info!("Proposal {} moved to {}", id, status);
    Ok(proposal)
}

/// Current board, optionally narrowed by a search query.
pub fn board(storage: &Storage, search: Option<&str>) -> PipelineBoard {
    let proposals = Repository::<Proposal>::new(storage).list();
    PipelineBoard::build_filtered(&proposals, search.unwrap_or(""))
}
