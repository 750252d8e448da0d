//! Proposal pipeline: stage transitions and the kanban board projection.
//!
//! Stages run lead → bidding → signature → hold → approved, plus a terminal
//! `rejected` stage that has no board column. The board is recomputed from
//! the full proposal list on every read; nothing about it is stored.

use serde::Serialize;
use thiserror::Error;

use crate::types::{Proposal, ProposalStatus};
use crate::util::now_rfc3339;

/// Board columns, left to right.
pub const BOARD_COLUMNS: [ProposalStatus; 5] = [
    ProposalStatus::Lead,
    ProposalStatus::Bidding,
    ProposalStatus::Signature,
    ProposalStatus::Hold,
    ProposalStatus::Approved,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot move proposal from '{from}' to '{to}'")]
pub struct InvalidTransition {
    pub from: ProposalStatus,
    pub to: ProposalStatus,
}

pub fn column_title(status: ProposalStatus) -> &'static str {
    match status {
        ProposalStatus::Lead => "Lead",
        ProposalStatus::Bidding => "Bidding",
        ProposalStatus::Signature => "Signature",
        ProposalStatus::Hold => "Hold",
        ProposalStatus::Approved => "Approved",
        ProposalStatus::Rejected => "Rejected",
    }
}

/// Field changes produced by a stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPatch {
    pub status: ProposalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<String>,
}

impl ProposalPatch {
    /// Patch for a proposal arriving in `status`. Arriving in `approved`
    /// signs it.
    pub fn entering(status: ProposalStatus) -> Self {
        if status == ProposalStatus::Approved {
            Self {
                status,
                signed: Some(true),
                signed_at: Some(now_rfc3339()),
            }
        } else {
            Self::status_only(status)
        }
    }

    fn status_only(status: ProposalStatus) -> Self {
        Self {
            status,
            signed: None,
            signed_at: None,
        }
    }

    pub fn apply(&self, proposal: &mut Proposal) {
        proposal.status = self.status;
        if let Some(signed) = self.signed {
            proposal.signed = signed;
        }
        if let Some(ref at) = self.signed_at {
            proposal.signed_at = Some(at.clone());
        }
    }

    /// The patch as a partial record for the generic update path.
    pub fn into_fields(self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// Whether `from` may move to `to`.
///
/// Any stage may currently move to any other, including out of `approved`
/// and `rejected`.
pub fn is_allowed(from: ProposalStatus, to: ProposalStatus) -> bool {
    let _ = (from, to);
    true
}

/// Compute the patch for moving a proposal from `current` to `next`.
///
/// Re-entering the stage a proposal is already in changes nothing beyond
/// `status`, so an approved proposal keeps its original `signedAt`.
pub fn transition(
    current: ProposalStatus,
    next: ProposalStatus,
) -> Result<ProposalPatch, InvalidTransition> {
    if !is_allowed(current, next) {
        return Err(InvalidTransition {
            from: current,
            to: next,
        });
    }
    if current == next {
        return Ok(ProposalPatch::status_only(next));
    }
    Ok(ProposalPatch::entering(next))
}

/// Case-folded match over the text a user sees on a card. Phone numbers are
/// matched verbatim. A blank query matches everything.
pub fn matches_query(proposal: &Proposal, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    let folded = [
        &proposal.title,
        &proposal.client,
        &proposal.address,
        &proposal.description,
        &proposal.project_type,
        &proposal.contact_email,
    ];
    folded
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
        || proposal.contact_phone.contains(query)
}

/// Proposals grouped by board column, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineBoard {
    pub lead: Vec<Proposal>,
    pub bidding: Vec<Proposal>,
    pub signature: Vec<Proposal>,
    pub hold: Vec<Proposal>,
    pub approved: Vec<Proposal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    pub status: ProposalStatus,
    pub title: &'static str,
    pub count: usize,
    pub total_value: f64,
}

impl PipelineBoard {
    pub fn build(proposals: &[Proposal]) -> Self {
        Self::build_filtered(proposals, "")
    }

    /// Board restricted to proposals matching `query`.
    pub fn build_filtered(proposals: &[Proposal], query: &str) -> Self {
        let mut board = Self::default();
        for proposal in proposals.iter().filter(|p| matches_query(p, query)) {
            if let Some(column) = board.column_mut(proposal.status) {
                column.push(proposal.clone());
            }
        }
        board
    }

    /// Cards in the column for `status`; `None` for `rejected`.
    pub fn column(&self, status: ProposalStatus) -> Option<&[Proposal]> {
        match status {
            ProposalStatus::Lead => Some(self.lead.as_slice()),
            ProposalStatus::Bidding => Some(self.bidding.as_slice()),
            ProposalStatus::Signature => Some(self.signature.as_slice()),
            ProposalStatus::Hold => Some(self.hold.as_slice()),
            ProposalStatus::Approved => Some(self.approved.as_slice()),
            ProposalStatus::Rejected => None,
        }
    }

    fn column_mut(&mut self, status: ProposalStatus) -> Option<&mut Vec<Proposal>> {
        match status {
            ProposalStatus::Lead => Some(&mut self.lead),
            ProposalStatus::Bidding => Some(&mut self.bidding),
            ProposalStatus::Signature => Some(&mut self.signature),
            ProposalStatus::Hold => Some(&mut self.hold),
            ProposalStatus::Approved => Some(&mut self.approved),
            ProposalStatus::Rejected => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (ProposalStatus, &[Proposal])> + '_ {
        BOARD_COLUMNS
            .into_iter()
            .filter_map(move |status| self.column(status).map(|cards| (status, cards)))
    }

    pub fn total(&self) -> usize {
        self.columns().map(|(_, cards)| cards.len()).sum()
    }

    /// Locate a card by id.
    pub fn find(&self, id: &str) -> Option<(ProposalStatus, &Proposal)> {
        self.columns()
            .find_map(|(status, cards)| cards.iter().find(|p| p.id == id).map(|p| (status, p)))
    }

    pub fn summaries(&self) -> Vec<ColumnSummary> {
        self.columns()
            .map(|(status, cards)| ColumnSummary {
                status,
                title: column_title(status),
                count: cards.len(),
                total_value: cards.iter().map(|p| p.total_value).sum(),
            })
            .collect()
    }
}
