//! Error types for CRM operations
//!
//! Errors are classified by who has to act:
//! - Caller: validation failures, unknown ids, duplicate emails (4xx)
//! - Operator: storage failures (5xx)

use serde::Serialize;
use thiserror::Error;

use crate::entity::EntityKind;
use crate::pipeline::InvalidTransition;
use crate::store::StoreError;
use crate::validation::FieldError;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Validation failed: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("{entity} not found")]
    NotFound { entity: EntityKind, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl CrmError {
    pub fn validation(field: &str, message: &str) -> Self {
        CrmError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(entity: EntityKind, id: &str) -> Self {
        CrmError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// HTTP status the REST layer answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            CrmError::Validation(_) | CrmError::Conflict(_) | CrmError::InvalidTransition(_) => 400,
            CrmError::NotFound { .. } => 404,
            CrmError::Storage(_) => 500,
        }
    }

    /// True when retrying the same request unchanged cannot succeed.
    pub fn is_caller_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Serializable error body for the REST layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            message: message.into(),
            errors: Vec::new(),
        }
    }
}

impl From<&CrmError> for ApiError {
    fn from(err: &CrmError) -> Self {
        let status = err.status_code();
        match err {
            CrmError::Validation(errors) => ApiError {
                status,
                success: false,
                message: "Validation failed".to_string(),
                errors: errors.clone(),
            },
            // Storage detail goes to the log, not the response
            CrmError::Storage(_) => ApiError::new(status, "Server error"),
            other => ApiError::new(status, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProposalStatus;

    #[test]
    fn test_status_codes() {
        assert_eq!(CrmError::validation("name", "bad").status_code(), 400);
        assert_eq!(
            CrmError::not_found(EntityKind::Client, "1").status_code(),
            404
        );
        assert_eq!(
            CrmError::Conflict("Client with this email already exists".into()).status_code(),
            400
        );
        let io = StoreError::Io(std::io::Error::other("disk full"));
        let err = CrmError::from(io);
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_not_found_message_names_entity() {
        let err = CrmError::not_found(EntityKind::Proposal, "42");
        assert_eq!(err.to_string(), "Proposal not found");
    }

    #[test]
    fn test_api_error_from_validation() {
        let err = CrmError::Validation(vec![
            FieldError::new("name", "Name must be between 2 and 100 characters"),
            FieldError::new("email", "Please provide a valid email"),
        ]);
        let api = ApiError::from(&err);
        assert_eq!(api.status, 400);
        assert_eq!(api.message, "Validation failed");
        assert_eq!(api.errors.len(), 2);

        let body = serde_json::to_value(&api).expect("ser");
        assert_eq!(body["success"], serde_json::json!(false));
        assert!(body.get("status").is_none());
    }

    #[test]
    fn test_api_error_hides_storage_detail() {
        let err = CrmError::from(StoreError::Io(std::io::Error::other("/secret/path")));
        let api = ApiError::from(&err);
        assert_eq!(api.message, "Server error");
        assert!(api.errors.is_empty());
    }

    #[test]
    fn test_invalid_transition_maps_to_400() {
        let err = CrmError::from(InvalidTransition {
            from: ProposalStatus::Approved,
            to: ProposalStatus::Lead,
        });
        assert_eq!(err.status_code(), 400);
    }
}
