//! Response bodies: `{success, data}`, `{success, data, pagination}`,
//! `{success, message}` and the error shape from `ApiError`.

use serde::Serialize;
use serde_json::{json, Value};

use super::query::Pagination;
use super::ApiResponse;
use crate::entity::EntityKind;
use crate::error::{ApiError, CrmError};

fn to_value<T: Serialize>(data: &T) -> Result<Value, ApiResponse> {
    serde_json::to_value(data).map_err(|e| {
        log::error!("Failed to serialize response: {}", e);
        failure(500, "Server error")
    })
}

fn respond<T: Serialize>(status: u16, data: &T) -> ApiResponse {
    match to_value(data) {
        Ok(data) => ApiResponse {
            status,
            body: json!({ "success": true, "data": data }),
        },
        Err(response) => response,
    }
}

pub fn success<T: Serialize>(data: &T) -> ApiResponse {
    respond(200, data)
}

pub fn created<T: Serialize>(data: &T) -> ApiResponse {
    respond(201, data)
}

pub fn list(data: Vec<Value>, pagination: Pagination) -> ApiResponse {
    match to_value(&pagination) {
        Ok(pagination) => ApiResponse {
            status: 200,
            body: json!({ "success": true, "data": data, "pagination": pagination }),
        },
        Err(response) => response,
    }
}

pub fn deleted(kind: EntityKind) -> ApiResponse {
    message(200, &format!("{} deleted successfully", kind))
}

pub fn message(status: u16, message: &str) -> ApiResponse {
    ApiResponse {
        status,
        body: json!({ "success": true, "message": message }),
    }
}

pub fn failure(status: u16, message: &str) -> ApiResponse {
    from_api_error(ApiError::new(status, message))
}

pub fn error(err: &CrmError) -> ApiResponse {
    from_api_error(ApiError::from(err))
}

fn from_api_error(api: ApiError) -> ApiResponse {
    let status = api.status;
    let body = serde_json::to_value(&api)
        .unwrap_or_else(|_| json!({ "success": false, "message": api.message }));
    ApiResponse { status, body }
}
