//! REST surface without a listener.
//!
//! `dispatch` maps a method, path, query and JSON body onto the services and
//! the generic repository, answering with the same envelopes and status
//! codes the HTTP routes use. The CLI `request` command and the tests call it
//! directly.

pub mod envelope;
pub mod query;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::entity::{Entity, EntityKind};
use crate::error::CrmError;
use crate::repository::Repository;
use crate::services::{clients, dashboard, profile, projects, proposals, tasks};
use crate::state::AppState;
use crate::types::{Client, Employee, Project, Proposal, ProposalStatus, Task, TaskStatus};
use crate::util::today;

use query::ListParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("Unsupported method: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Value,
}

impl ApiRequest {
    /// `target` may carry a query string (`/clients?page=2&search=acme`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, qs)) => (path, parse_query_string(qs)),
            None => (target, BTreeMap::new()),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            body: Value::Null,
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Path segments with an optional leading `api` dropped.
    fn segments(&self) -> Vec<&str> {
        let mut segments: Vec<&str> = self.path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.first() == Some(&"api") {
            segments.remove(0);
        }
        segments
    }
}

pub fn parse_query_string(qs: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(qs.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub fn dispatch(state: &AppState, request: &ApiRequest) -> ApiResponse {
    log::debug!("{} {}", request.method, request.path);
    match route(state, request) {
        Ok(response) => response,
        Err(err) => {
            if err.is_caller_error() {
                log::debug!("{} {} rejected: {}", request.method, request.path, err);
            } else {
                log::error!("{} {} failed: {}", request.method, request.path, err);
            }
            envelope::error(&err)
        }
    }
}

fn route_not_found() -> ApiResponse {
    envelope::failure(404, "Route not found")
}

fn method_not_allowed() -> ApiResponse {
    envelope::failure(405, "Method not allowed")
}

fn route(state: &AppState, request: &ApiRequest) -> Result<ApiResponse, CrmError> {
    let segments = request.segments();
    if let Some(kind) = segments.first().and_then(|s| EntityKind::from_path(s)) {
        return entity_route(state, request, kind, &segments[1..]);
    }

    let storage = &state.storage;
    let body = &request.body;
    match (request.method, segments.as_slice()) {
        (Method::Get, ["dashboard"]) => Ok(envelope::success(&dashboard::load_dashboard(
            storage,
            state.config.recent_activity_limit,
        ))),
        (Method::Get, ["profile"]) => Ok(envelope::success(&profile::get_profile(storage))),
        (Method::Put, ["profile"]) => Ok(envelope::success(&profile::update_profile(
            storage,
            body.clone(),
        )?)),
        (Method::Get, ["profile", "picture"]) => {
            Ok(envelope::success(&profile::get_profile_picture(storage)))
        }
        (Method::Put, ["profile", "picture"]) => {
            let picture = match body {
                Value::String(s) => Some(s.as_str()),
                other => other.get("picture").and_then(Value::as_str),
            }
            .ok_or_else(|| CrmError::validation("picture", "Please select an image file"))?;
            profile::save_profile_picture(storage, picture)?;
            Ok(envelope::message(200, "Profile picture updated"))
        }
        (Method::Delete, ["profile", "picture"]) => {
            profile::remove_profile_picture(storage)?;
            Ok(envelope::message(200, "Profile picture removed"))
        }
        (Method::Get, ["notifications"]) => {
            Ok(envelope::success(&profile::get_notifications(storage)))
        }
        (Method::Put, ["notifications"]) => Ok(envelope::success(
            &profile::update_notifications(storage, body.clone())?,
        )),
        (_, ["dashboard"] | ["profile"] | ["profile", "picture"] | ["notifications"]) => {
            Ok(method_not_allowed())
        }
        _ => Ok(route_not_found()),
    }
}

fn entity_route(
    state: &AppState,
    request: &ApiRequest,
    kind: EntityKind,
    rest: &[&str],
) -> Result<ApiResponse, CrmError> {
    use EntityKind as K;
    use Method as M;

    let storage = &state.storage;
    let body = &request.body;
    match (kind, request.method, rest) {
        (K::Client, M::Get, ["stats", "overview"]) => {
            Ok(envelope::success(&clients::load_clients_overview(storage)))
        }
        (K::Client, M::Put, [id]) => {
            let client = clients::update_client(storage, id, body.clone())?;
            Ok(envelope::success(&render(&client, today())))
        }
        (K::Proposal, M::Get, ["kanban"]) => {
            let search = request.query.get("search").map(String::as_str);
            Ok(envelope::success(&proposals::board(storage, search)))
        }
        (K::Proposal, M::Patch, [id, "status"]) => {
            let status: ProposalStatus = status_from(body)?;
            let proposal = proposals::change_status(storage, id, status)?;
            Ok(envelope::success(&render(&proposal, today())))
        }
        (K::Project, M::Patch, [id, "progress"]) => {
            let progress = body
                .get("progress")
                .and_then(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
                .ok_or_else(|| CrmError::validation("progress", "Progress must be a number"))?;
            let project = projects::update_progress(storage, id, progress)?;
            Ok(envelope::success(&render(&project, today())))
        }
        (K::Task, M::Patch, [id, "status"]) => {
            let status: TaskStatus = status_from(body)?;
            let task = tasks::change_status(storage, id, status)?;
            Ok(envelope::success(&render(&task, today())))
        }
        (K::Task, M::Post, [id, "time-logs"]) => {
            let input: tasks::TimeLogInput = serde_json::from_value(body.clone())
                .map_err(|e| CrmError::validation("body", &e.to_string()))?;
            let task = tasks::log_time(storage, id, input)?;
            Ok(envelope::created(&render(&task, today())))
        }
        (_, M::Get | M::Post, []) | (_, M::Get | M::Put | M::Delete, [_]) => match kind {
            K::Client => crud::<Client>(state, request, rest),
            K::Proposal => crud::<Proposal>(state, request, rest),
            K::Project => crud::<Project>(state, request, rest),
            K::Task => crud::<Task>(state, request, rest),
            K::Employee => crud::<Employee>(state, request, rest),
        },
        (_, _, [] | [_])
        | (K::Client, _, ["stats", "overview"])
        | (K::Proposal | K::Task, _, [_, "status"])
        | (K::Project, _, [_, "progress"])
        | (K::Task, _, [_, "time-logs"]) => Ok(method_not_allowed()),
        _ => Ok(route_not_found()),
    }
}

/// List, create, read and delete for any collection.
fn crud<T: Entity>(state: &AppState, request: &ApiRequest, rest: &[&str]) -> Result<ApiResponse, CrmError> {
    let repo = Repository::<T>::new(&state.storage);
    let today = today();
    match (request.method, rest) {
        (Method::Get, []) => {
            let params = ListParams::parse(T::KIND, &request.query, state.config.default_page_size)?;
            let page = params.apply(repo.list());
            let data = page.items.iter().map(|r| render(r, today)).collect();
            Ok(envelope::list(data, page.pagination))
        }
        (Method::Post, []) => {
            let record = repo.create(request.body.clone())?;
            Ok(envelope::created(&render(&record, today)))
        }
        (Method::Get, [id]) => repo
            .get(id)
            .map(|record| envelope::success(&render(&record, today)))
            .ok_or_else(|| CrmError::not_found(T::KIND, id)),
        (Method::Put, [id]) => {
            let record = repo
                .update(id, request.body.clone())?
                .ok_or_else(|| CrmError::not_found(T::KIND, id))?;
            Ok(envelope::success(&render(&record, today)))
        }
        (Method::Delete, [id]) => {
            if repo.remove(id)? {
                Ok(envelope::deleted(T::KIND))
            } else {
                Err(CrmError::not_found(T::KIND, id))
            }
        }
        _ => Ok(method_not_allowed()),
    }
}

/// Record as JSON with its derived fields alongside.
fn render<T: Entity>(record: &T, today: NaiveDate) -> Value {
    match serde_json::to_value(record) {
        Ok(Value::Object(mut map)) => {
            map.extend(record.derived_fields(today));
            Value::Object(map)
        }
        Ok(other) => other,
        Err(e) => {
            log::error!("Failed to serialize {} {}: {}", T::KIND, record.id(), e);
            Value::Null
        }
    }
}

fn status_from<S: FromStr<Err = String>>(body: &Value) -> Result<S, CrmError> {
    let raw = body
        .get("status")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| CrmError::validation("status", "Status is required"))?;
    raw.parse().map_err(|message: String| CrmError::validation("status", &message))
}
