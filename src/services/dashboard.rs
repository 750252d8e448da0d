// Dashboard service
// Headline stats and the recent-activity feed, derived from four collections.
// Nothing here writes; a collection that fails to load counts as empty.

use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

use crate::entity::Entity;
use crate::repository::Repository;
use crate::store::{Collection, Storage, StoreEvent};
use crate::types::{Client, Project, ProjectStatus, Proposal, Task, TaskStatus};
use crate::util::numeric_id;

/// Newest records taken from each collection before merging.
const ACTIVITY_PER_KIND: usize = 2;

/// Default length of the merged activity feed.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Proposal,
    Client,
    Project,
    Task,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Proposal => "proposal",
            ActivityKind::Client => "client",
            ActivityKind::Project => "project",
            ActivityKind::Task => "task",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    /// `<type>-<record id>`
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub description: String,
    pub status: String,
}

impl ActivityItem {
    fn new(kind: ActivityKind, record_id: &str, title: String, description: String, status: &str) -> Self {
        Self {
            id: format!("{}-{}", kind.as_str(), record_id),
            kind,
            title,
            description,
            status: status.to_string(),
        }
    }

    /// Numeric part of the synthetic id; 0 when it isn't a number.
    pub fn sort_key(&self) -> u64 {
        self.id
            .split_once('-')
            .and_then(|(_, rest)| numeric_id(rest))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: f64,
    pub total_clients: usize,
    pub active_projects: usize,
    pub pending_tasks: usize,
    pub recent_activity: Vec<ActivityItem>,
}

/// The `n` records with the highest numeric ids, newest first.
fn most_recent<T: Entity>(records: &[T], n: usize) -> Vec<&T> {
    let mut sorted: Vec<&T> = records.iter().collect();
    sorted.sort_by_key(|r| std::cmp::Reverse(numeric_id(r.id()).unwrap_or(0)));
    sorted.truncate(n);
    sorted
}

fn completion_status(completed: bool) -> &'static str {
    if completed {
        "success"
    } else {
        "pending"
    }
}

pub fn compute_dashboard(
    clients: &[Client],
    projects: &[Project],
    tasks: &[Task],
    proposals: &[Proposal],
    activity_limit: usize,
) -> DashboardStats {
    let mut activity = Vec::new();

    for p in most_recent(proposals, ACTIVITY_PER_KIND) {
        activity.push(ActivityItem::new(
            ActivityKind::Proposal,
            &p.id,
            format!("Proposal: {}", p.title),
            format!("Client: {}", p.client),
            p.status.as_str(),
        ));
    }
    for c in most_recent(clients, ACTIVITY_PER_KIND) {
        activity.push(ActivityItem::new(
            ActivityKind::Client,
            &c.id,
            format!("Client: {}", c.name),
            format!("Industry: {}", c.industry),
            "success",
        ));
    }
    for p in most_recent(projects, ACTIVITY_PER_KIND) {
        activity.push(ActivityItem::new(
            ActivityKind::Project,
            &p.id,
            format!("Project: {}", p.name),
            format!("Status: {}", p.status),
            completion_status(p.status == ProjectStatus::Completed),
        ));
    }
    for t in most_recent(tasks, ACTIVITY_PER_KIND) {
        activity.push(ActivityItem::new(
            ActivityKind::Task,
            &t.id,
            format!("Task: {}", t.title),
            format!("Assigned to: {}", t.assignee),
            completion_status(t.status == TaskStatus::Completed),
        ));
    }

    activity.sort_by_key(|item| std::cmp::Reverse(item.sort_key()));
    activity.truncate(activity_limit);

    DashboardStats {
        total_revenue: clients.iter().map(|c| c.total_revenue).sum(),
        total_clients: clients.len(),
        active_projects: projects
            .iter()
            .filter(|p| p.status != ProjectStatus::Completed)
            .count(),
        pending_tasks: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count(),
        recent_activity: activity,
    }
}

pub fn load_dashboard(storage: &Storage, activity_limit: usize) -> DashboardStats {
    compute_dashboard(
        &Repository::<Client>::new(storage).list(),
        &Repository::<Project>::new(storage).list(),
        &Repository::<Task>::new(storage).list(),
        &Repository::<Proposal>::new(storage).list(),
        activity_limit,
    )
}

/// Collections the dashboard is derived from.
pub fn is_dashboard_input(collection: Collection) -> bool {
    matches!(
        collection,
        Collection::Clients | Collection::Projects | Collection::Tasks | Collection::Proposals
    )
}

/// Keeps a dashboard snapshot current by listening to the store's change
/// feed. `refresh` recomputes only when an input collection changed since
/// the last call, or when events were dropped.
pub struct DashboardWatcher {
    storage: Storage,
    rx: Receiver<StoreEvent>,
    activity_limit: usize,
    current: DashboardStats,
    recomputes: usize,
}

impl DashboardWatcher {
    pub fn new(storage: &Storage, activity_limit: usize) -> Self {
        // Subscribe before the first read so no write can slip between them
        let rx = storage.subscribe();
        let current = load_dashboard(storage, activity_limit);
        Self {
            storage: storage.clone(),
            rx,
            activity_limit,
            current,
            recomputes: 0,
        }
    }

    pub fn current(&self) -> &DashboardStats {
        &self.current
    }

    /// How many times the snapshot was rebuilt after construction.
    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }

    /// Drain pending events; returns true if the snapshot was rebuilt.
    pub fn refresh(&mut self) -> bool {
        let mut stale = false;
        loop {
            match self.rx.try_recv() {
                Ok(event) => stale |= is_dashboard_input(event.collection),
                Err(TryRecvError::Lagged(skipped)) => {
                    log::debug!("Dashboard watcher lagged by {} event(s)", skipped);
                    stale = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if stale {
            self.current = load_dashboard(&self.storage, self.activity_limit);
            self.recomputes += 1;
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NotificationPrefs, ProposalStatus};

    fn client(id: &str, name: &str, revenue: f64) -> Client {
        Client {
            id: id.into(),
            name: name.into(),
            total_revenue: revenue,
            ..Default::default()
        }
    }

    fn project(id: &str, status: ProjectStatus) -> Project {
        Project {
            id: id.into(),
            name: format!("Project {}", id),
            status,
            ..Default::default()
        }
    }

    fn task(id: &str, status: TaskStatus) -> Task {
        Task {
            id: id.into(),
            title: format!("Task {}", id),
            status,
            ..Default::default()
        }
    }

    fn proposal(id: &str, status: ProposalStatus) -> Proposal {
        Proposal {
            id: id.into(),
            title: format!("Proposal {}", id),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_revenue_and_client_count() {
        let clients = vec![client("1", "Acme", 1000.0), client("2", "Beta", 2000.0)];
        let stats = compute_dashboard(&clients, &[], &[], &[], DEFAULT_ACTIVITY_LIMIT);
        assert_eq!(stats.total_revenue, 3000.0);
        assert_eq!(stats.total_clients, 2);
    }

    #[test]
    fn test_active_projects_and_pending_tasks() {
        let projects = vec![
            project("1", ProjectStatus::Completed),
            project("2", ProjectStatus::Planning),
            project("3", ProjectStatus::OnHold),
        ];
        let tasks = vec![
            task("1", TaskStatus::Pending),
            task("2", TaskStatus::InProgress),
            task("3", TaskStatus::Pending),
        ];
        let stats = compute_dashboard(&[], &projects, &tasks, &[], DEFAULT_ACTIVITY_LIMIT);
        assert_eq!(stats.active_projects, 2);
        assert_eq!(stats.pending_tasks, 2);
    }

    #[test]
    fn test_recent_activity_newest_first_and_capped() {
        let clients = vec![client("10", "Old", 0.0), client("50", "New", 0.0), client("30", "Mid", 0.0)];
        let projects = vec![project("40", ProjectStatus::Completed)];
        let tasks = vec![task("20", TaskStatus::Pending), task("60", TaskStatus::Completed)];
        let proposals = vec![proposal("5", ProposalStatus::Bidding)];

        let stats = compute_dashboard(&clients, &projects, &tasks, &proposals, DEFAULT_ACTIVITY_LIMIT);
        let ids: Vec<&str> = stats.recent_activity.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["task-60", "client-50", "project-40", "client-30"]);

        let statuses: Vec<&str> = stats.recent_activity.iter().map(|a| a.status.as_str()).collect();
        assert_eq!(statuses, vec!["success", "success", "success", "success"]);
    }

    #[test]
    fn test_activity_status_classification() {
        let projects = vec![project("3", ProjectStatus::InProgress)];
        let tasks = vec![task("2", TaskStatus::Pending)];
        let proposals = vec![proposal("1", ProposalStatus::Signature)];
        let stats = compute_dashboard(&[], &projects, &tasks, &proposals, 10);
        let by_id: Vec<(&str, &str)> = stats
            .recent_activity
            .iter()
            .map(|a| (a.id.as_str(), a.status.as_str()))
            .collect();
        assert_eq!(
            by_id,
            vec![("project-3", "pending"), ("task-2", "pending"), ("proposal-1", "signature")]
        );
    }

    #[test]
    fn test_unparsable_ids_sort_last() {
        let clients = vec![client("legacy", "Legacy", 0.0), client("7", "Seven", 0.0)];
        let stats = compute_dashboard(&clients, &[], &[], &[], 10);
        assert_eq!(stats.recent_activity[0].id, "client-7");
        assert_eq!(stats.recent_activity[1].sort_key(), 0);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let clients = vec![client("1", "Acme", 1000.0)];
        let tasks = vec![task("2", TaskStatus::Pending)];
        let a = compute_dashboard(&clients, &[], &tasks, &[], 4);
        let b = compute_dashboard(&clients, &[], &tasks, &[], 4);
        assert_eq!(a, b);
    }

    #[test]
    fn test_corrupt_collection_counts_as_empty() {
        let storage = Storage::in_memory();
        storage
            .save(
                Collection::Clients,
                &[client("1", "Acme", 1000.0), client("2", "Beta", 250.0)],
            )
            .expect("clients");
        storage
            .save(
                Collection::Projects,
                &[
                    project("3", ProjectStatus::Planning),
                    project("4", ProjectStatus::Completed),
                ],
            )
            .expect("projects");
        storage.save_raw(Collection::Tasks, "{not json").expect("tasks");

        let stats = load_dashboard(&storage, DEFAULT_ACTIVITY_LIMIT);
        assert_eq!(stats.pending_tasks, 0);
        assert_eq!(stats.total_clients, 2);
        assert_eq!(stats.total_revenue, 1250.0);
        assert_eq!(stats.active_projects, 1);
        assert!(stats
            .recent_activity
            .iter()
            .all(|item| item.kind != ActivityKind::Task));
        assert_eq!(stats.recent_activity.len(), 4);
    }

    #[test]
    fn test_watcher_recomputes_only_for_inputs() {
        let storage = Storage::in_memory();
        let mut watcher = DashboardWatcher::new(&storage, DEFAULT_ACTIVITY_LIMIT);
        assert_eq!(watcher.current().total_clients, 0);
        assert!(!watcher.refresh());

        storage
            .save_document(Collection::Notifications, &NotificationPrefs::default())
            .expect("save prefs");
        assert!(!watcher.refresh());
        assert_eq!(watcher.recompute_count(), 0);

        storage
            .save(Collection::Clients, &[client("1", "Acme", 1000.0)])
            .expect("save clients");
        assert!(watcher.refresh());
        assert_eq!(watcher.current().total_clients, 1);
        assert_eq!(watcher.current().total_revenue, 1000.0);
        assert_eq!(watcher.recompute_count(), 1);
    }

    #[test]
    fn test_watcher_recomputes_after_lag() {
        let storage = Storage::in_memory();
        let mut watcher = DashboardWatcher::new(&storage, DEFAULT_ACTIVITY_LIMIT);
        for _ in 0..100 {
            storage
                .save_document(Collection::Notifications, &NotificationPrefs::default())
                .expect("save prefs");
        }
        assert!(watcher.refresh());
    }
}
