// Clients service
// Update with contact stamping, and the aggregate overview behind
// GET /clients/stats/overview.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::entity::EntityKind;
use crate::error::CrmError;
use crate::repository::Repository;
use crate::store::Storage;
use crate::types::{Client, ClientStatus, ClientType};
use crate::util::now_rfc3339;

/// Industries listed in the overview.
const TOP_INDUSTRIES: usize = 10;

/// Update a client and record the contact: every edit stamps `lastContact`.
pub fn update_client(storage: &Storage, id: &str, patch: Value) -> Result<Client, CrmError> {
    let mut patch = match patch {
        Value::Object(map) => map,
        _ => return Err(CrmError::validation("body", "Request body must be a JSON object")),
    };
    patch.insert("lastContact".to_string(), json!(now_rfc3339()));

    Repository::<Client>::new(storage)
        .update(id, Value::Object(patch))?
        .ok_or_else(|| CrmError::not_found(EntityKind::Client, id))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewTotals {
    pub total_clients: usize,
    pub total_revenue: f64,
    pub active_clients: usize,
    pub prospects: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryCount {
    pub industry: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOverview {
    pub overview: OverviewTotals,
    pub by_type: Vec<TypeCount>,
    pub top_industries: Vec<IndustryCount>,
}

pub fn clients_overview(clients: &[Client]) -> ClientOverview {
    let overview = OverviewTotals {
        total_clients: clients.len(),
        total_revenue: clients.iter().map(|c| c.total_revenue).sum(),
        active_clients: clients
            .iter()
            .filter(|c| c.status == ClientStatus::Active)
            .count(),
        prospects: clients
            .iter()
            .filter(|c| c.status == ClientStatus::Prospect)
            .count(),
    };

    let by_type = ClientType::ALL
        .iter()
        .map(|t| TypeCount {
            client_type: *t,
            count: clients.iter().filter(|c| c.client_type == *t).count(),
        })
        .filter(|tc| tc.count > 0)
        .collect();

    let mut industries: BTreeMap<&str, usize> = BTreeMap::new();
    for client in clients {
        let industry = client.industry.trim();
        if !industry.is_empty() {
            *industries.entry(industry).or_insert(0) += 1;
        }
    }
    // BTreeMap iteration is by name, so the stable sort breaks ties by name
    let mut top_industries: Vec<IndustryCount> = industries
        .into_iter()
        .map(|(industry, count)| IndustryCount {
            industry: industry.to_string(),
            count,
        })
        .collect();
    top_industries.sort_by(|a, b| b.count.cmp(&a.count));
    top_industries.truncate(TOP_INDUSTRIES);

    ClientOverview {
        overview,
        by_type,
        top_industries,
    }
}

pub fn load_clients_overview(storage: &Storage) -> ClientOverview {
    clients_overview(&Repository::<Client>::new(storage).list())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(name: &str, industry: &str, status: ClientStatus, revenue: f64) -> Client {
        Client {
            id: name.to_string(),
            name: name.to_string(),
            industry: industry.to_string(),
            status,
            total_revenue: revenue,
            ..Default::default()
        }
    }

    #[test]
    fn test_overview_totals() {
        let clients = vec![
            client("Acme", "Retail", ClientStatus::Active, 1000.0),
            client("Beta", "Software", ClientStatus::Prospect, 2000.0),
            client("Gamma", "", ClientStatus::Active, 0.0),
        ];
        let stats = clients_overview(&clients);
        assert_eq!(stats.overview.total_clients, 3);
        assert_eq!(stats.overview.total_revenue, 3000.0);
        assert_eq!(stats.overview.active_clients, 2);
        assert_eq!(stats.overview.prospects, 1);
        assert_eq!(
            stats.by_type,
            vec![TypeCount {
                client_type: ClientType::Client,
                count: 3
            }]
        );
    }

    #[test]
    fn test_top_industries_sorted_and_capped() {
        let mut clients = Vec::new();
        for i in 0..12 {
            clients.push(client(&format!("c{}", i), &format!("Industry {:02}", i), ClientStatus::Active, 0.0));
        }
        clients.push(client("x", "Industry 11", ClientStatus::Active, 0.0));
        clients.push(client("y", "   ", ClientStatus::Active, 0.0));

        let stats = clients_overview(&clients);
        assert_eq!(stats.top_industries.len(), TOP_INDUSTRIES);
        assert_eq!(stats.top_industries[0].industry, "Industry 11");
        assert_eq!(stats.top_industries[0].count, 2);
        assert_eq!(stats.top_industries[1].industry, "Industry 00");
    }

    #[test]
    fn test_empty_overview() {
        let stats = clients_overview(&[]);
        assert_eq!(stats.overview, OverviewTotals::default());
        assert!(stats.by_type.is_empty());
        assert!(stats.top_industries.is_empty());
    }

    #[test]
    fn test_update_client_stamps_last_contact() {
        let storage = Storage::in_memory();
        let repo = Repository::<Client>::new(&storage);
        let created = repo.create(json!({"name": "Acme"})).expect("create");
        assert!(created.last_contact.is_none());

        let updated = update_client(&storage, &created.id, json!({"phone": "555"})).expect("update");
        assert_eq!(updated.phone, "555");
        assert!(updated.last_contact.is_some());
    }

    #[test]
    fn test_update_missing_client_is_not_found() {
        let storage = Storage::in_memory();
        let err = update_client(&storage, "nope", json!({"phone": "555"})).expect_err("missing");
        assert_eq!(err.status_code(), 404);
    }
}
