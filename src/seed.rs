//! Default records for a fresh store.
//!
//! Each collection is seeded on its own and only when its key is absent, so
//! running the routine twice, or after the user emptied a collection, never
//! duplicates or resurrects anything.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::store::{Collection, Storage, StoreError};
use crate::types::{Client, Employee, Project, Proposal, Task};

/// Collections written by one `seed_defaults` run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SeedReport {
    pub seeded: Vec<Collection>,
    pub skipped: Vec<Collection>,
}

/// Write `records` to `collection` unless the key already exists.
/// Returns whether anything was written.
pub fn seed_collection<T>(storage: &Storage, collection: Collection, records: Value) -> Result<bool, StoreError>
where
    T: Serialize + DeserializeOwned,
{
    if storage.contains(collection)? {
        log::debug!("{} already present, not seeding", collection);
        return Ok(false);
    }
    let typed: Vec<T> = serde_json::from_value(records)?;
    storage.save(collection, &typed)?;
    log::info!("Seeded {} default record(s) into {}", typed.len(), collection);
    Ok(true)
}

pub fn seed_defaults(storage: &Storage) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();
    let plan: [(Collection, fn(&Storage) -> Result<bool, StoreError>); 5] = [
        (Collection::Proposals, |s| {
            seed_collection::<Proposal>(s, Collection::Proposals, default_proposals())
        }),
        (Collection::Projects, |s| {
            seed_collection::<Project>(s, Collection::Projects, default_projects())
        }),
        (Collection::Clients, |s| {
            seed_collection::<Client>(s, Collection::Clients, default_clients())
        }),
        (Collection::Tasks, |s| {
            seed_collection::<Task>(s, Collection::Tasks, default_tasks())
        }),
        (Collection::Employees, |s| {
            seed_collection::<Employee>(s, Collection::Employees, default_employees())
        }),
    ];
    for (collection, seed) in plan {
        if seed(storage)? {
            report.seeded.push(collection);
        } else {
            report.skipped.push(collection);
        }
    }
    Ok(report)
}

fn default_proposals() -> Value {
    json!([
        {
            "id": "1",
            "title": "Website Redesign Project",
            "client": "TechCorp Inc.",
            "totalValue": 15000,
            "status": "bidding",
            "priority": "Medium",
            "description": "Complete website redesign for TechCorp Inc."
        },
        {
            "id": "2",
            "title": "Mobile App Development",
            "client": "StartupXYZ",
            "totalValue": 25000,
            "status": "lead",
            "priority": "High",
            "description": "iOS and Android app development for StartupXYZ"
        }
    ])
}

fn default_projects() -> Value {
    json!([
        {
            "id": "1",
            "name": "E-commerce Platform",
            "client": "Retail Solutions",
            "status": "In Progress",
            "progress": 75,
            "startDate": "2024-01-15",
            "endDate": "2024-05-30",
            "budget": 50000,
            "team": ["John Doe", "Jane Smith", "Mike Johnson"]
        },
        {
            "id": "2",
            "name": "CRM System",
            "client": "Business Corp",
            "status": "Planning",
            "progress": 25,
            "startDate": "2024-02-01",
            "endDate": "2024-08-15",
            "budget": 75000,
            "team": ["Sarah Wilson", "David Brown"]
        }
    ])
}

fn default_clients() -> Value {
    json!([
        {
            "id": "1",
            "name": "TechCorp Inc.",
            "type": "Client",
            "email": "contact@techcorp.com",
            "phone": "+1 (555) 123-4567",
            "address": "123 Business Ave, New York, NY 10001",
            "industry": "Technology",
            "contactPerson": "John Smith",
            "totalProjects": 3,
            "totalRevenue": 75000,
            "status": "Active",
            "lastContact": "2024-02-10"
        },
        {
            "id": "2",
            "name": "StartupXYZ",
            "type": "Client",
            "email": "hello@startupxyz.com",
            "phone": "+1 (555) 987-6543",
            "address": "456 Innovation St, San Francisco, CA 94102",
            "industry": "Software",
            "contactPerson": "Sarah Wilson",
            "totalProjects": 1,
            "totalRevenue": 25000,
            "status": "Active",
            "lastContact": "2024-02-15"
        }
    ])
}

fn default_tasks() -> Value {
    json!([
        {
            "id": "1",
            "title": "Design Homepage",
            "description": "Create modern homepage design for e-commerce platform",
            "assignee": "John Doe",
            "priority": "High",
            "status": "In Progress",
            "dueDate": "2024-03-20",
            "tags": ["Design", "Frontend"]
        },
        {
            "id": "2",
            "title": "Database Setup",
            "description": "Set up PostgreSQL database with proper schemas",
            "assignee": "Mike Johnson",
            "priority": "Medium",
            "status": "Completed",
            "dueDate": "2024-03-10",
            "tags": ["Backend", "Database"]
        },
        {
            "id": "3",
            "title": "API Integration",
            "description": "Integrate third-party payment APIs",
            "assignee": "Sarah Wilson",
            "priority": "High",
            "status": "Pending",
            "dueDate": "2024-03-25",
            "tags": ["Backend", "API"]
        }
    ])
}

fn default_employees() -> Value {
    json!([
        {
            "id": "1",
            "name": "John Doe",
            "email": "john.doe@clientcore.com",
            "role": "Senior Developer",
            "department": "Engineering",
            "status": "Active",
            "joinDate": "2023-01-15"
        },
        {
            "id": "2",
            "name": "Jane Smith",
            "email": "jane.smith@clientcore.com",
            "role": "UI/UX Designer",
            "department": "Design",
            "status": "Active",
            "joinDate": "2023-03-20"
        }
    ])
}
