//! List query parameters: paging, search, field filters and sorting.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

use crate::entity::{Entity, EntityKind};
use crate::error::CrmError;
use crate::types::{
    ClientStatus, ClientType, EmployeeStatus, Priority, ProjectStatus, ProposalStatus, TaskStatus,
};
use crate::util::contains_ci;
use crate::validation::{FieldError, Validator};

pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matching {
    /// Case-insensitive equality.
    Exact,
    /// Case-insensitive substring.
    Contains,
}

struct FilterRule {
    field: &'static str,
    matching: Matching,
    /// Canonicalizes an enum-valued filter, rejecting unknown labels.
    label: Option<fn(&str) -> Result<String, String>>,
}

fn label_of<E>(value: &str) -> Result<String, String>
where
    E: FromStr<Err = String> + std::fmt::Display,
{
    value.parse::<E>().map(|v| v.to_string())
}

const fn exact(field: &'static str) -> FilterRule {
    FilterRule {
        field,
        matching: Matching::Exact,
        label: None,
    }
}

static CLIENT_FILTERS: &[FilterRule] = &[
    FilterRule {
        field: "type",
        matching: Matching::Exact,
        label: Some(label_of::<ClientType>),
    },
    FilterRule {
        field: "status",
        matching: Matching::Exact,
        label: Some(label_of::<ClientStatus>),
    },
    FilterRule {
        field: "industry",
        matching: Matching::Contains,
        label: None,
    },
];

static PROPOSAL_FILTERS: &[FilterRule] = &[
    FilterRule {
        field: "status",
        matching: Matching::Exact,
        label: Some(label_of::<ProposalStatus>),
    },
    exact("client"),
    FilterRule {
        field: "priority",
        matching: Matching::Exact,
        label: Some(label_of::<Priority>),
    },
];

static PROJECT_FILTERS: &[FilterRule] = &[
    FilterRule {
        field: "status",
        matching: Matching::Exact,
        label: Some(label_of::<ProjectStatus>),
    },
    exact("client"),
    FilterRule {
        field: "priority",
        matching: Matching::Exact,
        label: Some(label_of::<Priority>),
    },
];

static TASK_FILTERS: &[FilterRule] = &[
    FilterRule {
        field: "status",
        matching: Matching::Exact,
        label: Some(label_of::<TaskStatus>),
    },
    FilterRule {
        field: "priority",
        matching: Matching::Exact,
        label: Some(label_of::<Priority>),
    },
    exact("assignee"),
    exact("project"),
];

static EMPLOYEE_FILTERS: &[FilterRule] = &[
    FilterRule {
        field: "status",
        matching: Matching::Exact,
        label: Some(label_of::<EmployeeStatus>),
    },
    exact("department"),
    exact("role"),
];

fn filter_rules(kind: EntityKind) -> &'static [FilterRule] {
    match kind {
        EntityKind::Client => CLIENT_FILTERS,
        EntityKind::Proposal => PROPOSAL_FILTERS,
        EntityKind::Project => PROJECT_FILTERS,
        EntityKind::Task => TASK_FILTERS,
        EntityKind::Employee => EMPLOYEE_FILTERS,
    }
}

/// Fields `sortBy` accepts per collection.
pub fn sort_fields(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Client => &["name", "createdAt", "totalRevenue", "totalProjects"],
        EntityKind::Proposal => &["title", "client", "status", "priority", "totalValue", "createdAt"],
        EntityKind::Project => &[
            "name", "client", "status", "priority", "startDate", "endDate", "budget", "progress",
            "createdAt",
        ],
        EntityKind::Task => &[
            "title",
            "status",
            "priority",
            "assignee",
            "dueDate",
            "estimatedHours",
            "actualHours",
            "createdAt",
        ],
        EntityKind::Employee => &["name", "email", "role", "department", "status", "joinDate", "createdAt"],
    }
}

#[derive(Debug, Clone)]
struct Filter {
    field: &'static str,
    matching: Matching,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Parsed, validated list query.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub page: usize,
    pub limit: usize,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: SortOrder,
    filters: Vec<Filter>,
}

fn param<'a>(query: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    query
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_bounded(
    v: &mut Validator,
    raw: Option<&str>,
    field: &str,
    default: usize,
    max: usize,
    message: &str,
) -> usize {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 && n <= max => n,
        _ => {
            v.fail(field, message);
            default
        }
    }
}

impl ListParams {
    pub fn parse(
        kind: EntityKind,
        query: &BTreeMap<String, String>,
        default_limit: usize,
    ) -> Result<Self, CrmError> {
        let mut v = Validator::new();
        let page = parse_bounded(
            &mut v,
            param(query, "page"),
            "page",
            1,
            usize::MAX,
            "Page must be a positive integer",
        );
        let limit = parse_bounded(
            &mut v,
            param(query, "limit"),
            "limit",
            default_limit.clamp(1, MAX_LIMIT),
            MAX_LIMIT,
            "Limit must be between 1 and 100",
        );

        let order = match param(query, "sortOrder").map(str::to_ascii_lowercase).as_deref() {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(_) => {
                v.fail("sortOrder", "Sort order must be asc or desc");
                SortOrder::Desc
            }
        };

        let sort_by = param(query, "sortBy").map(str::to_string);
        if let Some(field) = &sort_by {
            if !sort_fields(kind).contains(&field.as_str()) {
                v.fail(
                    "sortBy",
                    &format!("Sort field must be one of: {}", sort_fields(kind).join(", ")),
                );
            }
        }

        let mut filters = Vec::new();
        for rule in filter_rules(kind) {
            let Some(raw) = param(query, rule.field) else {
                continue;
            };
            let value = match rule.label {
                Some(canonical) => match canonical(raw) {
                    Ok(label) => label,
                    Err(message) => {
                        v.fail(rule.field, &message);
                        continue;
                    }
                },
                None => raw.to_string(),
            };
            filters.push(Filter {
                field: rule.field,
                matching: rule.matching,
                value: value.to_lowercase(),
            });
        }

        let errors: Vec<FieldError> = v.into_errors();
        if !errors.is_empty() {
            return Err(CrmError::Validation(errors));
        }

        Ok(Self {
            page,
            limit,
            search: param(query, "search").map(str::to_string),
            sort_by,
            order,
            filters,
        })
    }

    fn keeps<T: Entity>(&self, record: &T) -> bool {
        if let Some(search) = &self.search {
            if !record.matches_search(search) {
                return false;
            }
        }
        self.filters.iter().all(|filter| {
            let Some(text) = record.field_text(filter.field) else {
                return false;
            };
            match filter.matching {
                Matching::Exact => text.to_lowercase() == filter.value,
                Matching::Contains => contains_ci(&text, &filter.value),
            }
        })
    }

    /// Filter, sort and slice `records`.
    pub fn apply<T: Entity>(&self, records: Vec<T>) -> Page<T> {
        let mut matched: Vec<T> = records.into_iter().filter(|r| self.keeps(r)).collect();

        let field = self.sort_by.as_deref().unwrap_or("createdAt");
        matched.sort_by(|a, b| {
            let ordering = compare_field(a, b, field);
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matched.len();
        let pages = total.div_ceil(self.limit);
        let items = matched
            .into_iter()
            .skip((self.page - 1).saturating_mul(self.limit))
            .take(self.limit)
            .collect();

        Page {
            items,
            pagination: Pagination {
                page: self.page,
                limit: self.limit,
                total,
                pages,
            },
        }
    }
}

/// Numbers compare numerically, everything else as case-folded text.
/// Records without a numeric value sort as 0.
fn compare_field<T: Entity>(a: &T, b: &T, field: &str) -> Ordering {
    let numeric = |r: &T| r.field_number(field);
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(x), None) => x.partial_cmp(&0.0).unwrap_or(Ordering::Equal),
        (None, Some(y)) => 0.0_f64.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (None, None) => {
            let text = |r: &T| r.field_text(field).unwrap_or_default().to_lowercase();
            text(a).cmp(&text(b))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Client, Task};

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn client(id: &str, name: &str, revenue: f64, industry: &str) -> Client {
        Client {
            id: id.into(),
            name: name.into(),
            total_revenue: revenue,
            industry: industry.into(),
            ..Default::default()
        }
    }

    fn clients() -> Vec<Client> {
        vec![
            client("100", "Acme", 500.0, "Manufacturing"),
            client("300", "Beta", 2000.0, "Software"),
            client("200", "Gamma", 1000.0, "Software Services"),
        ]
    }

    #[test]
    fn test_defaults() {
        let params = ListParams::parse(EntityKind::Client, &BTreeMap::new(), 10).expect("parse");
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 10);
        assert_eq!(params.order, SortOrder::Desc);
    }

    #[test]
    fn test_default_order_is_newest_first() {
        let params = ListParams::parse(EntityKind::Client, &BTreeMap::new(), 10).expect("parse");
        let page = params.apply(clients());
        let ids: Vec<&str> = page.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["300", "200", "100"]);
    }

    #[test]
    fn test_pagination_math() {
        let params =
            ListParams::parse(EntityKind::Client, &query(&[("page", "2"), ("limit", "2")]), 10)
                .expect("parse");
        let page = params.apply(clients());
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "100");
        assert_eq!(
            page.pagination,
            Pagination {
                page: 2,
                limit: 2,
                total: 3,
                pages: 2
            }
        );
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let params =
            ListParams::parse(EntityKind::Client, &query(&[("page", "9")]), 10).expect("parse");
        let page = params.apply(clients());
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.pages, 1);
    }

    #[test]
    fn test_limit_bounds() {
        for bad in ["0", "101", "ten", "-1"] {
            let err = ListParams::parse(EntityKind::Client, &query(&[("limit", bad)]), 10)
                .expect_err("out of range");
            match err {
                CrmError::Validation(errors) => assert_eq!(errors[0].field, "limit"),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(ListParams::parse(EntityKind::Client, &query(&[("limit", "100")]), 10).is_ok());
    }

    #[test]
    fn test_sort_by_revenue_ascending() {
        let params = ListParams::parse(
            EntityKind::Client,
            &query(&[("sortBy", "totalRevenue"), ("sortOrder", "asc")]),
            10,
        )
        .expect("parse");
        let names: Vec<String> = params.apply(clients()).items.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Acme", "Gamma", "Beta"]);
    }

    #[test]
    fn test_unknown_sort_field_rejected() {
        assert!(ListParams::parse(EntityKind::Client, &query(&[("sortBy", "email")]), 10).is_err());
        assert!(ListParams::parse(EntityKind::Client, &query(&[("sortOrder", "up")]), 10).is_err());
    }

    #[test]
    fn test_industry_is_substring_filter() {
        let params =
            ListParams::parse(EntityKind::Client, &query(&[("industry", "software")]), 10).expect("parse");
        assert_eq!(params.apply(clients()).pagination.total, 2);
    }

    #[test]
    fn test_enum_filter_is_validated_and_case_folded() {
        let err = ListParams::parse(EntityKind::Task, &query(&[("status", "done")]), 10)
            .expect_err("unknown status");
        assert_eq!(err.status_code(), 400);

        let tasks = vec![
            Task {
                id: "1".into(),
                status: TaskStatus::InProgress,
                ..Default::default()
            },
            Task {
                id: "2".into(),
                ..Default::default()
            },
        ];
        let params =
            ListParams::parse(EntityKind::Task, &query(&[("status", "in progress")]), 10).expect("parse");
        let page = params.apply(tasks);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "1");
    }

    #[test]
    fn test_search_then_filter() {
        let params = ListParams::parse(
            EntityKind::Client,
            &query(&[("search", "a"), ("industry", "Software")]),
            10,
        )
        .expect("parse");
        let names: Vec<String> = params.apply(clients()).items.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Beta", "Gamma"]);
    }
}
