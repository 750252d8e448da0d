//! ClientCore: clients, proposals, projects, tasks and employees for a small
//! business, kept as named JSON collections in one local store.
//!
//! Layers, bottom up:
//! - `db`, `store`: the SQLite/file/memory backends behind `CollectionStore`
//!   and the typed `Storage` wrapper with its change feed
//! - `types`, `entity`, `validation`, `repository`: records and generic CRUD
//! - `pipeline`: proposal stages and the board projection
//! - `services`: dashboard, client stats and per-entity operations
//! - `api`: the REST dispatcher; `state` wires config to storage

pub mod api;
pub mod db;
pub mod entity;
pub mod error;
mod migrations;
pub mod pipeline;
pub mod repository;
pub mod seed;
pub mod services;
pub mod state;
pub mod store;
pub mod types;
pub mod util;
pub mod validation;
