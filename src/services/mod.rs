//! Domain operations layered on top of the generic repository.

pub mod clients;
pub mod dashboard;
pub mod profile;
pub mod projects;
pub mod proposals;
pub mod tasks;
