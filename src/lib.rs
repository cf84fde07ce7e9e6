//! PeopleDesk operator tooling: report rendering for the `pdesk` CLI and the
//! admin HTTP API. Storage and maintenance live in `peopledesk-core`.

pub mod api;
pub mod report;

pub use peopledesk_core::{db, maintenance, models};
