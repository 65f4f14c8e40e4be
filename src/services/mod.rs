//! Services composing the data sources with the pure calculation core
//!
//! Services take their sources as `Arc<dyn ...>` so the same service runs over
//! Postgres repositories in production and in-memory sources in tests.

pub mod entry_service;
pub mod target_service;

pub use entry_service::{EntryDraft, PreparedEntry, ScopeEntryService};
pub use target_service::{ClientForecast, TargetForecastService};
