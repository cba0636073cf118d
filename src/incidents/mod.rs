//! Incident tracking.
//!
//! Incidents are created with status `new` and change only through explicit
//! status updates. Any status may follow any other; there is no transition
//! guard.

pub mod store;

pub use store::SqliteIncidentStore;
