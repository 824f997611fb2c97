//! ==============================================================================
//! sensor-console - client core for the temperature/luminosity sensor backend
//! ==============================================================================
//!
//! purpose:
//!     holds the client's view of sensor records, summarizes them per kind,
//!     allocates uids for new records and mediates create/update/delete
//!     against the kind-routed rest endpoints.
//!
//! layout (leaf -> root):
//!     - transport.rs: http seam (reqwest, in-memory backend for tests)
//!     - session.rs: explicit bearer session, login/register gateway
//!     - repository.rs: kind-routed record reads and mutations
//!     - uid.rs: next-uid allocation
//!     - stats.rs: count/min/max/avg/population std dev
//!     - board.rs: record set as of the last successful fetch
//!     - form.rs: create/edit state machine
//!     - export.rs: csv artifacts
//!     - config.rs: console.toml
//!
//! ==============================================================================

pub mod board;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod form;
pub mod repository;
pub mod session;
pub mod stats;
pub mod transport;
pub mod uid;

pub use board::{DashboardSummary, KindSummary, Resync, SensorBoard};
pub use domain::{RecordId, SensorKind, SensorRecord, SensorValue, Uid};
pub use error::ConsoleError;
pub use export::{ExportSubset, Exporter};
pub use form::{FormCoordinator, FormPhase, FormState};
pub use repository::SensorRepository;
pub use session::{AuthGateway, Session, Surface};
pub use stats::Stats;
pub use transport::{HttpTransport, Transport};
pub use uid::UidAllocator;
