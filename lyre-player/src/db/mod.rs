//! Database access layer
//!
//! SQLite catalog collaborator and persisted cross-restart session state.

pub mod catalog;
pub mod init;
pub mod session_state;

pub use catalog::SqliteCatalog;
pub use init::init_database;
pub use session_state::{PersistedSession, SessionStateSink, SessionStateWriter};
