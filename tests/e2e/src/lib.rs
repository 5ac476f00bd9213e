//! End-to-end test support for the Dorudon store
//!
//! - `harness`: isolated, self-cleaning store instances
//! - `mocks`: dictionary source text generators

pub mod harness {
    pub mod db_manager;
    pub use db_manager::TestDatabaseManager;
}

pub mod mocks {
    pub mod fixtures;
    pub use fixtures::TestDataFactory;
}
