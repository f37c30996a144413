pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod ledger_repo;
pub mod memory;

pub use catalog_repo::StoreScheduleCatalog;
pub use database::DbClient;
pub use ledger_repo::StoreAvailabilityLedger;
pub use memory::{MemoryCatalog, MemoryLedger};
