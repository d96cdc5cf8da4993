//! Service layer - ledger use cases
//!
//! Services depend on the port traits only. Each one covers a single
//! feature area.

mod account;
mod doctor;
pub mod migration;
mod status;
mod transfer;

pub use account::AccountService;
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use migration::{MigrationResult, MigrationService};
pub use status::StatusService;
pub use transfer::TransferService;
