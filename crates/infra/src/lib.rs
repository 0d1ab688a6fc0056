//! Infrastructure layer: identity provider and document store adapters, the
//! provisioning saga, and repair bookkeeping.

pub mod document_store;
pub mod error;
pub mod faults;
pub mod identity;
pub mod provisioning;
pub mod reconcile;
pub mod repairs;


pub use error::BackendError;
pub use provisioning::{Aftermath, CompensationPolicy, Stage, StaffError, StaffProvisioner, StatusChange};
pub use reconcile::SweepReport;
