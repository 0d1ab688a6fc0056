//! `staffgate-core`: domain building blocks for staff accounts.
//!
//! This crate contains **pure domain** primitives (no backend or HTTP concerns).

pub mod claims;
pub mod error;
pub mod id;
pub mod role;
pub mod staff;

pub use claims::CustomClaims;
pub use error::{DomainError, DomainResult};
pub use id::StaffId;
pub use role::StaffRole;
pub use staff::{fields, NewStaff, StaffInput, StaffRecord, STAFF_COLLECTION};
