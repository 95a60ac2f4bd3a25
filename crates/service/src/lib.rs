//! Service layer providing business-oriented operations on top of models.
//! - Separates business logic from data access.
//! - Reuses validation and entity definitions in `models` crate.
//! - Provides clear error types and documented interfaces.

pub mod auth;
pub mod errors;
pub mod import;
pub mod payments;
pub mod school_service;
pub mod storage;
pub mod user_service;
