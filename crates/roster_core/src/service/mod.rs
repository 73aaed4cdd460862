//! Roster use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the roster use-cases: registration,
//!   membership queries, notification recipients, suspension and class
//!   enrolment.
//! - Translate repository failures into the caller-facing error taxonomy.
//!
//! # Invariants
//! - Service layer remains storage-agnostic; it only sees `RosterRepository`.
//! - Multi-row writes run inside one repository transaction.

pub mod class_service;
pub mod error;
pub mod query_service;
pub mod registration_service;
pub mod suspension_service;

use error::RosterError;

/// Trims `value` and rejects it when blank.
pub(crate) fn require_email<'a>(
    value: &'a str,
    message: &'static str,
) -> Result<&'a str, RosterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RosterError::Validation(message.to_string()));
    }
    Ok(trimmed)
}
