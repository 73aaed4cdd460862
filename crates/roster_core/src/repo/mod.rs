//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the roster and for
//!   class/subject enrolment.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Relationships are read and written as explicit edge-set operations.
//! - Repository APIs return semantic errors (`*NotFound`, `DuplicateEmail`)
//!   in addition to DB transport errors.

pub mod class_repo;
pub mod roster_repo;
