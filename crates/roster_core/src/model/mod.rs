//! Domain model for the teacher/student roster.
//!
//! # Responsibility
//! - Define the canonical records used by roster business logic.
//! - Define class/subject enrolment records.
//!
//! # Invariants
//! - Email uniquely identifies one record within its kind.
//! - Relationships are not embedded in records; they live in the edge set
//!   owned by the repository layer.

pub mod class;
pub mod student;
pub mod subject;
pub mod teacher;
