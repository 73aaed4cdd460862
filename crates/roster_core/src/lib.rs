//! Core domain logic for the teacher/student roster and class enrolment.
//! This crate is the single source of truth for registration and query
//! invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod mention;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, RosterConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use mention::{extract_mentioned_emails, is_email_address};
pub use model::class::{Class, ClassId, ClassStudent, ClassSubject};
pub use model::student::{Student, StudentId};
pub use model::subject::{Subject, SubjectId};
pub use model::teacher::{Teacher, TeacherId};
pub use repo::class_repo::{ClassRepository, SqliteClassRepository};
pub use repo::roster_repo::{
    EntityKind, RepoError, RepoResult, RosterRepository, SqliteRosterRepository,
};
pub use service::class_service::{ClassService, DEFAULT_MAX_STUDENTS_PER_CLASS};
pub use service::error::{RosterError, RosterErrorKind};
pub use service::query_service::QueryService;
pub use service::registration_service::{
    DuplicatePolicy, RegistrationService, RegistrationSummary,
};
pub use service::suspension_service::SuspensionService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
