//! Student suspension use-case service.
//!
//! # Invariants
//! - Suspension is one-way and idempotent.
//! - Suspension never touches teacher/student edges.

use crate::repo::roster_repo::RosterRepository;
use crate::service::error::RosterError;
use crate::service::require_email;
use log::info;

/// Suspension service facade over repository implementations.
pub struct SuspensionService<R: RosterRepository> {
    repo: R,
}

impl<R: RosterRepository> SuspensionService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Suspends the student identified by `student_email`.
    ///
    /// Fails with `StudentNotFound` when no such student exists. Suspending
    /// an already suspended student succeeds.
    pub fn suspend_student(&self, student_email: &str) -> Result<(), RosterError> {
        let student_email = require_email(student_email, "student email is required")?;
        let student = self
            .repo
            .find_student_by_email(student_email)?
            .ok_or_else(|| RosterError::StudentNotFound(student_email.to_string()))?;

        self.repo.suspend_student(student.id)?;
        info!(
            "event=suspend_student module=service status=ok student_id={} was_suspended={}",
            student.id, student.suspended
        );
        Ok(())
    }
}
