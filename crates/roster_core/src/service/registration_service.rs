//! Student registration use-case service.
//!
//! # Responsibility
//! - Register a list of students to one teacher, creating missing rows.
//! - Apply the configured duplicate-registration policy.
//!
//! # Invariants
//! - One registration call is all-or-nothing: rows and edges created by a
//!   failed call never become visible.
//! - A teacher/student pair is linked at most once regardless of policy.
//!
//! # Duplicate policy
//! - `Skip` (default): already linked students are left alone and the call
//!   succeeds, adding only the missing edges.
//! - `Reject`: when any requested student is already linked, the call fails
//!   with `RosterError::AlreadyRegistered` naming every such student, and
//!   nothing from the call is persisted.

use crate::model::student::{Student, StudentId};
use crate::model::teacher::TeacherId;
use crate::repo::roster_repo::RosterRepository;
use crate::service::error::RosterError;
use crate::service::require_email;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Instant;

/// Handling of students already linked to the teacher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Add only missing edges and succeed.
    #[default]
    Skip,
    /// Fail the whole call when any edge already exists.
    Reject,
}

impl DuplicatePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Reject => "reject",
        }
    }
}

impl Display for DuplicatePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unsupported duplicate policy `{other}`; expected skip|reject"
            )),
        }
    }
}

/// Outcome of one successful registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSummary {
    pub teacher_id: TeacherId,
    /// Resolved students in request order, duplicates collapsed.
    pub student_ids: Vec<StudentId>,
    /// Edges inserted by this call.
    pub edges_added: usize,
    /// Requested students that were already linked (only under `Skip`).
    pub already_registered: Vec<String>,
}

/// Registration service facade over repository implementations.
pub struct RegistrationService<R: RosterRepository> {
    repo: R,
    policy: DuplicatePolicy,
}

impl<R: RosterRepository> RegistrationService<R> {
    /// Creates a service with the default `Skip` policy.
    pub fn new(repo: R) -> Self {
        Self::with_policy(repo, DuplicatePolicy::default())
    }

    pub fn with_policy(repo: R, policy: DuplicatePolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Registers `student_emails` to the teacher identified by `teacher_email`.
    ///
    /// # Contract
    /// - Blank teacher email, empty student list or blank student entry is a
    ///   `Validation` error.
    /// - Missing teacher and student rows are created.
    /// - Runs as one transaction; see module docs for the duplicate policy.
    pub fn register_students(
        &self,
        teacher_email: &str,
        student_emails: &[String],
    ) -> Result<RegistrationSummary, RosterError> {
        let started_at = Instant::now();
        let teacher_email = require_email(teacher_email, "teacher email is required")?;
        let student_emails = normalize_student_emails(student_emails)?;
        let policy = self.policy;

        let result = self.repo.in_transaction(|repo| {
            register_in_tx(repo, teacher_email, &student_emails, policy)
        });

        match &result {
            Ok(summary) => info!(
                "event=register_students module=service status=ok policy={} requested={} edges_added={} already_registered={} duration_ms={}",
                policy,
                student_emails.len(),
                summary.edges_added,
                summary.already_registered.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=register_students module=service status=error policy={} requested={} error_kind={} duration_ms={}",
                policy,
                student_emails.len(),
                err.kind().as_str(),
                started_at.elapsed().as_millis()
            ),
        }

        result
    }
}

fn register_in_tx(
    repo: &dyn RosterRepository,
    teacher_email: &str,
    student_emails: &[String],
    policy: DuplicatePolicy,
) -> Result<RegistrationSummary, RosterError> {
    let teacher = repo.find_or_create_teacher(teacher_email)?;

    let mut students = Vec::with_capacity(student_emails.len());
    for email in student_emails {
        students.push(repo.find_or_create_student(email)?);
    }
    let student_ids: Vec<StudentId> = students.iter().map(|student| student.id).collect();

    let linked = repo.existing_edges(teacher.id, &student_ids)?;
    let (already, fresh): (Vec<&Student>, Vec<&Student>) = students
        .iter()
        .partition(|student| linked.contains(&student.id));
    let already_registered: Vec<String> =
        already.iter().map(|student| student.email.clone()).collect();

    if policy == DuplicatePolicy::Reject && !already_registered.is_empty() {
        return Err(RosterError::AlreadyRegistered {
            teacher: teacher.email,
            students: already_registered,
        });
    }

    let fresh_ids: Vec<StudentId> = fresh.iter().map(|student| student.id).collect();
    let edges_added = repo.add_edges(teacher.id, &fresh_ids)?;

    Ok(RegistrationSummary {
        teacher_id: teacher.id,
        student_ids,
        edges_added,
        already_registered,
    })
}

fn normalize_student_emails(student_emails: &[String]) -> Result<Vec<String>, RosterError> {
    if student_emails.is_empty() {
        return Err(RosterError::Validation(
            "at least one student email is required".to_string(),
        ));
    }

    // Emails are unique case-insensitively in storage.
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(student_emails.len());
    for email in student_emails {
        let email = require_email(email, "student email must not be blank")?;
        if seen.insert(email.to_ascii_lowercase()) {
            unique.push(email.to_string());
        }
    }
    Ok(unique)
}
