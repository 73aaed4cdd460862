//! Roster membership and notification query service.
//!
//! # Responsibility
//! - Resolve students common to a set of teachers.
//! - Resolve notification recipients from registrations plus mentions.
//! - Resolve the teachers of one student.
//!
//! # Invariants
//! - An unknown teacher in a common-students query yields an empty result.
//! - Suspended students never appear in notification recipients.
//! - Suspended students are hidden from single-teacher common-students
//!   results but still take part in multi-teacher intersections.
//! - Every returned list is duplicate-free.

use crate::mention::extract_mentioned_emails;
use crate::model::student::StudentId;
use crate::repo::roster_repo::RosterRepository;
use crate::service::error::RosterError;
use crate::service::require_email;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Query service facade over repository implementations.
pub struct QueryService<R: RosterRepository> {
    repo: R,
}

impl<R: RosterRepository> QueryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns emails of students registered to every listed teacher.
    ///
    /// # Contract
    /// - Empty list or blank entry is a `Validation` error.
    /// - Repeated teacher emails count once.
    /// - Any unknown teacher makes the result empty.
    /// - One teacher: that teacher's non-suspended students.
    /// - Several teachers: the intersection of their students, suspended
    ///   ones included.
    /// - Ordered by student registration order.
    pub fn common_students(&self, teacher_emails: &[String]) -> Result<Vec<String>, RosterError> {
        let started_at = Instant::now();
        let teacher_emails = normalize_teacher_emails(teacher_emails)?;

        let teachers = self.repo.find_teachers_by_emails(&teacher_emails)?;
        if teachers.len() < teacher_emails.len() {
            debug!(
                "event=common_students module=service status=unknown_teacher requested={} resolved={}",
                teacher_emails.len(),
                teachers.len()
            );
            return Ok(Vec::new());
        }

        let students = match teachers.as_slice() {
            [teacher] => self.repo.students_for_teacher_not_suspended(teacher.id)?,
            _ => {
                let teacher_ids: Vec<_> = teachers.iter().map(|teacher| teacher.id).collect();
                self.repo.students_linked_to_all_teachers(&teacher_ids)?
            }
        };

        info!(
            "event=common_students module=service status=ok teachers={} students={} duration_ms={}",
            teachers.len(),
            students.len(),
            started_at.elapsed().as_millis()
        );
        Ok(students.into_iter().map(|student| student.email).collect())
    }

    /// Returns emails of students who should receive a teacher's notification.
    ///
    /// # Contract
    /// - The teacher is created when unknown.
    /// - Recipients are the teacher's non-suspended students followed by the
    ///   non-suspended students mentioned as `@email` in `notification`, in
    ///   mention order.
    /// - Mentions of unknown emails are dropped.
    /// - Each student appears once.
    pub fn notification_recipients(
        &self,
        teacher_email: &str,
        notification: &str,
    ) -> Result<Vec<String>, RosterError> {
        let started_at = Instant::now();
        let teacher_email = require_email(teacher_email, "teacher email is required")?;
        let mentioned = extract_mentioned_emails(notification);

        let teacher = self.repo.find_or_create_teacher(teacher_email)?;

        let mut seen: HashSet<StudentId> = HashSet::new();
        let mut recipients = Vec::new();
        for student in self.repo.students_for_teacher_not_suspended(teacher.id)? {
            if seen.insert(student.id) {
                recipients.push(student.email);
            }
        }
        let registered = recipients.len();

        if !mentioned.is_empty() {
            let mut by_email: HashMap<String, _> = self
                .repo
                .find_students_by_emails_not_suspended(&mentioned)?
                .into_iter()
                .map(|student| (student.email.to_ascii_lowercase(), student))
                .collect();
            for email in &mentioned {
                let Some(student) = by_email.remove(&email.to_ascii_lowercase()) else {
                    continue;
                };
                if seen.insert(student.id) {
                    recipients.push(student.email);
                }
            }
        }

        info!(
            "event=notification_recipients module=service status=ok registered={} mentioned={} recipients={} duration_ms={}",
            registered,
            mentioned.len(),
            recipients.len(),
            started_at.elapsed().as_millis()
        );
        Ok(recipients)
    }

    /// Returns emails of the teachers a student is registered to.
    ///
    /// Fails with `StudentNotFound` for an unknown student.
    pub fn teachers_of_student(&self, student_email: &str) -> Result<Vec<String>, RosterError> {
        let student_email = require_email(student_email, "student email is required")?;
        let student = self
            .repo
            .find_student_by_email(student_email)?
            .ok_or_else(|| RosterError::StudentNotFound(student_email.to_string()))?;

        let teachers = self.repo.teachers_for_student(student.id)?;
        Ok(teachers.into_iter().map(|teacher| teacher.email).collect())
    }
}

fn normalize_teacher_emails(teacher_emails: &[String]) -> Result<Vec<String>, RosterError> {
    if teacher_emails.is_empty() {
        return Err(RosterError::Validation(
            "at least one teacher email is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(teacher_emails.len());
    for email in teacher_emails {
        let email = require_email(email, "teacher email must not be blank")?;
        if seen.insert(email.to_ascii_lowercase()) {
            unique.push(email.to_string());
        }
    }
    Ok(unique)
}
