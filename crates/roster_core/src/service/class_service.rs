//! Class/subject enrolment use-case service.
//!
//! # Responsibility
//! - Create classes and subjects.
//! - Register subjects to classes and enrol students in classes.
//!
//! # Invariants
//! - A class never holds more than the configured number of students.
//! - Each check and the insert it guards run in one transaction.

use crate::model::class::{Class, ClassId, ClassStudent, ClassSubject};
use crate::model::subject::{Subject, SubjectId};
use crate::repo::class_repo::ClassRepository;
use crate::service::error::RosterError;
use crate::service::require_email;
use log::{info, warn};

/// Class size used when none is configured.
pub const DEFAULT_MAX_STUDENTS_PER_CLASS: u32 = 30;

/// Class enrolment service facade over repository implementations.
pub struct ClassService<R: ClassRepository> {
    repo: R,
    max_students_per_class: u32,
}

impl<R: ClassRepository> ClassService<R> {
    /// Creates a service with the default class size limit.
    pub fn new(repo: R) -> Self {
        Self::with_capacity(repo, DEFAULT_MAX_STUDENTS_PER_CLASS)
    }

    pub fn with_capacity(repo: R, max_students_per_class: u32) -> Self {
        Self {
            repo,
            max_students_per_class,
        }
    }

    pub fn max_students_per_class(&self) -> u32 {
        self.max_students_per_class
    }

    /// Creates a class. A blank name is a `Validation` error.
    pub fn create_class(&self, name: &str, description: &str) -> Result<Class, RosterError> {
        let name = require_name(name, "class name is required")?;
        let class = self.repo.create_class(name, description.trim())?;
        info!(
            "event=create_class module=service status=ok class_id={}",
            class.id
        );
        Ok(class)
    }

    /// Creates a subject. A blank name is a `Validation` error.
    pub fn create_subject(&self, name: &str) -> Result<Subject, RosterError> {
        let name = require_name(name, "subject name is required")?;
        let subject = self.repo.create_subject(name)?;
        info!(
            "event=create_subject module=service status=ok subject_id={}",
            subject.id
        );
        Ok(subject)
    }

    /// Registers one subject to one class.
    ///
    /// # Contract
    /// - Unknown class or subject: `ClassNotFound` / `SubjectNotFound`.
    /// - Pair already linked: `SubjectAlreadyInClass`.
    pub fn register_subject(
        &self,
        class_id: ClassId,
        subject_id: SubjectId,
    ) -> Result<ClassSubject, RosterError> {
        let result: Result<ClassSubject, RosterError> = self.repo.in_transaction(|repo| {
            if repo.find_class(class_id)?.is_none() {
                return Err(RosterError::ClassNotFound(class_id));
            }
            if repo.find_subject(subject_id)?.is_none() {
                return Err(RosterError::SubjectNotFound(subject_id));
            }
            if repo.class_has_subject(class_id, subject_id)? {
                return Err(RosterError::SubjectAlreadyInClass {
                    class_id,
                    subject_id,
                });
            }
            Ok(repo.link_subject(class_id, subject_id)?)
        });

        log_outcome("register_subject", class_id, &result);
        result
    }

    /// Enrols the student identified by `student_email` in one class.
    ///
    /// # Contract
    /// - Unknown class or student: `ClassNotFound` / `StudentNotFound`.
    /// - Student already enrolled: `StudentAlreadyInClass`.
    /// - Class at its limit: `ClassFull`, nothing written.
    pub fn register_student(
        &self,
        class_id: ClassId,
        student_email: &str,
    ) -> Result<ClassStudent, RosterError> {
        let student_email = require_email(student_email, "student email is required")?;
        let limit = self.max_students_per_class;

        let result: Result<ClassStudent, RosterError> = self.repo.in_transaction(|repo| {
            if repo.find_class(class_id)?.is_none() {
                return Err(RosterError::ClassNotFound(class_id));
            }
            let student = repo
                .find_student_by_email(student_email)?
                .ok_or_else(|| RosterError::StudentNotFound(student_email.to_string()))?;
            if repo.class_has_student(class_id, student.id)? {
                return Err(RosterError::StudentAlreadyInClass {
                    class_id,
                    student: student.email,
                });
            }
            if repo.count_class_students(class_id)? >= u64::from(limit) {
                return Err(RosterError::ClassFull { class_id, limit });
            }
            Ok(repo.enrol_student(class_id, student.id)?)
        });

        log_outcome("register_class_student", class_id, &result);
        result
    }

    /// Returns emails of the students enrolled in one class.
    pub fn class_students(&self, class_id: ClassId) -> Result<Vec<String>, RosterError> {
        if self.repo.find_class(class_id)?.is_none() {
            return Err(RosterError::ClassNotFound(class_id));
        }
        let students = self.repo.students_in_class(class_id)?;
        Ok(students.into_iter().map(|student| student.email).collect())
    }
}

fn require_name<'a>(value: &'a str, message: &'static str) -> Result<&'a str, RosterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RosterError::Validation(message.to_string()));
    }
    Ok(trimmed)
}

fn log_outcome<T>(event: &str, class_id: ClassId, result: &Result<T, RosterError>) {
    match result {
        Ok(_) => info!(
            "event={} module=service status=ok class_id={}",
            event, class_id
        ),
        Err(err) => warn!(
            "event={} module=service status=error class_id={} error_kind={}",
            event,
            class_id,
            err.kind().as_str()
        ),
    }
}
