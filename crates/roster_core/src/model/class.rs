//! Class record and its enrolment links.
//!
//! # Invariants
//! - A subject is linked to a class at most once.
//! - A student is enrolled in a class at most once.

use crate::model::student::StudentId;
use crate::model::subject::SubjectId;
use serde::{Deserialize, Serialize};

/// Storage key of a class row.
pub type ClassId = i64;

/// Persisted class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub description: String,
}

/// Subject taught in a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSubject {
    pub id: i64,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
}

/// Student enrolled in a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassStudent {
    pub id: i64,
    pub class_id: ClassId,
    pub student_id: StudentId,
}
