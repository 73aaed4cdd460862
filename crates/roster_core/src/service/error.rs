//! Caller-facing error taxonomy for roster use-cases.

use crate::model::class::ClassId;
use crate::model::subject::SubjectId;
use crate::repo::roster_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse error class used by transports to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterErrorKind {
    /// Malformed or missing input. Never retried.
    Validation,
    /// Referenced entity does not exist.
    NotFound,
    /// Uniqueness or duplicate-registration violation.
    Conflict,
    /// Transient storage failure. Callers may retry with backoff.
    StoreUnavailable,
}

impl RosterErrorKind {
    /// Stable machine-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::StoreUnavailable => "store_unavailable",
        }
    }

    /// HTTP status a transport should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::StoreUnavailable => 503,
        }
    }
}

/// Service error for roster use-cases.
#[derive(Debug)]
pub enum RosterError {
    /// Input rejected before touching storage.
    Validation(String),
    /// No student exists for the given email.
    StudentNotFound(String),
    ClassNotFound(ClassId),
    SubjectNotFound(SubjectId),
    /// A storage key referenced directly does not exist.
    MissingRecord(RepoError),
    /// Strict registration found students already linked to the teacher.
    AlreadyRegistered {
        teacher: String,
        students: Vec<String>,
    },
    /// The subject is already taught in the class.
    SubjectAlreadyInClass {
        class_id: ClassId,
        subject_id: SubjectId,
    },
    /// The student is already enrolled in the class.
    StudentAlreadyInClass { class_id: ClassId, student: String },
    /// The class holds `limit` students already.
    ClassFull { class_id: ClassId, limit: u32 },
    /// Storage-level uniqueness violation.
    Conflict(RepoError),
    /// Storage could not serve the request.
    StoreUnavailable(RepoError),
}

impl RosterError {
    pub fn kind(&self) -> RosterErrorKind {
        match self {
            Self::Validation(_) => RosterErrorKind::Validation,
            Self::StudentNotFound(_)
            | Self::ClassNotFound(_)
            | Self::SubjectNotFound(_)
            | Self::MissingRecord(_) => RosterErrorKind::NotFound,
            Self::AlreadyRegistered { .. }
            | Self::SubjectAlreadyInClass { .. }
            | Self::StudentAlreadyInClass { .. }
            | Self::ClassFull { .. }
            | Self::Conflict(_) => RosterErrorKind::Conflict,
            Self::StoreUnavailable(_) => RosterErrorKind::StoreUnavailable,
        }
    }
}

impl Display for RosterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::StudentNotFound(email) => write!(f, "student not found: {email}"),
            Self::ClassNotFound(id) => write!(f, "class not found: {id}"),
            Self::SubjectNotFound(id) => write!(f, "subject not found: {id}"),
            Self::MissingRecord(err) => write!(f, "{err}"),
            Self::AlreadyRegistered { teacher, students } => write!(
                f,
                "students already registered to {teacher}: {}",
                students.join(", ")
            ),
            Self::SubjectAlreadyInClass {
                class_id,
                subject_id,
            } => write!(
                f,
                "subject {subject_id} is already registered for class {class_id}"
            ),
            Self::StudentAlreadyInClass { class_id, student } => {
                write!(f, "student {student} is already registered for class {class_id}")
            }
            Self::ClassFull { class_id, limit } => write!(
                f,
                "class {class_id} has reached the maximum student limit of {limit}"
            ),
            Self::Conflict(err) => write!(f, "{err}"),
            Self::StoreUnavailable(err) => write!(f, "store unavailable: {err}"),
        }
    }
}

impl Error for RosterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MissingRecord(err) | Self::Conflict(err) | Self::StoreUnavailable(err) => {
                Some(err)
            }
            _ => None,
        }
    }
}

impl From<RepoError> for RosterError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::TeacherNotFound(_)
            | RepoError::StudentNotFound(_)
            | RepoError::ClassNotFound(_)
            | RepoError::SubjectNotFound(_) => Self::MissingRecord(value),
            RepoError::DuplicateEmail { .. } | RepoError::DuplicateLink { .. } => {
                Self::Conflict(value)
            }
            other => Self::StoreUnavailable(other),
        }
    }
}
