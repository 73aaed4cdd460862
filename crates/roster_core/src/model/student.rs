//! Student record.
//!
//! # Invariants
//! - `suspended` only transitions from `false` to `true`.

use serde::{Deserialize, Serialize};

/// Storage key of a student row.
pub type StudentId = i64;

/// Persisted student identity and suspension state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    /// Natural key, unique case-insensitively.
    pub email: String,
    /// Suspended students are hidden from recipient and single-teacher
    /// queries. Existing edges are kept.
    pub suspended: bool,
}

impl Student {
    /// Returns whether this student may receive notifications.
    pub fn is_active(&self) -> bool {
        !self.suspended
    }
}
