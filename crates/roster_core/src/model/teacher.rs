//! Teacher record.

use serde::{Deserialize, Serialize};

/// Storage key of a teacher row.
pub type TeacherId = i64;

/// Persisted teacher identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: TeacherId,
    /// Natural key, unique case-insensitively.
    pub email: String,
}
