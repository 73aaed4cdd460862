//! Subject record.

use serde::{Deserialize, Serialize};

/// Storage key of a subject row.
pub type SubjectId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}
