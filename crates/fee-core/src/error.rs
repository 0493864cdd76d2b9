use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("School not found: {0}")]
    SchoolNotFound(Uuid),
    #[error("Student not found: {0}")]
    StudentNotFound(Uuid),
    #[error("Academic year not found: {0}")]
    AcademicYearNotFound(String),
    #[error("Student {0} has no grade assignment")]
    MissingGradeAssignment(Uuid),
    #[error("Upstream lookup failed: {0}")]
    UpstreamLookup(String),
    #[error("Persistence write failed: {0}")]
    PersistenceWrite(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// True for the precondition failures that abort a statement before any computation.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CoreError::SchoolNotFound(_)
                | CoreError::StudentNotFound(_)
                | CoreError::AcademicYearNotFound(_)
                | CoreError::MissingGradeAssignment(_)
        )
    }
}
