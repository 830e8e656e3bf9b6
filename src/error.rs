/// Structural problems in the timetabling input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Course {0} is declared more than once")]
    DuplicateCourse(String),

    #[error("Room {0} is declared more than once")]
    DuplicateRoom(String),

    #[error("Curriculum {curriculum} references unknown course {course}")]
    UnknownCurriculumCourse { curriculum: String, course: String },

    #[error("Unavailability constraint references unknown course {0}")]
    UnknownConstraintCourse(String),
}

/// Invalid solver settings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid exploration constant: {0} (must be finite and >= 0)")]
    InvalidExplorationConstant(f64),

    #[error("Invalid time limit: {0} seconds (must be finite and >= 0)")]
    InvalidTimeLimit(f64),

    #[error("Hill climbing idle cap must be > 0")]
    ZeroIdleCap,
}

/// Everything that can stop a solve before the search starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
