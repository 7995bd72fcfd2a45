use std::path::PathBuf;

use crate::exercise::Exercise;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("No keypoints extracted from the recording")]
    NoKeypoints,

    #[error("Reference data missing for {0}")]
    MissingReference(Exercise),

    #[error("Unknown exercise: {0}")]
    UnknownExercise(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
