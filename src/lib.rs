pub mod analysis;
pub mod config;
pub mod error;
pub mod exercise;
pub mod pose;
pub mod reference;

pub use analysis::{AnalysisReport, Analyzer};
pub use error::{AnalysisError, AnalysisResult};
pub use exercise::Exercise;
