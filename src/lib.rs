pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod gemini;
mod metrics;
pub mod relay;
pub mod server;
pub mod vision;

pub use config::Opts;
pub use error::AnalyzeError;
pub use relay::{AnalysisItem, Relay};
pub use vision::{InlineImage, VisionModel};
