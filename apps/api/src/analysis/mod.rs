pub mod annotate;
pub mod classify;
pub mod detector;
pub mod handlers;
pub mod pipeline;
pub mod suggestions;

pub use pipeline::AnalysisPipeline;
