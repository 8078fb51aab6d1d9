//! Tabular exports and Markdown reports over analysis results.

pub mod export;
pub mod handlers;
pub mod markdown;
