//! `mailroom-enrich`
//!
//! **Responsibility:** the AI text-analysis collaborator boundary.
//!
//! This crate must not mutate workflow state. It turns OCR text into an
//! [`mailroom_core::Enrichment`] record, or a typed failure the worker can
//! classify as transient or permanent, and nothing else.

pub mod analyzer;
pub mod http;

pub use analyzer::{AnalysisError, MailAnalyzer};
pub use http::{HttpAnalyzer, HttpAnalyzerConfig};
