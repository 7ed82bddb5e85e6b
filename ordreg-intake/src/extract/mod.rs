//! Candidate Extraction
//!
//! Turns raw message text into unvalidated line candidates. Two
//! implementations of the `CandidateExtractor` boundary:
//! - `PatternExtractor` — built-in, pattern-based, no network
//! - `RemoteExtractor` — delegates to the external extraction service

mod pattern;
mod remote;

pub use pattern::PatternExtractor;
pub use remote::{RemoteExtractor, RemoteLineItem, RemoteResponse};
