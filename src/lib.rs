//! Speech delivery scoring: acoustic feature extraction, multi-target regression
//! and rule-based coaching feedback.

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod feedback;
pub mod features;
pub mod model;
pub mod preprocessing;
pub mod schema;
pub mod service;
pub mod types;

pub use error::{Result, SpeechError};
