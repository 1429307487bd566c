//! Core config, errors, language catalog, and shared records for SpeechBridge.

pub mod config;
pub mod error;
pub mod languages;
pub mod types;
