//! mp-providers: LLM provider implementations for MetroPulse
//!
//! This crate provides implementations of the Provider trait for the LLM APIs
//! the pipelines run against.

pub mod gemini;

pub use gemini::GeminiProvider;
