//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber, with an
//! optional daily-rotated JSON file via tracing-appender.

pub mod logger;

pub use logger::LoggerImpl;
