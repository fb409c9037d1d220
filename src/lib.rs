//! Locaflow - Batch Localization Table Translation
//!
//! A Rust implementation of a workflow that fills the target-language columns of
//! game localization tables (CSV, gettext PO) using a locally hosted ollama model.

pub mod cli;
pub mod config;
pub mod error;
pub mod cancel;
pub mod languages;
pub mod prompt;
pub mod table;
pub mod service;
pub mod ollama;
pub mod models;
pub mod chat;
pub mod translate;
pub mod workflow;
