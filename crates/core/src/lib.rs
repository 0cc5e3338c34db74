//! Core library: rule table, pattern matching, classification and cross-environment reporting.

pub mod classifier;
pub mod config;
pub mod error;
pub mod manager;
pub mod matcher;
pub mod models;
pub mod query;
pub mod report;
pub mod rules;
pub mod stats;
