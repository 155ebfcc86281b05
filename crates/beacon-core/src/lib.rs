//! # beacon-core
//!
//! Core types, traits, configuration, and error handling for Beacon.

pub mod config;
pub mod error;
pub mod message;
pub mod traits;
