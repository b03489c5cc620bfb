//! Shared types for the streamcast bridge: branded ids, record decoding,
//! configuration, and the error taxonomy.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod ids;
pub mod records;
