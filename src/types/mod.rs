//! Shared type definitions
//!
//! This module contains the data types passed between the server layers.

pub mod config;
pub mod message;
pub mod model;
