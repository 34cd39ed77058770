//! MedResearch Library
//!
//! Core library for the MedResearch inference server.

pub mod accounts;
pub mod api;
pub mod app;
pub mod inference;
pub mod storage;
pub mod types;
