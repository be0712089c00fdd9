//! # Prompt Templates
//!
//! Prompt templates used when calling the text-generation service.

pub mod enrichment;
