//! Shared utilities and common types for the app usage backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Page resolution and over-fetch pagination
//! - API key hashing
//! - Common validation logic

pub mod crypto;
pub mod pagination;
pub mod validation;
