//! Shared test utilities for the contract engine crates.
//!
//! This crate provides:
//! - Proptest generators for JSON values and matcher trees
//! - Product catalog fixtures (interactions and sample data)
//! - A small catalog consumer client for end-to-end runs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod fixtures;
pub mod generators;

pub use client::CatalogClient;
pub use generators::*;
