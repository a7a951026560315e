//! Common types and utilities for OpenHedge
//!
//! This crate provides shared types used across all OpenHedge crates.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Shared domain types (Pubkey, Asset, OptionKind, OptionSeries)
//! - [`address`] - Deterministic account address derivation
//! - [`units`] - Minor-unit and power-of-ten arithmetic

pub mod address;
pub mod error;
pub mod types;
pub mod units;

pub use address::{derive_address, AddressBuilder, AddressDomain};
pub use error::{Error, Result};
pub use types::*;
