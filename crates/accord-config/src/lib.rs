// crates/accord-config/src/lib.rs
// ============================================================================
// Module: Accord Config Library
// Description: Broker URL configuration and consumer selection.
// Purpose: Single source of truth for accord-broker.toml semantics.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! `accord-config` resolves where contracts are published to and downloaded
//! from, and which consumer (if any) a provider run is narrowed to. Every
//! property is read from the process environment first and from a TOML file
//! second; a missing file is not an error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
