// crates/accord-broker/src/lib.rs
// ============================================================================
// Module: Accord Broker Library
// Description: Contract resolution and publishing against contract brokers.
// Purpose: Move contract documents between consumers, brokers, and providers.
// Dependencies: accord-config, accord-core, reqwest
// ============================================================================

//! ## Overview
//! The [`BrokerResolver`] turns a [`ContractSpec`] into parsed contract
//! documents, either from one local file or by downloading each requested
//! version from the first broker that answers. The [`ContractPublisher`]
//! uploads recorded contract files to a broker.
//! Invariants:
//! - Every network call is bounded by a connect and read timeout.
//! - Local files never trigger network access.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod publisher;
pub mod resolver;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use publisher::ContractPublisher;
pub use publisher::PublishError;
pub use publisher::provider_from_file_name;
pub use publisher::strip_snapshot;
pub use resolver::BrokerResolver;
pub use resolver::CONSUMER_VERSION_HEADER;
pub use resolver::ContractResolver;
pub use resolver::ContractSpec;
pub use resolver::DEFAULT_TIMEOUT;
pub use resolver::LATEST_VERSION;
pub use resolver::LOCAL_VERSION;
pub use resolver::ResolveError;
pub use resolver::contract_url;
