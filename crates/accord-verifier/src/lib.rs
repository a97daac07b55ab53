// crates/accord-verifier/src/lib.rs
// ============================================================================
// Module: Accord Verifier Library
// Description: Provider-side verification of recorded contracts.
// Purpose: Replay consumer workflows against a provider and report results.
// Dependencies: accord-broker, accord-config, accord-core, reqwest, serde, thiserror
// ============================================================================

//! ## Overview
//! The verifier resolves contract documents, deduplicates their workflows,
//! applies provider states through a [`StateRegistry`], replays each recorded
//! request against a [`ProviderFixture`], and asserts the responses with an
//! ordered [`accord_core::MatcherSet`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;
pub mod error;
pub mod filter;
pub mod fixture;
pub mod report;
pub mod state;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::ResponseFailure;
pub use engine::VerificationCase;
pub use engine::Verifier;
pub use engine::assert_response;
pub use engine::replay_request;
pub use error::Mismatch;
pub use error::VerifyError;
pub use filter::ConsumerFilter;
pub use filter::ContractFilter;
pub use filter::NoFilter;
pub use filter::WorkflowFilter;
pub use fixture::DEFAULT_PROVIDER_TIMEOUT;
pub use fixture::DispatchError;
pub use fixture::Dispatcher;
pub use fixture::FnProvider;
pub use fixture::HttpProvider;
pub use fixture::ProviderFixture;
pub use fixture::ReplayRequest;
pub use report::CaseOutcome;
pub use report::CaseReport;
pub use report::CaseSummary;
pub use report::VerificationReport;
pub use state::FromStateArguments;
pub use state::StateArguments;
pub use state::StateError;
pub use state::StateHook;
pub use state::StateRegistry;
