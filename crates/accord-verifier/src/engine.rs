// crates/accord-verifier/src/engine.rs
// ============================================================================
// Module: Verification Engine
// Description: Replays recorded workflows against a provider fixture.
// Purpose: Set up provider states, replay requests, and assert responses.
// Dependencies: accord-broker, accord-core
// ============================================================================

//! ## Overview
//! Verification runs in three phases so any test runner can drive it:
//! [`Verifier::resolve`] turns contract documents into cases (one per unique
//! workflow), [`Verifier::set_up`] applies the case's provider states through
//! registered hooks, and [`Verifier::run`] replays each interaction and
//! asserts the response.
//! Invariants:
//! - Provider states are applied in recorded order before any request.
//! - A missing state hook is fatal for the case.
//! - Replay stops at the first failing interaction of a workflow; sibling
//!   workflows are unaffected.
//! - Excluded cases are reported as passed with a warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use accord_broker::ContractResolver;
use accord_broker::ContractSpec;
use accord_core::APPLICATION_JSON;
use accord_core::ActualResponse;
use accord_core::CONTENT_TYPE;
use accord_core::ContractDocument;
use accord_core::ContractEvent;
use accord_core::EventLevel;
use accord_core::EventSink;
use accord_core::Interaction;
use accord_core::InteractionRequest;
use accord_core::InteractionResponse;
use accord_core::JsonConverter;
use accord_core::MatcherSet;
use accord_core::NoopSink;
use accord_core::ObjectConverter;
use accord_core::Workflow;
use accord_core::decode_uri;
use accord_core::unique_workflows;

use crate::error::Mismatch;
use crate::error::VerifyError;
use crate::filter::ContractFilter;
use crate::filter::NoFilter;
use crate::fixture::ProviderFixture;
use crate::fixture::ReplayRequest;
use crate::report::CaseOutcome;
use crate::report::CaseReport;
use crate::report::VerificationReport;
use crate::state::StateArguments;
use crate::state::StateRegistry;

// ============================================================================
// SECTION: Cases
// ============================================================================

/// One unique workflow scheduled for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCase {
    /// Display name (`<workflow id> Contract(<document name>)`).
    name: String,
    /// Workflow to replay.
    workflow: Workflow,
    /// Exclusion warning when a filter excluded the workflow.
    excluded: Option<String>,
}

impl VerificationCase {
    /// Creates a case for `workflow` of the document named `document_name`.
    #[must_use]
    pub fn new(workflow: Workflow, document_name: &str) -> Self {
        Self {
            name: format!("{} Contract({document_name})", workflow.id),
            workflow,
            excluded: None,
        }
    }

    /// Marks the case excluded with `warning`.
    #[must_use]
    pub fn excluded(mut self, warning: impl Into<String>) -> Self {
        self.excluded = Some(warning.into());
        self
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the workflow.
    #[must_use]
    pub const fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Returns the exclusion warning, if excluded.
    #[must_use]
    pub fn exclusion(&self) -> Option<&str> {
        self.excluded.as_deref()
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verification engine for fixtures of type `F`.
pub struct Verifier<F> {
    /// Provider-state hooks.
    states: StateRegistry<F>,
    /// Ordered body matchers for this run.
    matchers: MatcherSet,
    /// Exclusion and selection predicates.
    filter: Box<dyn ContractFilter>,
    /// Converter used to decode state arguments.
    converter: Arc<dyn ObjectConverter>,
    /// Event sink for verification diagnostics.
    sink: Arc<dyn EventSink>,
}

impl<F> Verifier<F> {
    /// Creates a verifier with built-in matchers and no filter.
    #[must_use]
    pub fn new(states: StateRegistry<F>) -> Self {
        Self {
            states,
            matchers: MatcherSet::builtin(),
            filter: Box::new(NoFilter),
            converter: Arc::new(JsonConverter::new()),
            sink: Arc::new(NoopSink),
        }
    }

    /// Replaces the matcher set.
    #[must_use]
    pub fn with_matchers(mut self, matchers: MatcherSet) -> Self {
        self.matchers = matchers;
        self
    }

    /// Replaces the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: impl ContractFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Replaces the converter used for state arguments.
    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn ObjectConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Routes verification events to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Resolves contracts for `spec` and generates their cases.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Resolve`] when resolution fails.
    pub fn resolve(
        &self,
        resolver: &dyn ContractResolver,
        spec: &ContractSpec,
    ) -> Result<Vec<VerificationCase>, VerifyError> {
        let documents = resolver.resolve(spec)?;
        Ok(self.cases(&documents))
    }

    /// Generates one case per unique, selected workflow of each document.
    #[must_use]
    pub fn cases(&self, documents: &[ContractDocument]) -> Vec<VerificationCase> {
        let run_only = self.filter.run_only();
        let mut cases = Vec::new();
        for document in documents {
            let document_excluded = self.filter.exclude_document(document);
            for workflow in unique_workflows(document, self.sink.as_ref()) {
                if !run_only.is_empty() && !run_only.contains(&workflow.id) {
                    continue;
                }
                let case = VerificationCase::new(workflow.clone(), document.display_name());
                let case = if document_excluded {
                    case.excluded(format!("contracts of {} are excluded", document.display_name()))
                } else if self.filter.exclude_workflow(document, &workflow.id) {
                    case.excluded(format!("workflow {} is excluded", workflow.id))
                } else {
                    case
                };
                cases.push(case);
            }
        }
        cases
    }

    /// Applies the case's provider states to `fixture` in recorded order.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::MissingStateHandler`] when a state has no hook
    /// and [`VerifyError::StateSetup`] when a hook fails.
    pub fn set_up(&self, case: &VerificationCase, fixture: &mut F) -> Result<(), VerifyError> {
        for state in &case.workflow.provider_states {
            let Some(hook) = self.states.get(&state.description) else {
                return Err(VerifyError::MissingStateHandler(state.description.clone()));
            };
            let arguments =
                StateArguments::new(&state.description, &state.provider_arguments, self.converter.as_ref());
            hook(fixture, &arguments)?;
            self.sink.record(
                &ContractEvent::new("provider_state_applied", EventLevel::Debug, "applied provider state")
                    .with_workflow(case.workflow.id.clone())
                    .with_target(state.description.clone()),
            );
        }
        Ok(())
    }
}

impl<F: ProviderFixture> Verifier<F> {
    /// Replays every interaction of the case, returning how many matched.
    ///
    /// # Errors
    ///
    /// Returns the first [`VerifyError`] raised by dispatch or assertion.
    pub fn run(&self, case: &VerificationCase, fixture: &mut F) -> Result<usize, VerifyError> {
        let mut passed = 0;
        self.replay_all(case, fixture, &mut passed)?;
        Ok(passed)
    }

    /// Runs one case through set-up and replay.
    pub fn verify_case(&self, case: &VerificationCase, fixture: &mut F) -> CaseReport {
        let workflow_id = case.workflow.id.clone();
        if let Some(warning) = case.exclusion() {
            self.sink.record(
                &ContractEvent::warn("workflow_excluded", "workflow excluded from verification")
                    .with_workflow(workflow_id.clone())
                    .with_detail(warning),
            );
            return CaseReport {
                name: case.name.clone(),
                workflow_id,
                interactions_passed: 0,
                outcome: CaseOutcome::Excluded {
                    warning: warning.to_string(),
                },
            };
        }
        let mut passed = 0;
        let result = match self.set_up(case, fixture) {
            Ok(()) => self.replay_all(case, fixture, &mut passed),
            Err(error) => Err(error),
        };
        let outcome = match result {
            Ok(()) => CaseOutcome::Passed,
            Err(error) => {
                self.sink.record(
                    &ContractEvent::error("verification_failed", "workflow verification failed")
                        .with_workflow(workflow_id.clone())
                        .with_detail(error.to_string()),
                );
                CaseOutcome::Failed(error)
            }
        };
        CaseReport {
            name: case.name.clone(),
            workflow_id,
            interactions_passed: passed,
            outcome,
        }
    }

    /// Verifies every case in order against `fixture`.
    pub fn verify_all(&self, cases: &[VerificationCase], fixture: &mut F) -> VerificationReport {
        VerificationReport {
            cases: cases.iter().map(|case| self.verify_case(case, fixture)).collect(),
        }
    }

    /// Resolves contracts for `spec` and verifies every case.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Resolve`] when resolution fails; case failures
    /// are reported in the returned report.
    pub fn verify(
        &self,
        resolver: &dyn ContractResolver,
        spec: &ContractSpec,
        fixture: &mut F,
    ) -> Result<VerificationReport, VerifyError> {
        let cases = self.resolve(resolver, spec)?;
        Ok(self.verify_all(&cases, fixture))
    }

    /// Replays interactions in order, counting the ones that matched.
    fn replay_all(
        &self,
        case: &VerificationCase,
        fixture: &mut F,
        passed: &mut usize,
    ) -> Result<(), VerifyError> {
        for (index, interaction) in case.workflow.interactions.iter().enumerate() {
            self.replay(index, interaction, fixture)?;
            *passed += 1;
            self.sink.record(
                &ContractEvent::new("interaction_replayed", EventLevel::Debug, "interaction matched")
                    .with_workflow(case.workflow.id.clone())
                    .with_target(request_label(&interaction.request)),
            );
        }
        Ok(())
    }

    /// Dispatches one interaction and asserts its response.
    fn replay(&self, index: usize, interaction: &Interaction, fixture: &mut F) -> Result<(), VerifyError> {
        let request = replay_request(&interaction.request, fixture.context_path());
        let label = request_label(&interaction.request);
        let actual = fixture.dispatch(&request).map_err(|source| VerifyError::Dispatch {
            interaction: index,
            request: label.clone(),
            source,
        })?;
        assert_response(&self.matchers, &interaction.response, &actual).map_err(|failure| match failure {
            ResponseFailure::Mismatch {
                subject,
                expected,
                actual,
                detail,
            } => VerifyError::Mismatch(Mismatch {
                interaction: index,
                request: label,
                subject,
                expected,
                actual,
                detail,
            }),
            ResponseFailure::NoMatcher => VerifyError::NoApplicableMatcher {
                interaction: index,
                request: label,
            },
        })
    }
}

// ============================================================================
// SECTION: Replay
// ============================================================================

/// Builds the live request for a recorded one.
///
/// Absolute recorded URIs keep only their path and query. When the path
/// contains `context_path` on a segment boundary, everything up to and
/// including it is dropped; otherwise the path is replayed unchanged. The
/// result is percent-decoded. A body without a recorded content type is sent
/// as JSON.
#[must_use]
pub fn replay_request(recorded: &InteractionRequest, context_path: &str) -> ReplayRequest {
    let uri = relative_to_context(strip_origin(&recorded.uri), context_path);
    let mut headers = recorded.headers.clone();
    if !recorded.body.is_empty() && !headers.contains(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, APPLICATION_JSON);
    }
    ReplayRequest {
        method: recorded.method,
        uri: decode_uri(&uri),
        headers,
        body: recorded.body.clone(),
    }
}

/// Returns the part of `path` after the first boundary-aligned occurrence of
/// `context_path`, or `path` itself when there is none.
fn relative_to_context(path: &str, context_path: &str) -> String {
    let context = context_path.trim_matches('/');
    if context.is_empty() {
        return path.to_string();
    }
    let context = format!("/{context}");
    for (index, _) in path.match_indices(&context) {
        let rest = &path[index + context.len() ..];
        if rest.is_empty() {
            return "/".to_string();
        }
        if rest.starts_with('/') {
            return rest.to_string();
        }
        if rest.starts_with('?') {
            return format!("/{rest}");
        }
    }
    path.to_string()
}

/// Removes `scheme://authority` from an absolute URI.
fn strip_origin(uri: &str) -> &str {
    let Some((_, rest)) = uri.split_once("://") else {
        return uri;
    };
    rest.find('/').map_or("/", |start| &rest[start ..])
}

/// Returns `METHOD uri` for diagnostics.
fn request_label(request: &InteractionRequest) -> String {
    format!("{} {}", request.method, request.uri)
}

// ============================================================================
// SECTION: Response Assertions
// ============================================================================

/// Failure of a response assertion before request context is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFailure {
    /// A compared part differs.
    Mismatch {
        /// What was compared.
        subject: String,
        /// Expected rendering.
        expected: String,
        /// Actual rendering.
        actual: String,
        /// Short explanation.
        detail: String,
    },
    /// No matcher applies to the expected response.
    NoMatcher,
}

/// Builds a [`ResponseFailure::Mismatch`].
fn mismatch(
    subject: impl Into<String>,
    expected: impl Into<String>,
    actual: impl Into<String>,
    detail: impl Into<String>,
) -> ResponseFailure {
    ResponseFailure::Mismatch {
        subject: subject.into(),
        expected: expected.into(),
        actual: actual.into(),
        detail: detail.into(),
    }
}

/// Asserts status, headers, and body of an actual response.
///
/// # Errors
///
/// Returns [`ResponseFailure`] describing the first difference.
pub fn assert_response(
    matchers: &MatcherSet,
    expected: &InteractionResponse,
    actual: &ActualResponse,
) -> Result<(), ResponseFailure> {
    if expected.status == 204 && !expected.body.is_empty() {
        return Err(mismatch(
            "body",
            "",
            expected.body.as_str(),
            "a 204 expectation must not carry a recorded body",
        ));
    }
    if expected.status != actual.status {
        return Err(mismatch("status", expected.status.to_string(), actual.status.to_string(), ""));
    }
    for (name, values) in expected.headers.iter() {
        let [expected_value] = values else {
            return Err(mismatch(
                format!("header {name}"),
                values.join(", "),
                actual.headers.get(name).map(|actual| actual.join(", ")).unwrap_or_default(),
                "only single-valued headers are supported",
            ));
        };
        let Some(actual_value) = actual.headers.first(name) else {
            return Err(mismatch(format!("header {name}"), expected_value.as_str(), "<missing>", ""));
        };
        let matches = if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            actual_value.starts_with(expected_value.as_str())
        } else {
            actual_value == expected_value
        };
        if !matches {
            return Err(mismatch(format!("header {name}"), expected_value.as_str(), actual_value, ""));
        }
    }
    let Some(matcher) = matchers.select(expected) else {
        return Err(ResponseFailure::NoMatcher);
    };
    matcher.assert_matches(actual, expected).map_err(|failure| {
        mismatch(
            "body",
            failure.expected,
            failure.actual,
            format!("{}: {}", failure.matcher, failure.detail),
        )
    })
}
