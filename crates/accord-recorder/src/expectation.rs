// crates/accord-recorder/src/expectation.rs
// ============================================================================
// Module: Accord Expectation Builder
// Description: Completes an expected request with its canned response.
// Purpose: Register mock expectations and record matched interactions.
// Dependencies: accord-core, serde, serde_json
// ============================================================================

//! ## Overview
//! [`ReturnExpect`] is returned by [`crate::RecordingServer::expect`]. It
//! collects optional refinements (`times`, extra header matchers, a schema)
//! and is completed by exactly one of the `and_*` methods, which installs the
//! expectation on the mock transport.
//!
//! When the expectation is invoked the outgoing request is checked against
//! the descriptor (URL substring after query encoding, method, body, headers),
//! the canned response is produced, and, unless recording was suppressed, the
//! interaction is appended to the contract file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use accord_core::CONTENT_TYPE;
use accord_core::Headers;
use accord_core::HttpMethod;
use accord_core::Interaction;
use accord_core::InteractionRequest;
use accord_core::InteractionResponse;
use accord_core::ObjectConverter;
use accord_core::ProviderState;
use accord_core::check_schema;
use accord_core::encode_uri;
use accord_core::is_json_media_type;
use accord_core::json_difference;
use serde::Serialize;
use serde_json::Value;

use crate::descriptor::RequestDescriptor;
use crate::descriptor::ResponseSpec;
use crate::descriptor::render_body;
use crate::error::RecordingError;
use crate::store::ContractStore;
use crate::transport::Expectation;
use crate::transport::MockTransport;
use crate::transport::OutgoingRequest;
use crate::transport::TransportError;
use crate::transport::TransportResponse;

// ============================================================================
// SECTION: Header Matching
// ============================================================================

/// Predicate over the values of one request header.
#[derive(Clone)]
pub enum HeaderMatch {
    /// Values must equal the list exactly.
    Exact(Vec<String>),
    /// The first value must start with the prefix.
    Prefix(String),
    /// The header only has to be present.
    Present,
    /// Caller-supplied predicate.
    Custom(Arc<dyn Fn(&[String]) -> bool + Send + Sync>),
}

impl HeaderMatch {
    /// Requires a single exact value.
    #[must_use]
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(vec![value.into()])
    }

    /// Wraps a caller predicate.
    #[must_use]
    pub fn custom(predicate: impl Fn(&[String]) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    /// Returns true when `values` satisfy the matcher.
    #[must_use]
    pub fn matches(&self, values: &[String]) -> bool {
        match self {
            Self::Exact(expected) => values == expected.as_slice(),
            Self::Prefix(prefix) => values.first().is_some_and(|value| value.starts_with(prefix.as_str())),
            Self::Present => true,
            Self::Custom(predicate) => predicate(values),
        }
    }
}

impl fmt::Display for HeaderMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(values) => write!(f, "equal to [{}]", values.join(", ")),
            Self::Prefix(prefix) => write!(f, "starting with {prefix}"),
            Self::Present => f.write_str("present"),
            Self::Custom(_) => f.write_str("matching a custom predicate"),
        }
    }
}

// ============================================================================
// SECTION: Recording Context
// ============================================================================

/// Server state captured when an expectation is started.
pub(crate) struct RecordingContext {
    /// Transport the expectation is installed on.
    pub(crate) transport: Arc<MockTransport>,
    /// Contract file the interaction is appended to.
    pub(crate) store: ContractStore,
    /// Converter for bodies.
    pub(crate) converter: Arc<dyn ObjectConverter>,
    /// Content type applied to canned bodies without one.
    pub(crate) content_type: String,
    /// Workflow receiving the interaction.
    pub(crate) workflow_id: String,
    /// Provider states for a newly created workflow.
    pub(crate) provider_states: Vec<ProviderState>,
    /// False when recording was suppressed for this expectation.
    pub(crate) record: bool,
}

// ============================================================================
// SECTION: Request Matching
// ============================================================================

/// Shared checks applied to each outgoing request.
struct RequestMatcher {
    /// Expected method.
    method: HttpMethod,
    /// Query-encoded descriptor URL.
    url: String,
    /// Rendered descriptor body.
    body: String,
    /// Descriptor headers required verbatim.
    required_headers: Headers,
    /// Additional header predicates.
    header_matchers: Vec<(String, HeaderMatch)>,
}

impl RequestMatcher {
    /// Checks a request, describing the first difference.
    fn check(&self, request: &OutgoingRequest) -> Result<(), String> {
        let actual_url = encode_uri(&request.url).unwrap_or_else(|_| request.url.clone());
        if !actual_url.contains(self.url.as_str()) {
            return Err(format!("url {actual_url} does not contain {}", self.url));
        }
        if request.method != self.method {
            return Err(format!("method {} is not {}", request.method, self.method));
        }
        self.check_body(request)?;
        for (name, expected) in self.required_headers.iter() {
            match request.headers.get(name) {
                None => return Err(format!("missing header {name}")),
                Some(actual) if actual != expected => {
                    return Err(format!(
                        "header {name} is [{}], expected [{}]",
                        actual.join(", "),
                        expected.join(", ")
                    ));
                }
                Some(_) => {}
            }
        }
        for (name, matcher) in &self.header_matchers {
            match request.headers.get(name) {
                None => return Err(format!("missing header {name}")),
                Some(actual) if !matcher.matches(actual) => {
                    return Err(format!("header {name} is [{}], expected {matcher}", actual.join(", ")));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Compares bodies structurally for JSON requests, literally otherwise.
    fn check_body(&self, request: &OutgoingRequest) -> Result<(), String> {
        if request.headers.content_type().is_some_and(is_json_media_type)
            && let (Ok(expected), Ok(actual)) = (
                serde_json::from_str::<Value>(&self.body),
                serde_json::from_str::<Value>(&request.body),
            )
        {
            return match json_difference(&expected, &actual) {
                None => Ok(()),
                Some(difference) => Err(format!(
                    "body differs at {}: expected {} but was {}",
                    difference.path, difference.expected, difference.actual
                )),
            };
        }
        if request.body == self.body {
            Ok(())
        } else {
            Err(format!("body was '{}', expected '{}'", request.body, self.body))
        }
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Pending expectation for a request whose response decodes into `R`.
pub struct ReturnExpect<R> {
    /// Captured server state.
    context: RecordingContext,
    /// Expected request.
    descriptor: RequestDescriptor<R>,
    /// Number of identical expectations to register.
    times: usize,
    /// Additional header predicates.
    header_matchers: Vec<(String, HeaderMatch)>,
    /// Schema recorded with the response.
    schema: Option<String>,
}

impl<R> ReturnExpect<R> {
    /// Creates a builder for `descriptor`.
    pub(crate) const fn new(context: RecordingContext, descriptor: RequestDescriptor<R>) -> Self {
        Self {
            context,
            descriptor,
            times: 1,
            header_matchers: Vec::new(),
            schema: None,
        }
    }

    /// Registers the expectation `times` times, for retried calls.
    ///
    /// Completing the builder fails with [`RecordingError::InvalidTimes`]
    /// when `times` is zero.
    #[must_use]
    pub const fn times(mut self, times: usize) -> Self {
        self.times = times;
        self
    }

    /// Requires a request header satisfying `matcher`.
    #[must_use]
    pub fn and_expect_header(mut self, name: impl Into<String>, matcher: HeaderMatch) -> Self {
        self.header_matchers.push((name.into(), matcher));
        self
    }

    /// Records `schema` with the response; providers then validate against it
    /// instead of comparing bodies.
    #[must_use]
    pub fn matching_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Reads the schema from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::SchemaSource`] when the reader fails.
    pub fn matching_schema_from(mut self, mut reader: impl Read) -> Result<Self, RecordingError> {
        let mut schema = String::new();
        reader
            .read_to_string(&mut schema)
            .map_err(|err| RecordingError::SchemaSource(err.to_string()))?;
        self.schema = Some(schema);
        Ok(self)
    }

    /// Expects a `200 OK` with an empty body.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError`] when the expectation cannot be installed.
    pub fn and_return(self) -> Result<(), RecordingError> {
        self.install(200, Headers::new(), None)
    }

    /// Expects a `200 OK` whose body is `value`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError`] when the value cannot be converted or the
    /// expectation cannot be installed.
    pub fn and_return_value(self, value: &R) -> Result<(), RecordingError>
    where
        R: Serialize,
    {
        let body = render_body(self.context.converter.as_ref(), value)?;
        self.install(200, Headers::new(), Some(body))
    }

    /// Expects an explicit status, headers, and body.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError`] when the body cannot be converted or the
    /// expectation cannot be installed.
    pub fn and_return_response(self, response: ResponseSpec<R>) -> Result<(), RecordingError>
    where
        R: Serialize,
    {
        self.and_error(response)
    }

    /// Expects an error response whose body type differs from `R`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError`] when the body cannot be converted or the
    /// expectation cannot be installed.
    pub fn and_error<E: Serialize>(self, response: ResponseSpec<E>) -> Result<(), RecordingError> {
        let body = response
            .body
            .as_ref()
            .map(|body| render_body(self.context.converter.as_ref(), body))
            .transpose()?;
        self.install(response.status, response.headers, body)
    }

    /// Installs `times` expectations answering with the given response.
    fn install(
        self,
        status: u16,
        mut headers: Headers,
        body: Option<String>,
    ) -> Result<(), RecordingError> {
        if self.times == 0 {
            return Err(RecordingError::InvalidTimes);
        }
        if body.is_some() && !headers.contains(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, self.context.content_type.clone());
        }
        let body = body.unwrap_or_default();
        let schema = self.schema.filter(|schema| !schema.trim().is_empty());
        if let Some(schema) = &schema {
            check_schema(schema, &body).map_err(|err| RecordingError::SchemaViolation(err.to_string()))?;
        }
        let converter = self.context.converter.as_ref();
        let matcher = Arc::new(RequestMatcher {
            method: self.descriptor.method(),
            url: encode_uri(self.descriptor.url())?,
            body: self.descriptor.render_body(converter)?,
            required_headers: self.descriptor.headers().clone(),
            header_matchers: self.header_matchers,
        });
        let response = TransportResponse {
            status,
            headers,
            body,
        };
        let recorder = self.context.record.then(|| {
            Arc::new(InteractionRecorder {
                store: self.context.store.clone(),
                workflow_id: self.context.workflow_id.clone(),
                provider_states: self.context.provider_states.clone(),
                schema,
            })
        });
        let label = format!("{} {}", matcher.method, matcher.url);
        for _ in 0 .. self.times {
            let check_matcher = Arc::clone(&matcher);
            let respond_matcher = Arc::clone(&matcher);
            let response = response.clone();
            let recorder = recorder.clone();
            self.context.transport.expect(Expectation::new(
                label.clone(),
                Box::new(move |request: &OutgoingRequest| check_matcher.check(request)),
                Box::new(move |request: &OutgoingRequest| {
                    if let Some(recorder) = &recorder {
                        recorder.record(&respond_matcher, request, &response)?;
                    }
                    Ok(response.clone())
                }),
            ))?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Interaction Recording
// ============================================================================

/// Appends matched interactions to the contract file.
struct InteractionRecorder {
    /// Target contract file.
    store: ContractStore,
    /// Workflow receiving interactions.
    workflow_id: String,
    /// Provider states for a newly created workflow.
    provider_states: Vec<ProviderState>,
    /// Schema recorded with the response.
    schema: Option<String>,
}

impl InteractionRecorder {
    /// Records the descriptor request, actual headers, and canned response.
    fn record(
        &self,
        matcher: &RequestMatcher,
        request: &OutgoingRequest,
        response: &TransportResponse,
    ) -> Result<(), TransportError> {
        let interaction = Interaction {
            request: InteractionRequest {
                method: matcher.method,
                uri: matcher.url.clone(),
                headers: request.headers.clone(),
                body: matcher.body.clone(),
            },
            response: InteractionResponse {
                status: response.status,
                headers: response.headers.clone(),
                body: response.body.clone(),
                schema: self.schema.clone(),
            },
        };
        self.store
            .append(&self.workflow_id, &self.provider_states, interaction)
            .map_err(|err| TransportError::Recording(err.to_string()))
    }
}
