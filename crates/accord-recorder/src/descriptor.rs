// crates/accord-recorder/src/descriptor.rs
// ============================================================================
// Module: Accord Request Descriptors
// Description: Typed request descriptors, canned responses, and state args.
// Purpose: Describe what the consumer sends and what it expects back.
// Dependencies: accord-core, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`RequestDescriptor<R>`] names a method, URL, optional body, and headers;
//! `R` is the response type the consumer decodes, so canned response values
//! are checked against it at compile time. [`ResponseSpec`] carries an
//! explicit status and body. [`StateArgs`] turns provider-state argument
//! tuples into recorded [`ProviderArgument`]s.
//!
//! String bodies are recorded verbatim; every other body goes through the
//! configured [`ObjectConverter`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::type_name;
use std::marker::PhantomData;

use accord_core::ConversionError;
use accord_core::Headers;
use accord_core::HttpMethod;
use accord_core::ObjectConverter;
use accord_core::ProviderArgument;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Body Rendering
// ============================================================================

/// Body captured on a descriptor before rendering.
#[derive(Debug, Clone, PartialEq)]
enum RequestBody {
    /// Text sent as-is.
    Text(String),
    /// Structured value rendered by the converter.
    Value {
        /// Value tree.
        tree: Value,
        /// Declared type name for diagnostics.
        declared: &'static str,
    },
}

/// Renders a body value: strings verbatim, anything else through `converter`.
///
/// # Errors
///
/// Returns [`ConversionError`] when the value cannot be serialized.
pub fn render_body<T: Serialize + ?Sized>(
    converter: &dyn ObjectConverter,
    body: &T,
) -> Result<String, ConversionError> {
    let declared = type_name::<T>();
    let tree =
        serde_json::to_value(body).map_err(|err| ConversionError::new(declared, err.to_string()))?;
    render_tree(converter, tree, declared)
}

/// Renders an already-built value tree.
fn render_tree(
    converter: &dyn ObjectConverter,
    tree: Value,
    declared: &str,
) -> Result<String, ConversionError> {
    match tree {
        Value::String(text) => Ok(text),
        Value::Null => Ok(String::new()),
        other => converter.encode(&other, declared),
    }
}

// ============================================================================
// SECTION: Request Descriptor
// ============================================================================

/// Typed description of a consumer request whose response decodes into `R`.
#[derive(Debug, Clone)]
pub struct RequestDescriptor<R> {
    /// Request method.
    method: HttpMethod,
    /// Path (with query) or absolute URL as the consumer issues it.
    url: String,
    /// Optional request body.
    body: Option<RequestBody>,
    /// Headers the request must carry.
    headers: Headers,
    /// Response type marker.
    response: PhantomData<fn() -> R>,
}

impl<R> RequestDescriptor<R> {
    /// Creates a descriptor for `method` and `url`.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: Headers::new(),
            response: PhantomData,
        }
    }

    /// Creates a `GET` descriptor.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Creates a `POST` descriptor.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Creates a `PUT` descriptor.
    #[must_use]
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    /// Creates a `DELETE` descriptor.
    #[must_use]
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    /// Attaches a structured request body.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the body cannot be serialized.
    pub fn with_body<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ConversionError> {
        let declared = type_name::<T>();
        let tree = serde_json::to_value(body)
            .map_err(|err| ConversionError::new(declared, err.to_string()))?;
        self.body = Some(RequestBody::Value {
            tree,
            declared,
        });
        Ok(self)
    }

    /// Attaches a literal text body.
    #[must_use]
    pub fn with_text_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    /// Requires a header value on the outgoing request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the URL as given.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the headers the request must carry.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Renders the request body; empty when there is none.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the converter rejects the body.
    pub fn render_body(&self, converter: &dyn ObjectConverter) -> Result<String, ConversionError> {
        match &self.body {
            None => Ok(String::new()),
            Some(RequestBody::Text(text)) => Ok(text.clone()),
            Some(RequestBody::Value {
                tree,
                declared,
            }) => render_tree(converter, tree.clone(), declared),
        }
    }
}

// ============================================================================
// SECTION: Response Spec
// ============================================================================

/// Canned response with an explicit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSpec<B> {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Response body, if any.
    pub body: Option<B>,
}

impl<B> ResponseSpec<B> {
    /// Creates a bodyless response.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Creates a `200 OK` response carrying `body`.
    #[must_use]
    pub fn ok(body: B) -> Self {
        Self::new(200).with_body(body)
    }

    /// Creates a `204 No Content` response.
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(204)
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: B) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

// ============================================================================
// SECTION: State Arguments
// ============================================================================

/// Argument list attached to a provider state.
pub trait StateArgs {
    /// Captures each argument through `converter`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when an argument cannot be serialized.
    fn capture(&self, converter: &dyn ObjectConverter) -> Result<Vec<ProviderArgument>, ConversionError>;
}

impl StateArgs for () {
    fn capture(&self, _converter: &dyn ObjectConverter) -> Result<Vec<ProviderArgument>, ConversionError> {
        Ok(Vec::new())
    }
}

impl StateArgs for Vec<ProviderArgument> {
    fn capture(&self, _converter: &dyn ObjectConverter) -> Result<Vec<ProviderArgument>, ConversionError> {
        Ok(self.clone())
    }
}

/// Implements [`StateArgs`] for a tuple of serializable values.
macro_rules! impl_state_args {
    ($($name:ident),+) => {
        impl<$($name: Serialize),+> StateArgs for ($($name,)+) {
            #[allow(non_snake_case, reason = "Tuple fields reuse the type parameter names.")]
            fn capture(
                &self,
                converter: &dyn ObjectConverter,
            ) -> Result<Vec<ProviderArgument>, ConversionError> {
                let ($($name,)+) = self;
                Ok(vec![$(ProviderArgument::capture(converter, $name)?),+])
            }
        }
    };
}

impl_state_args!(A);
impl_state_args!(A, B);
impl_state_args!(A, B, C);
impl_state_args!(A, B, C, D);
