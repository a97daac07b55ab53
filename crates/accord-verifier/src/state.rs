// crates/accord-verifier/src/state.rs
// ============================================================================
// Module: Provider State Registry
// Description: Registration table of provider-state setup hooks.
// Purpose: Map recorded state descriptions to callables on the fixture.
// Dependencies: accord-core, serde, thiserror
// ============================================================================

//! ## Overview
//! Provider states recorded by consumers are replayed by looking up a hook by
//! the state's description. Hooks receive the fixture and the recorded
//! arguments; each argument is decoded into whatever type the hook asks for
//! at replay time, so the recorded type name is only used in diagnostics.
//! Invariants:
//! - At most one hook is registered per description.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use accord_core::ConverterExt;
use accord_core::ObjectConverter;
use accord_core::ProviderArgument;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while registering or running state hooks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A hook is already registered for the description.
    #[error("state hook already registered: {0}")]
    DuplicateHandler(String),
    /// The hook expects a different number of arguments.
    #[error("state '{description}' expects {expected} arguments, {actual} recorded")]
    ArgumentCount {
        /// State description.
        description: String,
        /// Arguments the hook declares.
        expected: usize,
        /// Arguments recorded with the state.
        actual: usize,
    },
    /// A recorded argument does not decode into the requested type.
    #[error("state '{description}' argument {index} ({recorded}) does not decode: {message}")]
    Argument {
        /// State description.
        description: String,
        /// Zero-based argument index.
        index: usize,
        /// Type name recorded with the argument.
        recorded: String,
        /// Decoder message.
        message: String,
    },
    /// The hook reported a failure.
    #[error("state '{description}' setup failed: {message}")]
    Hook {
        /// State description.
        description: String,
        /// Hook message.
        message: String,
    },
}

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Recorded arguments of one provider state, decoded on demand.
pub struct StateArguments<'a> {
    /// State description, for diagnostics.
    description: &'a str,
    /// Recorded arguments in order.
    arguments: &'a [ProviderArgument],
    /// Converter used to decode payloads.
    converter: &'a dyn ObjectConverter,
}

impl<'a> StateArguments<'a> {
    /// Wraps recorded arguments.
    #[must_use]
    pub fn new(
        description: &'a str,
        arguments: &'a [ProviderArgument],
        converter: &'a dyn ObjectConverter,
    ) -> Self {
        Self {
            description,
            arguments,
            converter,
        }
    }

    /// Returns the state description.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description
    }

    /// Returns the number of recorded arguments.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.arguments.len()
    }

    /// Returns true when no arguments were recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Decodes argument `index` into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::ArgumentCount`] when the index is out of range and
    /// [`StateError::Argument`] when the payload does not decode into `T`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, StateError> {
        let Some(argument) = self.arguments.get(index) else {
            return Err(StateError::ArgumentCount {
                description: self.description.to_string(),
                expected: index + 1,
                actual: self.arguments.len(),
            });
        };
        self.converter.from_text(&argument.serialized_state_object).map_err(|err| {
            StateError::Argument {
                description: self.description.to_string(),
                index,
                recorded: argument.state_object_class_name.clone(),
                message: err.message,
            }
        })
    }

    /// Fails unless exactly `expected` arguments were recorded.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::ArgumentCount`] on an arity mismatch.
    pub fn expect_len(&self, expected: usize) -> Result<(), StateError> {
        if self.arguments.len() == expected {
            return Ok(());
        }
        Err(StateError::ArgumentCount {
            description: self.description.to_string(),
            expected,
            actual: self.arguments.len(),
        })
    }
}

/// Parameter list a typed hook declares.
pub trait FromStateArguments: Sized {
    /// Decodes the full argument list.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on an arity or decoding mismatch.
    fn from_arguments(arguments: &StateArguments<'_>) -> Result<Self, StateError>;
}

impl FromStateArguments for () {
    fn from_arguments(arguments: &StateArguments<'_>) -> Result<Self, StateError> {
        arguments.expect_len(0)
    }
}

/// Implements [`FromStateArguments`] for a tuple of decodable values.
macro_rules! impl_from_state_arguments {
    ($count:expr; $($name:ident => $index:tt),+) => {
        impl<$($name: DeserializeOwned),+> FromStateArguments for ($($name,)+) {
            fn from_arguments(arguments: &StateArguments<'_>) -> Result<Self, StateError> {
                arguments.expect_len($count)?;
                Ok(($(arguments.get::<$name>($index)?,)+))
            }
        }
    };
}

impl_from_state_arguments!(1; A => 0);
impl_from_state_arguments!(2; A => 0, B => 1);
impl_from_state_arguments!(3; A => 0, B => 1, C => 2);
impl_from_state_arguments!(4; A => 0, B => 1, C => 2, D => 3);

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Setup hook invoked against fixture `F`.
pub type StateHook<F> = Box<dyn Fn(&mut F, &StateArguments<'_>) -> Result<(), StateError> + Send + Sync>;

/// Provider-state hooks keyed by state description.
pub struct StateRegistry<F> {
    /// Hooks keyed by description.
    hooks: BTreeMap<String, StateHook<F>>,
}

impl<F> StateRegistry<F> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hooks: BTreeMap::new(),
        }
    }

    /// Registers a hook working on the raw argument list.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::DuplicateHandler`] when the description is taken.
    pub fn register(
        &mut self,
        description: impl Into<String>,
        hook: impl Fn(&mut F, &StateArguments<'_>) -> Result<(), StateError> + Send + Sync + 'static,
    ) -> Result<(), StateError> {
        let description = description.into();
        if self.hooks.contains_key(&description) {
            return Err(StateError::DuplicateHandler(description));
        }
        self.hooks.insert(description, Box::new(hook));
        Ok(())
    }

    /// Registers a hook whose parameters are decoded into `A`.
    ///
    /// Hook failures are reported as [`StateError::Hook`] with the returned
    /// message.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::DuplicateHandler`] when the description is taken.
    pub fn register_typed<A, H>(
        &mut self,
        description: impl Into<String>,
        hook: H,
    ) -> Result<(), StateError>
    where
        A: FromStateArguments,
        H: Fn(&mut F, A) -> Result<(), String> + Send + Sync + 'static,
    {
        self.register(description, move |fixture: &mut F, arguments: &StateArguments<'_>| {
            let params = A::from_arguments(arguments)?;
            hook(fixture, params).map_err(|message| StateError::Hook {
                description: arguments.description().to_string(),
                message,
            })
        })
    }

    /// Builder-style variant of [`StateRegistry::register_typed`].
    ///
    /// # Errors
    ///
    /// Returns [`StateError::DuplicateHandler`] when the description is taken.
    pub fn with<A, H>(mut self, description: impl Into<String>, hook: H) -> Result<Self, StateError>
    where
        A: FromStateArguments,
        H: Fn(&mut F, A) -> Result<(), String> + Send + Sync + 'static,
    {
        self.register_typed(description, hook)?;
        Ok(self)
    }

    /// Returns the hook for `description`.
    #[must_use]
    pub fn get(&self, description: &str) -> Option<&StateHook<F>> {
        self.hooks.get(description)
    }

    /// Returns true when a hook is registered for `description`.
    #[must_use]
    pub fn contains(&self, description: &str) -> bool {
        self.hooks.contains_key(description)
    }

    /// Returns the registered descriptions in order.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }
}

impl<F> Default for StateRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> fmt::Debug for StateRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRegistry").field("states", &self.hooks.keys().collect::<Vec<_>>()).finish()
    }
}
