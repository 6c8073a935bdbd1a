//! Per-request context and the trace identifier.
//!
//! The [`RequestContext`] is created once per inbound request and passed as
//! `&mut` down the stage chain. It is never shared between requests.

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

/// Format used when a trace identifier has to be generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdFormat {
    /// Time-ordered UUID (v7).
    #[default]
    V7,
    /// Random UUID (v4).
    V4,
}

/// A per-request correlation identifier.
///
/// A trace id is always a syntactically valid UUID. When it was supplied by
/// the caller, the original spelling is kept so it round-trips unchanged.
///
/// # Example
///
/// ```
/// use httpgate_core::{IdFormat, TraceId};
///
/// let id = TraceId::generate(IdFormat::V7);
/// assert_eq!(TraceId::parse(id.as_str()), Some(id));
/// assert!(TraceId::parse("not-a-uuid").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    /// Generates a fresh identifier in the given format.
    #[must_use]
    pub fn generate(format: IdFormat) -> Self {
        let uuid = match format {
            IdFormat::V7 => Uuid::now_v7(),
            IdFormat::V4 => Uuid::new_v4(),
        };
        Self(uuid.to_string())
    }

    /// Accepts a caller-supplied value if it is a well-formed UUID.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::try_parse(value).ok().map(|_| Self(value.to_string()))
    }

    /// Returns the identifier as it will appear on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for TraceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Context that flows through the stage chain for a single request.
///
/// # Example
///
/// ```
/// use httpgate_core::RequestContext;
///
/// #[derive(Clone)]
/// struct Tenant(&'static str);
///
/// let mut ctx = RequestContext::new();
/// assert!(ctx.trace_id().is_none());
///
/// ctx.set_extension(Tenant("acme"));
/// assert_eq!(ctx.get_extension::<Tenant>().unwrap().0, "acme");
/// ```
#[derive(Debug)]
pub struct RequestContext {
    trace_id: Option<TraceId>,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Creates an empty context. The trace id is assigned by the trace stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trace_id: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Creates a context with a known trace id.
    #[must_use]
    pub fn with_trace_id(trace_id: TraceId) -> Self {
        Self {
            trace_id: Some(trace_id),
            ..Self::new()
        }
    }

    /// Returns the trace id, if one has been assigned.
    #[must_use]
    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    /// Sets the trace id.
    pub fn set_trace_id(&mut self, trace_id: TraceId) {
        self.trace_id = Some(trace_id);
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value, replacing any previous value of the same type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
