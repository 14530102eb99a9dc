use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tonic::metadata::MetadataMap;

/// Call-scoped context threaded through every interceptor and handler.
///
/// A context is an immutable, append-only association of typed values. Adding a
/// value returns a new context that shares the existing entries, so a context
/// handed to `next` never changes what the caller already holds.
///
/// # Example
///
/// ```rust
/// use grpc_interceptors::Context;
///
/// #[derive(Debug, PartialEq)]
/// struct TenantId(u32);
///
/// let root = Context::new();
/// let scoped = root.with_value(TenantId(7));
///
/// assert_eq!(scoped.value::<TenantId>(), Some(&TenantId(7)));
/// assert!(root.value::<TenantId>().is_none());
/// ```
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Entry>>,
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Entry>>,
}

impl Context {
    /// Returns an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context carrying the metadata of an incoming tonic request.
    pub fn from_request<T>(request: &tonic::Request<T>) -> Self {
        Self::new().with_incoming_metadata(request.metadata().clone())
    }

    /// Returns a new context with `value` added. An existing value of the same
    /// type is shadowed, not replaced.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            head: Some(Arc::new(Entry {
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Returns the most recently added value of type `T`.
    pub fn value<T>(&self) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        let mut entry = self.head.as_deref();
        while let Some(current) = entry {
            if let Some(value) = (*current.value).downcast_ref::<T>() {
                return Some(value);
            }
            entry = current.parent.as_deref();
        }
        None
    }

    /// Child context carrying the metadata received with the call.
    pub fn with_incoming_metadata(&self, metadata: MetadataMap) -> Self {
        self.with_value(IncomingMetadata(metadata))
    }

    /// Metadata sent by the remote peer, if the transport recorded it.
    pub fn incoming_metadata(&self) -> Option<&MetadataMap> {
        self.value::<IncomingMetadata>().map(|md| &md.0)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut entry = self.head.as_deref();
        while let Some(current) = entry {
            depth += 1;
            entry = current.parent.as_deref();
        }
        f.debug_struct("Context").field("values", &depth).finish()
    }
}

/// Request metadata received from the remote peer.
#[derive(Debug, Clone)]
pub struct IncomingMetadata(pub MetadataMap);
