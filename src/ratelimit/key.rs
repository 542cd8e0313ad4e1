//! Window store key generation and handling.

use super::identity::CallerIdentity;

/// A key that uniquely identifies a window record in the store.
///
/// The key is composed of the limiter scope and the caller identity, so
/// limiters sharing one store keep independent counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    /// The limiter this record belongs to
    pub scope: String,
    /// The raw caller identity bytes
    pub identity: Vec<u8>,
}

impl WindowKey {
    /// Create a new window key from a scope and caller identity.
    pub fn new(scope: &str, identity: &CallerIdentity) -> Self {
        Self {
            scope: scope.to_string(),
            identity: identity.as_bytes().to_vec(),
        }
    }
}
