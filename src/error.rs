//! Error type for the checked map accessors.

/// Errors reported by fallible [`AvlMap`](crate::AvlMap) operations.
///
/// Plain lookups report absence through `Option`; the checked accessors
/// ([`at`](crate::AvlMap::at) and [`at_mut`](crate::AvlMap::at_mut)) report it
/// through this type so callers can propagate it with `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The requested key is not present in the map.
    #[error("key not found")]
    KeyNotFound,
}
