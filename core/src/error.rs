//! The error payload carried by a stream's error channel.

use core::fmt;
use std::rc::Rc;

/// A cloneable, type-erased error travelling through a stream.
///
/// A single failure is delivered to every subscriber of a multicast source, so the
/// payload is shared behind an [`Rc`]. The original error can be recovered with
/// [`StreamError::downcast_ref`].
#[derive(Clone)]
pub struct StreamError(Rc<anyhow::Error>);

impl StreamError {
    /// Wraps any error convertible into [`anyhow::Error`].
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Rc::new(error.into()))
    }

    /// Creates an error from a plain message.
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self(Rc::new(anyhow::Error::msg(message)))
    }

    /// Attempts to view the underlying error as a concrete type.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Returns `true` when both handles point at the same failure.
    #[must_use]
    pub fn same_failure(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> From<E> for StreamError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StreamError").field(&self.0.to_string()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn downcasts_to_original_error() {
        let error = StreamError::from(Boom);
        assert!(error.downcast_ref::<Boom>().is_some());
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn clones_share_the_failure() {
        let error = StreamError::msg("shared");
        let copy = error.clone();
        assert!(error.same_failure(&copy));
        assert!(!error.same_failure(&StreamError::msg("shared")));
    }
}
