//! Common error types.

use thiserror::Error;

/// Error type shared by the geometry, pixel and buffer layers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Allocation of {0} bytes failed")]
    Alloc(usize),

    #[error("Buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Render error: {0}")]
    Render(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Whether this error came from a failed allocation.
    pub fn is_alloc(&self) -> bool {
        matches!(self, Self::Alloc(_))
    }
}

/// Allocate a zeroed byte vector without aborting on exhaustion.
pub fn try_alloc_zeroed(len: usize) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| CoreError::Alloc(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_alloc_zeroed() {
        let buf = try_alloc_zeroed(64).unwrap();
        assert_eq!(buf.len(), 64);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_try_alloc_huge_fails() {
        let err = try_alloc_zeroed(usize::MAX).unwrap_err();
        assert!(err.is_alloc());
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::BufferTooSmall { needed: 16, actual: 4 };
        assert_eq!(err.to_string(), "Buffer too small: need 16 bytes, got 4");
    }
}
