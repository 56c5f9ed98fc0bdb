//! Error types for wgstat

use crate::dtype::DType;
use crate::runtime::wgpu::WgpuError;
use thiserror::Error;

/// Result type alias using wgstat's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing, setting up or encoding kernels
#[derive(Error, Debug)]
pub enum Error {
    /// A buffer's element count does not match the kernel's bound dimensions
    #[error("{kernel}: buffer '{buffer}' has {got} elements, expected {expected}")]
    BufferSize {
        /// Kernel that rejected the buffer
        kernel: &'static str,
        /// Role of the buffer in the kernel
        buffer: &'static str,
        /// Element count implied by the kernel dimensions
        expected: usize,
        /// Actual element count
        got: usize,
    },

    /// A buffer carries the wrong element type
    #[error("{kernel}: buffer '{buffer}' has dtype {got}, expected {expected}")]
    DTypeMismatch {
        /// Kernel that rejected the buffer
        kernel: &'static str,
        /// Role of the buffer in the kernel
        buffer: &'static str,
        /// Accepted dtype(s), rendered for the message
        expected: String,
        /// Actual dtype
        got: DType,
    },

    /// `encode` was called before `setup` completed
    #[error("{kernel}: encode called before setup")]
    NotSetUp {
        /// Kernel that was not set up
        kernel: &'static str,
    },

    /// Invalid argument provided to a constructor
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// Backend limitation - operation valid but exceeds device capabilities
    #[error("{backend} limitation: {operation} - {reason}")]
    BackendLimitation {
        /// The backend that has the limitation
        backend: &'static str,
        /// The operation being attempted
        operation: &'static str,
        /// Description of the limitation
        reason: String,
    },

    /// Adapter or device acquisition failed
    #[error(transparent)]
    Device(#[from] WgpuError),

    /// Backend-specific error (mapping, polling)
    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create a backend limitation error
    pub fn backend_limitation(
        backend: &'static str,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::BackendLimitation {
            backend,
            operation,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_message_names_counts() {
        let err = Error::BufferSize {
            kernel: "Sum2D",
            buffer: "output",
            expected: 12,
            got: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("Sum2D"));
        assert!(msg.contains("expected 12"));
        assert!(msg.contains("10 elements"));
    }

    #[test]
    fn test_not_set_up_message() {
        let err = Error::NotSetUp { kernel: "Transpose" };
        assert_eq!(err.to_string(), "Transpose: encode called before setup");
    }
}
