// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the viewer
//!
//! Each layer reports its own error enum; [`AppError`] wraps them at the
//! application edge so `?` can be used across layers.

use std::fmt;

use crate::backends::sensor::{SensorError, TiltError};
use crate::pipelines::stream_buffer::BufferError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Device-layer errors
    Sensor(SensorError),
    /// Tilt motor errors
    Tilt(TiltError),
    /// Pixel buffer errors
    Buffer(BufferError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Sensor(e) => write!(f, "Sensor error: {}", e),
            AppError::Tilt(e) => write!(f, "Tilt error: {}", e),
            AppError::Buffer(e) => write!(f, "Buffer error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Sensor(e) => Some(e),
            AppError::Tilt(e) => Some(e),
            AppError::Buffer(e) => Some(e),
            AppError::Config(_) | AppError::Io(_) => None,
        }
    }
}

// Conversions from sub-errors to AppError
impl From<SensorError> for AppError {
    fn from(err: SensorError) -> Self {
        AppError::Sensor(err)
    }
}

impl From<TiltError> for AppError {
    fn from(err: TiltError) -> Self {
        AppError::Tilt(err)
    }
}

impl From<BufferError> for AppError {
    fn from(err: BufferError) -> Self {
        AppError::Buffer(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sensor::SensorStatus;

    #[test]
    fn test_conversions_keep_source() {
        let err: AppError = SensorError::NotConnected(SensorStatus::NotReady).into();
        assert_eq!(err.to_string(), "Sensor error: Sensor not connected (not ready)");
        assert!(std::error::Error::source(&err).is_some());

        let err: AppError = TiltError::Busy.into();
        assert!(matches!(err, AppError::Tilt(TiltError::Busy)));

        let err = AppError::Config("bad".into());
        assert!(std::error::Error::source(&err).is_none());
    }
}
