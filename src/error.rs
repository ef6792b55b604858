//! Error types for the overdrive stages.
//!
//! Per-sample processing never fails. Everything in [`OverdriveError`] is
//! raised either while a stage is being constructed (bad sample rate, bad
//! component values, a tube bias point that has no real solution) or by the
//! CLI host while moving PCM through stdin/stdout.

use thiserror::Error;

/// Result type alias using [`OverdriveError`].
pub type Result<T> = std::result::Result<T, OverdriveError>;

/// Unified error type for all overdrive operations.
#[derive(Error, Debug)]
pub enum OverdriveError {
    // ============ Construction Errors ============
    /// Sample rate is zero, negative or not finite
    #[error("Invalid sample rate {value} Hz (must be finite and positive)")]
    InvalidSampleRate { value: f64 },

    /// Invalid parameter value
    #[error("Invalid parameter '{param}' for stage '{stage}': {message}")]
    InvalidParameter {
        stage: String,
        param: String,
        message: String,
    },

    /// The quiescent operating point cannot be computed from the parameters
    #[error("No valid operating point: {message}")]
    InvalidOperatingPoint { message: String },

    // ============ I/O Errors ============
    /// Error reading audio input
    #[error("Audio input error: {message}")]
    AudioInputError { message: String },

    /// Error writing audio output
    #[error("Audio output error: {message}")]
    AudioOutputError { message: String },
}

impl OverdriveError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(
        stage: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            stage: stage.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an operating point error
    pub fn operating_point(message: impl Into<String>) -> Self {
        Self::InvalidOperatingPoint {
            message: message.into(),
        }
    }
}

/// Reject a sample rate that cannot be used for discretization.
pub fn require_sample_rate(sample_rate: f64) -> Result<f64> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(sample_rate)
    } else {
        log::warn!("rejecting sample rate {sample_rate}");
        Err(OverdriveError::InvalidSampleRate { value: sample_rate })
    }
}

/// Reject a component value that must be finite and strictly positive.
pub fn require_positive(stage: &str, param: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        log::warn!("{stage}: rejecting {param} = {value}");
        Err(OverdriveError::invalid_parameter(
            stage,
            param,
            format!("must be finite and positive, got {value}"),
        ))
    }
}
