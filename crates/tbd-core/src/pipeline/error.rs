//! Error types for the rate conversion pipeline

use thiserror::Error;

/// Errors that can occur while configuring or running a rate converter
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Sample rates must be finite and positive
    #[error("Invalid conversion rates: {in_rate} Hz -> {out_rate} Hz")]
    InvalidRate { in_rate: f64, out_rate: f64 },

    /// The rate pair needs a resampler that has not been prepared
    #[error("Conversion {in_rate} Hz -> {out_rate} Hz has not been prepared")]
    NotPrepared { in_rate: f64, out_rate: f64 },

    /// The resampler could not be built for the requested ratio
    #[error("Failed to build resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    /// The resampler rejected a processing call or ratio update
    #[error("Resampler error: {0}")]
    Resample(#[from] rubato::ResampleError),
}

/// Result type for rate conversion operations
pub type ConvertResult<T> = Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConvertError::InvalidRate {
            in_rate: 0.0,
            out_rate: 44100.0,
        };
        assert!(err.to_string().contains("44100"));
    }
}
