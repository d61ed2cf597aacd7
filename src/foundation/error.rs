/// Convenience result type used across Lucent.
pub type LucentResult<T> = Result<T, LucentError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum LucentError {
    /// Invalid user-provided data (dimensions, properties, samples).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unsupported configuration, rejected at engine construction or
    /// on a lifecycle misuse. Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A render state handed to an engine of a different type.
    #[error("render state mismatch: {0}")]
    StateMismatch(String),

    /// Accelerator program compilation or buffer allocation failed.
    /// Fatal for that plugin/device pair; there is no automatic
    /// fallback to the host path.
    #[error("device setup failed: {0}")]
    DeviceSetup(String),

    /// Accelerator runtime fault (submission, map, readback).
    #[error("device error: {0}")]
    Device(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LucentError {
    /// Build a [`LucentError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`LucentError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`LucentError::StateMismatch`] value.
    pub fn state_mismatch(msg: impl Into<String>) -> Self {
        Self::StateMismatch(msg.into())
    }

    /// Build a [`LucentError::DeviceSetup`] value.
    pub fn device_setup(msg: impl Into<String>) -> Self {
        Self::DeviceSetup(msg.into())
    }

    /// Build a [`LucentError::Device`] value.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
