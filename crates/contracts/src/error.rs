//! Layered error definitions
//!
//! Categorized by source: device / module / context / config

use thiserror::Error;

/// Unified collaborator-boundary error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Device Errors =====
    /// No device satisfies the requested filter
    #[error("no device matches '{filter}'")]
    DeviceNotFound { filter: String },

    /// Device rejected the configuration while opening
    #[error("device '{device}' open error: {message}")]
    DeviceOpen { device: String, message: String },

    /// Device failed to start or stop streaming
    #[error("device '{device}' streaming error: {message}")]
    DeviceStreaming { device: String, message: String },

    // ===== Module Errors =====
    /// A CV module rejected the configuration it was given
    #[error("module {module_uid} rejected configuration: {message}")]
    ModuleConfig { module_uid: u32, message: String },

    /// A CV module failed to process a sample set
    #[error("module {module_uid} processing error: {message}")]
    ModuleProcessing { module_uid: u32, message: String },

    // ===== Context Errors =====
    /// File-backed context could not be created
    #[error("failed to create context: {message}")]
    ContextCreation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create device open error
    pub fn device_open(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceOpen {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create device streaming error
    pub fn device_streaming(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceStreaming {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create module configuration rejection
    pub fn module_config(module_uid: u32, message: impl Into<String>) -> Self {
        Self::ModuleConfig {
            module_uid,
            message: message.into(),
        }
    }

    /// Create module processing error
    pub fn module_processing(module_uid: u32, message: impl Into<String>) -> Self {
        Self::ModuleProcessing {
            module_uid,
            message: message.into(),
        }
    }

    /// Create context creation error wrapping its cause
    pub fn context_creation(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ContextCreation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}
