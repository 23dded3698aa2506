//! Error types for the Keepsake domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all Keepsake operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Media errors ---
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Scheduling errors ---
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed model output: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Credentials and configuration problems never fix themselves, and
    /// client-side 4xx responses other than 408/429 are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::AuthenticationFailed(_) | ProviderError::NotConfigured(_) => false,
            ProviderError::ApiError { status_code, .. } => {
                *status_code >= 500 || *status_code == 408 || *status_code == 429
            }
            _ => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },
}

/// Errors raised by the backing store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors raised by the media store.
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("Media reference rejected: {0}")]
    Rejected(String),

    #[error("Media store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of a single tool call.
///
/// None of these end the turn: the dispatcher serializes them back to the
/// model so it can retry with other arguments or explain the problem.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Capability denied for {tool}: {reason}")]
    CapabilityDenied { tool: String, reason: String },

    #[error("Downstream failure in {tool}: {reason}")]
    DownstreamFailure { tool: String, reason: String },
}

/// Stable machine-readable failure classes reported to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    UnknownTool,
    InvalidArguments,
    CapabilityDenied,
    DownstreamFailure,
}

impl ToolError {
    pub fn invalid(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::InvalidArguments { tool: tool.into(), reason: reason.into() }
    }

    pub fn denied(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::CapabilityDenied { tool: tool.into(), reason: reason.into() }
    }

    pub fn downstream(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::DownstreamFailure { tool: tool.into(), reason: reason.into() }
    }

    /// Map a store error raised while serving `tool`.
    ///
    /// A missing record is the caller's mistake, a membership refusal inside
    /// the store's atomic section is a capability problem, everything else is
    /// a collaborator failure.
    pub fn from_store(tool: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ToolError::invalid(tool, err.to_string()),
            StoreError::Forbidden(reason) => ToolError::denied(tool, reason),
            StoreError::Unavailable(_) | StoreError::Storage(_) => {
                ToolError::downstream(tool, err.to_string())
            }
        }
    }

    pub fn from_media(tool: &str, err: MediaError) -> Self {
        match err {
            MediaError::Rejected(reason) => ToolError::invalid(tool, reason),
            MediaError::Unavailable(_) => ToolError::downstream(tool, err.to_string()),
        }
    }

    pub fn kind(&self) -> ToolFailureKind {
        match self {
            ToolError::UnknownTool(_) => ToolFailureKind::UnknownTool,
            ToolError::InvalidArguments { .. } => ToolFailureKind::InvalidArguments,
            ToolError::CapabilityDenied { .. } => ToolFailureKind::CapabilityDenied,
            ToolError::DownstreamFailure { .. } => ToolFailureKind::DownstreamFailure,
        }
    }
}

/// Failures of the batching scheduler.
#[derive(Debug, Clone, Error)]
pub enum SchedulingError {
    #[error("Flush handler failed: {0}")]
    HandlerFailed(String),

    #[error("Flush handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("Reply delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Aggregator is shut down")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        });
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn retryable_provider_errors() {
        assert!(ProviderError::Timeout("slow".into()).is_retryable());
        assert!(ProviderError::RateLimited { retry_after_secs: 3 }.is_retryable());
        assert!(ProviderError::MalformedResponse("no content".into()).is_retryable());
        assert!(!ProviderError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!ProviderError::ApiError { status_code: 400, message: "bad".into() }.is_retryable());
        assert!(ProviderError::ApiError { status_code: 503, message: "down".into() }.is_retryable());
    }

    #[test]
    fn store_errors_map_to_tool_failures() {
        let missing = StoreError::NotFound { entity: "event", id: "7".into() };
        assert_eq!(ToolError::from_store("add_memory", missing).kind(), ToolFailureKind::InvalidArguments);

        let forbidden = StoreError::Forbidden("not a member of event 7".into());
        assert_eq!(ToolError::from_store("add_memory", forbidden).kind(), ToolFailureKind::CapabilityDenied);

        let down = StoreError::Unavailable("connection reset".into());
        let err = ToolError::from_store("add_memory", down);
        assert_eq!(err.kind(), ToolFailureKind::DownstreamFailure);
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ToolFailureKind::CapabilityDenied).unwrap();
        assert_eq!(json, "\"capability_denied\"");
    }
}
