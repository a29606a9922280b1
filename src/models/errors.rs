//! Centralized Error Handling Module
//!
//! Every failed upstream attempt is described by an `AppError` with a unique
//! code. These errors stay inside the crate: the fallback engine and the
//! aggregator absorb them and answer with sentinel values instead.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - RPC_xxx: upstream transport / response errors
//! - EXTRACT_xxx: response understood but no usable value
//! - CFG_xxx: configuration and caller contract errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// Build the error matching a non-2xx HTTP status
    pub fn from_status(status: u16, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        let code = match status {
            429 => ErrorCode::RpcRateLimited,
            400..=499 => ErrorCode::RpcRejected,
            _ => ErrorCode::RpcError,
        };
        Self::new(code, format!("HTTP {}: {}", status, snippet))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Upstream transport errors
    // ============================================
    /// Connection refused, DNS failure, TLS failure
    RpcConnectionFailed,
    /// Per-call timeout elapsed
    RpcTimeout,
    /// Upstream rate limited (HTTP 429)
    RpcRateLimited,
    /// Upstream rejected the request (HTTP 4xx)
    RpcRejected,
    /// Upstream failed (HTTP 5xx or unexpected status)
    RpcError,
    /// No base URL / source configured
    RpcNoEndpoints,
    /// Body was not the JSON we expected
    RpcInvalidResponse,

    // ============================================
    // Extraction
    // ============================================
    /// Structurally valid body without a recognizable field
    ExtractionMiss,

    // ============================================
    // Configuration / caller contract
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Chain identifier not handled by this core
    UnsupportedChain,

    // ============================================
    // Generic
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RpcConnectionFailed => "RPC_CONNECTION_FAILED",
            Self::RpcTimeout => "RPC_TIMEOUT",
            Self::RpcRateLimited => "RPC_RATE_LIMITED",
            Self::RpcRejected => "RPC_REJECTED",
            Self::RpcError => "RPC_ERROR",
            Self::RpcNoEndpoints => "RPC_NO_ENDPOINTS",
            Self::RpcInvalidResponse => "RPC_INVALID_RESPONSE",
            Self::ExtractionMiss => "EXTRACT_MISS",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::UnsupportedChain => "CFG_UNSUPPORTED_CHAIN",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Check if error is retryable against the same endpoint
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RpcTimeout
                | Self::RpcRateLimited
                | Self::RpcConnectionFailed
                | Self::RpcError
                | Self::RpcInvalidResponse
        )
    }

    /// The node understood the transport but refused the request shape
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::RpcRejected)
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Per-call timeout elapsed
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcTimeout, msg)
    }

    /// Connection could not be established
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcConnectionFailed, msg)
    }

    /// Body could not be decoded
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcInvalidResponse, msg)
    }

    /// No endpoint configured
    pub fn no_endpoints(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcNoEndpoints, msg)
    }

    /// Unsupported chain
    pub fn unsupported_chain(chain: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedChain,
            format!("Unsupported chain: {}", chain),
        )
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::RpcTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::RpcConnectionFailed, "Connection failed")
        } else if err.is_decode() {
            Self::new(ErrorCode::RpcInvalidResponse, err.to_string())
        } else {
            Self::new(ErrorCode::Unknown, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::RpcInvalidResponse, "JSON parse error", err)
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::timeout("Per-call timeout elapsed")
    }
}
