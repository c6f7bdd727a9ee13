//! Fetch failures and their classification.

/// How a failure should be treated by retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The caller is not entitled to the resource (401/403). Never retried.
  Authorization,
  /// Malformed or invalid request (other 4xx). Never retried.
  ClientRequest,
  /// Network or server trouble (5xx, 408, 429, connection errors).
  Transient,
  /// Anything else; retried within the budget like a transient failure.
  Unclassified,
}

impl ErrorKind {
  /// Classify an HTTP status code.
  pub fn from_status(status: u16) -> Self {
    match status {
      401 | 403 => ErrorKind::Authorization,
      408 | 429 => ErrorKind::Transient,
      400..=499 => ErrorKind::ClientRequest,
      500..=599 => ErrorKind::Transient,
      _ => ErrorKind::Unclassified,
    }
  }
}

/// Error produced by a fetch function.
///
/// Cloneable so one failure can be handed to every caller that was
/// coalesced onto the same request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
  #[error("not authorized (HTTP {status}): {message}")]
  Authorization { status: u16, message: String },

  #[error("request rejected (HTTP {status}): {message}")]
  ClientRequest { status: u16, message: String },

  #[error("temporary failure (HTTP {status}): {message}")]
  Transient { status: u16, message: String },

  #[error("network error: {0}")]
  Network(String),

  #[error("{0}")]
  Unclassified(String),
}

impl FetchError {
  /// Build an error from a non-success HTTP response.
  pub fn from_status(status: u16, message: impl Into<String>) -> Self {
    let message = message.into();
    match ErrorKind::from_status(status) {
      ErrorKind::Authorization => FetchError::Authorization { status, message },
      ErrorKind::ClientRequest => FetchError::ClientRequest { status, message },
      ErrorKind::Transient => FetchError::Transient { status, message },
      ErrorKind::Unclassified => {
        FetchError::Unclassified(format!("unexpected HTTP {}: {}", status, message))
      }
    }
  }

  pub fn network(message: impl Into<String>) -> Self {
    FetchError::Network(message.into())
  }

  pub fn unclassified(message: impl Into<String>) -> Self {
    FetchError::Unclassified(message.into())
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      FetchError::Authorization { .. } => ErrorKind::Authorization,
      FetchError::ClientRequest { .. } => ErrorKind::ClientRequest,
      FetchError::Transient { .. } | FetchError::Network(_) => ErrorKind::Transient,
      FetchError::Unclassified(_) => ErrorKind::Unclassified,
    }
  }

  /// HTTP status code, when the failure came from a response.
  pub fn status(&self) -> Option<u16> {
    match self {
      FetchError::Authorization { status, .. }
      | FetchError::ClientRequest { status, .. }
      | FetchError::Transient { status, .. } => Some(*status),
      FetchError::Network(_) | FetchError::Unclassified(_) => None,
    }
  }

  /// True when the request never reached the server.
  pub fn is_network(&self) -> bool {
    matches!(self, FetchError::Network(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_classification() {
    assert_eq!(ErrorKind::from_status(401), ErrorKind::Authorization);
    assert_eq!(ErrorKind::from_status(403), ErrorKind::Authorization);
    assert_eq!(ErrorKind::from_status(400), ErrorKind::ClientRequest);
    assert_eq!(ErrorKind::from_status(404), ErrorKind::ClientRequest);
    assert_eq!(ErrorKind::from_status(422), ErrorKind::ClientRequest);
    assert_eq!(ErrorKind::from_status(408), ErrorKind::Transient);
    assert_eq!(ErrorKind::from_status(429), ErrorKind::Transient);
    assert_eq!(ErrorKind::from_status(500), ErrorKind::Transient);
    assert_eq!(ErrorKind::from_status(503), ErrorKind::Transient);
    assert_eq!(ErrorKind::from_status(302), ErrorKind::Unclassified);
  }

  #[test]
  fn test_from_status_keeps_status() {
    let err = FetchError::from_status(503, "maintenance");
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.to_string(), "temporary failure (HTTP 503): maintenance");
  }

  #[test]
  fn test_network_error_is_transient_without_status() {
    let err = FetchError::network("connection refused");
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(err.status(), None);
    assert!(err.is_network());
  }

  #[test]
  fn test_unexpected_status_is_unclassified() {
    let err = FetchError::from_status(304, "not modified");
    assert_eq!(err.kind(), ErrorKind::Unclassified);
    assert_eq!(err.status(), None);
  }
}
