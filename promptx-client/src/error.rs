use thiserror::Error;

/// Errors returned by promptx-client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (connection, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status. `message` is the `error`
    /// field of the JSON body when present, else the raw body.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A filesystem I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rejected locally before any request was sent.
    #[error("{0}")]
    Invalid(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_server_message() {
        let err = ClientError::Api { status: 401, message: "Unauthorized".into() };
        assert_eq!(err.to_string(), "Unauthorized");
        assert!(err.is_unauthorized());
        assert!(!err.is_not_found());
        assert_eq!(ClientError::Invalid("x".into()).status(), None);
    }
}
