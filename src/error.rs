use thiserror::Error;

/// Failure of a single call to the remote task API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The request never reached the server, or its response could not be read.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A request body could not be built; nothing was sent.
    #[error("could not encode request: {0}")]
    Encode(String),
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Api { status, .. } => Some(*status),
            RequestError::Network(_) | RequestError::Encode(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        RequestError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        RequestError::Encode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Rejected on the client; nothing was sent.
    #[error("{0}")]
    Validation(String),

    #[error("session storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("session directory error: {0}")]
    Io(#[from] std::io::Error),
}

impl BoardError {
    pub fn validation(message: impl Into<String>) -> Self {
        BoardError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, BoardError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_server_message() {
        let err = RequestError::Api {
            status: 400,
            message: "Title is required!".to_string(),
        };
        assert_eq!(err.to_string(), "Title is required!");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn board_error_is_transparent_over_request_error() {
        let err: BoardError = RequestError::Network("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "network error: connection refused");
        assert!(!err.is_validation());
    }

    #[test]
    fn unauthorized_is_detected_from_status() {
        let err = RequestError::Api {
            status: 401,
            message: "Token is invalid!".to_string(),
        };
        assert!(err.is_unauthorized());
        assert!(!RequestError::Network("x".into()).is_unauthorized());
    }

    #[test]
    fn encode_failure_is_not_a_network_error() {
        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1u8], "key must be a string");
        let err: RequestError = serde_json::to_value(&bad).unwrap_err().into();
        assert!(matches!(err, RequestError::Encode(_)));
        assert!(err.to_string().starts_with("could not encode request"));
        assert_eq!(err.status(), None);
    }
}
