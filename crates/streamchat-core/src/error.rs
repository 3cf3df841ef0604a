use reqwest::StatusCode;

/// The request could not be sent, or it came back without a usable body.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Chat endpoint error {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("No response body")]
    NoBody,
}

/// Reading or decoding the body failed after streaming began.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("Stream interrupted: {0}")]
    Read(String),

    #[error("Invalid UTF-8 in response at byte {offset}")]
    Decode { offset: usize },
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Read(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("A request is already in progress")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let err = TransportError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: "invalid api key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Chat endpoint error 401 Unauthorized: invalid api key"
        );
    }

    #[test]
    fn test_no_body_message() {
        assert_eq!(TransportError::NoBody.to_string(), "No response body");
    }
}
