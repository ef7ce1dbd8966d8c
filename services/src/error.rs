use mcc_config::ServiceName;
use reqwest::StatusCode;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// The remote host could not be reached before any response arrived.
    #[error("{service}: could not connect to {url}: {source}")]
    Connection {
        service: ServiceName,
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("{service}: {url} answered with {status}")]
    Status {
        service: ServiceName,
        url: String,
        status: StatusCode,
    },
    #[error("{service}: malformed response from {url}: {source}")]
    Decode {
        service: ServiceName,
        url: String,
        #[source]
        source: serde_json::Error,
    },
    /// Any other transport failure, e.g. a timeout after the connection was made.
    #[error("{service}: request to {url} failed: {source}")]
    Request {
        service: ServiceName,
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("{service}: cannot build a URL for endpoint {endpoint:?}: {source}")]
    Endpoint {
        service: ServiceName,
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{service}: cancelled while waiting to retry")]
    Cancelled { service: ServiceName },
}

impl ClientError {
    pub(crate) fn from_transport(service: ServiceName, url: &str, err: reqwest::Error) -> Self {
        // A connect timeout reports both; timeouts stay out of the retry path.
        if err.is_connect() && !err.is_timeout() {
            ClientError::Connection {
                service,
                url: url.to_string(),
                source: err.into(),
            }
        } else {
            ClientError::Request {
                service,
                url: url.to_string(),
                source: err.into(),
            }
        }
    }

    pub fn service(&self) -> ServiceName {
        match self {
            ClientError::Connection { service, .. }
            | ClientError::Status { service, .. }
            | ClientError::Decode { service, .. }
            | ClientError::Request { service, .. }
            | ClientError::Endpoint { service, .. }
            | ClientError::Cancelled { service } => *service,
        }
    }

    /// Only a failed connection is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Connection { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled { .. })
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
