use crate::config::ConfigError;
use crate::http::client::HttpResponseError;
use http::StatusCode;
use thiserror::Error;

/// Failure taxonomy for every outbound operation. Decisions are not errors:
/// `Denied` travels in [crate::access::AccessResult]. No variant fails open.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("configuration error: `{0}`")]
    Config(#[from] ConfigError),

    #[error("network error: `{0}`")]
    Network(String),

    #[error("authorization service rejected credentials: `{0}`")]
    Auth(String),

    #[error("request timed out: `{0}`")]
    Timeout(String),

    #[error("invalid request: `{0}`")]
    InvalidRequest(String),

    #[error("service error: `{0}`")]
    Service(String),
}

impl ClientError {
    /// Only transport-shaped failures are ever worth retrying. Credential
    /// rejections and decision responses are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Timeout(_))
    }
}

impl From<HttpResponseError> for ClientError {
    fn from(err: HttpResponseError) -> Self {
        match err {
            HttpResponseError::TimeoutError(_) => ClientError::Timeout(err.to_string()),
            HttpResponseError::ConnectError(_)
            | HttpResponseError::DnsError(_)
            | HttpResponseError::GenericTransportError(_) => {
                ClientError::Network(err.to_string())
            }
            HttpResponseError::UnsuccessfulResponse { status_code, body } => {
                from_status(status_code, &body)
            }
            HttpResponseError::BuildingRequest(msg) => ClientError::InvalidRequest(msg),
            HttpResponseError::BuildingResponse(msg) | HttpResponseError::ReadingResponse(msg) => {
                ClientError::Network(msg)
            }
        }
    }
}

fn from_status(status_code: StatusCode, body: &[u8]) -> ClientError {
    let message = format!(
        "HTTP {}: {}",
        status_code.as_u16(),
        String::from_utf8_lossy(body)
    );
    if status_code == StatusCode::UNAUTHORIZED || status_code == StatusCode::FORBIDDEN {
        ClientError::Auth(message)
    } else if status_code.is_server_error() {
        ClientError::Network(message)
    } else {
        ClientError::Service(message)
    }
}
