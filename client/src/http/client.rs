//! # Helpers to build a reqwest blocking client and handle responses
//!
use crate::http::config::HttpConfig;
use http::{Request, Response as HttpResponse, StatusCode};
use reqwest::{
    blocking::{Client, Response as BlockingResponse},
    Error as ReqwestError,
};
use tracing::warn;

/// Transport seam: the request pathway is injectable so decision flows are
/// testable without a network.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
pub trait HttpSender {
    fn send(&self, request: Request<Vec<u8>>) -> Result<HttpResponse<Vec<u8>>, HttpResponseError>;
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a reqwest blocking client according to the provided configuration.
    pub fn new(http_config: HttpConfig) -> Result<Self, HttpBuildError> {
        let mut builder = Client::builder()
            .use_rustls_tls() // Use rust-tls backend
            .tls_built_in_native_certs(true) // Load system (native) certificates
            .timeout(http_config.timeout)
            .connect_timeout(http_config.conn_timeout)
            .user_agent(http_config.user_agent.clone());

        if !http_config.verify_tls {
            warn!("TLS verification disabled by configuration");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|err| HttpBuildError::ClientBuilder(err.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpSender for HttpClient {
    fn send(&self, request: Request<Vec<u8>>) -> Result<HttpResponse<Vec<u8>>, HttpResponseError> {
        let req_builder = self
            .client
            .request(request.method().into(), request.uri().to_string().as_str())
            .headers(request.headers().clone())
            .body(request.body().to_vec());

        let res = req_builder.send().map_err(from_reqwest_error)?;

        if res.status().is_success() {
            try_build_response(res)
        } else {
            let status_code = res.status();
            let body = res
                .bytes()
                .map_err(|err| HttpResponseError::ReadingResponse(err.to_string()))?
                .to_vec();
            Err(HttpResponseError::UnsuccessfulResponse { status_code, body })
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HttpResponseError {
    #[error("could read response body: {0}")]
    ReadingResponse(String),
    #[error("could build response: {0}")]
    BuildingResponse(String),
    #[error("could build request: {0}")]
    BuildingRequest(String),
    /// Represents a response that was received, but had a non-successful status code.
    #[error(
        "unsuccessful response: {status_code} - body: {}",
        String::from_utf8_lossy(body)
    )]
    UnsuccessfulResponse {
        status_code: StatusCode,
        body: Vec<u8>,
    },
    #[error(
        "connection error: could not connect to the host. this is often caused by a firewall, proxy, or network routing issue. original error: {0}"
    )]
    ConnectError(#[source] ReqwestError),
    #[error("timeout error: the request timed out. original error: {0}")]
    TimeoutError(#[source] ReqwestError),
    #[error(
        "dns resolution error: could not resolve the host. please check your dns configuration. original error: {0}"
    )]
    DnsError(#[source] ReqwestError),
    #[error("generic transport error: {0}")]
    GenericTransportError(#[source] ReqwestError),
}

fn from_reqwest_error(e: ReqwestError) -> HttpResponseError {
    if e.is_connect() {
        HttpResponseError::ConnectError(e)
    } else if e.is_timeout() {
        HttpResponseError::TimeoutError(e)
    } else if e.is_builder() || e.is_request() {
        if e.to_string().to_lowercase().contains("dns") {
            HttpResponseError::DnsError(e)
        } else {
            HttpResponseError::BuildingRequest(e.to_string())
        }
    } else {
        HttpResponseError::GenericTransportError(e)
    }
}

/// Helper to build a [HttpResponse<Vec<u8>>] from a reqwest's blocking response.
/// It includes status, version and body. Headers are not included but they could be added if needed.
fn try_build_response(res: BlockingResponse) -> Result<HttpResponse<Vec<u8>>, HttpResponseError> {
    let status = res.status();
    let version = res.version();

    let body: Vec<u8> = res
        .bytes()
        .map_err(|err| HttpResponseError::ReadingResponse(err.to_string()))?
        .into();

    let response = http::Response::builder()
        .status(status)
        .version(version)
        .body(body)
        .map_err(|err| HttpResponseError::BuildingResponse(err.to_string()))?;

    Ok(response)
}

#[derive(thiserror::Error, Debug)]
pub enum HttpBuildError {
    #[error("could not build the http client: {0}")]
    ClientBuilder(String),
}
