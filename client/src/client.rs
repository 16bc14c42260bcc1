//! The authorization client: request construction, transport, parsing.
//!
//! One client is created per host-process initialization and dropped on
//! teardown; dropping zeroes the token buffer. The transport sits behind
//! [HttpSender] so the decision pathway is testable without a network.

use crate::access::{
    validate_identifier, AccessEvaluator, AccessQuery, AccessResult, BatchEvaluation, Decision,
    SearchResult, DEFAULT_SEARCH_ACTION,
};
use crate::config::{discover_path, ConfigError, ConfigLoader, SgnlConfig, SudoSettings};
use crate::error::ClientError;
use crate::http::client::{HttpClient, HttpSender};
use crate::http::config::HttpConfig;
use crate::logging::{LogDestination, LoggingConfig};
use crate::request_id::RequestId;
use crate::retry;
use device_id::DeviceIdProvider;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use url::Url;

const EVALUATIONS_PATH: &str = "/access/v2/evaluations";
const SEARCH_PATH: &str = "/access/v2/search";
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Serialize)]
struct PrincipalBody<'a> {
    id: &'a str,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    #[serde(rename = "assetId", skip_serializing_if = "Option::is_none")]
    asset_id: Option<&'a str>,
    action: &'a str,
}

#[derive(Debug, Serialize)]
struct AccessRequestBody<'a> {
    principal: PrincipalBody<'a>,
    queries: Vec<QueryBody<'a>>,
}

#[derive(Debug, Default, Deserialize)]
struct DecisionBody {
    #[serde(default)]
    decision: String,
    #[serde(default)]
    reason: String,
    #[serde(rename = "assetId", default)]
    asset_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DecisionsResponse {
    #[serde(default)]
    decisions: Vec<DecisionBody>,
    #[serde(default)]
    error: Option<ServiceErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    message: String,
}

/// Client construction with per-host overrides layered over the discovered
/// configuration document.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config_path: Option<PathBuf>,
    timeout: Option<u64>,
    debug: Option<bool>,
    ssl_verify: Option<bool>,
    user_agent: Option<String>,
    log_destination: Option<LogDestination>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
            ..self
        }
    }

    pub fn with_timeout(self, timeout_seconds: u64) -> Self {
        Self {
            timeout: Some(timeout_seconds),
            ..self
        }
    }

    pub fn with_debug(self, debug: bool) -> Self {
        Self {
            debug: Some(debug),
            ..self
        }
    }

    pub fn with_ssl_verify(self, verify: bool) -> Self {
        Self {
            ssl_verify: Some(verify),
            ..self
        }
    }

    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
            ..self
        }
    }

    pub fn with_log_destination(self, destination: LogDestination) -> Self {
        Self {
            log_destination: Some(destination),
            ..self
        }
    }

    pub fn build(self) -> Result<SgnlClient, ClientError> {
        let path = discover_path(self.config_path.as_deref());
        let mut config = ConfigLoader::default().load_from(&path)?;

        if let Some(timeout) = self.timeout {
            config.http.timeout = timeout;
        }
        if let Some(debug) = self.debug {
            config.debug = debug;
        }
        if let Some(verify) = self.ssl_verify {
            config.http.ssl_verify_peer = verify;
            config.http.ssl_verify_host = verify;
        }
        if let Some(user_agent) = self.user_agent {
            config.http.user_agent = user_agent;
        }
        config.validate()?;

        LoggingConfig {
            level: config.log_level(),
            destination: self.log_destination.unwrap_or_default(),
            ..LoggingConfig::default()
        }
        .try_init()
        .map_err(|err| ConfigError::Logging(err.to_string()))?;

        let sender = HttpClient::new(HttpConfig::from(config.http()))
            .map_err(|err| ClientError::Service(err.to_string()))?;
        SgnlClient::with_sender(sender, config, process_device_id())
    }
}

/// The device identifier is stable, so it is resolved once per process.
fn process_device_id() -> String {
    static DEVICE_ID: OnceLock<String> = OnceLock::new();
    DEVICE_ID
        .get_or_init(|| DeviceIdProvider::default().provide())
        .clone()
}

pub struct SgnlClient<S = HttpClient>
where
    S: HttpSender,
{
    sender: S,
    base: Url,
    config: SgnlConfig,
    device_id: String,
}

impl SgnlClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Builds a client from the discovered configuration with no overrides.
    pub fn from_default_config() -> Result<Self, ClientError> {
        ClientBuilder::new().build()
    }
}

impl<S> SgnlClient<S>
where
    S: HttpSender,
{
    /// Construction seam. Enforces the invariant that no client exists with
    /// an empty origin or token.
    pub fn with_sender(
        sender: S,
        config: SgnlConfig,
        device_id: String,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let origin = config.origin();
        let base = Url::parse(&origin).map_err(|err| {
            ClientError::InvalidRequest(format!("invalid service origin `{origin}`: {err}"))
        })?;
        Ok(Self {
            sender,
            base,
            config,
            device_id,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn debug(&self) -> bool {
        self.config.debug()
    }

    pub fn sudo_settings(&self) -> &SudoSettings {
        self.config.sudo()
    }

    pub fn check_access(
        &self,
        principal: &str,
        asset: &str,
        action: Option<&str>,
    ) -> Result<Decision, ClientError> {
        self.evaluate_access(principal, asset, action)
            .map(|result| result.decision)
    }

    pub fn evaluate_access(
        &self,
        principal: &str,
        asset: &str,
        action: Option<&str>,
    ) -> Result<AccessResult, ClientError> {
        let query = match action {
            Some(action) => AccessQuery::new(asset).with_action(action),
            None => AccessQuery::new(asset),
        };
        let mut batch = self.evaluate_access_batch(principal, std::slice::from_ref(&query))?;
        batch
            .results
            .pop()
            .ok_or_else(|| ClientError::Service("empty evaluation result".to_string()))
    }

    pub fn evaluate_access_batch(
        &self,
        principal: &str,
        queries: &[AccessQuery],
    ) -> Result<BatchEvaluation, ClientError> {
        validate_identifier("principal", principal)?;
        if queries.is_empty() {
            return Err(ClientError::InvalidRequest(
                "batch carries no queries".to_string(),
            ));
        }
        for query in queries {
            query.validate()?;
        }

        let request_id = RequestId::generate();
        let body = AccessRequestBody {
            principal: PrincipalBody {
                id: principal,
                device_id: &self.device_id,
            },
            queries: queries
                .iter()
                .map(|query| QueryBody {
                    asset_id: query.asset_id(),
                    action: query.action(),
                })
                .collect(),
        };
        debug!(
            request_id = %request_id,
            principal,
            queries = queries.len(),
            "evaluating access batch"
        );

        let response = self.post_decisions(EVALUATIONS_PATH, &body, &request_id)?;
        let timestamp = unix_timestamp();

        // Positional correspondence: slot i answers query i. Asset ids may
        // repeat across queries, so no re-matching by identifier. Positions
        // the service left unanswered deny.
        let results = queries
            .iter()
            .enumerate()
            .map(|(i, query)| match response.decisions.get(i) {
                Some(decision) => AccessResult {
                    decision: Decision::from_decision_string(&decision.decision),
                    decision_string: decision.decision.clone(),
                    reason: decision.reason.clone(),
                    asset_id: query.asset_id().map(str::to_string),
                    action: query.action().to_string(),
                    principal_id: principal.to_string(),
                    timestamp,
                    request_id: request_id.to_string(),
                },
                None => AccessResult {
                    decision: Decision::Denied,
                    decision_string: "Deny".to_string(),
                    reason: String::new(),
                    asset_id: query.asset_id().map(str::to_string),
                    action: query.action().to_string(),
                    principal_id: principal.to_string(),
                    timestamp,
                    request_id: request_id.to_string(),
                },
            })
            .collect();

        Ok(BatchEvaluation {
            results,
            request_id: request_id.to_string(),
        })
    }

    pub fn search_assets(
        &self,
        principal: &str,
        action: Option<&str>,
    ) -> Result<SearchResult, ClientError> {
        validate_identifier("principal", principal)?;
        let action = action.unwrap_or(DEFAULT_SEARCH_ACTION);
        validate_identifier("action", action)?;

        let request_id = RequestId::generate();
        let body = AccessRequestBody {
            principal: PrincipalBody {
                id: principal,
                device_id: &self.device_id,
            },
            queries: vec![QueryBody {
                asset_id: None,
                action,
            }],
        };
        debug!(request_id = %request_id, principal, action, "searching assets");

        let response = self.post_decisions(SEARCH_PATH, &body, &request_id)?;
        let assets = response
            .decisions
            .into_iter()
            .filter(|decision| Decision::from_decision_string(&decision.decision).is_allowed())
            .filter_map(|decision| decision.asset_id)
            .collect();

        Ok(SearchResult {
            assets,
            request_id: request_id.to_string(),
        })
    }

    fn post_decisions(
        &self,
        path: &str,
        body: &AccessRequestBody<'_>,
        request_id: &RequestId,
    ) -> Result<DecisionsResponse, ClientError> {
        let url = self
            .base
            .join(path)
            .map_err(|err| ClientError::InvalidRequest(err.to_string()))?;
        let body_bytes =
            serde_json::to_vec(body).map_err(|err| ClientError::InvalidRequest(err.to_string()))?;

        let response = retry::with_backoff(self.config.retry(), || {
            let request = http::Request::builder()
                .method(http::Method::POST)
                .uri(url.as_str())
                .header(ACCEPT, "application/json")
                .header(CONTENT_TYPE, "application/json")
                .header(USER_AGENT, self.config.http().user_agent.as_str())
                .header(
                    AUTHORIZATION,
                    format!("Bearer {}", self.config.api_token().expose()),
                )
                .header(REQUEST_ID_HEADER, request_id.as_str())
                .body(body_bytes.clone())
                .map_err(|err| ClientError::InvalidRequest(err.to_string()))?;
            self.sender.send(request).map_err(ClientError::from)
        })?;

        let parsed: DecisionsResponse = serde_json::from_slice(response.body())
            .map_err(|err| ClientError::Service(format!("malformed decision document: {err}")))?;
        if let Some(error) = parsed.error {
            return Err(ClientError::Service(error.message));
        }
        Ok(parsed)
    }
}

impl<S> AccessEvaluator for SgnlClient<S>
where
    S: HttpSender,
{
    fn check_access(
        &self,
        principal: &str,
        asset: &str,
        action: Option<&str>,
    ) -> Result<Decision, ClientError> {
        SgnlClient::check_access(self, principal, asset, action)
    }

    fn evaluate_access(
        &self,
        principal: &str,
        asset: &str,
        action: Option<&str>,
    ) -> Result<AccessResult, ClientError> {
        SgnlClient::evaluate_access(self, principal, asset, action)
    }

    fn evaluate_access_batch(
        &self,
        principal: &str,
        queries: &[AccessQuery],
    ) -> Result<BatchEvaluation, ClientError> {
        SgnlClient::evaluate_access_batch(self, principal, queries)
    }

    fn search_assets(
        &self,
        principal: &str,
        action: Option<&str>,
    ) -> Result<SearchResult, ClientError> {
        SgnlClient::search_assets(self, principal, action)
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::client::{HttpResponseError, MockHttpSender};
    use assert_matches::assert_matches;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    const TESTING_TOKEN: &str = "sekret-token-value";

    fn testing_config(api_url: &str) -> SgnlConfig {
        let doc = format!(
            r#"{{"api_url": "{api_url}", "api_token": "{TESTING_TOKEN}"}}"#
        );
        ConfigLoader::default().parse(&doc).unwrap()
    }

    fn testing_config_with(api_url: &str, extra: &str) -> SgnlConfig {
        let doc = format!(
            r#"{{"api_url": "{api_url}", "api_token": "{TESTING_TOKEN}", {extra}}}"#
        );
        ConfigLoader::default().parse(&doc).unwrap()
    }

    fn decisions_response(decisions: serde_json::Value) -> http::Response<Vec<u8>> {
        http::Response::builder()
            .status(200)
            .body(serde_json::to_vec(&json!({ "decisions": decisions })).unwrap())
            .unwrap()
    }

    fn client_over(sender: MockHttpSender) -> SgnlClient<MockHttpSender> {
        SgnlClient::with_sender(
            sender,
            testing_config("tenant.example.test"),
            "device-1".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn requests_carry_the_wire_contract() {
        let mut sender = MockHttpSender::new();
        sender
            .expect_send()
            .withf(|request| {
                let header = |name: &str| {
                    request
                        .headers()
                        .get(name)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                };
                *request.method() == http::Method::POST
                    && request.uri().to_string()
                        == "https://tenant.example.test/access/v2/evaluations"
                    && header("accept") == "application/json"
                    && header("content-type") == "application/json"
                    && header("authorization") == format!("Bearer {TESTING_TOKEN}")
                    && !header("x-request-id").is_empty()
                    && header("user-agent") == "SGNL-Client/1.0"
                    && serde_json::from_slice::<serde_json::Value>(request.body()).unwrap()
                        == json!({
                            "principal": {"id": "alice", "deviceId": "device-1"},
                            "queries": [{"assetId": "cat", "action": "execute"}]
                        })
            })
            .returning(|_| Ok(decisions_response(json!([{"decision": "Allow"}]))));

        let client = client_over(sender);
        let result = client.evaluate_access("alice", "cat", None).unwrap();
        assert_eq!(result.decision, Decision::Allowed);
        assert_eq!(result.decision_string, "Allow");
        assert_eq!(result.principal_id, "alice");
        assert_eq!(result.asset_id.as_deref(), Some("cat"));
        assert!(!result.request_id.is_empty());
    }

    #[test]
    fn short_responses_pad_with_conservative_denials() {
        let mut sender = MockHttpSender::new();
        sender.expect_send().returning(|_| {
            Ok(decisions_response(json!([
                {"decision": "Allow"},
                {"decision": "Allow"}
            ])))
        });

        let client = client_over(sender);
        let queries = vec![
            AccessQuery::new("a"),
            AccessQuery::new("b"),
            AccessQuery::new("c"),
        ];
        let batch = client.evaluate_access_batch("alice", &queries).unwrap();

        assert_eq!(batch.results.len(), 3);
        assert_eq!(batch.results[0].decision, Decision::Allowed);
        assert_eq!(batch.results[1].decision, Decision::Allowed);
        assert_eq!(batch.results[2].decision, Decision::Denied);
        assert_eq!(batch.results[2].decision_string, "Deny");
        assert_eq!(batch.results[2].reason, "");
        assert!(!batch.all_allowed());
    }

    #[test]
    fn empty_decisions_array_denies() {
        let mut sender = MockHttpSender::new();
        sender
            .expect_send()
            .returning(|_| Ok(decisions_response(json!([]))));

        let client = client_over(sender);
        let result = client.evaluate_access("bob", "whoami", None).unwrap();
        assert_eq!(result.decision, Decision::Denied);
        assert_eq!(result.reason, "");
    }

    #[test]
    fn missing_decision_field_denies() {
        let mut sender = MockHttpSender::new();
        sender
            .expect_send()
            .returning(|_| Ok(decisions_response(json!([{"reason": "no verdict"}]))));

        let client = client_over(sender);
        let result = client.evaluate_access("bob", "whoami", None).unwrap();
        assert_eq!(result.decision, Decision::Denied);
    }

    #[test]
    fn service_error_message_overrides_decisions() {
        let mut sender = MockHttpSender::new();
        sender.expect_send().returning(|_| {
            Ok(http::Response::builder()
                .status(200)
                .body(
                    serde_json::to_vec(&json!({"error": {"message": "tenant suspended"}}))
                        .unwrap(),
                )
                .unwrap())
        });

        let client = client_over(sender);
        let err = client.evaluate_access("bob", "whoami", None).unwrap_err();
        assert_matches!(err, ClientError::Service(msg) => {
            assert_eq!(msg, "tenant suspended");
        });
    }

    #[test]
    fn results_correspond_positionally_even_with_repeated_assets() {
        let mut sender = MockHttpSender::new();
        sender.expect_send().returning(|_| {
            Ok(decisions_response(json!([
                {"decision": "Deny", "reason": "first", "assetId": "cat"},
                {"decision": "Allow", "assetId": "cat"}
            ])))
        });

        let client = client_over(sender);
        let queries = vec![
            AccessQuery::new("cat").with_action("sudo"),
            AccessQuery::new("cat").with_action("execute"),
        ];
        let batch = client.evaluate_access_batch("alice", &queries).unwrap();

        assert_eq!(batch.results[0].decision, Decision::Denied);
        assert_eq!(batch.results[0].reason, "first");
        assert_eq!(batch.results[0].action, "sudo");
        assert_eq!(batch.results[1].decision, Decision::Allowed);
        assert_eq!(batch.results[1].action, "execute");
    }

    #[test]
    fn search_keeps_only_allowed_assets() {
        let mut sender = MockHttpSender::new();
        sender.expect_send().returning(|_| {
            Ok(decisions_response(json!([
                {"decision": "Allow", "assetId": "ls"},
                {"decision": "Deny", "assetId": "cat"},
                {"decision": "Allow", "assetId": "whoami"}
            ])))
        });

        let client = client_over(sender);
        let result = client.search_assets("alice", None).unwrap();
        assert_eq!(result.assets, vec!["ls", "whoami"]);
    }

    #[test]
    fn search_with_only_denials_is_empty() {
        let mut sender = MockHttpSender::new();
        sender.expect_send().returning(|_| {
            Ok(decisions_response(json!([
                {"decision": "Deny", "assetId": "a"}
            ])))
        });

        let client = client_over(sender);
        let result = client.search_assets("alice", None).unwrap();
        assert!(result.assets.is_empty());
    }

    #[test]
    fn search_uses_list_action_by_default() {
        let mut sender = MockHttpSender::new();
        sender
            .expect_send()
            .withf(|request| {
                serde_json::from_slice::<serde_json::Value>(request.body()).unwrap()
                    == json!({
                        "principal": {"id": "alice", "deviceId": "device-1"},
                        "queries": [{"action": "list"}]
                    })
            })
            .returning(|_| Ok(decisions_response(json!([]))));

        let client = client_over(sender);
        client.search_assets("alice", None).unwrap();
    }

    #[test]
    fn validation_failures_never_reach_the_transport() {
        let mut sender = MockHttpSender::new();
        sender.expect_send().times(0);
        let client = client_over(sender);

        assert_matches!(
            client.evaluate_access("", "cat", None),
            Err(ClientError::InvalidRequest(_))
        );
        assert_matches!(
            client.evaluate_access("alice", "", None),
            Err(ClientError::InvalidRequest(_))
        );
        assert_matches!(
            client.evaluate_access_batch("alice", &[]),
            Err(ClientError::InvalidRequest(_))
        );
        let long = "x".repeat(300);
        assert_matches!(
            client.evaluate_access("alice", &long, None),
            Err(ClientError::InvalidRequest(_))
        );
    }

    #[test]
    fn client_requires_token_and_origin() {
        let result = ConfigLoader::default().parse(r#"{"api_url": "u"}"#);
        // The invariant holds upstream: such a config cannot even be built.
        assert_matches!(result, Err(ConfigError::MissingField("api_token")));
    }

    #[test]
    fn transport_errors_are_retried_when_configured() {
        let mut sender = MockHttpSender::new();
        let mut attempts = 0;
        sender.expect_send().times(2).returning(move |_| {
            attempts += 1;
            if attempts == 1 {
                Err(HttpResponseError::ReadingResponse(
                    "connection reset".to_string(),
                ))
            } else {
                Ok(decisions_response(json!([{"decision": "Allow"}])))
            }
        });

        let config = testing_config_with(
            "tenant.example.test",
            r#""retry": {"retry_count": 1, "retry_delay_ms": 1}"#,
        );
        let client = SgnlClient::with_sender(sender, config, "device-1".to_string()).unwrap();
        let result = client.evaluate_access("alice", "cat", None).unwrap();
        assert_eq!(result.decision, Decision::Allowed);
    }

    #[test]
    fn auth_failures_are_never_retried() {
        let mut sender = MockHttpSender::new();
        sender.expect_send().times(1).returning(|_| {
            Err(HttpResponseError::UnsuccessfulResponse {
                status_code: http::StatusCode::UNAUTHORIZED,
                body: b"bad token".to_vec(),
            })
        });

        let config = testing_config_with(
            "tenant.example.test",
            r#""retry": {"retry_count": 3, "retry_delay_ms": 1}"#,
        );
        let client = SgnlClient::with_sender(sender, config, "device-1".to_string()).unwrap();
        let err = client.evaluate_access("alice", "cat", None).unwrap_err();
        assert_matches!(&err, ClientError::Auth(msg) => {
            assert!(msg.contains("HTTP 401"));
            assert!(!msg.contains(TESTING_TOKEN));
        });
    }

    // End-to-end through the real blocking transport.
    mod wire {
        use super::*;
        use crate::http::client::HttpClient;
        use crate::http::config::HttpConfig;

        fn wire_client(server: &MockServer) -> SgnlClient {
            let config = testing_config(&server.base_url());
            let sender = HttpClient::new(HttpConfig::from(config.http())).unwrap();
            SgnlClient::with_sender(sender, config, "device-1".to_string()).unwrap()
        }

        #[test]
        fn evaluation_round_trip() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(POST)
                    .path("/access/v2/evaluations")
                    .header("authorization", format!("Bearer {TESTING_TOKEN}"))
                    .header("content-type", "application/json")
                    .header_exists("x-request-id")
                    .json_body(json!({
                        "principal": {"id": "alice", "deviceId": "device-1"},
                        "queries": [
                            {"assetId": "cat", "action": "sudo"},
                            {"assetId": "/etc/shadow", "action": "cat"}
                        ]
                    }));
                then.status(200).json_body(json!({
                    "decisions": [
                        {"decision": "Allow"},
                        {"decision": "Deny", "reason": "sensitive path"}
                    ]
                }));
            });

            let client = wire_client(&server);
            let queries = vec![
                AccessQuery::new("cat").with_action("sudo"),
                AccessQuery::new("/etc/shadow").with_action("cat"),
            ];
            let batch = client.evaluate_access_batch("alice", &queries).unwrap();

            mock.assert();
            assert!(!batch.all_allowed());
            assert_eq!(batch.first_denied().unwrap().reason, "sensitive path");
        }

        #[test]
        fn http_401_maps_to_auth_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/access/v2/evaluations");
                then.status(401).body("invalid token");
            });

            let client = wire_client(&server);
            let err = client.check_access("alice", "cat", None).unwrap_err();
            assert_matches!(&err, ClientError::Auth(msg) => {
                assert!(msg.contains("HTTP 401"));
                assert!(!msg.contains(TESTING_TOKEN));
            });
        }

        #[test]
        fn http_500_maps_to_network_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/access/v2/evaluations");
                then.status(500).body("boom");
            });

            let client = wire_client(&server);
            let err = client.check_access("alice", "cat", None).unwrap_err();
            assert_matches!(err, ClientError::Network(_));
        }

        #[test]
        fn search_round_trip() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/access/v2/search").json_body(json!({
                    "principal": {"id": "alice", "deviceId": "device-1"},
                    "queries": [{"action": "execute"}]
                }));
                then.status(200).json_body(json!({
                    "decisions": [
                        {"decision": "Allow", "assetId": "ls"},
                        {"decision": "Allow", "assetId": "whoami"}
                    ]
                }));
            });

            let client = wire_client(&server);
            let result = client.search_assets("alice", Some("execute")).unwrap();
            assert_eq!(result.assets, vec!["ls", "whoami"]);
        }
    }
}
