//! Access queries and decisions exchanged with the SGNL service.

use crate::error::ClientError;

/// Default action for evaluation queries.
pub const DEFAULT_EVALUATE_ACTION: &str = "execute";
/// Default action for asset search.
pub const DEFAULT_SEARCH_ACTION: &str = "list";

/// Principal and asset identifiers must stay under this many bytes.
pub const MAX_IDENTIFIER_BYTES: usize = 256;

/// One question for the decision service: may `principal` perform `action`,
/// optionally on `asset_id`. Search queries carry no asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessQuery {
    asset_id: Option<String>,
    action: String,
}

impl AccessQuery {
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: Some(asset_id.into()),
            action: DEFAULT_EVALUATE_ACTION.to_string(),
        }
    }

    pub fn action_only(action: impl Into<String>) -> Self {
        Self {
            asset_id: None,
            action: action.into(),
        }
    }

    pub fn with_action(self, action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..self
        }
    }

    pub fn asset_id(&self) -> Option<&str> {
        self.asset_id.as_deref()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if let Some(asset_id) = &self.asset_id {
            validate_identifier("asset identifier", asset_id)?;
        }
        validate_identifier("action", &self.action)
    }
}

pub(crate) fn validate_identifier(kind: &str, value: &str) -> Result<(), ClientError> {
    if value.is_empty() {
        return Err(ClientError::InvalidRequest(format!(
            "{kind} must not be empty"
        )));
    }
    if value.len() >= MAX_IDENTIFIER_BYTES {
        return Err(ClientError::InvalidRequest(format!(
            "{kind} exceeds {} bytes",
            MAX_IDENTIFIER_BYTES - 1
        )));
    }
    Ok(())
}

/// The service's verdict. Anything the service says that is not literally
/// `Allow` is a denial; there is no fail-open value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// `Allow` maps to [Decision::Allowed]; every other string is a denial.
    pub fn from_decision_string(decision: &str) -> Self {
        if decision == "Allow" {
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }
}

/// Detailed outcome of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessResult {
    pub decision: Decision,
    /// Raw verdict string as the service sent it (`"Deny"` for synthetic
    /// conservative denials).
    pub decision_string: String,
    pub reason: String,
    pub asset_id: Option<String>,
    pub action: String,
    pub principal_id: String,
    /// Unix timestamp (seconds) at evaluation time.
    pub timestamp: u64,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEvaluation {
    /// One entry per input query, same order. Positions the service left
    /// unanswered carry conservative denials.
    pub results: Vec<AccessResult>,
    pub request_id: String,
}

impl BatchEvaluation {
    /// The AND fold: allowed only when every per-query result is allowed.
    pub fn all_allowed(&self) -> bool {
        self.results.iter().all(|result| result.decision.is_allowed())
    }

    pub fn first_denied(&self) -> Option<&AccessResult> {
        self.results
            .iter()
            .find(|result| !result.decision.is_allowed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Asset identifiers the principal holds the action on. May be empty.
    pub assets: Vec<String>,
    pub request_id: String,
}

/// Decision operations the host adapters consume. Implemented by
/// [crate::client::SgnlClient]; mockable for adapter tests.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
pub trait AccessEvaluator {
    fn check_access<'a>(
        &self,
        principal: &str,
        asset: &str,
        action: Option<&'a str>,
    ) -> Result<Decision, ClientError>;

    fn evaluate_access<'a>(
        &self,
        principal: &str,
        asset: &str,
        action: Option<&'a str>,
    ) -> Result<AccessResult, ClientError>;

    fn evaluate_access_batch(
        &self,
        principal: &str,
        queries: &[AccessQuery],
    ) -> Result<BatchEvaluation, ClientError>;

    fn search_assets<'a>(
        &self,
        principal: &str,
        action: Option<&'a str>,
    ) -> Result<SearchResult, ClientError>;
}
