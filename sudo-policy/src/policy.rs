//! Decision logic for a sudo invocation, independent of the plugin ABI.
//!
//! The engine is generic over [AccessEvaluator] so the whole decision path
//! runs in tests without a transport.

use crate::command_info::{build_command_info, resolve_command_path, CStringArray};
use crate::principal::principal_is_valid;
use sgnl_client::access::{AccessEvaluator, AccessQuery, BatchEvaluation};
use sgnl_client::config::{CommandAttribute, SudoSettings};
use sgnl_client::ClientError;
use std::ffi::NulError;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Action attached to the base command of an invocation.
pub const SUDO_ACTION: &str = "sudo";
/// Action used by `list` queries.
pub const EXECUTE_ACTION: &str = "execute";

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("no command specified")]
    NoCommand,

    #[error("principal could not be resolved")]
    UnknownPrincipal,

    #[error("command not found: `{0}`")]
    CommandNotFound(String),

    #[error("embedded NUL in plugin string: `{0}`")]
    Nul(#[from] NulError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Debug)]
pub enum CheckOutcome {
    Accept {
        command_info: CStringArray,
        /// Informational line for the invoking user, when configured.
        access_message: Option<String>,
    },
    Reject {
        /// Reason from the first denying decision, possibly empty.
        reason: String,
    },
}

pub struct PolicyEngine<E>
where
    E: AccessEvaluator,
{
    evaluator: E,
}

impl<E> PolicyEngine<E>
where
    E: AccessEvaluator,
{
    pub fn new(evaluator: E) -> Self {
        Self { evaluator }
    }

    /// The main decision path: every element of `argv` must be individually
    /// allowed, otherwise the invocation is rejected.
    pub fn check_command(
        &self,
        principal: &str,
        argv: &[String],
        settings: &SudoSettings,
        path_var: Option<&str>,
        cwd: &Path,
    ) -> Result<CheckOutcome, PolicyError> {
        if argv.is_empty() || argv[0].is_empty() {
            return Err(PolicyError::NoCommand);
        }
        if !principal_is_valid(principal) {
            return Err(PolicyError::UnknownPrincipal);
        }

        let command = &argv[0];
        let base_asset = command_asset(command, settings.command_attribute);

        if argv.len() == 1 {
            // No arguments: the batch degenerates to a single check.
            let decision =
                self.evaluator
                    .check_access(principal, &base_asset, Some(SUDO_ACTION))?;
            if !decision.is_allowed() {
                info!(principal, command = %command, "command denied");
                return Ok(CheckOutcome::Reject {
                    reason: String::new(),
                });
            }
        } else {
            let queries = build_queries(argv, &base_asset);
            let batch = self.evaluate(principal, &queries, settings)?;
            if !batch.all_allowed() {
                let reason = batch
                    .first_denied()
                    .map(|result| result.reason.clone())
                    .unwrap_or_default();
                info!(principal, command = %command, reason = %reason, "command denied");
                return Ok(CheckOutcome::Reject { reason });
            }
        }

        let resolved = resolve_command_path(command, path_var)?;
        let command_info = build_command_info(&resolved, cwd)?;
        let access_message = settings
            .access_msg
            .then(|| format!("SGNL policy: access granted to {principal} for {command}"));
        debug!(principal, resolved = %resolved.display(), "command allowed");
        Ok(CheckOutcome::Accept {
            command_info,
            access_message,
        })
    }

    /// Lines for `sudo -l`: a verdict for one command, or every asset the
    /// principal may execute.
    pub fn list(
        &self,
        principal: &str,
        command: Option<&str>,
    ) -> Result<Vec<String>, PolicyError> {
        if !principal_is_valid(principal) {
            return Err(PolicyError::UnknownPrincipal);
        }
        match command {
            Some(command) => {
                let decision =
                    self.evaluator
                        .check_access(principal, command, Some(EXECUTE_ACTION))?;
                let verdict = if decision.is_allowed() {
                    "allowed"
                } else {
                    "denied"
                };
                Ok(vec![format!("{command}: {verdict}")])
            }
            None => {
                let result = self
                    .evaluator
                    .search_assets(principal, Some(EXECUTE_ACTION))?;
                Ok(result.assets)
            }
        }
    }

    fn evaluate(
        &self,
        principal: &str,
        queries: &[AccessQuery],
        settings: &SudoSettings,
    ) -> Result<BatchEvaluation, PolicyError> {
        if settings.batch_evaluation {
            return Ok(self.evaluator.evaluate_access_batch(principal, queries)?);
        }
        // Batching disabled: one evaluation round-trip per query. The fold
        // over the results is identical.
        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            let asset = query.asset_id().unwrap_or_default();
            results.push(
                self.evaluator
                    .evaluate_access(principal, asset, Some(query.action()))?,
            );
        }
        let request_id = results
            .first()
            .map(|result| result.request_id.clone())
            .unwrap_or_default();
        Ok(BatchEvaluation {
            results,
            request_id,
        })
    }
}

/// The identifier form the configured command attribute selects: `id` sends
/// the command as invoked, `name`/`displayName` send the basename.
fn command_asset(command: &str, attribute: CommandAttribute) -> String {
    match attribute {
        CommandAttribute::Id => command.to_string(),
        CommandAttribute::Name | CommandAttribute::DisplayName => Path::new(command)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| command.to_string()),
    }
}

/// One query for the base command with the `sudo` action, then one per
/// non-empty argument scoped to the base command.
fn build_queries(argv: &[String], base_asset: &str) -> Vec<AccessQuery> {
    let mut queries = vec![AccessQuery::new(base_asset).with_action(SUDO_ACTION)];
    for arg in &argv[1..] {
        if arg.is_empty() {
            continue;
        }
        queries.push(AccessQuery::new(arg.as_str()).with_action(base_asset));
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sgnl_client::access::{AccessResult, Decision, MockAccessEvaluator, SearchResult};
    use std::fs::{self, File};
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn allowed(asset: &str, action: &str) -> AccessResult {
        AccessResult {
            decision: Decision::Allowed,
            decision_string: "Allow".to_string(),
            reason: String::new(),
            asset_id: Some(asset.to_string()),
            action: action.to_string(),
            principal_id: "alice".to_string(),
            timestamp: 0,
            request_id: "req-1".to_string(),
        }
    }

    fn denied(asset: &str, action: &str, reason: &str) -> AccessResult {
        AccessResult {
            decision: Decision::Denied,
            decision_string: "Deny".to_string(),
            reason: reason.to_string(),
            ..allowed(asset, action)
        }
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    /// A temp dir holding one executable `name`, usable as a PATH entry.
    fn path_dir_with(name: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(name);
        File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    }

    #[test]
    fn argument_denial_rejects_the_whole_invocation() {
        let mut evaluator = MockAccessEvaluator::new();
        evaluator
            .expect_evaluate_access_batch()
            .withf(|principal, queries| {
                *principal == *"alice"
                    && queries.len() == 2
                    && queries[0].asset_id() == Some("cat")
                    && queries[0].action() == SUDO_ACTION
                    && queries[1].asset_id() == Some("/etc/shadow")
                    && queries[1].action() == "cat"
            })
            .returning(|_, _| {
                Ok(BatchEvaluation {
                    results: vec![
                        allowed("cat", "sudo"),
                        denied("/etc/shadow", "cat", "sensitive path"),
                    ],
                    request_id: "req-1".to_string(),
                })
            });

        let engine = PolicyEngine::new(evaluator);
        let outcome = engine
            .check_command(
                "alice",
                &argv(&["cat", "/etc/shadow"]),
                &SudoSettings::default(),
                None,
                Path::new("/"),
            )
            .unwrap();

        assert_matches!(outcome, CheckOutcome::Reject { reason } => {
            assert_eq!(reason, "sensitive path");
        });
    }

    #[test]
    fn bare_command_uses_a_single_check() {
        let (dir, resolved) = path_dir_with("whoami");
        let path_var = dir.path().display().to_string();

        let mut evaluator = MockAccessEvaluator::new();
        evaluator
            .expect_check_access()
            .withf(|principal, asset, action| {
                *principal == *"bob" && *asset == *"whoami" && *action == Some(SUDO_ACTION)
            })
            .returning(|_, _, _| Ok(Decision::Allowed));
        evaluator.expect_evaluate_access_batch().times(0);

        let engine = PolicyEngine::new(evaluator);
        let outcome = engine
            .check_command(
                "bob",
                &argv(&["whoami"]),
                &SudoSettings::default(),
                Some(&path_var),
                Path::new("/home/bob"),
            )
            .unwrap();

        assert_matches!(outcome, CheckOutcome::Accept { command_info, access_message } => {
            assert_eq!(
                command_info.entries(),
                vec![
                    format!("command={}", resolved.display()),
                    "runas_uid=0".to_string(),
                    "runas_gid=0".to_string(),
                    "cwd=/home/bob".to_string(),
                    "timeout=300".to_string(),
                ]
            );
            let message = access_message.unwrap();
            assert!(message.contains("bob"));
            assert!(message.contains("whoami"));
        });
    }

    #[test]
    fn empty_arguments_are_not_queried() {
        let mut evaluator = MockAccessEvaluator::new();
        evaluator
            .expect_evaluate_access_batch()
            .withf(|_, queries| {
                queries.len() == 2 && queries[1].asset_id() == Some("-l")
            })
            .returning(|_, queries| {
                Ok(BatchEvaluation {
                    results: queries
                        .iter()
                        .map(|query| allowed(query.asset_id().unwrap(), query.action()))
                        .collect(),
                    request_id: "req-1".to_string(),
                })
            });

        let (dir, _) = path_dir_with("ls");
        let path_var = dir.path().display().to_string();

        let engine = PolicyEngine::new(evaluator);
        let outcome = engine
            .check_command(
                "alice",
                &argv(&["ls", "", "-l", ""]),
                &SudoSettings::default(),
                Some(&path_var),
                Path::new("/"),
            )
            .unwrap();
        assert_matches!(outcome, CheckOutcome::Accept { .. });
    }

    #[test]
    fn empty_argv_is_no_command() {
        let engine = PolicyEngine::new(MockAccessEvaluator::new());
        let result = engine.check_command(
            "alice",
            &[],
            &SudoSettings::default(),
            None,
            Path::new("/"),
        );
        assert_matches!(result, Err(PolicyError::NoCommand));
    }

    #[test]
    fn unknown_principal_is_an_error_before_any_query() {
        let mut evaluator = MockAccessEvaluator::new();
        evaluator.expect_check_access().times(0);
        evaluator.expect_evaluate_access_batch().times(0);

        let engine = PolicyEngine::new(evaluator);
        for principal in ["", "unknown"] {
            let result = engine.check_command(
                principal,
                &argv(&["ls"]),
                &SudoSettings::default(),
                None,
                Path::new("/"),
            );
            assert_matches!(result, Err(PolicyError::UnknownPrincipal));
        }
    }

    #[test]
    fn unresolvable_command_is_an_error_after_allow() {
        let dir = tempdir().unwrap(); // empty: nothing resolvable
        let path_var = dir.path().display().to_string();

        let mut evaluator = MockAccessEvaluator::new();
        evaluator
            .expect_check_access()
            .returning(|_, _, _| Ok(Decision::Allowed));

        let engine = PolicyEngine::new(evaluator);
        let result = engine.check_command(
            "alice",
            &argv(&["vanished"]),
            &SudoSettings::default(),
            Some(&path_var),
            Path::new("/"),
        );
        assert_matches!(result, Err(PolicyError::CommandNotFound(_)));
    }

    #[test]
    fn per_query_mode_calls_evaluate_for_each_query() {
        let mut evaluator = MockAccessEvaluator::new();
        evaluator.expect_evaluate_access_batch().times(0);
        evaluator
            .expect_evaluate_access()
            .times(2)
            .returning(|_, asset, action| Ok(allowed(asset, action.unwrap())));

        let (dir, _) = path_dir_with("ls");
        let path_var = dir.path().display().to_string();
        let settings = SudoSettings {
            batch_evaluation: false,
            ..Default::default()
        };

        let engine = PolicyEngine::new(evaluator);
        let outcome = engine
            .check_command(
                "alice",
                &argv(&["ls", "-l"]),
                &settings,
                Some(&path_var),
                Path::new("/"),
            )
            .unwrap();
        assert_matches!(outcome, CheckOutcome::Accept { .. });
    }

    #[test]
    fn name_attribute_sends_the_basename() {
        let mut evaluator = MockAccessEvaluator::new();
        evaluator
            .expect_evaluate_access_batch()
            .withf(|_, queries| {
                queries[0].asset_id() == Some("cat")
                    && queries[1].action() == "cat"
            })
            .returning(|_, _| {
                Ok(BatchEvaluation {
                    results: vec![allowed("cat", "sudo"), allowed("/tmp/x", "cat")],
                    request_id: "req-1".to_string(),
                })
            });

        let settings = SudoSettings {
            command_attribute: CommandAttribute::Name,
            ..Default::default()
        };
        let engine = PolicyEngine::new(evaluator);
        let outcome = engine
            .check_command(
                "alice",
                &argv(&["/bin/cat", "/tmp/x"]),
                &settings,
                None,
                Path::new("/"),
            )
            .unwrap();
        // `/bin/cat` contains a slash: taken verbatim, no PATH involved.
        assert_matches!(outcome, CheckOutcome::Accept { command_info, .. } => {
            assert_eq!(command_info.entries()[0], "command=/bin/cat");
        });
    }

    #[test]
    fn access_message_can_be_disabled() {
        let (dir, _) = path_dir_with("ls");
        let path_var = dir.path().display().to_string();

        let mut evaluator = MockAccessEvaluator::new();
        evaluator
            .expect_check_access()
            .returning(|_, _, _| Ok(Decision::Allowed));

        let settings = SudoSettings {
            access_msg: false,
            ..Default::default()
        };
        let engine = PolicyEngine::new(evaluator);
        let outcome = engine
            .check_command("alice", &argv(&["ls"]), &settings, Some(&path_var), Path::new("/"))
            .unwrap();
        assert_matches!(outcome, CheckOutcome::Accept { access_message: None, .. });
    }

    #[test]
    fn client_failures_propagate_as_errors() {
        let mut evaluator = MockAccessEvaluator::new();
        evaluator
            .expect_check_access()
            .returning(|_, _, _| Err(ClientError::Auth("HTTP 401".to_string())));

        let engine = PolicyEngine::new(evaluator);
        let result = engine.check_command(
            "alice",
            &argv(&["ls"]),
            &SudoSettings::default(),
            None,
            Path::new("/"),
        );
        assert_matches!(result, Err(PolicyError::Client(ClientError::Auth(_))));
    }

    #[test]
    fn list_with_command_prints_a_verdict_line() {
        let mut evaluator = MockAccessEvaluator::new();
        evaluator
            .expect_check_access()
            .withf(|principal, asset, action| {
                *principal == *"alice" && *asset == *"cat" && *action == Some(EXECUTE_ACTION)
            })
            .returning(|_, _, _| Ok(Decision::Denied));

        let engine = PolicyEngine::new(evaluator);
        let lines = engine.list("alice", Some("cat")).unwrap();
        assert_eq!(lines, vec!["cat: denied"]);
    }

    #[test]
    fn list_without_command_searches_assets() {
        let mut evaluator = MockAccessEvaluator::new();
        evaluator
            .expect_search_assets()
            .withf(|principal, action| {
                *principal == *"alice" && *action == Some(EXECUTE_ACTION)
            })
            .returning(|_, _| {
                Ok(SearchResult {
                    assets: vec!["ls".to_string(), "whoami".to_string()],
                    request_id: "req-1".to_string(),
                })
            });

        let engine = PolicyEngine::new(evaluator);
        let lines = engine.list("alice", None).unwrap();
        assert_eq!(lines, vec!["ls", "whoami"]);
    }
}
