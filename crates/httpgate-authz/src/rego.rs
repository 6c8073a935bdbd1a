//! Embedded OPA/Rego evaluation.
//!
//! [`RegoEnforcer`] compiles a set of Rego policies and JSON data documents
//! into a `regorus` engine once, then evaluates the configured query against
//! each [`PolicyInput`] supplied as `input`.
//!
//! | Query result                          | Decision                   |
//! |---------------------------------------|----------------------------|
//! | no results (rule undefined)           | `false`                    |
//! | first expression is a boolean         | that boolean               |
//! | first expression is anything else     | `PolicyError::InvalidResult` |
//! | engine error                          | `PolicyError::Evaluation`  |

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use httpgate_core::{BoxFuture, PolicyEnforcer, PolicyError, PolicyInput};
use regorus::Engine;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::RegoConfig;
use crate::error::{AuthzError, AuthzResult};

/// Policy enforcer backed by an embedded Rego engine.
#[derive(Debug, Clone)]
pub struct RegoEnforcer {
    engine: Engine,
    query: String,
}

impl RegoEnforcer {
    /// Creates an enforcer with no policies loaded.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            engine: Engine::new(),
            query: query.into(),
        }
    }

    /// Loads every policy and data file named by `config`.
    pub fn from_config(config: &RegoConfig) -> AuthzResult<Self> {
        config.validate()?;

        let mut enforcer = Self::new(config.query.trim());
        enforcer
            .engine
            .set_strict_builtin_errors(config.strict_builtin_errors);

        let mut policies = Vec::new();
        let mut documents = Vec::new();
        collect_files(&config.policies_path, &mut policies, &mut documents)?;
        if policies.is_empty() {
            return Err(AuthzError::policy_load(
                &config.policies_path,
                "no .rego files found",
            ));
        }
        documents.extend(config.data_files.iter().cloned());

        for path in &policies {
            let source = fs::read_to_string(path)
                .map_err(|e| AuthzError::policy_load(path, e.to_string()))?;
            enforcer.add_policy(&path.display().to_string(), &source)?;
        }
        for path in &documents {
            enforcer.add_data_file(path)?;
        }

        info!(
            query = %enforcer.query,
            policies = policies.len(),
            documents = documents.len(),
            "rego enforcer ready"
        );
        Ok(enforcer)
    }

    /// Adds a policy from source.
    pub fn add_policy(&mut self, name: &str, source: &str) -> AuthzResult<()> {
        self.engine
            .add_policy(name.to_string(), source.to_string())
            .map_err(|e| AuthzError::InvalidPolicy(format!("{name}: {e}")))?;
        Ok(())
    }

    /// Merges a data document into `data`.
    pub fn add_data(&mut self, data: Value) -> AuthzResult<()> {
        if !data.is_object() {
            return Err(AuthzError::InvalidPolicy(
                "data document must be a JSON object".to_string(),
            ));
        }
        self.engine
            .add_data(data.into())
            .map_err(|e| AuthzError::InvalidPolicy(format!("failed to add data: {e}")))?;
        Ok(())
    }

    /// Reads and merges a JSON data file.
    pub fn add_data_file(&mut self, path: &Path) -> AuthzResult<()> {
        let content =
            fs::read_to_string(path).map_err(|e| AuthzError::policy_load(path, e.to_string()))?;
        let data: Value = serde_json::from_str(&content)
            .map_err(|e| AuthzError::policy_load(path, e.to_string()))?;
        self.add_data(data)
    }

    /// The decision query.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Evaluates the query for `input`.
    pub fn evaluate(&self, input: &PolicyInput) -> Result<bool, PolicyError> {
        let start = Instant::now();
        let input_json = serde_json::to_value(input)
            .map_err(|e| PolicyError::Evaluation(format!("failed to serialize input: {e}")))?;

        // set_input mutates the engine; evaluate on a per-call copy.
        let mut engine = self.engine.clone();
        engine.set_input(input_json.into());
        let results = engine
            .eval_query(self.query.clone(), false)
            .map_err(|e| PolicyError::Evaluation(e.to_string()))?;

        let decision = match results
            .result
            .first()
            .and_then(|result| result.expressions.first())
        {
            None => false,
            Some(expr) => match &expr.value {
                regorus::Value::Bool(allowed) => *allowed,
                other => return Err(PolicyError::InvalidResult(format!("{other:?}"))),
            },
        };

        debug!(
            query = %self.query,
            action = %input.action,
            allowed = decision,
            elapsed_us = start.elapsed().as_micros(),
            "rego decision"
        );
        Ok(decision)
    }
}

impl PolicyEnforcer for RegoEnforcer {
    fn is_allowed<'a>(&'a self, input: &'a PolicyInput) -> BoxFuture<'a, Result<bool, PolicyError>> {
        Box::pin(async move { self.evaluate(input) })
    }
}

/// Sorted walk of `root`, splitting `.rego` sources from `.json` documents.
fn collect_files(root: &Path, policies: &mut Vec<PathBuf>, documents: &mut Vec<PathBuf>) -> AuthzResult<()> {
    if root.is_file() {
        classify(root.to_path_buf(), policies, documents);
        return Ok(());
    }
    if !root.is_dir() {
        return Err(AuthzError::policy_load(root, "no such file or directory"));
    }

    let mut entries = fs::read_dir(root)
        .map_err(|e| AuthzError::policy_load(root, e.to_string()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_files(&path, policies, documents)?;
        } else {
            classify(path, policies, documents);
        }
    }
    Ok(())
}

fn classify(path: PathBuf, policies: &mut Vec<PathBuf>, documents: &mut Vec<PathBuf>) {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("rego") => policies.push(path),
        Some("json") => documents.push(path),
        _ => {}
    }
}
