//! Rulegate Root Library
//!
//! Orchestration for the `rulegate` binary: load a policy document named by
//! the configuration, evaluate or enforce one of its policies against a
//! context, and describe what a policy contains.

pub mod config;
pub mod error;

pub use config::{EnforcementConfig, LoggingConfig, RootConfig};
pub use error::{RootError, RootResult};

use rulegate_core::{Context, Decision};
use rulegate_policy::{
    combine_rules, enforce_decision, evaluate_traced, Enforcer, PolicyDocument, PolicySpec, Rule,
    TracingAuditSink, Verdict,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read a policy document from disk. `.json` files are parsed as JSON,
/// anything else as TOML. The document is validated before it is returned.
pub fn load_policy_file(path: &Path) -> RootResult<PolicyDocument> {
    let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let document = if is_json {
        PolicyDocument::from_json_str(&contents)?
    } else {
        PolicyDocument::from_toml_str(&contents)?
    };
    document.validate()?;
    info!(path = %path.display(), policies = document.policies.len(), "policy file loaded");
    Ok(document)
}

/// Load the document at `config.policy_path`.
pub fn load_policies(config: &RootConfig) -> RootResult<PolicyDocument> {
    load_policy_file(&config.policy_path)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// One policy compiled for repeated use: its top-level members, for
/// tracing which one decided, and the chained rule they form.
#[derive(Clone)]
pub struct CompiledPolicy {
    rule: Rule<Context>,
    members: Vec<Rule<Context>>,
}

impl CompiledPolicy {
    pub fn compile(document: &PolicyDocument, name: &str) -> RootResult<Self> {
        let members = document.compile_members(name)?;
        let rule = combine_rules(members.iter().cloned()).relabel(name);
        Ok(Self { rule, members })
    }

    /// The chained rule, labelled with the policy name.
    pub fn rule(&self) -> &Rule<Context> {
        &self.rule
    }

    pub fn members(&self) -> &[Rule<Context>] {
        &self.members
    }

    /// Evaluate against `context`, reporting which top-level rule decided.
    pub fn evaluate(&self, context: &Context) -> Verdict {
        evaluate_traced(&self.members, context)
    }

    /// Enforce a verdict this policy produced on `context`: Ok only for an
    /// explicit Allow. Nothing is evaluated again.
    ///
    /// With `audit` set, the decision is first recorded through the tracing
    /// audit sink.
    pub fn enforce(&self, verdict: &Verdict, context: &Context, audit: bool) -> RootResult<Decision> {
        let outcome = if audit {
            let sink = TracingAuditSink;
            Enforcer::new(&sink).enforce_decision(&self.rule, context, verdict.decision)?
        } else {
            enforce_decision(&self.rule, context, verdict.decision)
        };
        Ok(outcome?)
    }
}

/// Evaluate policy `name` against `context`, reporting which top-level rule
/// of the policy decided.
pub fn evaluate(document: &PolicyDocument, name: &str, context: &Context) -> RootResult<Verdict> {
    Ok(CompiledPolicy::compile(document, name)?.evaluate(context))
}

/// Enforce policy `name` against `context`: Ok only for an explicit Allow.
///
/// With `audit` set, the decision is first recorded through the tracing
/// audit sink.
pub fn enforce_named(
    document: &PolicyDocument,
    name: &str,
    context: &Context,
    audit: bool,
) -> RootResult<Decision> {
    let policy = CompiledPolicy::compile(document, name)?;
    let verdict = policy.evaluate(context);
    policy.enforce(&verdict, context, audit)
}

// ---------------------------------------------------------------------------
// Description
// ---------------------------------------------------------------------------

/// Human-facing summary of one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Labels of the compiled top-level rules, in evaluation order.
    pub rules: Vec<String>,
}

pub fn explain(document: &PolicyDocument, name: &str) -> RootResult<PolicySummary> {
    let policy = CompiledPolicy::compile(document, name)?;
    let description = document
        .get(name)
        .and_then(|spec: &PolicySpec| spec.description.clone());
    Ok(PolicySummary {
        name: name.to_string(),
        description,
        rules: policy
            .members()
            .iter()
            .map(|rule| rule.label().to_string())
            .collect(),
    })
}
