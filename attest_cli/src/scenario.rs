//! Scenario files: a scripted sequence of broker commands.
//!
//! ```toml
//! [[step]]
//! verb = "insert-image"
//! args = ["img1"]
//!
//! [[step]]
//! verb = "attestAppProperty"   # legacy route names work too
//! args = ["10.0.0.2:9000", "cap-x"]
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::Context;
use attest_core::{Broker, Outcome, Verb};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub verb: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// One executed step and what the broker answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub verb: String,
    pub outcome: Outcome,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.verb, self.outcome.status)?;
        if let Some(message) = &self.outcome.message {
            write!(f, " {}", message)?;
        }
        Ok(())
    }
}

impl Scenario {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("invalid scenario")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Run every step against `broker` in order.
    ///
    /// An unknown verb is reported like any other rejected request and does
    /// not stop the run.
    pub fn run(&self, broker: &Broker) -> Vec<StepReport> {
        self.steps
            .iter()
            .map(|step| {
                debug!(verb = %step.verb, args = ?step.args, "running step");
                let outcome = match step.verb.parse::<Verb>() {
                    Ok(verb) => broker.dispatch(verb, step.args.as_slice()),
                    Err(err) => Outcome::from(err),
                };
                StepReport {
                    verb: step.verb.clone(),
                    outcome,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::{Status, PROPERTY_TOKEN};

    const SCENARIO: &str = r#"
        [[step]]
        verb = "insert-image"
        args = ["img1"]

        [[step]]
        verb = "postImageProperty"
        args = ["img1", "cap-x"]

        [[step]]
        verb = "insert-principal"
        args = ["p1", "img1", "", "10.0.0.2:9000-9000", "cfg"]

        [[step]]
        verb = "check-has-property"
        args = ["10.0.0.2:9000", "cap-x"]

        [[step]]
        verb = "launch-missiles"
    "#;

    #[test]
    fn test_run_scenario() {
        let scenario = Scenario::from_toml_str(SCENARIO).unwrap();
        assert_eq!(scenario.steps.len(), 5);

        let reports = scenario.run(&Broker::default());
        let statuses: Vec<_> = reports.iter().map(|r| r.outcome.status).collect();
        assert_eq!(
            statuses,
            vec![Status::Ok, Status::Ok, Status::Ok, Status::Ok, Status::BadRequest]
        );
        assert_eq!(reports[3].outcome.message.as_deref(), Some(PROPERTY_TOKEN));
    }

    #[test]
    fn test_report_display() {
        let report = StepReport {
            verb: "insert-principal".into(),
            outcome: Outcome::ok_with("['p1']"),
        };
        assert_eq!(report.to_string(), "insert-principal -> OK ['p1']");

        let report = StepReport {
            verb: "remove-principal".into(),
            outcome: Outcome::ok(),
        };
        assert_eq!(report.to_string(), "remove-principal -> OK");
    }

    #[test]
    fn test_empty_scenario() {
        let scenario = Scenario::from_toml_str("").unwrap();
        assert!(scenario.run(&Broker::default()).is_empty());
    }

    #[test]
    fn test_reject_unknown_fields() {
        assert!(Scenario::from_toml_str("[[step]]\nverb = \"x\"\nargz = []").is_err());
    }
}
