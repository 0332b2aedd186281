//! What the validators conclude about a scenario.
//!
//! Each validator opens an [`Audit`], notes violations (Juju could never
//! produce this) and cautions (legal, but probably not what the test meant),
//! then closes it with a verdict. Verdicts from every validator are merged
//! into one [`ConsistencyReport`].

use std::fmt;

/// How bad a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Nothing wrong.
    Pass,
    /// Juju could produce this, but it is probably not what the test meant.
    Warning,
    /// Juju could never produce this scenario.
    Failure,
}

/// One conclusion of one validator.
#[derive(Debug, Clone)]
pub struct Finding {
    /// Validator that reached it, e.g. `relations`.
    pub validator: String,
    /// One-line summary.
    pub message: String,
    /// Severity.
    pub severity: Severity,
    /// Offending components, one per line.
    pub details: Vec<String>,
}

impl Finding {
    /// Whether the scenario must be refused because of this finding.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Failure
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.validator, self.message)?;
        for detail in &self.details {
            write!(f, "\n    {detail}")?;
        }
        Ok(())
    }
}

/// Violations and cautions one validator collects while it walks a scenario.
#[derive(Debug)]
pub struct Audit {
    validator: &'static str,
    violations: Vec<String>,
    cautions: Vec<String>,
}

impl Audit {
    /// Starts an audit for `validator`.
    #[must_use]
    pub fn new(validator: &'static str) -> Self {
        Self {
            validator,
            violations: Vec::new(),
            cautions: Vec::new(),
        }
    }

    /// Notes something Juju could never produce.
    pub fn violation(&mut self, detail: impl Into<String>) {
        self.violations.push(detail.into());
    }

    /// Notes something suspicious that Juju could still produce.
    pub fn caution(&mut self, message: impl Into<String>) {
        self.cautions.push(message.into());
    }

    /// Closes the audit. With no violations the verdict is a pass reading
    /// `consistent`; otherwise one failure reading `inconsistent` lists them
    /// all. Each caution becomes its own warning, ahead of the verdict.
    #[must_use]
    pub fn verdict(
        self,
        consistent: impl Into<String>,
        inconsistent: impl Into<String>,
    ) -> ConsistencyReport {
        let validator = self.validator;
        let mut findings: Vec<Finding> = self
            .cautions
            .into_iter()
            .map(|message| Finding {
                validator: validator.to_string(),
                message,
                severity: Severity::Warning,
                details: Vec::new(),
            })
            .collect();
        findings.push(if self.violations.is_empty() {
            Finding {
                validator: validator.to_string(),
                message: consistent.into(),
                severity: Severity::Pass,
                details: Vec::new(),
            }
        } else {
            Finding {
                validator: validator.to_string(),
                message: inconsistent.into(),
                severity: Severity::Failure,
                details: self.violations,
            }
        });
        ConsistencyReport { findings }
    }
}

/// Findings of every validator, in the order they ran.
#[derive(Debug, Default)]
pub struct ConsistencyReport {
    /// All findings.
    pub findings: Vec<Finding>,
}

impl ConsistencyReport {
    /// An empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends another validator's verdict.
    pub fn extend(&mut self, other: ConsistencyReport) {
        self.findings.extend(other.findings);
    }

    /// Number of failures.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Whether nothing failed; warnings do not count.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failure_count() == 0
    }

    /// The failures.
    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_failure())
    }

    /// The warnings.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }
}
