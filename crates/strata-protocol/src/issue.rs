use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Exit code when validation found no errors or warnings.
pub const EXIT_OK: i32 = 0;
/// Exit code when at least one error was reported.
pub const EXIT_ERRORS: i32 = 1;
/// Exit code when only warnings were reported.
pub const EXIT_WARNINGS: i32 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Which part of the system raised an issue.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueDomain {
    Dependency,
    Structural,
    Composition,
    Infrastructure,
    #[default]
    Custom,
}

/// One diagnostic. `code` is stable and meant for tooling to match on.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct Issue {
    pub code: String,
    pub message: String,
    /// JSON-pointer style location; empty for the document root.
    #[serde(default)]
    pub path: String,
    pub severity: Severity,
    #[serde(default)]
    pub domain: IssueDomain,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl Issue {
    pub fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: String::new(),
            severity,
            domain: IssueDomain::default(),
            source: String::new(),
            file: None,
            hint: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn in_domain(mut self, domain: IssueDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ValidationSummary {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

impl ValidationSummary {
    fn count(issues: &[Issue]) -> Self {
        let mut summary = ValidationSummary::default();
        for issue in issues {
            match issue.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.info += 1,
            }
        }
        summary
    }
}

/// Aggregated outcome of one or more validation passes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<Issue>,
    pub summary: ValidationSummary,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
            summary: ValidationSummary::default(),
        }
    }

    /// Build a result; it is valid exactly when no issue has error severity.
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let summary = ValidationSummary::count(&issues);
        Self {
            valid: summary.errors == 0,
            issues,
            summary,
        }
    }

    pub fn single(issue: Issue) -> Self {
        Self::from_issues(vec![issue])
    }

    /// Concatenate two results, keeping issue order.
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.issues.extend(other.issues);
        Self::from_issues(self.issues)
    }

    pub fn aggregate(results: impl IntoIterator<Item = ValidationResult>) -> Self {
        results
            .into_iter()
            .fold(ValidationResult::ok(), ValidationResult::merge)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    /// CI mapping: errors → 1, warnings only → 2, otherwise 0.
    pub fn exit_code(&self) -> i32 {
        if self.summary.errors > 0 {
            EXIT_ERRORS
        } else if self.summary.warnings > 0 {
            EXIT_WARNINGS
        } else {
            EXIT_OK
        }
    }
}
