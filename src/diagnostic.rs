//! Diagnostic types for rule results

use crate::fix::Fix;
use crate::syntax::{ModuleName, Range};
use serde::{Deserialize, Serialize};

/// Rule name used for imports that point at no known module
pub const UNRESOLVED_IMPORT: &str = "unresolved-import";

/// Severity level for diagnostics
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning - potential issue
    #[default]
    Warning,
    /// Error - definite problem
    Error,
}

/// Fix safety classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixSafety {
    /// Safe fix - preserves code meaning, can be applied automatically
    #[default]
    Safe,
    /// Unsafe fix - may change behavior, requires opt-in
    Unsafe,
    /// Display only - shown to user but not auto-applied
    Display,
}

impl std::fmt::Display for FixSafety {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixSafety::Safe => write!(f, "safe"),
            FixSafety::Unsafe => write!(f, "unsafe"),
            FixSafety::Display => write!(f, "display"),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(()),
        }
    }
}

/// Where a diagnostic came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Reported by a rule callback
    #[default]
    Rule,
    /// An import naming a module that is neither in the project nor a known dependency
    UnresolvedImport,
    /// A rule callback panicked
    RuleCrashed,
}

/// A diagnostic reported against a module or the project as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Name of the rule that produced this diagnostic
    pub rule_name: String,
    /// Module the diagnostic belongs to, `None` for project-level findings
    pub module: Option<ModuleName>,
    /// Severity level
    pub severity: Severity,
    #[serde(default)]
    pub kind: DiagnosticKind,
    /// Human-readable message
    pub message: String,
    /// Additional explanation, one paragraph per entry
    #[serde(default)]
    pub details: Vec<String>,
    /// Source range in the module
    pub range: Range,
    /// Suggested fix
    pub fix: Option<Fix>,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(rule_name: &str, severity: Severity, message: &str, range: Range) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            module: None,
            severity,
            kind: DiagnosticKind::Rule,
            message: message.to_string(),
            details: Vec::new(),
            range,
            fix: None,
        }
    }

    /// Diagnostic for an import whose target cannot be found
    pub fn unresolved_import(module: &ModuleName, imported: &ModuleName, range: Range) -> Self {
        Self::new(
            UNRESOLVED_IMPORT,
            Severity::Error,
            &format!("Could not find module `{}`", imported),
            range,
        )
        .in_module(module.clone())
        .with_kind(DiagnosticKind::UnresolvedImport)
        .with_detail(&format!(
            "`{}` is not part of the project and no dependency exposes it. \
             References through this import are left unresolved.",
            imported
        ))
    }

    /// Diagnostic for a rule that panicked while analysing a module (or the whole project)
    pub fn rule_crashed(rule_name: &str, module: Option<&ModuleName>, reason: &str) -> Self {
        let message = match module {
            Some(module) => format!("Rule `{}` crashed while analysing `{}`", rule_name, module),
            None => format!("Rule `{}` crashed during its project evaluation", rule_name),
        };
        let mut diag = Self::new(rule_name, Severity::Error, &message, Range::EMPTY)
            .with_kind(DiagnosticKind::RuleCrashed)
            .with_detail(reason);
        diag.module = module.cloned();
        diag
    }

    /// Attribute the diagnostic to a module
    pub fn in_module(mut self, module: ModuleName) -> Self {
        self.module = Some(module);
        self
    }

    pub fn with_kind(mut self, kind: DiagnosticKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add a paragraph of details
    pub fn with_detail(mut self, detail: &str) -> Self {
        self.details.push(detail.to_string());
        self
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details.extend(details);
        self
    }

    /// Add a suggested fix
    pub fn with_fix(mut self, fix: Fix) -> Self {
        self.fix = Some(fix);
        self
    }

    /// Check if this diagnostic has a fix
    pub fn has_fix(&self) -> bool {
        self.fix.is_some()
    }

    /// Check if this diagnostic has a safe fix
    pub fn has_safe_fix(&self) -> bool {
        self.fix.as_ref().is_some_and(|f| f.is_safe())
    }

    /// Check if this is a project-level diagnostic
    pub fn is_project_level(&self) -> bool {
        self.module.is_none()
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this is a warning
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}
