//! Applying fixes to module sources
//!
//! Fixes are classified as safe or unsafe:
//! - Safe fixes preserve code meaning and can be applied automatically
//! - Unsafe fixes may change behavior and require explicit opt-in
//! - Display fixes are only ever shown
//!
//! All fixes accepted for a module are applied in a single pass. A fix computed against a
//! different source, or conflicting with a fix accepted before it, is rejected.

use crate::diagnostic::FixSafety;
use crate::engine::ProjectReport;
use crate::fix::{apply_edits, fingerprint, Edit, Fix, FixRejection};
use crate::project::Project;
use crate::syntax::{ModuleName, Range};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A fix waiting to be applied to a module
#[derive(Debug, Clone)]
pub struct PendingFix {
    pub module: ModuleName,
    /// Rule that generated this fix
    pub rule_name: String,
    /// Range of the diagnostic carrying the fix
    pub range: Range,
    pub message: String,
    pub fix: Fix,
}

/// Result of applying fixes
#[derive(Debug, Default)]
pub struct FixResult {
    /// Number of modules modified
    pub modules_modified: usize,
    /// Number of fixes applied
    pub fixes_applied: usize,
    /// Number of safe fixes applied
    pub safe_fixes_applied: usize,
    /// Number of unsafe fixes applied
    pub unsafe_fixes_applied: usize,
    /// Number of fixes rejected (stale, conflicting or out of range)
    pub fixes_rejected: usize,
    /// Number of fixes skipped by the fix mode
    pub fixes_skipped: usize,
    /// Errors encountered
    pub errors: Vec<String>,
    /// Diff output (diff mode only)
    pub diffs: BTreeMap<ModuleName, String>,
    /// Fixed source of every modified module
    pub sources: BTreeMap<ModuleName, String>,
}

impl FixResult {
    pub fn fixed_source(&self, module: &ModuleName) -> Option<&str> {
        self.sources.get(module).map(String::as_str)
    }
}

/// Fix mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixMode {
    /// Apply only safe fixes (default)
    #[default]
    SafeOnly,
    /// Apply all fixes including unsafe
    All,
    /// Apply safe fixes and record a diff per module
    Diff,
    /// Show fixes without applying
    ShowOnly,
}

/// Collects fixes from reports and applies them to in-memory sources
#[derive(Debug, Default)]
pub struct Fixer {
    fixes_by_module: BTreeMap<ModuleName, Vec<PendingFix>>,
    mode: FixMode,
}

impl Fixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fix mode
    pub fn with_mode(mut self, mode: FixMode) -> Self {
        self.mode = mode;
        self
    }

    /// Collect the fixes kept on a report's module diagnostics
    pub fn collect_from_report(&mut self, report: &ProjectReport) {
        for (module, diagnostics) in &report.modules {
            for diag in diagnostics {
                if let Some(fix) = &diag.fix {
                    self.add_fix(PendingFix {
                        module: module.clone(),
                        rule_name: diag.rule_name.clone(),
                        range: diag.range,
                        message: diag.message.clone(),
                        fix: fix.clone(),
                    });
                }
            }
        }
    }

    /// Add a fix manually
    pub fn add_fix(&mut self, fix: PendingFix) {
        self.fixes_by_module
            .entry(fix.module.clone())
            .or_default()
            .push(fix);
    }

    fn should_apply_fix(&self, fix: &Fix) -> bool {
        match (self.mode, fix.safety) {
            (_, FixSafety::Display) => false,
            (FixMode::All, _) => true,
            (_, safety) => safety == FixSafety::Safe,
        }
    }

    /// Apply all collected fixes to the sources of `project`
    pub fn apply_all(&self, project: &Project) -> FixResult {
        let mut result = FixResult::default();

        for (name, fixes) in &self.fixes_by_module {
            let applicable: Vec<&PendingFix> = fixes
                .iter()
                .filter(|pending| self.should_apply_fix(&pending.fix))
                .collect();
            result.fixes_skipped += fixes.len() - applicable.len();

            if self.mode == FixMode::ShowOnly {
                continue;
            }

            let Some(module) = project.module(name) else {
                result.fixes_rejected += applicable.len();
                result.errors.push(format!("{}: module is not part of the project", name));
                continue;
            };

            let source = module.source.as_str();
            let accepted = accept_fixes(name, source, &applicable, &mut result);
            if accepted.is_empty() {
                continue;
            }

            let edits: Vec<Edit> = accepted
                .iter()
                .flat_map(|pending| pending.fix.edits.iter().cloned())
                .collect();

            match apply_edits(source, &edits) {
                Ok(fixed) if fixed == source => {
                    result.fixes_rejected += accepted.len();
                    result.errors.push(format!("{}: {}", name, FixRejection::Unchanged));
                }
                Ok(fixed) => {
                    debug!("Applied {} fix(es) to {}", accepted.len(), name);
                    result.modules_modified += 1;
                    result.fixes_applied += accepted.len();
                    for pending in &accepted {
                        if pending.fix.is_safe() {
                            result.safe_fixes_applied += 1;
                        } else {
                            result.unsafe_fixes_applied += 1;
                        }
                    }
                    if self.mode == FixMode::Diff {
                        result
                            .diffs
                            .insert(name.clone(), generate_unified_diff(name, source, &fixed));
                    }
                    result.sources.insert(name.clone(), fixed);
                }
                Err(e) => {
                    result.fixes_rejected += accepted.len();
                    result.errors.push(format!("{}: {}", name, e));
                }
            }
        }

        result
    }

    /// Get all fixes that would be applied
    pub fn get_pending_fixes(&self) -> Vec<&PendingFix> {
        let mut all_fixes: Vec<&PendingFix> = self
            .fixes_by_module
            .values()
            .flatten()
            .filter(|pending| self.should_apply_fix(&pending.fix))
            .collect();
        all_fixes.sort_by(|a, b| a.module.cmp(&b.module).then(a.range.cmp(&b.range)));
        all_fixes
    }

    /// Format pending fixes for display
    pub fn format_fixes(&self) -> String {
        let fixes = self.get_pending_fixes();
        if fixes.is_empty() {
            return "No fixes available.\n".to_string();
        }

        let mut output = format!("Found {} fix(es):\n\n", fixes.len());
        let mut current_module: Option<&ModuleName> = None;
        for pending in fixes {
            if current_module != Some(&pending.module) {
                current_module = Some(&pending.module);
                output.push_str(&format!("{}:\n", pending.module));
            }
            output.push_str(&format!(
                "  {}: [{}] {} - {}\n",
                pending.range.start, pending.fix.safety, pending.rule_name, pending.message
            ));
        }
        output
    }

    /// Get count of fixes pending
    pub fn pending_count(&self) -> usize {
        self.fixes_by_module.values().map(Vec::len).sum()
    }

    /// Get the current fix mode
    pub fn mode(&self) -> FixMode {
        self.mode
    }

    /// Format diff output for display
    pub fn format_diffs(&self, result: &FixResult) -> String {
        let mut output = String::new();
        for (module, diff) in &result.diffs {
            output.push_str(&format!("diff --grove a/{} b/{}\n", module, module));
            output.push_str(diff);
            output.push('\n');
        }
        output
    }
}

/// Fixes of one module that can be applied together, in collection order
fn accept_fixes<'f>(
    module: &ModuleName,
    source: &str,
    fixes: &[&'f PendingFix],
    result: &mut FixResult,
) -> Vec<&'f PendingFix> {
    let current = fingerprint(source);
    let mut accepted: Vec<&PendingFix> = Vec::new();

    for &pending in fixes {
        let rejection = if pending.fix.source_fingerprint.is_some_and(|f| f != current) {
            Some(FixRejection::SourceChanged)
        } else if let Some((first, second)) = pending.fix.first_overlap() {
            Some(FixRejection::Overlapping {
                first: first.range,
                second: second.range,
            })
        } else {
            accepted
                .iter()
                .find(|other| other.fix.conflicts_with(&pending.fix))
                .map(|other| FixRejection::Overlapping {
                    first: other.range,
                    second: pending.range,
                })
        };

        match rejection {
            Some(rejection) => {
                warn!("Rejected fix of `{}` in {}: {}", pending.rule_name, module, rejection);
                result.fixes_rejected += 1;
                result
                    .errors
                    .push(format!("{}: {} ({})", module, rejection, pending.rule_name));
            }
            None => accepted.push(pending),
        }
    }
    accepted
}

/// Generate a unified diff with a single hunk around the changed lines
fn generate_unified_diff(module: &ModuleName, original: &str, modified: &str) -> String {
    const CONTEXT: usize = 3;

    let old: Vec<&str> = original.lines().collect();
    let new: Vec<&str> = modified.lines().collect();

    let mut diff = format!("--- a/{}\n+++ b/{}\n", module, module);

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    if prefix == old.len() && prefix == new.len() {
        return diff;
    }
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(old.len().min(new.len()) - prefix)
        .take_while(|(a, b)| a == b)
        .count();

    let start = prefix.saturating_sub(CONTEXT);
    let old_changed_end = old.len() - suffix;
    let new_changed_end = new.len() - suffix;
    let old_end = (old_changed_end + CONTEXT).min(old.len());
    let new_end = (new_changed_end + CONTEXT).min(new.len());

    diff.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        start + 1,
        old_end - start,
        start + 1,
        new_end - start
    ));

    let hunk = old[start..prefix]
        .iter()
        .map(|line| format!(" {}", line))
        .chain(old[prefix..old_changed_end].iter().map(|line| format!("-{}", line)))
        .chain(new[prefix..new_changed_end].iter().map(|line| format!("+{}", line)))
        .chain(old[old_changed_end..old_end].iter().map(|line| format!(" {}", line)));
    for line in hunk {
        diff.push_str(&line);
        diff.push('\n');
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_module;

    const SOURCE: &str = "module Main exposing (..)\n\nmain =\n    x == True\n";

    fn project() -> Project {
        Project::from_modules(vec![parse_module(SOURCE).unwrap()]).unwrap()
    }

    fn pending(rule: &str, range: Range, replacement: &str, safety: FixSafety) -> PendingFix {
        PendingFix {
            module: ModuleName::from("Main"),
            rule_name: rule.to_string(),
            range,
            message: "simplify".to_string(),
            fix: Fix::new(vec![Edit::replace(range, replacement)])
                .with_safety(safety)
                .against(SOURCE),
        }
    }

    #[test]
    fn test_fixer_new() {
        let fixer = Fixer::new();
        assert_eq!(fixer.mode(), FixMode::SafeOnly);
        assert_eq!(fixer.pending_count(), 0);
        assert_eq!(fixer.format_fixes(), "No fixes available.\n");
    }

    #[test]
    fn test_safe_fix_is_applied() {
        let mut fixer = Fixer::new();
        fixer.add_fix(pending("simplify", Range::from_coords(4, 5, 4, 14), "x", FixSafety::Safe));

        let result = fixer.apply_all(&project());
        assert_eq!(result.fixes_applied, 1);
        assert_eq!(result.safe_fixes_applied, 1);
        assert_eq!(result.modules_modified, 1);
        assert_eq!(
            result.fixed_source(&ModuleName::from("Main")),
            Some("module Main exposing (..)\n\nmain =\n    x\n")
        );
    }

    #[test]
    fn test_unsafe_fix_requires_all_mode() {
        let fix = pending("risky", Range::from_coords(4, 5, 4, 6), "y", FixSafety::Unsafe);

        let mut safe_only = Fixer::new();
        safe_only.add_fix(fix.clone());
        let result = safe_only.apply_all(&project());
        assert_eq!(result.fixes_applied, 0);
        assert_eq!(result.fixes_skipped, 1);

        let mut all = Fixer::new().with_mode(FixMode::All);
        all.add_fix(fix);
        let result = all.apply_all(&project());
        assert_eq!(result.unsafe_fixes_applied, 1);
    }

    #[test]
    fn test_display_fix_is_never_applied() {
        let mut fixer = Fixer::new().with_mode(FixMode::All);
        fixer.add_fix(pending("hint", Range::from_coords(4, 5, 4, 6), "y", FixSafety::Display));
        let result = fixer.apply_all(&project());
        assert_eq!(result.fixes_applied, 0);
        assert_eq!(result.fixes_skipped, 1);
    }

    #[test]
    fn test_conflicting_fix_is_rejected() {
        let mut fixer = Fixer::new();
        fixer.add_fix(pending("first", Range::from_coords(4, 5, 4, 14), "x", FixSafety::Safe));
        fixer.add_fix(pending(
            "second",
            Range::from_coords(4, 10, 4, 14),
            "False",
            FixSafety::Safe,
        ));

        let result = fixer.apply_all(&project());
        assert_eq!(result.fixes_applied, 1);
        assert_eq!(result.fixes_rejected, 1);
        assert!(result.errors[0].contains("second"));
    }

    #[test]
    fn test_stale_fix_is_rejected() {
        let mut stale = pending("simplify", Range::from_coords(4, 5, 4, 14), "x", FixSafety::Safe);
        stale.fix = stale.fix.against("module Main exposing (..)\n");

        let mut fixer = Fixer::new();
        fixer.add_fix(stale);
        let result = fixer.apply_all(&project());
        assert_eq!(result.fixes_applied, 0);
        assert_eq!(result.fixes_rejected, 1);
    }

    #[test]
    fn test_diff_mode() {
        let mut fixer = Fixer::new().with_mode(FixMode::Diff);
        fixer.add_fix(pending("simplify", Range::from_coords(4, 5, 4, 14), "x", FixSafety::Safe));

        let result = fixer.apply_all(&project());
        let diff = &result.diffs[&ModuleName::from("Main")];
        assert!(diff.starts_with("--- a/Main\n+++ b/Main\n"));
        assert!(diff.contains("@@ -1,4 +1,4 @@"));
        assert!(diff.contains("-    x == True\n"));
        assert!(diff.contains("+    x\n"));
        assert!(fixer.format_diffs(&result).starts_with("diff --grove a/Main b/Main\n"));
    }

    #[test]
    fn test_show_only_mode_lists_without_applying() {
        let mut fixer = Fixer::new().with_mode(FixMode::ShowOnly);
        fixer.add_fix(pending("simplify", Range::from_coords(4, 5, 4, 14), "x", FixSafety::Safe));

        let result = fixer.apply_all(&project());
        assert!(result.sources.is_empty());
        let listing = fixer.format_fixes();
        assert!(listing.contains("Found 1 fix(es)"));
        assert!(listing.contains("Main:\n"));
        assert!(listing.contains("[safe] simplify - simplify"));
    }
}
