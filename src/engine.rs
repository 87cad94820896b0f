//! Project rule engine
//!
//! A run goes through these steps:
//! 1. Build the import graph and its topological order (a cycle aborts the run)
//! 2. Resolve the scope of every module once, shared by all rules
//! 3. Run each rule in registration order: module rules visit modules independently,
//!    project rules fold their project context through the import graph
//! 4. Turn rule errors into diagnostics and drop fixes that conflict with earlier ones

use crate::cache::{hash_config, module_fingerprints, AnalysisCache};
use crate::config::Config;
use crate::diagnostic::{Diagnostic, DiagnosticKind, Severity, UNRESOLVED_IMPORT};
use crate::fix::Fix;
use crate::graph::ImportGraph;
use crate::project::Project;
use crate::rule::{
    check_module_isolated, ErrorTarget, ModuleRunner, ProjectOutcome, Rule, RuleError, RuleKind,
};
use crate::scope::{core_modules, ExposedNames, ModuleScope, ScopeResolver};
use crate::syntax::{Module, ModuleName, Range};
use crate::visitor::ModuleEnv;
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that make a project impossible to analyse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("Import cycle detected: {}", join_names(.0))]
    Cycle(Vec<ModuleName>),

    #[error("Module `{0}` is defined more than once")]
    DuplicateModule(ModuleName),
}

fn join_names(cycle: &[ModuleName]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Per-rule timing statistics
#[derive(Debug, Clone, Default)]
pub struct RuleTiming {
    pub rule_name: String,
    /// Total time spent on this rule
    pub total_time: Duration,
    /// Number of modules visited (cache hits excluded)
    pub evaluation_count: usize,
    /// Number of diagnostics reported
    pub match_count: usize,
}

impl RuleTiming {
    pub fn new(rule_name: &str) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            ..Default::default()
        }
    }

    /// Average time per evaluation
    pub fn avg_time(&self) -> Duration {
        if self.evaluation_count > 0 {
            self.total_time / self.evaluation_count as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Result of a project run
#[derive(Debug, Default)]
pub struct ProjectReport {
    /// Diagnostics of every analysed module, sorted by range
    pub modules: BTreeMap<ModuleName, Vec<Diagnostic>>,

    /// Project-level diagnostics
    pub project: Vec<Diagnostic>,

    pub modules_analyzed: usize,

    pub error_count: usize,

    pub warning_count: usize,

    pub info_count: usize,

    /// Fixes removed because they conflicted with a fix accepted before them
    pub fixes_dropped: usize,

    /// Processing duration
    pub duration: Duration,

    /// Per-rule timing statistics (rule name -> timing)
    pub rule_timings: HashMap<String, RuleTiming>,

    pub cache_hits: usize,

    pub cache_misses: usize,
}

impl ProjectReport {
    /// Diagnostics of one module, empty if the module is unknown
    pub fn diagnostics_for(&self, module: &ModuleName) -> &[Diagnostic] {
        self.modules.get(module).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Module diagnostics by module name, then project-level ones
    pub fn all_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.modules.values().flatten().chain(&self.project)
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    /// Check if result is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        self.error_count == 0 && self.warning_count == 0
    }

    /// Get exit code (0 = success, 1 = warnings, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        if self.error_count > 0 {
            2
        } else if self.warning_count > 0 {
            1
        } else {
            0
        }
    }

    fn count(&mut self) {
        let (mut errors, mut warnings, mut infos) = (0, 0, 0);
        for diag in self.all_diagnostics() {
            match diag.severity {
                Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Info => infos += 1,
            }
        }
        self.error_count = errors;
        self.warning_count = warnings;
        self.info_count = infos;
    }

    /// Get rule timings sorted by total time (descending)
    pub fn sorted_timings(&self) -> Vec<&RuleTiming> {
        let mut timings: Vec<_> = self.rule_timings.values().collect();
        timings.sort_by(|a, b| b.total_time.cmp(&a.total_time));
        timings
    }

    /// Format timing statistics as a string
    pub fn format_timings(&self) -> String {
        let timings = self.sorted_timings();
        if timings.is_empty() {
            return "No timing data available".to_string();
        }

        let mut output = String::from("Rule Timing Statistics:\n");
        output.push_str(&format!(
            "{:<40} {:>12} {:>12} {:>10} {:>12}\n",
            "Rule", "Total", "Avg", "Modules", "Diagnostics"
        ));
        output.push_str(&"-".repeat(90));
        output.push('\n');

        for timing in timings {
            let total_ms = timing.total_time.as_secs_f64() * 1000.0;
            let avg_us = timing.avg_time().as_secs_f64() * 1_000_000.0;
            output.push_str(&format!(
                "{:<40} {:>10.2}ms {:>10.2}µs {:>10} {:>12}\n",
                timing.rule_name, total_ms, avg_us, timing.evaluation_count, timing.match_count
            ));
        }

        output
    }
}

/// Everything a rule run needs, computed once per engine run
pub(crate) struct AnalysisInput<'a> {
    pub graph: &'a ImportGraph,
    pub envs: &'a BTreeMap<ModuleName, ModuleEnv<'a>>,
    /// Empty when caching is off
    pub fingerprints: &'a HashMap<ModuleName, u64>,
    pub cache: Option<&'a AnalysisCache>,
    pub pool: Option<&'a ThreadPool>,
}

/// Ordering slot of resolution diagnostics, after every registered rule
const RESOLUTION_INDEX: usize = usize::MAX;

/// A diagnostic tagged with the registration index of its rule
struct Collected {
    rule_index: usize,
    diagnostic: Diagnostic,
}

/// The main engine
pub struct Engine {
    config: Config,
    rules: Vec<Rule>,
    cache: Option<Arc<AnalysisCache>>,
}

impl Engine {
    /// Create a new engine; a cache is created when the configuration enables it
    pub fn new(config: Config) -> Self {
        let cache = config
            .engine
            .cache
            .then(|| Arc::new(AnalysisCache::new()));
        Self {
            config,
            rules: Vec::new(),
            cache,
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Share a cache across engines
    pub fn with_cache(mut self, cache: Arc<AnalysisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn cache(&self) -> Option<&Arc<AnalysisCache>> {
        self.cache.as_ref()
    }

    fn build_pool(&self) -> Option<ThreadPool> {
        if !self.config.engine.parallel {
            return None;
        }
        let threads = if self.config.engine.jobs > 0 {
            self.config.engine.jobs
        } else {
            num_cpus::get()
        };
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Could not start worker pool, running sequentially: {}", e);
                None
            }
        }
    }

    /// Run every enabled rule over the project
    pub fn run(&self, project: &Project) -> Result<ProjectReport, StructuralError> {
        let start = Instant::now();

        let graph = ImportGraph::from_project(project);
        let order = graph.topological_order()?;
        debug!("Module order: {}", join_names(&order));

        let pool = self.build_pool();
        let pool = pool.as_ref();

        let mut known = core_modules();
        known.extend(
            project
                .dependencies()
                .iter()
                .map(|(name, exposed)| (name.clone(), exposed.clone())),
        );
        for module in project.modules() {
            known.insert(module.name().clone(), ExposedNames::from_module(module));
        }

        let scopes = resolve_scopes(project, &known, pool);
        let envs: BTreeMap<ModuleName, ModuleEnv<'_>> = project
            .modules()
            .filter_map(|module| {
                let scope = scopes.get(module.name())?;
                Some((module.name().clone(), ModuleEnv::new(module, &scope.lookup)))
            })
            .collect();

        let cache = self.cache.as_deref();
        let stats_before = cache.map(AnalysisCache::stats).unwrap_or_default();
        let fingerprints = match cache {
            Some(cache) => {
                cache.set_config_hash(&hash_config(&self.config));
                module_fingerprints(project, &order, &known)
            }
            None => HashMap::new(),
        };

        let input = AnalysisInput {
            graph: &graph,
            envs: &envs,
            fingerprints: &fingerprints,
            cache,
            pool,
        };

        let mut report = ProjectReport {
            modules_analyzed: project.len(),
            ..ProjectReport::default()
        };
        let mut collected: BTreeMap<ModuleName, Vec<Collected>> = project
            .module_names()
            .map(|name| (name.clone(), Vec::new()))
            .collect();

        self.collect_unresolved_imports(&scopes, &mut collected);

        for (rule_index, rule) in self.rules.iter().enumerate() {
            if !self.config.is_rule_enabled(rule.name()) {
                debug!("Skipping disabled rule `{}`", rule.name());
                continue;
            }

            let rule_start = Instant::now();
            let outcome = match rule.kind() {
                RuleKind::Module(runner) => run_module_rule(runner.as_ref(), rule.name(), &input),
                RuleKind::Project(runner) => runner.run(rule.name(), &input)?,
            };
            let elapsed = rule_start.elapsed();

            let reported = self.collect_outcome(
                rule_index,
                rule,
                project,
                &outcome,
                &mut collected,
                &mut report,
            );
            let timing = report
                .rule_timings
                .entry(rule.name().to_string())
                .or_insert_with(|| RuleTiming::new(rule.name()));
            timing.total_time += elapsed;
            timing.evaluation_count += outcome.visited;
            timing.match_count += reported;
        }

        for (name, diagnostics) in collected {
            let diagnostics = drop_conflicting_fixes(&name, diagnostics, &mut report.fixes_dropped);
            report.modules.insert(name, dedup_diagnostics(diagnostics));
        }
        report.project = dedup_diagnostics(std::mem::take(&mut report.project));
        report.count();

        if let Some(cache) = cache {
            let stats = cache.stats();
            report.cache_hits = stats.hits.saturating_sub(stats_before.hits);
            report.cache_misses = stats.misses.saturating_sub(stats_before.misses);
        }
        report.duration = start.elapsed();

        info!(
            "Analysed {} modules in {:?}: {} errors, {} warnings",
            report.modules_analyzed, report.duration, report.error_count, report.warning_count
        );
        Ok(report)
    }

    fn collect_unresolved_imports(
        &self,
        scopes: &BTreeMap<ModuleName, ModuleScope>,
        collected: &mut BTreeMap<ModuleName, Vec<Collected>>,
    ) {
        if !self.config.is_rule_enabled(UNRESOLVED_IMPORT) {
            return;
        }
        for (name, scope) in scopes {
            if self.config.should_ignore_rule_for_module(UNRESOLVED_IMPORT, name) {
                continue;
            }
            let entry = collected.entry(name.clone()).or_default();
            for import in &scope.unresolved_imports {
                let mut diagnostic =
                    Diagnostic::unresolved_import(name, &import.value, import.range);
                diagnostic.severity =
                    self.config.severity_for(UNRESOLVED_IMPORT, diagnostic.severity);
                entry.push(Collected {
                    rule_index: RESOLUTION_INDEX,
                    diagnostic,
                });
            }
        }
    }

    /// Turn a rule's outcome into diagnostics, returning how many were reported
    fn collect_outcome(
        &self,
        rule_index: usize,
        rule: &Rule,
        project: &Project,
        outcome: &ProjectOutcome,
        collected: &mut BTreeMap<ModuleName, Vec<Collected>>,
        report: &mut ProjectReport,
    ) -> usize {
        let severity = self.config.severity_for(rule.name(), rule.severity());
        let mut reported = 0;

        for (module, module_outcome) in &outcome.modules {
            if let Some(reason) = &module_outcome.crash {
                collected.entry(module.clone()).or_default().push(Collected {
                    rule_index,
                    diagnostic: Diagnostic::rule_crashed(rule.name(), Some(module), reason),
                });
                reported += 1;
            }
            for error in &module_outcome.errors {
                let target = match &error.target {
                    ErrorTarget::CurrentModule => Some(module),
                    ErrorTarget::Module(other) => Some(other),
                    ErrorTarget::Project => None,
                };
                if self.place(
                    rule_index, rule, severity, target, error, project, collected, report,
                ) {
                    reported += 1;
                }
            }
        }

        for error in &outcome.project_errors {
            let target = match &error.target {
                ErrorTarget::Module(module) => Some(module),
                ErrorTarget::CurrentModule | ErrorTarget::Project => None,
            };
            if self.place(
                rule_index, rule, severity, target, error, project, collected, report,
            ) {
                reported += 1;
            }
        }

        if let Some(reason) = &outcome.project_crash {
            report
                .project
                .push(Diagnostic::rule_crashed(rule.name(), None, reason));
            reported += 1;
        }
        reported
    }

    /// Attach one rule error to its module (or the project), returning whether it was kept
    #[allow(clippy::too_many_arguments)]
    fn place(
        &self,
        rule_index: usize,
        rule: &Rule,
        severity: Severity,
        target: Option<&ModuleName>,
        error: &RuleError,
        project: &Project,
        collected: &mut BTreeMap<ModuleName, Vec<Collected>>,
        report: &mut ProjectReport,
    ) -> bool {
        let diagnostic = Diagnostic::new(rule.name(), severity, &error.message, error.range)
            .with_details(error.details.clone());

        let module = target.and_then(|name| project.module(name));
        let Some(module) = module else {
            if let Some(name) = target {
                debug!(
                    "`{}` reported on unknown module {}, keeping it at project level",
                    rule.name(),
                    name
                );
            }
            report.project.push(diagnostic);
            return true;
        };

        if self.config.should_ignore_rule_for_module(rule.name(), module.name()) {
            return false;
        }

        let diagnostic = match &error.fix {
            Some(fix) => diagnostic.with_fix(stamp(fix, module)),
            None => diagnostic,
        };
        collected
            .entry(module.name().clone())
            .or_default()
            .push(Collected {
                rule_index,
                diagnostic: diagnostic.in_module(module.name().clone()),
            });
        true
    }
}

/// Pin a fix to the source it was computed against
fn stamp(fix: &Fix, module: &Module) -> Fix {
    if fix.source_fingerprint.is_some() {
        return fix.clone();
    }
    fix.clone().against(&module.source)
}

fn resolve_scopes(
    project: &Project,
    known: &BTreeMap<ModuleName, ExposedNames>,
    pool: Option<&ThreadPool>,
) -> BTreeMap<ModuleName, ModuleScope> {
    let resolver = ScopeResolver::new(known);
    let modules: Vec<&Module> = project.modules().collect();
    let resolve = |module: &&Module| (module.name().clone(), resolver.resolve(module));
    match pool {
        Some(pool) => pool.install(|| modules.par_iter().map(resolve).collect()),
        None => modules.iter().map(resolve).collect(),
    }
}

fn run_module_rule(
    runner: &dyn ModuleRunner,
    rule_name: &str,
    input: &AnalysisInput<'_>,
) -> ProjectOutcome {
    let envs: Vec<(&ModuleName, &ModuleEnv<'_>)> = input.envs.iter().collect();
    let check = |entry: &(&ModuleName, &ModuleEnv<'_>)| {
        let (name, env) = *entry;
        let cache = input.cache.zip(input.fingerprints.get(name).copied());
        let (outcome, cached) = check_module_isolated(runner, rule_name, env, cache);
        (name.clone(), outcome, cached)
    };

    let results: Vec<_> = match input.pool {
        Some(pool) => pool.install(|| envs.par_iter().map(check).collect()),
        None => envs.iter().map(check).collect(),
    };

    let mut outcome = ProjectOutcome::default();
    for (name, module_outcome, cached) in results {
        if !cached {
            outcome.visited += 1;
        }
        outcome.modules.insert(name, module_outcome);
    }
    outcome
}

/// Keep a fix only if it does not conflict with a fix accepted before it
///
/// Fixes are considered in rule registration order, then source order. The returned
/// diagnostics are sorted by range.
fn drop_conflicting_fixes(
    module: &ModuleName,
    mut collected: Vec<Collected>,
    dropped: &mut usize,
) -> Vec<Diagnostic> {
    collected.sort_by_key(|c| (c.rule_index, c.diagnostic.range));

    let mut accepted: Vec<Fix> = Vec::new();
    let mut diagnostics = Vec::with_capacity(collected.len());
    for Collected { mut diagnostic, .. } in collected {
        if let Some(fix) = diagnostic.fix.take() {
            if accepted.contains(&fix) {
                // same edits as an accepted fix: nothing left to apply
                diagnostics.push(diagnostic);
                continue;
            }
            let conflicts = fix.first_overlap().is_some()
                || accepted.iter().any(|other| other.conflicts_with(&fix));
            if conflicts {
                warn!(
                    "Dropped fix of `{}` at {} in {}: it conflicts with an earlier fix",
                    diagnostic.rule_name, diagnostic.range, module
                );
                *dropped += 1;
            } else {
                accepted.push(fix.clone());
                diagnostic.fix = Some(fix);
            }
        }
        diagnostics.push(diagnostic);
    }

    diagnostics.sort_by_key(|d| d.range);
    diagnostics
}

/// What makes two diagnostics the same finding
#[derive(PartialEq, Eq, Hash)]
struct DiagnosticKey {
    rule_name: String,
    kind: DiagnosticKind,
    range: Range,
    message: String,
    details: Vec<String>,
}

impl DiagnosticKey {
    fn of(diagnostic: &Diagnostic) -> Self {
        Self {
            rule_name: diagnostic.rule_name.clone(),
            kind: diagnostic.kind,
            range: diagnostic.range,
            message: diagnostic.message.clone(),
            details: diagnostic.details.clone(),
        }
    }
}

/// Keep one diagnostic per finding, preferring a copy that still carries a fix
///
/// Order of first occurrence is kept.
fn dedup_diagnostics(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut seen: HashMap<DiagnosticKey, usize> = HashMap::with_capacity(diagnostics.len());
    let mut kept: Vec<Diagnostic> = Vec::with_capacity(diagnostics.len());
    for diagnostic in diagnostics {
        match seen.get(&DiagnosticKey::of(&diagnostic)) {
            Some(&index) => {
                if kept[index].fix.is_none() && diagnostic.fix.is_some() {
                    kept[index] = diagnostic;
                }
            }
            None => {
                seen.insert(DiagnosticKey::of(&diagnostic), kept.len());
                kept.push(diagnostic);
            }
        }
    }
    kept
}

/// Run `rules` over `modules` with the default configuration
pub fn run_project(
    rules: &[Rule],
    modules: Vec<Module>,
) -> Result<ProjectReport, StructuralError> {
    let project = Project::from_modules(modules)?;
    Engine::new(Config::default())
        .with_rules(rules.iter().cloned())
        .run(&project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::Edit;

    fn collected(rule_index: usize, range: Range, fix: Option<Fix>) -> Collected {
        let mut diagnostic = Diagnostic::new("r", Severity::Warning, "m", range);
        diagnostic.fix = fix;
        Collected {
            rule_index,
            diagnostic,
        }
    }

    #[test]
    fn test_structural_error_messages() {
        let cycle = StructuralError::Cycle(vec![
            ModuleName::from("A"),
            ModuleName::from("B"),
            ModuleName::from("A"),
        ]);
        assert_eq!(cycle.to_string(), "Import cycle detected: A -> B -> A");
        assert_eq!(
            StructuralError::DuplicateModule(ModuleName::from("Main")).to_string(),
            "Module `Main` is defined more than once"
        );
    }

    #[test]
    fn test_earlier_rule_wins_fix_conflict() {
        let range = Range::from_coords(2, 1, 2, 10);
        let later_rule = Fix::new(vec![Edit::replace(range, "b")]);
        let earlier_rule = Fix::new(vec![Edit::replace(Range::from_coords(2, 5, 2, 8), "a")]);
        let unrelated = Fix::new(vec![Edit::replace(Range::from_coords(5, 1, 5, 2), "c")]);

        let mut dropped = 0;
        let diagnostics = drop_conflicting_fixes(
            &ModuleName::from("Main"),
            vec![
                collected(1, range, Some(later_rule)),
                collected(0, Range::from_coords(2, 5, 2, 8), Some(earlier_rule.clone())),
                collected(1, Range::from_coords(5, 1, 5, 2), Some(unrelated)),
            ],
            &mut dropped,
        );

        assert_eq!(dropped, 1);
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics[0].range, range);
        assert!(diagnostics[0].fix.is_none());
        assert_eq!(diagnostics[1].fix, Some(earlier_rule));
        assert!(diagnostics[2].fix.is_some());
    }

    #[test]
    fn test_resolution_diagnostics_yield_to_registered_rules() {
        let range = Range::from_coords(3, 8, 3, 20);
        let resolution_fix = Fix::new(vec![Edit::replace(range, "Html")]);
        let rule_fix = Fix::new(vec![Edit::replace(range, "Html.Attributes")]);

        let mut dropped = 0;
        let diagnostics = drop_conflicting_fixes(
            &ModuleName::from("Main"),
            vec![
                collected(RESOLUTION_INDEX, range, Some(resolution_fix)),
                collected(0, range, Some(rule_fix.clone())),
            ],
            &mut dropped,
        );

        assert_eq!(dropped, 1);
        let kept: Vec<_> = diagnostics.iter().filter_map(|d| d.fix.as_ref()).collect();
        assert_eq!(kept, vec![&rule_fix]);
    }

    #[test]
    fn test_identical_fixes_are_not_conflicts() {
        let range = Range::from_coords(4, 5, 4, 17);
        let fix = Fix::new(vec![Edit::replace(range, "flag")]);

        let mut dropped = 0;
        let diagnostics = drop_conflicting_fixes(
            &ModuleName::from("Main"),
            vec![
                collected(0, range, Some(fix.clone())),
                collected(0, range, Some(fix.clone())),
            ],
            &mut dropped,
        );

        assert_eq!(dropped, 0);
        let diagnostics = dedup_diagnostics(diagnostics);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].fix, Some(fix));
    }

    #[test]
    fn test_dedup_keeps_the_copy_with_a_fix() {
        let range = Range::from_coords(1, 1, 1, 7);
        let fix = Fix::new(vec![Edit::replace(range, "Utils")]);
        let plain = Diagnostic::new("util-check", Severity::Warning, "Util is deprecated", range);
        let with_fix = plain.clone().with_fix(fix.clone());
        let detailed = plain.clone().with_details(vec!["Use Utils".to_string()]);

        let diagnostics = dedup_diagnostics(vec![
            plain.clone(),
            detailed.clone(),
            with_fix,
            plain.clone(),
        ]);

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].fix, Some(fix));
        assert_eq!(diagnostics[1], detailed);
    }

    #[test]
    fn test_report_exit_codes() {
        let mut report = ProjectReport::default();
        assert_eq!(report.exit_code(), 0);
        assert!(report.is_clean());

        report.project.push(Diagnostic::new("r", Severity::Warning, "m", Range::EMPTY));
        report.count();
        assert_eq!(report.exit_code(), 1);

        report
            .modules
            .entry(ModuleName::from("Main"))
            .or_default()
            .push(Diagnostic::new("r", Severity::Error, "m", Range::EMPTY));
        report.count();
        assert_eq!(report.exit_code(), 2);
        assert!(report.has_errors());
        assert_eq!(report.all_diagnostics().count(), 2);
        assert!(report.diagnostics_for(&ModuleName::from("Other")).is_empty());
    }

    #[test]
    fn test_format_timings() {
        let mut report = ProjectReport::default();
        assert_eq!(report.format_timings(), "No timing data available");

        let mut slow = RuleTiming::new("slow");
        slow.total_time = Duration::from_millis(20);
        slow.evaluation_count = 4;
        let mut fast = RuleTiming::new("fast");
        fast.total_time = Duration::from_millis(1);
        report.rule_timings.insert("slow".to_string(), slow);
        report.rule_timings.insert("fast".to_string(), fast);

        let names: Vec<&str> = report
            .sorted_timings()
            .iter()
            .map(|t| t.rule_name.as_str())
            .collect();
        assert_eq!(names, vec!["slow", "fast"]);
        assert_eq!(report.sorted_timings()[0].avg_time(), Duration::from_millis(5));
        assert!(report.format_timings().starts_with("Rule Timing Statistics:\n"));
    }
}
