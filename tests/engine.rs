//! Engine behaviour around crashes, caching, configuration and structural errors

mod common;

use common::*;
use grove::testing::{parse_sources, project_from_sources, run_on_sources, run_with_config};
use grove::{
    run_project, AnalysisCache, Config, DiagnosticKind, Engine, FixMode, Fixer, Severity,
    StructuralError,
};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

const COMPARISONS: &str = "module Util exposing (helper)

helper flag =
    flag == True
";

#[test]
fn test_module_rule_crash_is_isolated() {
    init_logging();
    let report = run_on_sources(&[crashing_module_rule("Util")], &layered_sources()).unwrap();

    let util = report.diagnostics_for(&name("Util"));
    assert_eq!(util.len(), 1);
    assert_eq!(util[0].kind, DiagnosticKind::RuleCrashed);
    assert_eq!(util[0].severity, Severity::Error);
    assert!(util[0].details.iter().any(|d| d.contains("cannot handle Util")));

    for other in ["Main", "Page.Home", "Page.About", "Api"] {
        let diagnostics = report.diagnostics_for(&name(other));
        assert_eq!(diagnostics.len(), 1, "{}", other);
        assert_eq!(diagnostics[0].message, "visited");
    }
}

#[test]
fn test_project_rule_crash_contributes_the_initial_context() {
    init_logging();
    let report = run_on_sources(&[crashing_project_rule("Util")], &layered_sources()).unwrap();

    let util = report.diagnostics_for(&name("Util"));
    assert_eq!(util.len(), 1);
    assert_eq!(util[0].kind, DiagnosticKind::RuleCrashed);

    assert_eq!(report.project.len(), 1);
    assert_eq!(report.project[0].message, "contributed: Api, Main, Page.About, Page.Home");
}

#[test]
fn test_project_evaluation_crash_is_reported_at_project_level() {
    init_logging();
    let rules = [crashing_evaluation_rule(), redundant_comparison_rule()];
    let report = run_on_sources(&rules, &layered_sources()).unwrap();

    assert_eq!(report.project.len(), 1);
    let crash = &report.project[0];
    assert_eq!(crash.kind, DiagnosticKind::RuleCrashed);
    assert_eq!(crash.rule_name, "crashing-evaluation");
    assert!(crash.is_project_level());
    assert_eq!(crash.message, "Rule `crashing-evaluation` crashed during its project evaluation");
    assert!(crash.details.iter().any(|d| d.contains("cannot summarise 5 modules")));

    // module visits of the crashed rule are kept
    for module in ["Main", "Page.Home", "Page.About", "Util", "Api"] {
        let diagnostics = report.diagnostics_for(&name(module));
        assert_eq!(diagnostics.len(), 1, "{}", module);
        assert_eq!(diagnostics[0].message, "visited");
    }
    assert_eq!(report.exit_code(), 2);
}

#[test]
fn test_cache_is_reused_across_runs_and_invalidated_by_edits() {
    init_logging();
    let cache = Arc::new(AnalysisCache::new());
    let rules = [redundant_comparison_rule(), unsafe_call_rule()];
    let engine = Engine::new(Config::new())
        .with_rules(rules.iter().cloned())
        .with_cache(Arc::clone(&cache));

    let mut sources = layered_sources();
    sources[3] = COMPARISONS;
    let project = project_from_sources(&sources).unwrap();

    let first = engine.run(&project).unwrap();
    assert_eq!(first.cache_hits, 0);
    assert_eq!(first.cache_misses, 10);

    let second = engine.run(&project).unwrap();
    assert_eq!(second.cache_hits, 10);
    assert_eq!(second.cache_misses, 0);
    assert_eq!(first.modules, second.modules);
    assert_eq!(first.project, second.project);

    // Util changes: it and everything importing it are analysed again, Api is not
    sources[3] = "module Util exposing (helper)\n\nhelper flag =\n    flag\n";
    let edited = project_from_sources(&sources).unwrap();
    let third = engine.run(&edited).unwrap();
    assert_eq!(third.cache_hits, 2);
    assert_eq!(third.cache_misses, 8);
    assert!(third.diagnostics_for(&name("Util")).is_empty());
}

#[test]
fn test_config_change_drops_cached_results() {
    init_logging();
    let cache = Arc::new(AnalysisCache::new());
    let project = project_from_sources(&[COMPARISONS]).unwrap();

    let engine = Engine::new(Config::new())
        .with_rule(redundant_comparison_rule())
        .with_cache(Arc::clone(&cache));
    engine.run(&project).unwrap();

    let mut config = Config::new();
    config.rules.severity.insert("redundant-comparison".to_string(), Severity::Error);
    let engine = Engine::new(config)
        .with_rule(redundant_comparison_rule())
        .with_cache(Arc::clone(&cache));
    let report = engine.run(&project).unwrap();

    assert_eq!(report.cache_hits, 0);
    assert_eq!(report.diagnostics_for(&name("Util"))[0].severity, Severity::Error);
}

fn write_file(dir: &TempDir, file: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(file);
    let mut handle = std::fs::File::create(&path).unwrap();
    handle.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_yaml_config_controls_the_run() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "grove.yaml",
        r#"
engine:
  parallel: false
rules:
  disabled:
    - literal-first
  severity:
    unresolved-import: info
  per_module:
    "Page.*":
      - redundant-comparison
fixes:
  mode: all
"#,
    );
    let config = Config::load(&path).unwrap();
    assert!(!config.engine.parallel);
    assert_eq!(config.fixes.mode, FixMode::All);

    let sources = [
        "module Page.Home exposing (view)\n\nimport Missing\n\nview flag =\n    flag == True\n",
        "module Util exposing (helper)\n\nhelper flag =\n    flag == True\n",
    ];
    let rules = [redundant_comparison_rule(), literal_first_rule()];
    let report = run_with_config(config, &rules, &sources).unwrap();

    let home = report.diagnostics_for(&name("Page.Home"));
    assert_eq!(home.len(), 1);
    assert_eq!(home[0].kind, DiagnosticKind::UnresolvedImport);
    assert_eq!(home[0].severity, Severity::Info);

    let util = report.diagnostics_for(&name("Util"));
    assert_eq!(util.len(), 1);
    assert_eq!(util[0].rule_name, "redundant-comparison");
    assert!(!report.rule_timings.contains_key("literal-first"));
}

#[test]
fn test_json_config_extends_a_base_file() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "base.yaml", "rules:\n  disabled:\n    - unresolved-import\n");
    let path = write_file(
        &dir,
        "grove.json",
        r#"{"extends": ["base.yaml"], "engine": {"jobs": 2}, "rules": {"ignore": ["literal"]}}"#,
    );

    let config = Config::load(&path).unwrap();
    assert_eq!(config.engine.jobs, 2);
    assert!(!config.is_rule_enabled("unresolved-import"));
    assert!(!config.is_rule_enabled("literal-first"));
    assert!(config.is_rule_enabled("redundant-comparison"));

    let source = "module A exposing (..)\n\nimport Missing\n\na = 1\n";
    let report = run_with_config(config, &[], &[source]).unwrap();
    assert!(report.is_clean());
}

#[test]
fn test_invalid_module_pattern_is_rejected() {
    let dir = TempDir::new().unwrap();
    let yaml = "rules:\n  per_module:\n    \"Page.[\":\n      - all\n";
    let path = write_file(&dir, "grove.yml", yaml);
    assert!(Config::load(&path).is_err());
}

#[test]
fn test_import_cycle_aborts_the_run() {
    let sources = [
        "module A exposing (..)\n\nimport B\n\na = 1\n",
        "module B exposing (..)\n\nimport A\n\nb = 1\n",
    ];
    let modules = parse_sources(&sources).unwrap();
    let err = run_project(&[redundant_comparison_rule()], modules).unwrap_err();

    let StructuralError::Cycle(path) = &err else {
        panic!("expected a cycle, got {:?}", err);
    };
    assert_eq!(path.first(), path.last());
    assert!(err.to_string().starts_with("Import cycle detected: "));
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    init_logging();
    let mut sources = layered_sources();
    sources[3] = COMPARISONS;
    let rules = [
        unsafe_call_rule(),
        redundant_comparison_rule(),
        literal_first_rule(),
        crashing_module_rule("Api"),
    ];

    let mut sequential = Config::new();
    sequential.engine.parallel = false;
    let mut parallel = Config::new();
    parallel.engine.jobs = 3;

    let a = run_with_config(sequential, &rules, &sources).unwrap();
    let b = run_with_config(parallel, &rules, &sources).unwrap();
    assert_eq!(a.modules, b.modules);
    assert_eq!(a.project, b.project);
    assert_eq!(a.fixes_dropped, b.fixes_dropped);
}

#[test]
fn test_run_project_counts_and_timings() {
    init_logging();
    let modules = parse_sources(&[UNSAFE_CALLER, UNSAFE_PROVIDER]).unwrap();
    let report = run_project(&[unsafe_call_rule(), redundant_comparison_rule()], modules).unwrap();

    assert_eq!(report.modules_analyzed, 2);
    assert_eq!(report.error_count, 1);
    assert_eq!(report.warning_count, 0);
    assert!(report.has_errors());

    let timing = &report.rule_timings["unsafe-call"];
    assert_eq!(timing.evaluation_count, 2);
    assert_eq!(timing.match_count, 1);
    assert!(report.format_timings().contains("unsafe-call"));
}

#[test]
fn test_fixer_applies_fixes_kept_by_the_engine() {
    init_logging();
    let source = "module Main exposing (main)\n\nmain flag =\n    flag == True\n";
    let project = project_from_sources(&[source]).unwrap();
    let engine = Engine::new(Config::new())
        .with_rules([redundant_comparison_rule(), literal_first_rule()]);
    let report = engine.run(&project).unwrap();

    let mut fixer = Fixer::new().with_mode(FixMode::Diff);
    fixer.collect_from_report(&report);
    assert_eq!(fixer.pending_count(), 1);

    let result = fixer.apply_all(&project);
    assert_eq!(result.fixes_applied, 1);
    assert_eq!(result.safe_fixes_applied, 1);
    assert_eq!(result.modules_modified, 1);
    assert_eq!(
        result.fixed_source(&name("Main")),
        Some("module Main exposing (main)\n\nmain flag =\n    flag\n")
    );
    assert!(result.diffs[&name("Main")].contains("-    flag == True"));
}

#[test]
fn test_stale_fix_is_rejected() {
    init_logging();
    let source = "module Main exposing (main)\n\nmain flag =\n    flag == True\n";
    let report = run_on_sources(&[redundant_comparison_rule()], &[source]).unwrap();

    let edited_source = "module Main exposing (main)\n\nmain flag =\n    (flag == True)\n";
    let edited = project_from_sources(&[edited_source]).unwrap();
    let mut fixer = Fixer::new();
    fixer.collect_from_report(&report);
    let result = fixer.apply_all(&edited);

    assert_eq!(result.fixes_applied, 0);
    assert_eq!(result.fixes_rejected, 1);
    assert!(result.fixed_source(&name("Main")).is_none());
}
