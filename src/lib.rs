//! Grove - Project rule engine for ML-family source code
//!
//! Runs user-defined rules over every module of a project. Module rules look at one module
//! at a time; project rules accumulate knowledge across modules, visiting each module once
//! in dependency order and folding a project context through the import graph.
//!
//! # Architecture
//!
//! ```text
//! Project -> ImportGraph -> ScopeResolver -> walk_module (per rule) -> ProjectReport -> Fixer
//! ```
//!
//! The engine orders modules so every import is analysed before its importers, resolves
//! each module's references once, runs the rules, and collects diagnostics (optionally
//! carrying fixes) per module.
//!
//! # Writing a project rule
//!
//! ```
//! use grove::{ContextConversion, ModuleEnv, ProjectRuleSchema, RuleError};
//! use std::collections::BTreeSet;
//!
//! // Project context: every module seen so far. Module context: unused.
//! let conversion = ContextConversion::new(
//!     |_: &ModuleEnv<'_>, _: &BTreeSet<String>| (),
//!     |env: &ModuleEnv<'_>, _: ()| BTreeSet::from([env.name().to_string()]),
//!     |a: &BTreeSet<String>, b: &BTreeSet<String>| a.union(b).cloned().collect(),
//! );
//!
//! let rule = ProjectRuleSchema::new("needs-main", BTreeSet::new(), conversion)
//!     .with_final_project_evaluation(|modules: &BTreeSet<String>| {
//!         if modules.contains("Main") {
//!             Vec::new()
//!         } else {
//!             vec![RuleError::new("No `Main` module", grove::Range::EMPTY).for_project()]
//!         }
//!     })
//!     .build();
//!
//! let source = "module Util exposing (..)\n\nx = 1\n";
//! let report = grove::testing::run_on_sources(&[rule], &[source]).unwrap();
//! assert_eq!(report.project.len(), 1);
//! ```

pub mod cache;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod fix;
pub mod fixer;
pub mod graph;
pub mod project;
pub mod rule;
pub mod schedule;
pub mod scope;
pub mod syntax;
pub mod testing;
pub mod visitor;

// Re-export main types
pub use cache::{AnalysisCache, CacheStats};
pub use config::{Config, ConfigError};
pub use diagnostic::{Diagnostic, DiagnosticKind, FixSafety, Severity};
pub use engine::{run_project, Engine, ProjectReport, RuleTiming, StructuralError};
pub use fix::{apply_fix, Edit, Fix, FixRejection};
pub use fixer::{FixMode, FixResult, Fixer, PendingFix};
pub use graph::ImportGraph;
pub use project::Project;
pub use rule::{
    ContextConversion, ErrorTarget, ModuleRuleSchema, ProjectRuleSchema, Rule, RuleError,
};
pub use scope::{ExposedNames, LookupTable, Resolution, ScopeResolver};
pub use syntax::{parse_module, Module, ModuleName, ParseError, Position, Range};
pub use visitor::{Direction, ModuleEnv};
