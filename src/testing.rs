//! Helpers for running rules over in-memory sources
//!
//! Meant for rule tests: parse a handful of modules, run the engine, inspect the report.

use crate::config::Config;
use crate::engine::{Engine, ProjectReport, StructuralError};
use crate::project::Project;
use crate::rule::Rule;
use crate::syntax::{parse_module, Module, ParseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("module {index} does not parse: {source}")]
    Parse { index: usize, source: ParseError },

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Parse every source, in order
pub fn parse_sources(sources: &[&str]) -> Result<Vec<Module>, HarnessError> {
    sources
        .iter()
        .enumerate()
        .map(|(index, source)| {
            parse_module(source).map_err(|source| HarnessError::Parse { index, source })
        })
        .collect()
}

pub fn project_from_sources(sources: &[&str]) -> Result<Project, HarnessError> {
    Ok(Project::from_modules(parse_sources(sources)?)?)
}

/// Run `rules` over the sources with the default configuration
pub fn run_on_sources(rules: &[Rule], sources: &[&str]) -> Result<ProjectReport, HarnessError> {
    run_with_config(Config::default(), rules, sources)
}

pub fn run_with_config(
    config: Config,
    rules: &[Rule],
    sources: &[&str],
) -> Result<ProjectReport, HarnessError> {
    let project = project_from_sources(sources)?;
    let engine = Engine::new(config).with_rules(rules.iter().cloned());
    Ok(engine.run(&project)?)
}
