//! Rules and fixtures shared by the integration tests

#![allow(dead_code)]

use grove::fix::source_text;
use grove::syntax::{Declaration, Expression, Import, ModuleHeader, Node};
use grove::{
    ContextConversion, Direction, Edit, Fix, FixSafety, ModuleEnv, ModuleName, ModuleRuleSchema,
    ProjectRuleSchema, Range, Rule, RuleError, Severity,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn name(s: &str) -> ModuleName {
    ModuleName::from(s)
}

// ---------------------------------------------------------------------------
// unsafe-call: calls to an imported `unsafe` function with a non-literal argument

pub const UNSAFE_TARGET: &str = "unsafe";

/// Modules declaring a top-level `unsafe`, including everything upstream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsafeProject {
    pub declared_in: BTreeSet<ModuleName>,
}

pub fn merge_unsafe(a: &UnsafeProject, b: &UnsafeProject) -> UnsafeProject {
    UnsafeProject {
        declared_in: a.declared_in.union(&b.declared_in).cloned().collect(),
    }
}

pub struct UnsafeModule {
    declared_upstream: BTreeSet<ModuleName>,
    declares_target: bool,
}

pub fn unsafe_call_rule() -> Rule {
    let conversion = ContextConversion::new(
        |_: &ModuleEnv<'_>, project: &UnsafeProject| UnsafeModule {
            declared_upstream: project.declared_in.clone(),
            declares_target: false,
        },
        |env: &ModuleEnv<'_>, module: UnsafeModule| {
            let mut declared_in = module.declared_upstream;
            if module.declares_target {
                declared_in.insert(env.name().clone());
            }
            UnsafeProject { declared_in }
        },
        merge_unsafe,
    );

    ProjectRuleSchema::new("unsafe-call", UnsafeProject::default(), conversion)
        .with_severity(Severity::Error)
        .with_declaration_visitor(
            |_: &ModuleEnv<'_>,
             node: &Node<Declaration>,
             direction: Direction,
             mut context: UnsafeModule| {
                if direction == Direction::Enter && node.value.name().value == UNSAFE_TARGET {
                    context.declares_target = true;
                }
                (Vec::new(), context)
            },
        )
        .with_expression_visitor(
            |env: &ModuleEnv<'_>,
             node: &Node<Expression>,
             direction: Direction,
             context: UnsafeModule| {
                if direction == Direction::Exit {
                    return (Vec::new(), context);
                }
                let Expression::Application(items) = &node.value else {
                    return (Vec::new(), context);
                };
                let Some((function, arguments)) = items.split_first() else {
                    return (Vec::new(), context);
                };
                let calls_target = matches!(
                    &function.value,
                    Expression::FunctionOrValue { name, .. } if name == UNSAFE_TARGET
                );
                let declared_upstream = env
                    .module_for(function.range)
                    .is_some_and(|module| context.declared_upstream.contains(module));

                let passes_variable = arguments.iter().any(|a| !a.value.is_literal());
                if calls_target && declared_upstream && passes_variable {
                    let message = "Call to `unsafe` with a non-literal argument";
                    let error = RuleError::new(message, node.range)
                        .with_details(&["Only pass literals to `unsafe`."]);
                    (vec![error], context)
                } else {
                    (Vec::new(), context)
                }
            },
        )
        .with_final_project_evaluation(|project: &UnsafeProject| {
            if project.declared_in.is_empty() {
                let message = "Could not find the declaration of `unsafe`";
                vec![RuleError::new(message, Range::EMPTY).for_project()]
            } else {
                Vec::new()
            }
        })
        .build()
}

// ---------------------------------------------------------------------------
// visitation-order: records the order modules are visited in and checks that every project
// import was analysed first

pub fn merge_seen(a: &BTreeSet<ModuleName>, b: &BTreeSet<ModuleName>) -> BTreeSet<ModuleName> {
    a.union(b).cloned().collect()
}

pub struct OrderModule {
    seen_upstream: BTreeSet<ModuleName>,
}

pub fn visitation_order_rule(
    project_modules: BTreeSet<ModuleName>,
    log: Arc<Mutex<Vec<ModuleName>>>,
) -> Rule {
    let conversion = ContextConversion::new(
        |_: &ModuleEnv<'_>, seen: &BTreeSet<ModuleName>| OrderModule {
            seen_upstream: seen.clone(),
        },
        |env: &ModuleEnv<'_>, module: OrderModule| {
            let mut seen = module.seen_upstream;
            seen.insert(env.name().clone());
            seen
        },
        merge_seen,
    );

    ProjectRuleSchema::new("visitation-order", BTreeSet::new(), conversion)
        .with_module_definition_visitor(
            move |env: &ModuleEnv<'_>, _: &Node<ModuleHeader>, context: OrderModule| {
                if let Ok(mut log) = log.lock() {
                    log.push(env.name().clone());
                }
                (Vec::new(), context)
            },
        )
        .with_import_visitor(move |_: &ModuleEnv<'_>, import: &Node<Import>, context: OrderModule| {
            let imported = &import.value.module_name.value;
            if project_modules.contains(imported) && !context.seen_upstream.contains(imported) {
                let message = format!("`{}` was not analysed yet", imported);
                let error = RuleError::new(&message, import.range);
                (vec![error], context)
            } else {
                (Vec::new(), context)
            }
        })
        .build()
}

// ---------------------------------------------------------------------------
// Module rules with fixes on `x == True`

fn comparison_with_true(node: &Node<Expression>) -> Option<(&Node<Expression>, &Node<Expression>)> {
    match &node.value {
        Expression::OperatorApplication { operator, left, right } if operator == "==" => {
            match &right.value {
                Expression::FunctionOrValue { module_name, name }
                    if module_name.is_empty() && name == "True" =>
                {
                    Some((left, right))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// `x == True` can be written `x`
pub fn redundant_comparison_rule() -> Rule {
    ModuleRuleSchema::new("redundant-comparison", ())
        .with_simple_expression_visitor(|env: &ModuleEnv<'_>, node: &Node<Expression>| {
            let Some((left, _)) = comparison_with_true(node) else {
                return Vec::new();
            };
            let mut error = RuleError::new("Comparison with `True` is redundant", node.range);
            if let Some(text) = source_text(&env.module.source, left.range) {
                error = error.with_fix(Fix::new(vec![Edit::replace(node.range, text)]));
            }
            vec![error]
        })
        .build()
}

/// `x == True` should be written `True == x`
pub fn literal_first_rule() -> Rule {
    ModuleRuleSchema::new("literal-first", ())
        .with_severity(Severity::Info)
        .with_simple_expression_visitor(|env: &ModuleEnv<'_>, node: &Node<Expression>| {
            let Some((left, right)) = comparison_with_true(node) else {
                return Vec::new();
            };
            let source = &env.module.source;
            let mut error = RuleError::new("Put the literal first", node.range);
            let texts = (source_text(source, left.range), source_text(source, right.range));
            if let (Some(left), Some(right)) = texts {
                let swapped = format!("{} == {}", right, left);
                let fix = Fix::new(vec![Edit::replace(node.range, &swapped)])
                    .with_safety(FixSafety::Unsafe);
                error = error.with_fix(fix);
            }
            vec![error]
        })
        .build()
}

// ---------------------------------------------------------------------------
// Crashing rules

/// Module rule that panics on `target`
pub fn crashing_module_rule(target: &str) -> Rule {
    let target = name(target);
    ModuleRuleSchema::new("crashing-module-rule", ())
        .with_module_definition_visitor(
            move |env: &ModuleEnv<'_>, header: &Node<ModuleHeader>, _: ()| {
                if *env.name() == target {
                    panic!("cannot handle {}", target);
                }
                (vec![RuleError::new("visited", header.range)], ())
            },
        )
        .build()
}

/// Project rule that panics on `target` and reports the modules that contributed
pub fn crashing_project_rule(target: &str) -> Rule {
    let target = name(target);
    let conversion = ContextConversion::new(
        |_: &ModuleEnv<'_>, seen: &BTreeSet<ModuleName>| seen.clone(),
        |env: &ModuleEnv<'_>, mut seen: BTreeSet<ModuleName>| {
            seen.insert(env.name().clone());
            seen
        },
        merge_seen,
    );

    ProjectRuleSchema::new("crashing-project-rule", BTreeSet::new(), conversion)
        .with_module_definition_visitor(
            move |env: &ModuleEnv<'_>, _: &Node<ModuleHeader>, seen: BTreeSet<ModuleName>| {
                if *env.name() == target {
                    panic!("cannot handle {}", target);
                }
                (Vec::new(), seen)
            },
        )
        .with_final_project_evaluation(|seen: &BTreeSet<ModuleName>| {
            let names: Vec<String> = seen.iter().map(ToString::to_string).collect();
            vec![RuleError::new(&format!("contributed: {}", names.join(", ")), Range::EMPTY)]
        })
        .build()
}

/// Project rule reporting every module it visits, then panicking in its project evaluation
pub fn crashing_evaluation_rule() -> Rule {
    let conversion = ContextConversion::new(
        |_: &ModuleEnv<'_>, _: &usize| (),
        |_: &ModuleEnv<'_>, _: ()| 1,
        |a: &usize, b: &usize| a + b,
    );

    ProjectRuleSchema::new("crashing-evaluation", 0, conversion)
        .with_module_definition_visitor(|_: &ModuleEnv<'_>, header: &Node<ModuleHeader>, _: ()| {
            (vec![RuleError::new("visited", header.range)], ())
        })
        .with_final_project_evaluation(|modules: &usize| -> Vec<RuleError> {
            panic!("cannot summarise {} modules", modules);
        })
        .build()
}

// ---------------------------------------------------------------------------
// Rules reporting the same finding more than once

/// Every module reports `deprecated` as deprecated, against `deprecated` itself
pub fn deprecated_module_rule(deprecated: &str) -> Rule {
    let deprecated = name(deprecated);
    let conversion = ContextConversion::new(
        |_: &ModuleEnv<'_>, _: &()| (),
        |_: &ModuleEnv<'_>, _: ()| (),
        |_: &(), _: &()| (),
    );

    ProjectRuleSchema::new("deprecated-module", (), conversion)
        .with_final_module_evaluation(move |_: &ModuleEnv<'_>, _: &()| {
            let message = format!("`{}` is deprecated", deprecated);
            let error = RuleError::new(&message, Range::from_coords(1, 1, 1, 7))
                .for_module(deprecated.clone());
            vec![error]
        })
        .build()
}

fn flag_integer(_: &ModuleEnv<'_>, node: &Node<Expression>) -> Vec<RuleError> {
    match node.value {
        Expression::Integer(_) => vec![RuleError::new("Integer literal", node.range)],
        _ => Vec::new(),
    }
}

/// The same check registered twice
pub fn twice_registered_rule() -> Rule {
    ModuleRuleSchema::new("no-integers", ())
        .with_simple_expression_visitor(flag_integer)
        .with_simple_expression_visitor(flag_integer)
        .build()
}

// ---------------------------------------------------------------------------
// Fixtures

pub const UNSAFE_PROVIDER: &str = "module B exposing (unsafe, safe)

unsafe x =
    x

safe =
    unsafe 1
";

pub const UNSAFE_CALLER: &str = "module A exposing (run)

import B exposing (unsafe)

run param =
    unsafe param
";

/// Main imports Page.Home and Page.About, both import Util; Api stands alone
pub fn layered_sources() -> Vec<&'static str> {
    vec![
        "module Main exposing (main)

import Page.About
import Page.Home

main =
    Page.Home.view
",
        "module Page.Home exposing (view)\n\nimport Util\n\nview =\n    Util.helper 1\n",
        "module Page.About exposing (view)

import Util
import Api

view =
    Util.helper 2
",
        "module Util exposing (helper)\n\nhelper n =\n    n\n",
        "module Api exposing (get)\n\nget =\n    1\n",
    ]
}
