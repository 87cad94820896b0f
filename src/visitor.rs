//! Pre/post-order traversal of a module
//!
//! Walk order: module definition, imports in file order, then for each declaration its
//! Enter call, its expressions (pre-order, left to right, each with an Enter and a matching
//! Exit), and its Exit call. Final module evaluations run once the walk is done.

use crate::rule::RuleError;
use crate::scope::{LookupTable, Resolution};
use crate::syntax::{
    Declaration, Expression, Import, Module, ModuleHeader, ModuleName, Node, Range,
};
use std::sync::Arc;

/// Whether a node is being entered or left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Enter,
    Exit,
}

/// What a callback gets to know about the module being visited
#[derive(Debug, Clone, Copy)]
pub struct ModuleEnv<'a> {
    pub module: &'a Module,
    pub lookup: &'a LookupTable,
}

impl<'a> ModuleEnv<'a> {
    pub fn new(module: &'a Module, lookup: &'a LookupTable) -> Self {
        Self { module, lookup }
    }

    pub fn name(&self) -> &'a ModuleName {
        self.module.name()
    }

    /// Resolution of the reference at `range`
    pub fn resolve(&self, range: Range) -> Resolution {
        self.lookup
            .get(range)
            .cloned()
            .unwrap_or(Resolution::Unresolved)
    }

    /// Module declaring the reference at `range`, `None` when local or unresolved
    pub fn module_for(&self, range: Range) -> Option<&'a ModuleName> {
        self.lookup.module_for(range)
    }
}

pub type ModuleDefinitionVisitor<C> =
    Arc<dyn Fn(&ModuleEnv<'_>, &Node<ModuleHeader>, C) -> (Vec<RuleError>, C) + Send + Sync>;
pub type ImportVisitor<C> =
    Arc<dyn Fn(&ModuleEnv<'_>, &Node<Import>, C) -> (Vec<RuleError>, C) + Send + Sync>;
pub type DeclarationVisitor<C> = Arc<
    dyn Fn(&ModuleEnv<'_>, &Node<Declaration>, Direction, C) -> (Vec<RuleError>, C) + Send + Sync,
>;
pub type ExpressionVisitor<C> = Arc<
    dyn Fn(&ModuleEnv<'_>, &Node<Expression>, Direction, C) -> (Vec<RuleError>, C) + Send + Sync,
>;
pub type FinalModuleEvaluation<C> =
    Arc<dyn Fn(&ModuleEnv<'_>, &C) -> Vec<RuleError> + Send + Sync>;

/// Callbacks registered for each construct kind, in registration order
pub struct Visitors<C> {
    pub(crate) module_definition: Vec<ModuleDefinitionVisitor<C>>,
    pub(crate) import: Vec<ImportVisitor<C>>,
    pub(crate) declaration: Vec<DeclarationVisitor<C>>,
    pub(crate) expression: Vec<ExpressionVisitor<C>>,
    pub(crate) final_evaluation: Vec<FinalModuleEvaluation<C>>,
}

impl<C> Default for Visitors<C> {
    fn default() -> Self {
        Self {
            module_definition: Vec::new(),
            import: Vec::new(),
            declaration: Vec::new(),
            expression: Vec::new(),
            final_evaluation: Vec::new(),
        }
    }
}

// derive(Clone) would require C: Clone
impl<C> Clone for Visitors<C> {
    fn clone(&self) -> Self {
        Self {
            module_definition: self.module_definition.clone(),
            import: self.import.clone(),
            declaration: self.declaration.clone(),
            expression: self.expression.clone(),
            final_evaluation: self.final_evaluation.clone(),
        }
    }
}

impl<C> Visitors<C> {
    pub fn is_empty(&self) -> bool {
        self.module_definition.is_empty()
            && self.import.is_empty()
            && self.declaration.is_empty()
            && self.expression.is_empty()
            && self.final_evaluation.is_empty()
    }
}

/// Walk a module, threading `context` through every callback
///
/// Returns the errors sorted by range (stable, so callback order is kept on ties) and the
/// final context.
pub fn walk_module<C>(
    visitors: &Visitors<C>,
    env: &ModuleEnv<'_>,
    context: C,
) -> (Vec<RuleError>, C) {
    let mut walk = Walk {
        visitors,
        env,
        errors: Vec::new(),
    };
    let mut context = context;

    for visitor in &visitors.module_definition {
        context = walk.collect(visitor(env, &env.module.header, context));
    }

    for import in &env.module.imports {
        for visitor in &visitors.import {
            context = walk.collect(visitor(env, import, context));
        }
    }

    for declaration in &env.module.declarations {
        context = walk.declaration(declaration, context);
    }

    let mut errors = walk.errors;
    for evaluation in &visitors.final_evaluation {
        errors.extend(evaluation(env, &context));
    }

    errors.sort_by_key(|error| error.range);
    (errors, context)
}

struct Walk<'v, 'e, 'a, C> {
    visitors: &'v Visitors<C>,
    env: &'e ModuleEnv<'a>,
    errors: Vec<RuleError>,
}

impl<C> Walk<'_, '_, '_, C> {
    fn collect(&mut self, (errors, context): (Vec<RuleError>, C)) -> C {
        self.errors.extend(errors);
        context
    }

    fn declaration(&mut self, node: &Node<Declaration>, mut context: C) -> C {
        let (visitors, env) = (self.visitors, self.env);
        for visitor in &visitors.declaration {
            context = self.collect(visitor(env, node, Direction::Enter, context));
        }

        if !visitors.expression.is_empty() {
            if let Declaration::Function(function) = &node.value {
                context = self.expression(&function.body, context);
            }
        }

        for visitor in &visitors.declaration {
            context = self.collect(visitor(env, node, Direction::Exit, context));
        }
        context
    }

    fn expression(&mut self, node: &Node<Expression>, mut context: C) -> C {
        let (visitors, env) = (self.visitors, self.env);
        for visitor in &visitors.expression {
            context = self.collect(visitor(env, node, Direction::Enter, context));
        }
        for child in node.value.children() {
            context = self.expression(child, context);
        }
        for visitor in &visitors.expression {
            context = self.collect(visitor(env, node, Direction::Exit, context));
        }
        context
    }
}
