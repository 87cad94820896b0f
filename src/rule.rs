//! Rule schemas and built rules
//!
//! A rule is assembled from an immutable schema: every `with_*` call consumes the schema
//! and returns the extended one. Module rules look at one module at a time. Project rules
//! additionally fold a project context through the import graph using the
//! `to_module` / `to_project` / `merge` triple of a [`ContextConversion`].

use crate::cache::AnalysisCache;
use crate::diagnostic::Severity;
use crate::engine::{AnalysisInput, StructuralError};
use crate::fix::Fix;
use crate::schedule;
use crate::syntax::{Declaration, Expression, Import, ModuleHeader, ModuleName, Node, Range};
use crate::visitor::{walk_module, Direction, ModuleEnv, Visitors};
use log::{debug, warn};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Where a rule error is reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ErrorTarget {
    /// The module being visited
    #[default]
    CurrentModule,
    /// Another module of the project
    Module(ModuleName),
    /// The project as a whole
    Project,
}

/// An error reported by a rule callback
#[derive(Debug, Clone, PartialEq)]
pub struct RuleError {
    pub message: String,
    pub details: Vec<String>,
    pub range: Range,
    pub fix: Option<Fix>,
    pub target: ErrorTarget,
}

impl RuleError {
    pub fn new(message: &str, range: Range) -> Self {
        Self {
            message: message.to_string(),
            details: Vec::new(),
            range,
            fix: None,
            target: ErrorTarget::CurrentModule,
        }
    }

    pub fn with_details(mut self, details: &[&str]) -> Self {
        self.details.extend(details.iter().map(|d| d.to_string()));
        self
    }

    pub fn with_fix(mut self, fix: Fix) -> Self {
        self.fix = Some(fix);
        self
    }

    /// Report against another module, e.g. from a final project evaluation
    pub fn for_module(mut self, module: ModuleName) -> Self {
        self.target = ErrorTarget::Module(module);
        self
    }

    /// Report against the project
    pub fn for_project(mut self) -> Self {
        self.target = ErrorTarget::Project;
        self
    }
}

pub type FinalProjectEvaluation<P> = Arc<dyn Fn(&P) -> Vec<RuleError> + Send + Sync>;

/// Schema of a rule that inspects modules independently
pub struct ModuleRuleSchema<C> {
    name: String,
    severity: Severity,
    initial_context: C,
    visitors: Visitors<C>,
}

impl<C: Clone> Clone for ModuleRuleSchema<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            severity: self.severity,
            initial_context: self.initial_context.clone(),
            visitors: self.visitors.clone(),
        }
    }
}

impl<C> ModuleRuleSchema<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Start a schema; `initial_context` is handed to the first callback of every module
    pub fn new(name: &str, initial_context: C) -> Self {
        Self {
            name: name.to_string(),
            severity: Severity::default(),
            initial_context,
            visitors: Visitors::default(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_module_definition_visitor<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &Node<ModuleHeader>, C) -> (Vec<RuleError>, C)
            + Send
            + Sync
            + 'static,
    {
        self.visitors.module_definition.push(Arc::new(visitor));
        self
    }

    pub fn with_import_visitor<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &Node<Import>, C) -> (Vec<RuleError>, C) + Send + Sync + 'static,
    {
        self.visitors.import.push(Arc::new(visitor));
        self
    }

    pub fn with_declaration_visitor<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &Node<Declaration>, Direction, C) -> (Vec<RuleError>, C)
            + Send
            + Sync
            + 'static,
    {
        self.visitors.declaration.push(Arc::new(visitor));
        self
    }

    pub fn with_expression_visitor<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &Node<Expression>, Direction, C) -> (Vec<RuleError>, C)
            + Send
            + Sync
            + 'static,
    {
        self.visitors.expression.push(Arc::new(visitor));
        self
    }

    /// Context-free expression check, called on Enter only
    pub fn with_simple_expression_visitor<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &Node<Expression>) -> Vec<RuleError> + Send + Sync + 'static,
    {
        self.visitors.expression.push(Arc::new(
            move |env: &ModuleEnv<'_>, node: &Node<Expression>, direction: Direction, context: C| {
                match direction {
                    Direction::Enter => (visitor(env, node), context),
                    Direction::Exit => (Vec::new(), context),
                }
            },
        ));
        self
    }

    pub fn with_final_evaluation<F>(mut self, evaluation: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &C) -> Vec<RuleError> + Send + Sync + 'static,
    {
        self.visitors.final_evaluation.push(Arc::new(evaluation));
        self
    }

    pub fn build(self) -> Rule {
        Rule {
            name: self.name,
            severity: self.severity,
            kind: RuleKind::Module(Arc::new(ModuleRule {
                initial_context: self.initial_context,
                visitors: self.visitors,
            })),
        }
    }
}

/// Conversions between a project rule's project context `P` and module context `M`
///
/// `merge` must be associative and commutative: the engine combines contributions in an
/// unspecified grouping.
pub struct ContextConversion<P, M> {
    to_module: Arc<dyn Fn(&ModuleEnv<'_>, &P) -> M + Send + Sync>,
    to_project: Arc<dyn Fn(&ModuleEnv<'_>, M) -> P + Send + Sync>,
    merge: Arc<dyn Fn(&P, &P) -> P + Send + Sync>,
}

impl<P, M> Clone for ContextConversion<P, M> {
    fn clone(&self) -> Self {
        Self {
            to_module: Arc::clone(&self.to_module),
            to_project: Arc::clone(&self.to_project),
            merge: Arc::clone(&self.merge),
        }
    }
}

impl<P, M> ContextConversion<P, M> {
    pub fn new<TM, TP, MG>(to_module: TM, to_project: TP, merge: MG) -> Self
    where
        TM: Fn(&ModuleEnv<'_>, &P) -> M + Send + Sync + 'static,
        TP: Fn(&ModuleEnv<'_>, M) -> P + Send + Sync + 'static,
        MG: Fn(&P, &P) -> P + Send + Sync + 'static,
    {
        Self {
            to_module: Arc::new(to_module),
            to_project: Arc::new(to_project),
            merge: Arc::new(merge),
        }
    }

    pub fn to_module(&self, env: &ModuleEnv<'_>, project: &P) -> M {
        (self.to_module)(env, project)
    }

    pub fn to_project(&self, env: &ModuleEnv<'_>, module: M) -> P {
        (self.to_project)(env, module)
    }

    pub fn merge(&self, a: &P, b: &P) -> P {
        (self.merge)(a, b)
    }
}

/// Schema of a rule that accumulates knowledge across the project
pub struct ProjectRuleSchema<P, M> {
    name: String,
    severity: Severity,
    initial_context: P,
    conversion: ContextConversion<P, M>,
    visitors: Visitors<M>,
    final_evaluations: Vec<FinalProjectEvaluation<P>>,
}

impl<P: Clone, M> Clone for ProjectRuleSchema<P, M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            severity: self.severity,
            initial_context: self.initial_context.clone(),
            conversion: self.conversion.clone(),
            visitors: self.visitors.clone(),
            final_evaluations: self.final_evaluations.clone(),
        }
    }
}

impl<P, M> ProjectRuleSchema<P, M>
where
    P: Clone + Send + Sync + 'static,
    M: 'static,
{
    /// Start a schema; `initial_context` is the project context of a module with no imports
    pub fn new(name: &str, initial_context: P, conversion: ContextConversion<P, M>) -> Self {
        Self {
            name: name.to_string(),
            severity: Severity::default(),
            initial_context,
            conversion,
            visitors: Visitors::default(),
            final_evaluations: Vec::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_module_definition_visitor<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &Node<ModuleHeader>, M) -> (Vec<RuleError>, M)
            + Send
            + Sync
            + 'static,
    {
        self.visitors.module_definition.push(Arc::new(visitor));
        self
    }

    pub fn with_import_visitor<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &Node<Import>, M) -> (Vec<RuleError>, M) + Send + Sync + 'static,
    {
        self.visitors.import.push(Arc::new(visitor));
        self
    }

    pub fn with_declaration_visitor<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &Node<Declaration>, Direction, M) -> (Vec<RuleError>, M)
            + Send
            + Sync
            + 'static,
    {
        self.visitors.declaration.push(Arc::new(visitor));
        self
    }

    pub fn with_expression_visitor<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &Node<Expression>, Direction, M) -> (Vec<RuleError>, M)
            + Send
            + Sync
            + 'static,
    {
        self.visitors.expression.push(Arc::new(visitor));
        self
    }

    /// Evaluation run on each module's final module context
    pub fn with_final_module_evaluation<F>(mut self, evaluation: F) -> Self
    where
        F: Fn(&ModuleEnv<'_>, &M) -> Vec<RuleError> + Send + Sync + 'static,
    {
        self.visitors.final_evaluation.push(Arc::new(evaluation));
        self
    }

    /// Evaluation run once on the merge of every module's contribution
    pub fn with_final_project_evaluation<F>(mut self, evaluation: F) -> Self
    where
        F: Fn(&P) -> Vec<RuleError> + Send + Sync + 'static,
    {
        self.final_evaluations.push(Arc::new(evaluation));
        self
    }

    pub fn build(self) -> Rule {
        Rule {
            name: self.name,
            severity: self.severity,
            kind: RuleKind::Project(Arc::new(ProjectRule {
                initial_context: self.initial_context,
                conversion: self.conversion,
                visitors: self.visitors,
                final_evaluations: self.final_evaluations,
            })),
        }
    }
}

/// A built, immutable rule
#[derive(Clone)]
pub struct Rule {
    name: String,
    severity: Severity,
    kind: RuleKind,
}

#[derive(Clone)]
pub(crate) enum RuleKind {
    Module(Arc<dyn ModuleRunner>),
    Project(Arc<dyn ProjectRunner>),
}

impl Rule {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default severity of the rule's diagnostics
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_project_rule(&self) -> bool {
        matches!(self.kind, RuleKind::Project(_))
    }

    pub(crate) fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Run a module rule over one module; `None` for project rules
    pub fn check_module(&self, env: &ModuleEnv<'_>) -> Option<Vec<RuleError>> {
        match &self.kind {
            RuleKind::Module(runner) => Some(runner.check(env)),
            RuleKind::Project(_) => None,
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("project", &self.is_project_rule())
            .finish()
    }
}

pub(crate) trait ModuleRunner: Send + Sync {
    fn check(&self, env: &ModuleEnv<'_>) -> Vec<RuleError>;
}

pub(crate) trait ProjectRunner: Send + Sync {
    fn run(
        &self,
        rule_name: &str,
        input: &AnalysisInput<'_>,
    ) -> Result<ProjectOutcome, StructuralError>;
}

/// Errors of one rule on one module
#[derive(Debug, Clone, Default)]
pub(crate) struct ModuleOutcome {
    pub errors: Vec<RuleError>,
    /// Panic message when a callback crashed
    pub crash: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct ProjectOutcome {
    pub modules: BTreeMap<ModuleName, ModuleOutcome>,
    pub project_errors: Vec<RuleError>,
    pub project_crash: Option<String>,
    /// Modules actually visited, cache hits excluded
    pub visited: usize,
}

struct ModuleRule<C> {
    initial_context: C,
    visitors: Visitors<C>,
}

impl<C: Clone + Send + Sync> ModuleRunner for ModuleRule<C> {
    fn check(&self, env: &ModuleEnv<'_>) -> Vec<RuleError> {
        walk_module(&self.visitors, env, self.initial_context.clone()).0
    }
}

struct ProjectRule<P, M> {
    initial_context: P,
    conversion: ContextConversion<P, M>,
    visitors: Visitors<M>,
    final_evaluations: Vec<FinalProjectEvaluation<P>>,
}

/// What one module left behind for a project rule
struct ModuleVisit<P> {
    contribution: P,
    errors: Vec<RuleError>,
    crash: Option<String>,
    cached: bool,
}

impl<P, M> ProjectRule<P, M>
where
    P: Clone + Send + Sync + 'static,
{
    fn merge_all<'p>(&self, contexts: impl Iterator<Item = &'p P>) -> P
    where
        P: 'p,
    {
        contexts.fold(None, |merged: Option<P>, context| match merged {
            None => Some(context.clone()),
            Some(merged) => Some(self.conversion.merge(&merged, context)),
        })
        .unwrap_or_else(|| self.initial_context.clone())
    }

    fn visit_module(
        &self,
        rule_name: &str,
        input: &AnalysisInput<'_>,
        name: &ModuleName,
        upstream: Vec<Arc<ModuleVisit<P>>>,
    ) -> Arc<ModuleVisit<P>> {
        let cache = input.cache.zip(input.fingerprints.get(name).copied());
        if let Some((cache, fingerprint)) = cache {
            if let Some(hit) = cache.get::<ModuleVisit<P>>(rule_name, name, fingerprint) {
                debug!("{}: reusing cached contribution of {}", rule_name, name);
                return Arc::new(ModuleVisit {
                    contribution: hit.contribution.clone(),
                    errors: hit.errors.clone(),
                    crash: None,
                    cached: true,
                });
            }
        }

        let Some(env) = input.envs.get(name) else {
            return Arc::new(self.crashed(format!("module `{}` has no scope", name)));
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let upstream_context = self.merge_all(upstream.iter().map(|visit| &visit.contribution));
            let module_context = self.conversion.to_module(env, &upstream_context);
            let (errors, module_context) = walk_module(&self.visitors, env, module_context);
            (errors, self.conversion.to_project(env, module_context))
        }));

        let visit = match outcome {
            Ok((errors, contribution)) => Arc::new(ModuleVisit {
                contribution,
                errors,
                crash: None,
                cached: false,
            }),
            Err(payload) => {
                let reason = panic_message(&*payload);
                warn!("Rule `{}` crashed on {}: {}", rule_name, name, reason);
                return Arc::new(self.crashed(reason));
            }
        };

        if let Some((cache, fingerprint)) = cache {
            cache.put(rule_name, name, fingerprint, Arc::clone(&visit));
        }
        visit
    }

    /// A crashed module contributes the initial context
    fn crashed(&self, reason: String) -> ModuleVisit<P> {
        ModuleVisit {
            contribution: self.initial_context.clone(),
            errors: Vec::new(),
            crash: Some(reason),
            cached: false,
        }
    }
}

impl<P, M> ProjectRunner for ProjectRule<P, M>
where
    P: Clone + Send + Sync + 'static,
    M: 'static,
{
    fn run(
        &self,
        rule_name: &str,
        input: &AnalysisInput<'_>,
    ) -> Result<ProjectOutcome, StructuralError> {
        let visits = schedule::fold_in_dependency_order(input.graph, input.pool, |name, upstream| {
            self.visit_module(rule_name, input, name, upstream)
        })?;

        let final_outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let all = visits.values().fold(self.initial_context.clone(), |merged, visit| {
                self.conversion.merge(&merged, &visit.contribution)
            });
            self.final_evaluations
                .iter()
                .flat_map(|evaluation| evaluation(&all))
                .collect::<Vec<_>>()
        }));

        let mut outcome = ProjectOutcome::default();
        match final_outcome {
            Ok(errors) => outcome.project_errors = errors,
            Err(payload) => {
                let reason = panic_message(&*payload);
                warn!("Rule `{}` crashed in its project evaluation: {}", rule_name, reason);
                outcome.project_crash = Some(reason);
            }
        }

        for (name, visit) in visits {
            if !visit.cached {
                outcome.visited += 1;
            }
            outcome.modules.insert(
                name,
                ModuleOutcome {
                    errors: visit.errors.clone(),
                    crash: visit.crash.clone(),
                },
            );
        }
        Ok(outcome)
    }
}

/// Run a module rule on one module, converting a panic into a crash outcome
pub(crate) fn check_module_isolated(
    runner: &dyn ModuleRunner,
    rule_name: &str,
    env: &ModuleEnv<'_>,
    cache: Option<(&AnalysisCache, u64)>,
) -> (ModuleOutcome, bool) {
    if let Some((cache, fingerprint)) = cache {
        if let Some(hit) = cache.get::<Vec<RuleError>>(rule_name, env.name(), fingerprint) {
            debug!("{}: reusing cached errors of {}", rule_name, env.name());
            let outcome = ModuleOutcome {
                errors: hit.as_ref().clone(),
                crash: None,
            };
            return (outcome, true);
        }
    }

    match panic::catch_unwind(AssertUnwindSafe(|| runner.check(env))) {
        Ok(errors) => {
            if let Some((cache, fingerprint)) = cache {
                cache.put(rule_name, env.name(), fingerprint, Arc::new(errors.clone()));
            }
            (ModuleOutcome { errors, crash: None }, false)
        }
        Err(payload) => {
            let reason = panic_message(&*payload);
            warn!("Rule `{}` crashed on {}: {}", rule_name, env.name(), reason);
            let outcome = ModuleOutcome {
                errors: Vec::new(),
                crash: Some(reason),
            };
            (outcome, false)
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "rule panicked".to_string()
    }
}
