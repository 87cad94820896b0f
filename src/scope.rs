//! Scope resolution
//!
//! Builds, for one module, a [`LookupTable`] mapping every reference occurrence to the
//! module that declares it. Resolution uses only the module's own syntax plus the
//! [`ExposedNames`] summary of each module it imports:
//!
//! 1. local bindings (arguments, let bindings, lambda arguments, case patterns) and the
//!    module's own top-level declarations resolve to [`Resolution::Local`];
//! 2. unqualified names resolve through the exposing lists of the implicit core imports
//!    and then the explicit imports in file order, later exposings shadowing earlier ones;
//! 3. qualified names resolve through the import qualifier (alias or full name), later
//!    imports of the same qualifier shadowing earlier ones;
//! 4. everything else is [`Resolution::Unresolved`].

use crate::syntax::{
    Declaration, Exposing, Expression, Import, LetDeclaration, Module, ModuleName, Node,
    Pattern, Range, TopLevelExpose,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Names a module makes visible to its importers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposedNames {
    /// Functions and values
    pub values: BTreeSet<String>,
    /// Types mapped to their exposed constructors (empty for opaque types)
    pub types: BTreeMap<String, BTreeSet<String>>,
    /// Record type aliases, which double as constructor functions
    pub record_aliases: BTreeSet<String>,
}

impl ExposedNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_type<I, S>(mut self, name: &str, constructors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types
            .entry(name.to_string())
            .or_default()
            .extend(constructors.into_iter().map(Into::into));
        self
    }

    /// Summary of what `module` exposes, limited to what it actually declares
    pub fn from_module(module: &Module) -> Self {
        let declared = Self::declared_by(module);
        match &module.header.value.exposing.value {
            Exposing::All(_) => declared,
            Exposing::Explicit(items) => {
                let mut exposed = Self::new();
                for item in items {
                    match &item.value {
                        TopLevelExpose::Function(name) => {
                            if declared.values.contains(name) {
                                exposed.values.insert(name.clone());
                            }
                        }
                        TopLevelExpose::TypeOrAlias(name) => {
                            if let Some(constructors) = declared.types.get(name) {
                                if declared.record_aliases.contains(name) {
                                    exposed.types.insert(name.clone(), constructors.clone());
                                    exposed.record_aliases.insert(name.clone());
                                } else {
                                    exposed.types.insert(name.clone(), BTreeSet::new());
                                }
                            }
                        }
                        TopLevelExpose::TypeWithConstructors(name) => {
                            if let Some(constructors) = declared.types.get(name) {
                                exposed.types.insert(name.clone(), constructors.clone());
                            }
                        }
                        TopLevelExpose::Infix(_) => {}
                    }
                }
                exposed
            }
        }
    }

    /// Everything the module declares at top level
    fn declared_by(module: &Module) -> Self {
        let mut declared = Self::new();
        for declaration in &module.declarations {
            match &declaration.value {
                Declaration::Function(function) => {
                    declared.values.insert(function.name.value.clone());
                }
                Declaration::TypeAlias(alias) => {
                    let name = alias.name.value.clone();
                    if alias.type_annotation.value.trim_start().starts_with('{') {
                        declared.types.insert(name.clone(), BTreeSet::from([name.clone()]));
                        declared.record_aliases.insert(name);
                    } else {
                        declared.types.insert(name, BTreeSet::new());
                    }
                }
                Declaration::CustomType(custom) => {
                    declared.types.insert(
                        custom.name.value.clone(),
                        custom.constructors.iter().map(|c| c.value.clone()).collect(),
                    );
                }
            }
        }
        declared
    }

    /// Check if `name` is an exposed value or constructor
    pub fn exposes_value(&self, name: &str) -> bool {
        self.values.contains(name) || self.constructors().any(|c| c == name)
    }

    /// All exposed constructors
    pub fn constructors(&self) -> impl Iterator<Item = &String> {
        self.types.values().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.types.is_empty()
    }
}

/// What a reference occurrence resolves to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// Declared in the module itself, or bound locally
    Local,
    /// Declared in another module
    Module(ModuleName),
    /// Not resolvable; never guessed
    Unresolved,
}

/// Per-module mapping from reference ranges to their resolution
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    entries: HashMap<Range, Resolution>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolution of the reference at `range`, `None` if `range` is not a reference
    pub fn get(&self, range: Range) -> Option<&Resolution> {
        self.entries.get(&range)
    }

    /// Declaring module of the reference at `range`, `None` when local or unresolved
    pub fn module_for(&self, range: Range) -> Option<&ModuleName> {
        match self.entries.get(&range)? {
            Resolution::Module(name) => Some(name),
            Resolution::Local | Resolution::Unresolved => None,
        }
    }

    pub fn insert(&mut self, range: Range, resolution: Resolution) {
        self.entries.insert(range, resolution);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Range, &Resolution)> {
        self.entries.iter()
    }
}

/// Result of resolving one module
#[derive(Debug, Clone, Default)]
pub struct ModuleScope {
    pub lookup: LookupTable,
    /// Imports naming modules that are neither in the project nor known dependencies
    pub unresolved_imports: Vec<Node<ModuleName>>,
}

/// Modules every module imports implicitly, with their exposing lists
fn implicit_imports() -> Vec<(ModuleName, Option<ModuleName>, Exposing)> {
    let explicit = |items: &[TopLevelExpose]| {
        Exposing::Explicit(
            items
                .iter()
                .cloned()
                .map(|item| Node::new(Range::EMPTY, item))
                .collect(),
        )
    };
    vec![
        (ModuleName::from("Basics"), None, Exposing::All(Range::EMPTY)),
        (
            ModuleName::from("List"),
            None,
            explicit(&[
                TopLevelExpose::TypeOrAlias("List".to_string()),
                TopLevelExpose::Infix("::".to_string()),
            ]),
        ),
        (
            ModuleName::from("Maybe"),
            None,
            explicit(&[TopLevelExpose::TypeWithConstructors("Maybe".to_string())]),
        ),
        (
            ModuleName::from("Result"),
            None,
            explicit(&[TopLevelExpose::TypeWithConstructors("Result".to_string())]),
        ),
        (
            ModuleName::from("String"),
            None,
            explicit(&[TopLevelExpose::TypeOrAlias("String".to_string())]),
        ),
        (
            ModuleName::from("Char"),
            None,
            explicit(&[TopLevelExpose::TypeOrAlias("Char".to_string())]),
        ),
        (ModuleName::from("Tuple"), None, explicit(&[])),
        (ModuleName::from("Debug"), None, explicit(&[])),
        (
            ModuleName::from("Platform"),
            None,
            explicit(&[TopLevelExpose::TypeOrAlias("Program".to_string())]),
        ),
        (
            ModuleName::from("Platform.Cmd"),
            Some(ModuleName::from("Cmd")),
            explicit(&[TopLevelExpose::TypeOrAlias("Cmd".to_string())]),
        ),
        (
            ModuleName::from("Platform.Sub"),
            Some(ModuleName::from("Sub")),
            explicit(&[TopLevelExpose::TypeOrAlias("Sub".to_string())]),
        ),
    ]
}

/// Summaries of the always-available core modules
pub fn core_modules() -> BTreeMap<ModuleName, ExposedNames> {
    let mut core = BTreeMap::new();
    core.insert(
        ModuleName::from("Basics"),
        ExposedNames::new()
            .with_values([
                "identity", "always", "not", "xor", "min", "max", "compare", "toFloat", "round",
                "floor", "ceiling", "truncate", "modBy", "remainderBy", "negate", "abs", "clamp",
                "sqrt", "logBase", "e", "pi", "cos", "sin", "tan", "acos", "asin", "atan",
                "atan2", "degrees", "radians", "turns", "isNaN", "isInfinite", "never",
            ])
            .with_type("Int", Vec::<String>::new())
            .with_type("Float", Vec::<String>::new())
            .with_type("Bool", ["True", "False"])
            .with_type("Order", ["LT", "EQ", "GT"])
            .with_type("Never", Vec::<String>::new()),
    );
    core.insert(
        ModuleName::from("List"),
        ExposedNames::new()
            .with_values([
                "singleton", "repeat", "range", "map", "indexedMap", "foldl", "foldr", "filter",
                "filterMap", "length", "reverse", "member", "all", "any", "maximum", "minimum",
                "sum", "product", "append", "concat", "concatMap", "intersperse", "map2",
                "sort", "sortBy", "sortWith", "isEmpty", "head", "tail", "take", "drop",
                "partition", "unzip",
            ])
            .with_type("List", Vec::<String>::new()),
    );
    core.insert(
        ModuleName::from("Maybe"),
        ExposedNames::new()
            .with_values(["withDefault", "map", "map2", "andThen"])
            .with_type("Maybe", ["Just", "Nothing"]),
    );
    core.insert(
        ModuleName::from("Result"),
        ExposedNames::new()
            .with_values([
                "map", "map2", "andThen", "withDefault", "toMaybe", "fromMaybe", "mapError",
            ])
            .with_type("Result", ["Ok", "Err"]),
    );
    core.insert(
        ModuleName::from("String"),
        ExposedNames::new()
            .with_values([
                "isEmpty", "length", "reverse", "repeat", "replace", "append", "concat", "split",
                "join", "words", "lines", "slice", "left", "right", "dropLeft", "dropRight",
                "contains", "startsWith", "endsWith", "indexes", "toInt", "fromInt", "toFloat",
                "fromFloat", "fromChar", "toUpper", "toLower", "trim", "toList", "fromList",
            ])
            .with_type("String", Vec::<String>::new()),
    );
    core.insert(
        ModuleName::from("Char"),
        ExposedNames::new()
            .with_values([
                "isUpper", "isLower", "isAlpha", "isAlphaNum", "isDigit", "toCode", "fromCode",
            ])
            .with_type("Char", Vec::<String>::new()),
    );
    core.insert(
        ModuleName::from("Tuple"),
        ExposedNames::new().with_values([
            "pair", "first", "second", "mapFirst", "mapSecond", "mapBoth",
        ]),
    );
    core.insert(
        ModuleName::from("Debug"),
        ExposedNames::new().with_values(["toString", "log", "todo"]),
    );
    core.insert(
        ModuleName::from("Platform"),
        ExposedNames::new()
            .with_values(["worker"])
            .with_type("Program", Vec::<String>::new()),
    );
    core.insert(
        ModuleName::from("Platform.Cmd"),
        ExposedNames::new()
            .with_values(["none", "batch", "map"])
            .with_type("Cmd", Vec::<String>::new()),
    );
    core.insert(
        ModuleName::from("Platform.Sub"),
        ExposedNames::new()
            .with_values(["none", "batch", "map"])
            .with_type("Sub", Vec::<String>::new()),
    );
    core
}

/// Resolves modules against a fixed set of known module summaries
pub struct ScopeResolver<'a> {
    known: &'a BTreeMap<ModuleName, ExposedNames>,
}

impl<'a> ScopeResolver<'a> {
    /// `known` holds the summaries of project modules, dependencies and core modules
    pub fn new(known: &'a BTreeMap<ModuleName, ExposedNames>) -> Self {
        Self { known }
    }

    pub fn resolve(&self, module: &Module) -> ModuleScope {
        let mut walker = Walker {
            lookup: LookupTable::new(),
            locals: Vec::new(),
            top_level: top_level_names(module),
            unqualified: HashMap::new(),
            qualified: HashMap::new(),
            known: self.known,
        };

        for (name, alias, exposing) in implicit_imports() {
            walker.add_import(&name, alias.as_ref(), Some(&exposing));
        }

        let mut unresolved_imports = Vec::new();
        for import in &module.imports {
            let Import {
                module_name,
                alias,
                exposing,
            } = &import.value;
            if !self.known.contains_key(&module_name.value) {
                unresolved_imports.push(module_name.clone());
            }
            walker.add_import(
                &module_name.value,
                alias.as_ref().map(|a| &a.value),
                exposing.as_ref().map(|e| &e.value),
            );
        }

        for declaration in &module.declarations {
            if let Declaration::Function(function) = &declaration.value {
                walker.patterns(&function.arguments);
                walker.with_scope(bound_by(&function.arguments), |w| w.expression(&function.body));
            }
        }

        log::debug!(
            "resolved {} references in {} ({} unresolved imports)",
            walker.lookup.len(),
            module.name(),
            unresolved_imports.len()
        );

        ModuleScope {
            lookup: walker.lookup,
            unresolved_imports,
        }
    }
}

fn top_level_names(module: &Module) -> HashSet<String> {
    let declared = ExposedNames::declared_by(module);
    declared
        .values
        .iter()
        .chain(declared.constructors())
        .cloned()
        .collect()
}

fn bound_by(patterns: &[Node<Pattern>]) -> HashSet<String> {
    patterns
        .iter()
        .flat_map(|p| p.value.bound_names())
        .map(str::to_string)
        .collect()
}

struct Walker<'a> {
    lookup: LookupTable,
    locals: Vec<HashSet<String>>,
    top_level: HashSet<String>,
    /// Unqualified name to its module, `None` when it came through an unknown import
    unqualified: HashMap<String, Option<ModuleName>>,
    /// Qualifier to the module it stands for
    qualified: HashMap<ModuleName, ModuleName>,
    known: &'a BTreeMap<ModuleName, ExposedNames>,
}

impl Walker<'_> {
    fn add_import(
        &mut self,
        name: &ModuleName,
        alias: Option<&ModuleName>,
        exposing: Option<&Exposing>,
    ) {
        let qualifier = alias.unwrap_or(name).clone();
        self.qualified.insert(qualifier, name.clone());

        let Some(exposing) = exposing else {
            return;
        };
        let known = self.known;
        let summary = known.get(name);
        let target = summary.map(|_| name.clone());

        match (exposing, summary) {
            (Exposing::All(_), Some(summary)) => {
                for value in summary.values.iter().chain(summary.constructors()) {
                    self.unqualified.insert(value.clone(), target.clone());
                }
            }
            (Exposing::All(_), None) => {}
            (Exposing::Explicit(items), _) => {
                for item in items {
                    match &item.value {
                        TopLevelExpose::Function(value) => {
                            let resolved = target.clone().filter(|_| {
                                summary.is_some_and(|s| s.values.contains(value))
                            });
                            self.unqualified.insert(value.clone(), resolved);
                        }
                        TopLevelExpose::TypeWithConstructors(type_name) => {
                            let constructors = summary.and_then(|s| s.types.get(type_name));
                            for constructor in constructors.into_iter().flatten() {
                                self.unqualified.insert(constructor.clone(), target.clone());
                            }
                        }
                        TopLevelExpose::TypeOrAlias(type_name) => {
                            if summary.is_some_and(|s| s.record_aliases.contains(type_name)) {
                                self.unqualified.insert(type_name.clone(), target.clone());
                            }
                        }
                        TopLevelExpose::Infix(_) => {}
                    }
                }
            }
        }
    }

    fn resolve_unqualified(&self, name: &str) -> Resolution {
        if self.locals.iter().any(|scope| scope.contains(name)) || self.top_level.contains(name) {
            return Resolution::Local;
        }
        match self.unqualified.get(name) {
            Some(Some(module)) => Resolution::Module(module.clone()),
            Some(None) | None => Resolution::Unresolved,
        }
    }

    fn resolve_qualified(&self, qualifier: &[String], name: &str) -> Resolution {
        let qualifier = ModuleName::new(qualifier.to_vec());
        let Some(module) = self.qualified.get(&qualifier) else {
            return Resolution::Unresolved;
        };
        match self.known.get(module) {
            Some(summary) if summary.exposes_value(name) => Resolution::Module(module.clone()),
            _ => Resolution::Unresolved,
        }
    }

    fn reference(&mut self, range: Range, qualifier: &[String], name: &str) {
        let resolution = if qualifier.is_empty() {
            self.resolve_unqualified(name)
        } else {
            self.resolve_qualified(qualifier, name)
        };
        self.lookup.insert(range, resolution);
    }

    fn with_scope(&mut self, names: HashSet<String>, f: impl FnOnce(&mut Self)) {
        self.locals.push(names);
        f(self);
        self.locals.pop();
    }

    /// Record the constructor references made by patterns
    fn patterns(&mut self, patterns: &[Node<Pattern>]) {
        for pattern in patterns {
            let mut references = Vec::new();
            Pattern::constructor_references(pattern, &mut references);
            for (range, qualifier, name) in references {
                self.reference(range, qualifier, name);
            }
        }
    }

    fn expression(&mut self, node: &Node<Expression>) {
        match &node.value {
            Expression::FunctionOrValue { module_name, name } => {
                self.reference(node.range, module_name, name);
            }
            Expression::RecordUpdate { record, setters } => {
                self.reference(record.range, &[], &record.value);
                for setter in setters {
                    self.expression(&setter.value.value);
                }
            }
            Expression::Let { declarations, body } => {
                let mut names = HashSet::new();
                for declaration in declarations {
                    match &declaration.value {
                        LetDeclaration::Function(function) => {
                            names.insert(function.name.value.clone());
                        }
                        LetDeclaration::Destructuring { pattern, .. } => {
                            let bound = pattern.value.bound_names();
                            names.extend(bound.into_iter().map(str::to_string));
                        }
                    }
                }
                self.with_scope(names, |w| {
                    for declaration in declarations {
                        match &declaration.value {
                            LetDeclaration::Function(function) => {
                                w.patterns(&function.arguments);
                                w.with_scope(bound_by(&function.arguments), |w| {
                                    w.expression(&function.body)
                                });
                            }
                            LetDeclaration::Destructuring {
                                pattern,
                                expression,
                            } => {
                                w.patterns(std::slice::from_ref(pattern));
                                w.expression(expression);
                            }
                        }
                    }
                    w.expression(body);
                });
            }
            Expression::Case { subject, branches } => {
                self.expression(subject);
                for branch in branches {
                    self.patterns(std::slice::from_ref(&branch.pattern));
                    let names = bound_by(std::slice::from_ref(&branch.pattern));
                    self.with_scope(names, |w| w.expression(&branch.body));
                }
            }
            Expression::Lambda { arguments, body } => {
                self.patterns(arguments);
                self.with_scope(bound_by(arguments), |w| w.expression(body));
            }
            other => {
                for child in other.children() {
                    self.expression(child);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_module;

    fn known_with(modules: &[&Module]) -> BTreeMap<ModuleName, ExposedNames> {
        let mut known = core_modules();
        for module in modules {
            known.insert(module.name().clone(), ExposedNames::from_module(module));
        }
        known
    }

    /// Resolution of the first reference named `name` in source order
    fn resolution_of(module: &Module, scope: &ModuleScope, name: &str) -> Resolution {
        let mut found: Vec<(Range, Resolution)> = Vec::new();
        fn collect(
            node: &Node<Expression>,
            name: &str,
            scope: &ModuleScope,
            out: &mut Vec<(Range, Resolution)>,
        ) {
            if let Expression::FunctionOrValue { name: n, .. } = &node.value {
                if n == name {
                    let resolution = scope
                        .lookup
                        .get(node.range)
                        .cloned()
                        .unwrap_or(Resolution::Unresolved);
                    out.push((node.range, resolution));
                }
            }
            for child in node.value.children() {
                collect(child, name, scope, out);
            }
        }
        for function in module.functions() {
            collect(&function.body, name, scope, &mut found);
        }
        found.sort_by_key(|(range, _)| *range);
        found.into_iter().next().map(|(_, r)| r).unwrap()
    }

    #[test]
    fn test_exposed_names_respect_exposing_list() {
        let module = parse_module(
            "module Lib exposing (visible, Shape(..), Opaque, Config)

visible = 1
hidden = 2

type Shape = Circle | Square

type Opaque = Opaque Int

type alias Config =
    { size : Int }
",
        )
        .unwrap();
        let exposed = ExposedNames::from_module(&module);
        assert!(exposed.values.contains("visible"));
        assert!(!exposed.values.contains("hidden"));
        assert!(exposed.exposes_value("Circle"));
        assert!(!exposed.exposes_value("Opaque"));
        assert!(exposed.exposes_value("Config"));
    }

    #[test]
    fn test_exposing_all_exposes_everything_declared() {
        let module = parse_module("module Lib exposing (..)\n\na = 1\n\ntype T = A | B\n").unwrap();
        let exposed = ExposedNames::from_module(&module);
        assert!(exposed.values.contains("a"));
        assert!(exposed.exposes_value("B"));
    }

    #[test]
    fn test_resolves_qualified_aliased_and_exposed_names() {
        let lib = parse_module("module Data.Lib exposing (..)\n\nrun x = x\nhelper = 2\n").unwrap();
        let main = parse_module(
            "module Main exposing (..)

import Data.Lib as L exposing (run)

main = run (L.helper) (List.map) (Just 1)
",
        )
        .unwrap();
        let known = known_with(&[&lib]);
        let scope = ScopeResolver::new(&known).resolve(&main);
        let module = |name: &str| Resolution::Module(ModuleName::from(name));

        assert!(scope.unresolved_imports.is_empty());
        assert_eq!(resolution_of(&main, &scope, "run"), module("Data.Lib"));
        assert_eq!(resolution_of(&main, &scope, "helper"), module("Data.Lib"));
        assert_eq!(resolution_of(&main, &scope, "map"), module("List"));
        assert_eq!(resolution_of(&main, &scope, "Just"), module("Maybe"));
    }

    #[test]
    fn test_full_name_is_not_a_qualifier_when_aliased() {
        let lib = parse_module("module Data.Lib exposing (..)\n\nhelper = 2\n").unwrap();
        let main = parse_module(
            "module Main exposing (..)\n\nimport Data.Lib as L\n\nmain = Data.Lib.helper\n",
        )
        .unwrap();
        let known = known_with(&[&lib]);
        let scope = ScopeResolver::new(&known).resolve(&main);
        assert_eq!(resolution_of(&main, &scope, "helper"), Resolution::Unresolved);
    }

    #[test]
    fn test_locals_shadow_imports() {
        let lib = parse_module("module Lib exposing (..)\n\nvalue = 1\n").unwrap();
        let main = parse_module(
            "module Main exposing (..)

import Lib exposing (value)

first value = value

second =
    let
        value = 2
    in
    value

third = \\value -> value
",
        )
        .unwrap();
        let known = known_with(&[&lib]);
        let scope = ScopeResolver::new(&known).resolve(&main);
        let locals = scope
            .lookup
            .iter()
            .filter(|(_, resolution)| **resolution == Resolution::Local)
            .count();
        assert_eq!(locals, 3);
        assert!(scope.lookup.iter().all(|(_, r)| *r == Resolution::Local));
    }

    #[test]
    fn test_later_exposing_shadows_earlier() {
        let a = parse_module("module A exposing (..)\n\nshared = 1\n").unwrap();
        let b = parse_module("module B exposing (..)\n\nshared = 2\n").unwrap();
        let main = parse_module(
            "module Main exposing (..)

import A exposing (shared)
import B exposing (shared)

main = shared
",
        )
        .unwrap();
        let known = known_with(&[&a, &b]);
        let scope = ScopeResolver::new(&known).resolve(&main);
        assert_eq!(
            resolution_of(&main, &scope, "shared"),
            Resolution::Module(ModuleName::from("B"))
        );
    }

    #[test]
    fn test_later_alias_shadows_earlier() {
        let a = parse_module("module A exposing (..)\n\nshared = 1\n").unwrap();
        let b = parse_module("module B exposing (..)\n\nshared = 2\n").unwrap();
        let main = parse_module(
            "module Main exposing (..)

import A as X
import B as X

main = X.shared
",
        )
        .unwrap();
        let known = known_with(&[&a, &b]);
        let scope = ScopeResolver::new(&known).resolve(&main);
        assert_eq!(
            resolution_of(&main, &scope, "shared"),
            Resolution::Module(ModuleName::from("B"))
        );
    }

    #[test]
    fn test_explicit_import_shadows_core_modules() {
        let lib = parse_module("module Lib exposing (identity)\n\nidentity x = x\n").unwrap();
        let main = parse_module(
            "module Main exposing (..)

import Lib exposing (identity)

main = identity (always 1)
",
        )
        .unwrap();
        let known = known_with(&[&lib]);
        let scope = ScopeResolver::new(&known).resolve(&main);
        assert_eq!(
            resolution_of(&main, &scope, "identity"),
            Resolution::Module(ModuleName::from("Lib"))
        );
        assert_eq!(
            resolution_of(&main, &scope, "always"),
            Resolution::Module(ModuleName::from("Basics"))
        );
    }

    #[test]
    fn test_case_patterns_bind_and_reference_constructors() {
        let main = parse_module(
            "module Main exposing (..)

unwrap m =
    case m of
        Just inner ->
            inner

        Nothing ->
            0
",
        )
        .unwrap();
        let known = known_with(&[]);
        let scope = ScopeResolver::new(&known).resolve(&main);
        assert_eq!(resolution_of(&main, &scope, "inner"), Resolution::Local);
        let maybe = ModuleName::from("Maybe");
        let constructor_hits = scope
            .lookup
            .iter()
            .filter(|(_, r)| **r == Resolution::Module(maybe.clone()))
            .count();
        assert_eq!(constructor_hits, 2);
    }

    #[test]
    fn test_unknown_import_is_reported_and_left_unresolved() {
        let main = parse_module(
            "module Main exposing (..)

import Missing exposing (thing)

main = thing (Missing.other)
",
        )
        .unwrap();
        let known = known_with(&[]);
        let scope = ScopeResolver::new(&known).resolve(&main);
        assert_eq!(scope.unresolved_imports.len(), 1);
        assert_eq!(scope.unresolved_imports[0].value, ModuleName::from("Missing"));
        assert_eq!(resolution_of(&main, &scope, "thing"), Resolution::Unresolved);
        assert_eq!(resolution_of(&main, &scope, "other"), Resolution::Unresolved);
    }
}
