//! Syntax model for modules under review
//!
//! Every node carries a [`Range`] with 1-based lines and columns and an exclusive end
//! column. Trees are immutable once built; the engine never rewrites them, fixes operate
//! on the module's source text instead.

mod lexer;
mod parser;

pub use parser::{parse_module, ParseError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in a source file (1-based)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// Line number (1-based)
    pub line: u32,
    /// Column number (1-based, counted in characters)
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A source range, `end` is exclusive
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Range used for findings that have no meaningful location
    pub const EMPTY: Range = Range {
        start: Position::new(0, 0),
        end: Position::new(0, 0),
    };

    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Shorthand for `Range::new(Position::new(..), Position::new(..))`
    pub const fn from_coords(
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Self {
        Self {
            start: Position::new(start_line, start_column),
            end: Position::new(end_line, end_column),
        }
    }

    /// Smallest range covering both
    pub fn cover(self, other: Range) -> Range {
        Range {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A syntax node with its source range
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub range: Range,
    pub value: T,
}

impl<T> Node<T> {
    pub fn new(range: Range, value: T) -> Self {
        Self { range, value }
    }
}

/// Dotted module name, e.g. `Html.Attributes`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct ModuleName(Vec<String>);

impl ModuleName {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for ModuleName {
    fn from(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl From<String> for ModuleName {
    fn from(dotted: String) -> Self {
        Self::from(dotted.as_str())
    }
}

impl From<ModuleName> for String {
    fn from(name: ModuleName) -> Self {
        name.to_string()
    }
}

/// One entry of an explicit exposing list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopLevelExpose {
    /// `value`
    Function(String),
    /// `Type` without its constructors
    TypeOrAlias(String),
    /// `Type(..)`
    TypeWithConstructors(String),
    /// `(+)`
    Infix(String),
}

impl TopLevelExpose {
    pub fn name(&self) -> &str {
        match self {
            TopLevelExpose::Function(name)
            | TopLevelExpose::TypeOrAlias(name)
            | TopLevelExpose::TypeWithConstructors(name)
            | TopLevelExpose::Infix(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Exposing {
    /// `exposing (..)`
    All(Range),
    Explicit(Vec<Node<TopLevelExpose>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleHeader {
    pub name: Node<ModuleName>,
    pub exposing: Node<Exposing>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module_name: Node<ModuleName>,
    pub alias: Option<Node<ModuleName>>,
    pub exposing: Option<Node<Exposing>>,
}

impl Import {
    /// Name used to qualify references through this import
    pub fn qualifier(&self) -> &ModuleName {
        self.alias
            .as_ref()
            .map(|alias| &alias.value)
            .unwrap_or(&self.module_name.value)
    }
}

/// A type annotation, kept as raw source text
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: Node<String>,
    pub type_annotation: Node<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub signature: Option<Node<Signature>>,
    pub name: Node<String>,
    pub arguments: Vec<Node<Pattern>>,
    pub body: Node<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAlias {
    pub name: Node<String>,
    pub generics: Vec<Node<String>>,
    pub type_annotation: Node<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomType {
    pub name: Node<String>,
    pub generics: Vec<Node<String>>,
    pub constructors: Vec<Node<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Function(Function),
    TypeAlias(TypeAlias),
    CustomType(CustomType),
}

impl Declaration {
    /// Name introduced by the declaration
    pub fn name(&self) -> &Node<String> {
        match self {
            Declaration::Function(function) => &function.name,
            Declaration::TypeAlias(alias) => &alias.name,
            Declaration::CustomType(custom) => &custom.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSetter {
    pub field: Node<String>,
    pub value: Node<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LetDeclaration {
    Function(Function),
    Destructuring {
        pattern: Node<Pattern>,
        expression: Node<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseBranch {
    pub pattern: Node<Pattern>,
    pub body: Node<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Unit,
    Integer(i64),
    Float(f64),
    String(String),
    Char(char),
    /// A value or constructor reference, `module_name` holds the written qualifier
    FunctionOrValue {
        module_name: Vec<String>,
        name: String,
    },
    /// Operator used as a function, `(+)`
    PrefixOperator(String),
    Application(Vec<Node<Expression>>),
    OperatorApplication {
        operator: String,
        left: Box<Node<Expression>>,
        right: Box<Node<Expression>>,
    },
    Negation(Box<Node<Expression>>),
    Parenthesized(Box<Node<Expression>>),
    Tuple(Vec<Node<Expression>>),
    List(Vec<Node<Expression>>),
    Record(Vec<Node<RecordSetter>>),
    RecordUpdate {
        record: Node<String>,
        setters: Vec<Node<RecordSetter>>,
    },
    RecordAccess {
        record: Box<Node<Expression>>,
        field: Node<String>,
    },
    /// `.field`
    RecordAccessFunction(String),
    If {
        condition: Box<Node<Expression>>,
        then_branch: Box<Node<Expression>>,
        else_branch: Box<Node<Expression>>,
    },
    Let {
        declarations: Vec<Node<LetDeclaration>>,
        body: Box<Node<Expression>>,
    },
    Case {
        subject: Box<Node<Expression>>,
        branches: Vec<CaseBranch>,
    },
    Lambda {
        arguments: Vec<Node<Pattern>>,
        body: Box<Node<Expression>>,
    },
}

impl Expression {
    /// Direct sub-expressions, left to right
    pub fn children(&self) -> Vec<&Node<Expression>> {
        match self {
            Expression::Unit
            | Expression::Integer(_)
            | Expression::Float(_)
            | Expression::String(_)
            | Expression::Char(_)
            | Expression::FunctionOrValue { .. }
            | Expression::PrefixOperator(_)
            | Expression::RecordAccessFunction(_) => Vec::new(),
            Expression::Application(items) | Expression::Tuple(items) | Expression::List(items) => {
                items.iter().collect()
            }
            Expression::OperatorApplication { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            Expression::Negation(inner) | Expression::Parenthesized(inner) => vec![inner.as_ref()],
            Expression::Record(setters) | Expression::RecordUpdate { setters, .. } => {
                setters.iter().map(|setter| &setter.value.value).collect()
            }
            Expression::RecordAccess { record, .. } => vec![record.as_ref()],
            Expression::If {
                condition,
                then_branch,
                else_branch,
            } => vec![
                condition.as_ref(),
                then_branch.as_ref(),
                else_branch.as_ref(),
            ],
            Expression::Let { declarations, body } => {
                let mut children: Vec<&Node<Expression>> = declarations
                    .iter()
                    .map(|declaration| match &declaration.value {
                        LetDeclaration::Function(function) => &function.body,
                        LetDeclaration::Destructuring { expression, .. } => expression,
                    })
                    .collect();
                children.push(body.as_ref());
                children
            }
            Expression::Case { subject, branches } => {
                let mut children = vec![subject.as_ref()];
                children.extend(branches.iter().map(|branch| &branch.body));
                children
            }
            Expression::Lambda { body, .. } => vec![body.as_ref()],
        }
    }

    /// Whether the expression is a literal value
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expression::Integer(_)
                | Expression::Float(_)
                | Expression::String(_)
                | Expression::Char(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `_`
    All,
    Unit,
    Var(String),
    Integer(i64),
    String(String),
    Char(char),
    Tuple(Vec<Node<Pattern>>),
    List(Vec<Node<Pattern>>),
    Cons {
        head: Box<Node<Pattern>>,
        tail: Box<Node<Pattern>>,
    },
    /// Constructor pattern, possibly qualified
    Named {
        module_name: Vec<String>,
        name: String,
        arguments: Vec<Node<Pattern>>,
    },
    Record(Vec<Node<String>>),
    As {
        pattern: Box<Node<Pattern>>,
        name: Node<String>,
    },
    Parenthesized(Box<Node<Pattern>>),
}

impl Pattern {
    /// Names bound by this pattern, in source order
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_bound_names(&mut names);
        names
    }

    fn collect_bound_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Pattern::Var(name) => names.push(name),
            Pattern::Tuple(items) | Pattern::List(items) => {
                for item in items {
                    item.value.collect_bound_names(names);
                }
            }
            Pattern::Cons { head, tail } => {
                head.value.collect_bound_names(names);
                tail.value.collect_bound_names(names);
            }
            Pattern::Named { arguments, .. } => {
                for argument in arguments {
                    argument.value.collect_bound_names(names);
                }
            }
            Pattern::Record(fields) => names.extend(fields.iter().map(|f| f.value.as_str())),
            Pattern::As { pattern, name } => {
                pattern.value.collect_bound_names(names);
                names.push(&name.value);
            }
            Pattern::Parenthesized(inner) => inner.value.collect_bound_names(names),
            Pattern::All
            | Pattern::Unit
            | Pattern::Integer(_)
            | Pattern::String(_)
            | Pattern::Char(_) => {}
        }
    }

    /// Constructor references made by this pattern, with their ranges
    pub fn constructor_references<'a>(
        node: &'a Node<Pattern>,
        out: &mut Vec<(Range, &'a [String], &'a str)>,
    ) {
        match &node.value {
            Pattern::Named {
                module_name,
                name,
                arguments,
            } => {
                out.push((node.range, module_name.as_slice(), name.as_str()));
                for argument in arguments {
                    Pattern::constructor_references(argument, out);
                }
            }
            Pattern::Tuple(items) | Pattern::List(items) => {
                for item in items {
                    Pattern::constructor_references(item, out);
                }
            }
            Pattern::Cons { head, tail } => {
                Pattern::constructor_references(head, out);
                Pattern::constructor_references(tail, out);
            }
            Pattern::As { pattern, .. } | Pattern::Parenthesized(pattern) => {
                Pattern::constructor_references(pattern, out);
            }
            _ => {}
        }
    }
}

/// A parsed module
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub header: Node<ModuleHeader>,
    pub imports: Vec<Node<Import>>,
    pub declarations: Vec<Node<Declaration>>,
    pub comments: Vec<Node<String>>,
    /// Source text the tree was parsed from
    pub source: String,
}

impl Module {
    pub fn name(&self) -> &ModuleName {
        &self.header.value.name.value
    }

    /// Names of imported modules, in file order
    pub fn imported_modules(&self) -> impl Iterator<Item = &ModuleName> {
        self.imports.iter().map(|import| &import.value.module_name.value)
    }

    /// Top-level functions
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.declarations.iter().filter_map(|d| match &d.value {
            Declaration::Function(function) => Some(function),
            _ => None,
        })
    }
}
