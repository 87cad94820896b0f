//! Layout-aware recursive-descent parser for the core language subset
//!
//! Layout follows the offside rule: an expression ends at the first token whose column is
//! not greater than the current floor. Top-level declarations use floor 1, let bindings and
//! case branches use the column they start at.

use super::lexer::{Keyword, Lexer, Token, TokenKind};
use super::{
    CaseBranch, CustomType, Declaration, Exposing, Expression, Function, Import,
    LetDeclaration, Module, ModuleHeader, ModuleName, Node, Pattern, Position, Range,
    RecordSetter, Signature, TopLevelExpose, TypeAlias,
};
use thiserror::Error;

/// Error produced while parsing a module
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("lex error at {position}: {message}")]
    Lex { position: Position, message: String },

    #[error("parse error at {position}: expected {expected}, found {found}")]
    Unexpected {
        position: Position,
        expected: String,
        found: String,
    },
}

/// Parse a module's source text
pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let lexed = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(source, lexed.tokens);

    let header = parser.module_header()?;
    let mut imports = Vec::new();
    while parser.check_keyword(Keyword::Import) {
        imports.push(parser.import()?);
    }
    let declarations = parser.declarations()?;

    Ok(Module {
        header,
        imports,
        declarations,
        comments: lexed.comments,
        source: source.to_string(),
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

fn operator_info(op: &str) -> (u8, Assoc) {
    match op {
        "<|" => (0, Assoc::Right),
        "|>" => (0, Assoc::Left),
        "||" => (2, Assoc::Right),
        "&&" => (3, Assoc::Right),
        "==" | "/=" | "<" | ">" | "<=" | ">=" => (4, Assoc::Left),
        "++" | "::" => (5, Assoc::Right),
        "+" | "-" => (6, Assoc::Left),
        "*" | "/" | "//" => (7, Assoc::Left),
        "^" => (8, Assoc::Right),
        ">>" => (9, Assoc::Right),
        _ => (9, Assoc::Left),
    }
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    floor: u32,
    last_end: Position,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            floor: 1,
            last_end: Position::new(1, 1),
        }
    }

    fn peek(&self) -> &Token {
        // the lexer always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
            self.last_end = token.range.end;
        }
        token
    }

    /// Undo the last `advance` so errors point at the offending token
    fn step_back(&mut self, token: &Token) {
        if token.kind != TokenKind::Eof {
            self.pos -= 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().kind == TokenKind::Keyword(keyword)
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token, ParseError> {
        self.expect(TokenKind::Keyword(keyword), &format!("{:?}", keyword).to_lowercase())
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::Unexpected {
            position: token.range.start,
            expected: expected.to_string(),
            found: describe(&token.kind),
        }
    }

    /// True when the current token cannot continue the expression being parsed
    fn at_boundary(&self) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Eof || token.range.start.column <= self.floor
    }

    fn with_floor<T>(
        &mut self,
        floor: u32,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = std::mem::replace(&mut self.floor, floor);
        let result = f(self);
        self.floor = saved;
        result
    }

    fn lower_name(&mut self, expected: &str) -> Result<Node<String>, ParseError> {
        match &self.peek().kind {
            TokenKind::Lower { qualifiers, name } if qualifiers.is_empty() => {
                let name = name.clone();
                let token = self.advance();
                Ok(Node::new(token.range, name))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn upper_name(&mut self, expected: &str) -> Result<Node<String>, ParseError> {
        match &self.peek().kind {
            TokenKind::Upper { qualifiers, name } if qualifiers.is_empty() => {
                let name = name.clone();
                let token = self.advance();
                Ok(Node::new(token.range, name))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn module_name(&mut self) -> Result<Node<ModuleName>, ParseError> {
        match &self.peek().kind {
            TokenKind::Upper { qualifiers, name } => {
                let mut segments = qualifiers.clone();
                segments.push(name.clone());
                let token = self.advance();
                Ok(Node::new(token.range, ModuleName::new(segments)))
            }
            _ => Err(self.unexpected("module name")),
        }
    }

    /// Source text between the current token and the next boundary
    fn raw_until_boundary(&mut self) -> Node<String> {
        let start = self.peek().clone();
        let mut end_offset = start.start_offset;
        let mut end = start.range.start;
        while !self.at_boundary() {
            let token = self.advance();
            end_offset = token.end_offset;
            end = token.range.end;
        }
        let text = self.source[start.start_offset..end_offset].to_string();
        Node::new(Range::new(start.range.start, end), text)
    }

    // ---- header and imports ----

    fn module_header(&mut self) -> Result<Node<ModuleHeader>, ParseError> {
        let start = self.peek().range.start;
        if self.check_keyword(Keyword::Port) {
            self.advance();
        }
        self.expect_keyword(Keyword::Module)?;
        let name = self.module_name()?;
        self.expect_keyword(Keyword::Exposing)?;
        let exposing = self.exposing_list()?;
        let range = Range::new(start, exposing.range.end);
        Ok(Node::new(range, ModuleHeader { name, exposing }))
    }

    fn exposing_list(&mut self) -> Result<Node<Exposing>, ParseError> {
        let open = self.expect(TokenKind::LParen, "`(`")?;

        if self.check(&TokenKind::DotDot) {
            self.advance();
            let close = self.expect(TokenKind::RParen, "`)`")?;
            let range = Range::new(open.range.start, close.range.end);
            return Ok(Node::new(range, Exposing::All(range)));
        }

        let mut items = Vec::new();
        loop {
            items.push(self.exposed_item()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        let close = self.expect(TokenKind::RParen, "`)` or `,`")?;
        Ok(Node::new(
            Range::new(open.range.start, close.range.end),
            Exposing::Explicit(items),
        ))
    }

    fn exposed_item(&mut self) -> Result<Node<TopLevelExpose>, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Lower { .. } => {
                let name = self.lower_name("exposed value")?;
                Ok(Node::new(name.range, TopLevelExpose::Function(name.value)))
            }
            TokenKind::Upper { .. } => {
                let name = self.upper_name("exposed type")?;
                if self.check(&TokenKind::LParen) && self.peek_at(1) == &TokenKind::DotDot {
                    self.advance();
                    self.advance();
                    let close = self.expect(TokenKind::RParen, "`)`")?;
                    return Ok(Node::new(
                        Range::new(name.range.start, close.range.end),
                        TopLevelExpose::TypeWithConstructors(name.value),
                    ));
                }
                Ok(Node::new(name.range, TopLevelExpose::TypeOrAlias(name.value)))
            }
            TokenKind::LParen => {
                let open = self.advance();
                let op = match self.advance().kind {
                    TokenKind::Operator(op) => op,
                    _ => return Err(self.unexpected("operator")),
                };
                let close = self.expect(TokenKind::RParen, "`)`")?;
                Ok(Node::new(
                    Range::new(open.range.start, close.range.end),
                    TopLevelExpose::Infix(op),
                ))
            }
            _ => Err(self.unexpected("exposed name")),
        }
    }

    fn import(&mut self) -> Result<Node<Import>, ParseError> {
        let keyword = self.expect_keyword(Keyword::Import)?;
        let module_name = self.module_name()?;

        let alias = if self.check_keyword(Keyword::As) {
            self.advance();
            Some(self.module_name()?)
        } else {
            None
        };

        let exposing = if self.check_keyword(Keyword::Exposing) {
            self.advance();
            Some(self.exposing_list()?)
        } else {
            None
        };

        let range = Range::new(keyword.range.start, self.last_end);
        Ok(Node::new(
            range,
            Import {
                module_name,
                alias,
                exposing,
            },
        ))
    }

    // ---- declarations ----

    fn declarations(&mut self) -> Result<Vec<Node<Declaration>>, ParseError> {
        let mut declarations = Vec::new();
        let mut pending_signature: Option<Node<Signature>> = None;

        while self.peek().kind != TokenKind::Eof {
            match self.peek().kind.clone() {
                TokenKind::Keyword(Keyword::Type) => {
                    pending_signature = None;
                    declarations.push(self.type_declaration()?);
                }
                TokenKind::Keyword(Keyword::Port) | TokenKind::Keyword(Keyword::Infix) => {
                    pending_signature = None;
                    self.advance();
                    self.raw_until_boundary();
                }
                TokenKind::Lower { qualifiers, .. } if qualifiers.is_empty() => {
                    if self.peek_at(1) == &TokenKind::Colon {
                        pending_signature = Some(self.signature()?);
                        continue;
                    }
                    let function = self.function(pending_signature.take())?;
                    let declaration = Declaration::Function(function.value);
                    declarations.push(Node::new(function.range, declaration));
                }
                _ => return Err(self.unexpected("declaration")),
            }
        }

        Ok(declarations)
    }

    fn signature(&mut self) -> Result<Node<Signature>, ParseError> {
        let name = self.lower_name("name")?;
        self.expect(TokenKind::Colon, "`:`")?;
        let type_annotation = self.raw_until_boundary();
        let range = Range::new(name.range.start, type_annotation.range.end);
        Ok(Node::new(
            range,
            Signature {
                name,
                type_annotation,
            },
        ))
    }

    fn function(
        &mut self,
        signature: Option<Node<Signature>>,
    ) -> Result<Node<Function>, ParseError> {
        let name = self.lower_name("function name")?;
        let signature = signature.filter(|s| s.value.name.value == name.value);

        let mut arguments = Vec::new();
        while !self.check(&TokenKind::Equals) {
            arguments.push(self.atomic_pattern()?);
        }
        self.expect(TokenKind::Equals, "`=`")?;
        let body = self.expression()?;

        let start = signature
            .as_ref()
            .map(|s| s.range.start)
            .unwrap_or(name.range.start);
        Ok(Node::new(
            Range::new(start, body.range.end),
            Function {
                signature,
                name,
                arguments,
                body,
            },
        ))
    }

    fn type_declaration(&mut self) -> Result<Node<Declaration>, ParseError> {
        let keyword = self.expect_keyword(Keyword::Type)?;

        if self.check_keyword(Keyword::Alias) {
            self.advance();
            let name = self.upper_name("type alias name")?;
            let generics = self.generics()?;
            self.expect(TokenKind::Equals, "`=`")?;
            let type_annotation = self.raw_until_boundary();
            let range = Range::new(keyword.range.start, type_annotation.range.end);
            return Ok(Node::new(
                range,
                Declaration::TypeAlias(TypeAlias {
                    name,
                    generics,
                    type_annotation,
                }),
            ));
        }

        let name = self.upper_name("type name")?;
        let generics = self.generics()?;
        self.expect(TokenKind::Equals, "`=`")?;

        let mut constructors = Vec::new();
        let mut expecting_constructor = true;
        let mut depth = 0i32;
        while !self.at_boundary() {
            let token = self.advance();
            match &token.kind {
                TokenKind::Upper { qualifiers, name } if expecting_constructor && depth == 0 => {
                    if qualifiers.is_empty() {
                        constructors.push(Node::new(token.range, name.clone()));
                    }
                    expecting_constructor = false;
                }
                TokenKind::Pipe if depth == 0 => expecting_constructor = true,
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => depth -= 1,
                _ => {}
            }
        }

        Ok(Node::new(
            Range::new(keyword.range.start, self.last_end),
            Declaration::CustomType(CustomType {
                name,
                generics,
                constructors,
            }),
        ))
    }

    fn generics(&mut self) -> Result<Vec<Node<String>>, ParseError> {
        let mut generics = Vec::new();
        while matches!(&self.peek().kind, TokenKind::Lower { .. }) {
            generics.push(self.lower_name("type variable")?);
        }
        Ok(generics)
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Node<Expression>, ParseError> {
        self.binary(0)
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Node<Expression>, ParseError> {
        let mut left = self.operand()?;
        loop {
            if self.at_boundary() {
                break;
            }
            let operator = match &self.peek().kind {
                TokenKind::Operator(op) => op.clone(),
                _ => break,
            };
            let (precedence, assoc) = operator_info(&operator);
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let next_min = match assoc {
                Assoc::Right => precedence,
                Assoc::Left => precedence + 1,
            };
            let right = self.binary(next_min)?;
            let range = left.range.cover(right.range);
            left = Node::new(
                range,
                Expression::OperatorApplication {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
        Ok(left)
    }

    fn operand(&mut self) -> Result<Node<Expression>, ParseError> {
        match &self.peek().kind {
            TokenKind::Backslash => self.lambda(),
            TokenKind::Keyword(Keyword::If) => self.if_expression(),
            TokenKind::Keyword(Keyword::Let) => self.let_expression(),
            TokenKind::Keyword(Keyword::Case) => self.case_expression(),
            _ => self.application(),
        }
    }

    fn application(&mut self) -> Result<Node<Expression>, ParseError> {
        let first = self.primary()?;
        let mut items = vec![first];
        while !self.at_boundary() && starts_argument(&self.peek().kind) {
            items.push(self.primary()?);
        }
        if items.len() == 1 {
            return Ok(items.remove(0));
        }
        let range = items[0].range.cover(items[items.len() - 1].range);
        Ok(Node::new(range, Expression::Application(items)))
    }

    fn primary(&mut self) -> Result<Node<Expression>, ParseError> {
        let token = self.advance();
        let mut node = match token.kind.clone() {
            TokenKind::Integer(value) => Node::new(token.range, Expression::Integer(value)),
            TokenKind::Float(value) => Node::new(token.range, Expression::Float(value)),
            TokenKind::Str(value) => Node::new(token.range, Expression::String(value)),
            TokenKind::Char(value) => Node::new(token.range, Expression::Char(value)),
            TokenKind::Lower { qualifiers, name } | TokenKind::Upper { qualifiers, name } => {
                Node::new(
                    token.range,
                    Expression::FunctionOrValue {
                        module_name: qualifiers,
                        name,
                    },
                )
            }
            TokenKind::DotField(field) => {
                Node::new(token.range, Expression::RecordAccessFunction(field))
            }
            TokenKind::Operator(op) if op == "-" && self.peek().range.start == token.range.end => {
                let inner = self.primary()?;
                Node::new(
                    Range::new(token.range.start, inner.range.end),
                    Expression::Negation(Box::new(inner)),
                )
            }
            TokenKind::LParen => self.parenthesized(token.range.start)?,
            TokenKind::LBracket => self.list(token.range.start)?,
            TokenKind::LBrace => self.record(token.range.start)?,
            _ => {
                self.step_back(&token);
                return Err(self.unexpected("expression"));
            }
        };

        while let TokenKind::DotField(field) = &self.peek().kind {
            if self.peek().range.start != node.range.end {
                break;
            }
            let field = field.clone();
            let token = self.advance();
            let field_start = Position::new(token.range.start.line, token.range.start.column + 1);
            node = Node::new(
                node.range.cover(token.range),
                Expression::RecordAccess {
                    record: Box::new(node),
                    field: Node::new(Range::new(field_start, token.range.end), field),
                },
            );
        }

        Ok(node)
    }

    fn parenthesized(&mut self, start: Position) -> Result<Node<Expression>, ParseError> {
        if self.check(&TokenKind::RParen) {
            let close = self.advance();
            return Ok(Node::new(Range::new(start, close.range.end), Expression::Unit));
        }

        if let TokenKind::Operator(op) = &self.peek().kind {
            if self.peek_at(1) == &TokenKind::RParen {
                let op = op.clone();
                self.advance();
                let close = self.advance();
                return Ok(Node::new(
                    Range::new(start, close.range.end),
                    Expression::PrefixOperator(op),
                ));
            }
        }

        let first = self.expression()?;
        let mut items = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            items.push(self.expression()?);
        }
        let close = self.expect(TokenKind::RParen, "`)`")?;
        let range = Range::new(start, close.range.end);

        if items.len() == 1 {
            let inner = items.remove(0);
            return Ok(Node::new(range, Expression::Parenthesized(Box::new(inner))));
        }
        Ok(Node::new(range, Expression::Tuple(items)))
    }

    fn list(&mut self, start: Position) -> Result<Node<Expression>, ParseError> {
        let mut items = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            items.push(self.expression()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                items.push(self.expression()?);
            }
        }
        let close = self.expect(TokenKind::RBracket, "`]`")?;
        Ok(Node::new(Range::new(start, close.range.end), Expression::List(items)))
    }

    fn record(&mut self, start: Position) -> Result<Node<Expression>, ParseError> {
        if self.check(&TokenKind::RBrace) {
            let close = self.advance();
            return Ok(Node::new(
                Range::new(start, close.range.end),
                Expression::Record(Vec::new()),
            ));
        }

        let update_of = if self.peek_at(1) == &TokenKind::Pipe {
            let record = self.lower_name("record name")?;
            self.advance();
            Some(record)
        } else {
            None
        };

        let mut setters = vec![self.record_setter()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            setters.push(self.record_setter()?);
        }
        let close = self.expect(TokenKind::RBrace, "`}`")?;
        let range = Range::new(start, close.range.end);

        Ok(match update_of {
            Some(record) => Node::new(range, Expression::RecordUpdate { record, setters }),
            None => Node::new(range, Expression::Record(setters)),
        })
    }

    fn record_setter(&mut self) -> Result<Node<RecordSetter>, ParseError> {
        let field = self.lower_name("field name")?;
        self.expect(TokenKind::Equals, "`=`")?;
        let value = self.expression()?;
        Ok(Node::new(
            field.range.cover(value.range),
            RecordSetter { field, value },
        ))
    }

    fn if_expression(&mut self) -> Result<Node<Expression>, ParseError> {
        let keyword = self.expect_keyword(Keyword::If)?;
        let condition = self.expression()?;
        self.expect_keyword(Keyword::Then)?;
        let then_branch = self.expression()?;
        self.expect_keyword(Keyword::Else)?;
        let else_branch = self.expression()?;
        Ok(Node::new(
            Range::new(keyword.range.start, else_branch.range.end),
            Expression::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
        ))
    }

    fn lambda(&mut self) -> Result<Node<Expression>, ParseError> {
        let backslash = self.expect(TokenKind::Backslash, "`\\`")?;
        let mut arguments = Vec::new();
        while !self.check(&TokenKind::Arrow) {
            arguments.push(self.atomic_pattern()?);
        }
        self.expect(TokenKind::Arrow, "`->`")?;
        let body = self.expression()?;
        Ok(Node::new(
            Range::new(backslash.range.start, body.range.end),
            Expression::Lambda {
                arguments,
                body: Box::new(body),
            },
        ))
    }

    fn let_expression(&mut self) -> Result<Node<Expression>, ParseError> {
        let keyword = self.expect_keyword(Keyword::Let)?;
        let mut declarations = Vec::new();
        let mut pending_signature: Option<Node<Signature>> = None;

        while !self.check_keyword(Keyword::In) {
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("`in`"));
            }
            let column = self.peek().range.start.column;
            let is_named = matches!(
                &self.peek().kind,
                TokenKind::Lower { qualifiers, .. } if qualifiers.is_empty()
            );

            if is_named && self.peek_at(1) == &TokenKind::Colon {
                pending_signature = Some(self.with_floor(column, |p| p.signature())?);
                continue;
            }

            let declaration = if is_named {
                let signature = pending_signature.take();
                let function = self.with_floor(column, |p| p.function(signature))?;
                Node::new(function.range, LetDeclaration::Function(function.value))
            } else {
                pending_signature = None;
                self.with_floor(column, |p| {
                    let pattern = p.pattern()?;
                    p.expect(TokenKind::Equals, "`=`")?;
                    let expression = p.expression()?;
                    Ok(Node::new(
                        pattern.range.cover(expression.range),
                        LetDeclaration::Destructuring {
                            pattern,
                            expression,
                        },
                    ))
                })?
            };
            declarations.push(declaration);
        }

        self.expect_keyword(Keyword::In)?;
        let body = self.expression()?;
        Ok(Node::new(
            Range::new(keyword.range.start, body.range.end),
            Expression::Let {
                declarations,
                body: Box::new(body),
            },
        ))
    }

    fn case_expression(&mut self) -> Result<Node<Expression>, ParseError> {
        let keyword = self.expect_keyword(Keyword::Case)?;
        let subject = self.expression()?;
        self.expect_keyword(Keyword::Of)?;

        let column = self.peek().range.start.column;
        let mut branches = Vec::new();
        loop {
            let branch = self.with_floor(column, |p| {
                let pattern = p.pattern()?;
                p.expect(TokenKind::Arrow, "`->`")?;
                let body = p.expression()?;
                Ok(CaseBranch { pattern, body })
            })?;
            branches.push(branch);

            let next = self.peek();
            if next.kind == TokenKind::Eof
                || next.range.start.column != column
                || column <= self.floor
            {
                break;
            }
        }

        Ok(Node::new(
            Range::new(keyword.range.start, self.last_end),
            Expression::Case {
                subject: Box::new(subject),
                branches,
            },
        ))
    }

    // ---- patterns ----

    fn pattern(&mut self) -> Result<Node<Pattern>, ParseError> {
        let pattern = self.cons_pattern()?;
        if self.check_keyword(Keyword::As) {
            self.advance();
            let name = self.lower_name("alias name")?;
            return Ok(Node::new(
                pattern.range.cover(name.range),
                Pattern::As {
                    pattern: Box::new(pattern),
                    name,
                },
            ));
        }
        Ok(pattern)
    }

    fn cons_pattern(&mut self) -> Result<Node<Pattern>, ParseError> {
        let head = self.constructor_pattern()?;
        if self.check(&TokenKind::Operator("::".to_string())) {
            self.advance();
            let tail = self.cons_pattern()?;
            return Ok(Node::new(
                head.range.cover(tail.range),
                Pattern::Cons {
                    head: Box::new(head),
                    tail: Box::new(tail),
                },
            ));
        }
        Ok(head)
    }

    fn constructor_pattern(&mut self) -> Result<Node<Pattern>, ParseError> {
        let TokenKind::Upper { qualifiers, name } = self.peek().kind.clone() else {
            return self.atomic_pattern();
        };
        let token = self.advance();
        let mut arguments = Vec::new();
        while starts_pattern(&self.peek().kind) {
            arguments.push(self.atomic_pattern()?);
        }
        let range = arguments
            .last()
            .map(|last| token.range.cover(last.range))
            .unwrap_or(token.range);
        Ok(Node::new(
            range,
            Pattern::Named {
                module_name: qualifiers,
                name,
                arguments,
            },
        ))
    }

    fn atomic_pattern(&mut self) -> Result<Node<Pattern>, ParseError> {
        let token = self.advance();
        let range = token.range;
        let pattern = match token.kind.clone() {
            TokenKind::Underscore => Pattern::All,
            TokenKind::Lower { qualifiers, name } if qualifiers.is_empty() => Pattern::Var(name),
            TokenKind::Upper { qualifiers, name } => Pattern::Named {
                module_name: qualifiers,
                name,
                arguments: Vec::new(),
            },
            TokenKind::Integer(value) => Pattern::Integer(value),
            TokenKind::Str(value) => Pattern::String(value),
            TokenKind::Char(value) => Pattern::Char(value),
            TokenKind::Operator(op) if op == "-" => match self.advance().kind {
                TokenKind::Integer(value) => {
                    return Ok(Node::new(
                        Range::new(range.start, self.last_end),
                        Pattern::Integer(-value),
                    ))
                }
                _ => return Err(self.unexpected("integer")),
            },
            TokenKind::LParen => return self.parenthesized_pattern(range.start),
            TokenKind::LBracket => {
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    items.push(self.pattern()?);
                    while self.check(&TokenKind::Comma) {
                        self.advance();
                        items.push(self.pattern()?);
                    }
                }
                let close = self.expect(TokenKind::RBracket, "`]`")?;
                let range = Range::new(range.start, close.range.end);
                return Ok(Node::new(range, Pattern::List(items)));
            }
            TokenKind::LBrace => {
                let mut fields = vec![self.lower_name("field name")?];
                while self.check(&TokenKind::Comma) {
                    self.advance();
                    fields.push(self.lower_name("field name")?);
                }
                let close = self.expect(TokenKind::RBrace, "`}`")?;
                let range = Range::new(range.start, close.range.end);
                return Ok(Node::new(range, Pattern::Record(fields)));
            }
            _ => {
                self.step_back(&token);
                return Err(self.unexpected("pattern"));
            }
        };
        Ok(Node::new(range, pattern))
    }

    fn parenthesized_pattern(&mut self, start: Position) -> Result<Node<Pattern>, ParseError> {
        if self.check(&TokenKind::RParen) {
            let close = self.advance();
            return Ok(Node::new(Range::new(start, close.range.end), Pattern::Unit));
        }
        let mut items = vec![self.pattern()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            items.push(self.pattern()?);
        }
        let close = self.expect(TokenKind::RParen, "`)`")?;
        let range = Range::new(start, close.range.end);
        if items.len() == 1 {
            let inner = items.remove(0);
            return Ok(Node::new(range, Pattern::Parenthesized(Box::new(inner))));
        }
        Ok(Node::new(range, Pattern::Tuple(items)))
    }
}

fn starts_argument(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Lower { .. }
            | TokenKind::Upper { .. }
            | TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::Str(_)
            | TokenKind::Char(_)
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::DotField(_)
    )
}

fn starts_pattern(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Lower { .. }
            | TokenKind::Upper { .. }
            | TokenKind::Underscore
            | TokenKind::Integer(_)
            | TokenKind::Str(_)
            | TokenKind::Char(_)
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
    )
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Lower { name, .. } | TokenKind::Upper { name, .. } => format!("`{}`", name),
        TokenKind::Keyword(keyword) => format!("`{}`", format!("{:?}", keyword).to_lowercase()),
        TokenKind::Operator(op) => format!("`{}`", op),
        TokenKind::Eof => "end of file".to_string(),
        other => format!("{:?}", other),
    }
}
