// ABOUTME: Recursive-descent parser with one-token lookahead and speculative rewind

use crate::ast::{BinOp, ImportPath, Node, NodeKind, Param, UnaryOp};
use crate::error::Error;
use crate::lexer::{Keyword, Span, Token, TokenKind};
use std::rc::Rc;

const EXPECTED_EXPR: &str = "Expected 'switch', 'return', 'continue', 'break', 'if', 'for', \
     'while', 'fun', 'namespace', int, float, identifier, '+', '-', '(', '[', '{' or 'not'";
const EXPECTED_ATOM: &str =
    "Expected int, float, identifier, '+', '-', '(', '[', 'if', 'for', 'while', 'fun'";
const EXPECTED_COMP: &str =
    "Expected int, float, identifier, '+', '-', '(', '[', 'if', 'for', 'while', 'fun' or 'not'";

/// Carrier for one parse attempt. Tracks how many tokens the attempt
/// committed so that `failure` keeps only the deepest error and
/// `try_register` can tell its caller how far to rewind.
pub struct ParseResult {
    pub node: Option<Node>,
    pub error: Option<Error>,
    pub last_registered_advance_count: usize,
    pub advance_count: usize,
    pub to_reverse_count: usize,
}

impl ParseResult {
    pub fn new() -> Self {
        ParseResult {
            node: None,
            error: None,
            last_registered_advance_count: 0,
            advance_count: 0,
            to_reverse_count: 0,
        }
    }

    pub fn register_advancement(&mut self) {
        self.last_registered_advance_count = 1;
        self.advance_count += 1;
    }

    /// Fold a sub-result's error and advancement into this one, yielding its
    /// node. A `None` return means the sub-parse failed and the caller must
    /// return this result.
    pub fn register(&mut self, sub: ParseResult) -> Option<Node> {
        self.last_registered_advance_count = sub.advance_count;
        self.advance_count += sub.advance_count;
        if let Some(err) = sub.error {
            self.error = Some(err);
            return None;
        }
        sub.node
    }

    /// Speculative variant of `register`: on failure, records the rewind
    /// distance instead of the error. The caller must rewind the cursor by
    /// `to_reverse_count` tokens.
    pub fn try_register(&mut self, sub: ParseResult) -> Option<Node> {
        if sub.error.is_some() {
            self.to_reverse_count = sub.advance_count;
            return None;
        }
        self.register(sub)
    }

    pub fn success(mut self, node: Node) -> Self {
        self.node = Some(node);
        self
    }

    /// Record an error, but never overwrite one from a parse that had
    /// already committed tokens.
    pub fn failure(mut self, error: Error) -> Self {
        if self.error.is_none() || self.last_registered_advance_count == 0 {
            self.error = Some(error);
        }
        self
    }
}

impl Default for ParseResult {
    fn default() -> Self {
        ParseResult::new()
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    idx: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, idx: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.idx + 1).map(|t| &t.kind)
    }

    fn advance(&mut self, res: &mut ParseResult) {
        self.idx += 1;
        res.register_advancement();
    }

    fn reverse(&mut self, amount: usize) {
        self.idx = self.idx.saturating_sub(amount);
    }

    fn expected(&self, details: &str) -> Error {
        Error::syntax(self.current().span.clone(), details)
    }

    pub fn parse(mut self) -> Result<Node, Error> {
        let mut res = self.statements();
        if res.error.is_none() && self.current().kind != TokenKind::Eof {
            return Err(self.expected("Token cannot appear after previous tokens"));
        }
        match (res.node.take(), res.error.take()) {
            (_, Some(err)) => Err(err),
            (Some(node), None) => Ok(node),
            (None, None) => Err(self.expected(EXPECTED_EXPR)),
        }
    }

    fn skip_newlines(&mut self, res: &mut ParseResult) {
        while self.current().kind == TokenKind::Newline {
            self.advance(res);
        }
    }

    fn statements(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let mut statements = Vec::new();
        let pos_start = self.current().span.start.clone();

        self.skip_newlines(&mut res);

        if matches!(self.current().kind, TokenKind::Eof | TokenKind::RCurly) {
            let span = Span::new(pos_start, self.current().span.end.clone());
            return res.success(Node::new(NodeKind::List(statements), span));
        }

        let Some(stmt) = res.register(self.statement()) else {
            return res;
        };
        statements.push(stmt);

        loop {
            let mut newline_count = 0;
            while self.current().kind == TokenKind::Newline {
                self.advance(&mut res);
                newline_count += 1;
            }
            if newline_count == 0 {
                break;
            }

            match res.try_register(self.statement()) {
                Some(stmt) => statements.push(stmt),
                None => {
                    let rewind = res.to_reverse_count;
                    self.reverse(rewind);
                    break;
                }
            }
        }

        let span = Span::new(pos_start, self.current().span.end.clone());
        res.success(Node::new(NodeKind::List(statements), span))
    }

    fn block(&mut self) -> ParseResult {
        let mut res = ParseResult::new();

        self.skip_newlines(&mut res);

        if self.current().kind != TokenKind::LCurly {
            return res.failure(self.expected("Expected '{'"));
        }
        self.advance(&mut res);
        self.skip_newlines(&mut res);

        let Some(statements) = res.register(self.statements()) else {
            return res;
        };

        if self.current().kind != TokenKind::RCurly {
            return res.failure(self.expected("Expected '}'"));
        }
        self.advance(&mut res);

        res.success(statements)
    }

    fn statement(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let pos_start = self.current().span.start.clone();

        if self.current().is_keyword(Keyword::Return) {
            self.advance(&mut res);

            let value = match res.try_register(self.expr()) {
                Some(node) => Some(Box::new(node)),
                None => {
                    let rewind = res.to_reverse_count;
                    self.reverse(rewind);
                    None
                }
            };
            let span = Span::new(pos_start, self.current().span.start.clone());
            return res.success(Node::new(NodeKind::Return(value), span));
        }

        if self.current().is_keyword(Keyword::Continue) {
            self.advance(&mut res);
            let span = Span::new(pos_start, self.current().span.start.clone());
            return res.success(Node::new(NodeKind::Continue, span));
        }

        if self.current().is_keyword(Keyword::Break) {
            self.advance(&mut res);
            let span = Span::new(pos_start, self.current().span.start.clone());
            return res.success(Node::new(NodeKind::Break, span));
        }

        if self.current().is_keyword(Keyword::Import) {
            self.advance(&mut res);
            return self.import_statement(res, pos_start);
        }

        if self.current().is_keyword(Keyword::From) {
            self.advance(&mut res);
            return self.from_import_statement(res, pos_start);
        }

        if self.current().is_keyword(Keyword::Try) {
            self.advance(&mut res);
            return self.try_statement(res, pos_start);
        }

        if self.current().is_keyword(Keyword::Switch) {
            self.advance(&mut res);
            return self.switch_statement(res, pos_start);
        }

        if self.current().is_keyword(Keyword::Struct) {
            self.advance(&mut res);
            return self.struct_def(res);
        }

        let Some(expr) = res.register(self.expr()) else {
            return res.failure(self.expected(EXPECTED_EXPR));
        };
        res.success(expr)
    }

    fn import_statement(&mut self, mut res: ParseResult, pos_start: crate::lexer::Position) -> ParseResult {
        match self.current().kind.clone() {
            TokenKind::Str(path) => {
                self.advance(&mut res);
                let span = Span::new(pos_start, self.current().span.start.clone());
                res.success(Node::new(NodeKind::Import(ImportPath::File(path)), span))
            }
            TokenKind::Ident(_) => {
                let Some(parts) = self.dotted_path(&mut res) else {
                    return res;
                };
                let span = Span::new(pos_start, self.current().span.start.clone());
                res.success(Node::new(NodeKind::Import(ImportPath::Dotted(parts)), span))
            }
            _ => res.failure(self.expected("Expected string or identifier")),
        }
    }

    fn from_import_statement(
        &mut self,
        mut res: ParseResult,
        pos_start: crate::lexer::Position,
    ) -> ParseResult {
        let Some(parts) = self.dotted_path(&mut res) else {
            return res;
        };

        if !self.current().is_keyword(Keyword::Import) {
            return res.failure(self.expected("Expected 'import'"));
        }
        self.advance(&mut res);

        let mut names = Vec::new();
        loop {
            match self.current().kind.clone() {
                TokenKind::Ident(name) => {
                    names.push(name);
                    self.advance(&mut res);
                }
                _ => return res.failure(self.expected("Expected identifier")),
            }
            if self.current().kind != TokenKind::Comma {
                break;
            }
            self.advance(&mut res);
        }

        let span = Span::new(pos_start, self.current().span.start.clone());
        res.success(Node::new(NodeKind::FromImport { path: parts, names }, span))
    }

    /// `IDENT ('.' IDENT)*`
    fn dotted_path(&mut self, res: &mut ParseResult) -> Option<Vec<String>> {
        let mut parts = Vec::new();
        loop {
            match self.current().kind.clone() {
                TokenKind::Ident(name) => {
                    parts.push(name);
                    self.advance(res);
                }
                _ => {
                    res.error = Some(self.expected("Expected identifier"));
                    return None;
                }
            }
            if self.current().kind != TokenKind::Dot {
                break;
            }
            self.advance(res);
        }
        Some(parts)
    }

    fn try_statement(&mut self, mut res: ParseResult, pos_start: crate::lexer::Position) -> ParseResult {
        let Some(try_block) = res.register(self.block()) else {
            return res;
        };

        if !self.current().is_keyword(Keyword::Catch) {
            return res.failure(self.expected("Expected 'catch'"));
        }
        self.advance(&mut res);

        if !self.current().is_keyword(Keyword::As) {
            return res.failure(self.expected("Expected 'as'"));
        }
        self.advance(&mut res);

        let bind = match self.current().kind.clone() {
            TokenKind::Ident(name) => name,
            _ => return res.failure(self.expected("Expected identifier")),
        };
        self.advance(&mut res);

        let Some(handler) = res.register(self.block()) else {
            return res;
        };

        let span = Span::new(pos_start, handler.span.end.clone());
        res.success(Node::new(
            NodeKind::Try {
                body: Box::new(try_block),
                bind,
                handler: Box::new(handler),
            },
            span,
        ))
    }

    fn switch_statement(
        &mut self,
        mut res: ParseResult,
        pos_start: crate::lexer::Position,
    ) -> ParseResult {
        let Some(scrutinee) = res.register(self.expr()) else {
            return res;
        };

        if self.current().kind != TokenKind::LCurly {
            return res.failure(self.expected("Expected '{'"));
        }
        self.advance(&mut res);
        self.skip_newlines(&mut res);

        let mut cases = Vec::new();
        while self.current().is_keyword(Keyword::Case) {
            self.advance(&mut res);
            let Some(case) = res.register(self.expr()) else {
                return res;
            };
            let Some(body) = res.register(self.block()) else {
                return res;
            };
            cases.push((case, body));
            self.skip_newlines(&mut res);
        }

        let mut else_case = None;
        if self.current().is_keyword(Keyword::Else) {
            self.advance(&mut res);
            let Some(body) = res.register(self.block()) else {
                return res;
            };
            else_case = Some(Box::new(body));
            self.skip_newlines(&mut res);
        }

        if self.current().kind != TokenKind::RCurly {
            return res.failure(self.expected("Expected '}'"));
        }
        let pos_end = self.current().span.end.clone();
        self.advance(&mut res);

        res.success(Node::new(
            NodeKind::Switch {
                scrutinee: Box::new(scrutinee),
                cases,
                else_case,
            },
            Span::new(pos_start, pos_end),
        ))
    }

    fn struct_def(&mut self, mut res: ParseResult) -> ParseResult {
        let pos_start = self.current().span.start.clone();
        let name = match self.current().kind.clone() {
            TokenKind::Ident(name) => name,
            _ => return res.failure(self.expected("Expected identifier")),
        };
        self.advance(&mut res);
        self.skip_newlines(&mut res);

        if self.current().kind != TokenKind::LCurly {
            return res.failure(self.expected("Expected '{'"));
        }
        self.advance(&mut res);
        self.skip_newlines(&mut res);

        let mut fields = Vec::new();
        while let TokenKind::Ident(field) = self.current().kind.clone() {
            fields.push(field);
            self.advance(&mut res);
            if self.current().kind == TokenKind::Comma {
                self.advance(&mut res);
            }
            self.skip_newlines(&mut res);
        }

        if self.current().kind != TokenKind::RCurly {
            return res.failure(self.expected("Expected '}' or identifier"));
        }
        let pos_end = self.current().span.end.clone();
        self.advance(&mut res);

        res.success(Node::new(
            NodeKind::Struct { name, fields },
            Span::new(pos_start, pos_end),
        ))
    }

    fn expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();

        match res.try_register(self.assign_expr()) {
            Some(node) => return res.success(node),
            None => {
                let rewind = res.to_reverse_count;
                self.reverse(rewind);
            }
        }

        if self.current().is_keyword(Keyword::Const) {
            self.advance(&mut res);

            let name = match self.current().kind.clone() {
                TokenKind::Ident(name) => name,
                _ => return res.failure(self.expected("Expected identifier")),
            };
            let name_start = self.current().span.start.clone();
            self.advance(&mut res);

            if self.current().kind != TokenKind::Eq {
                return res.failure(self.expected("Expected '='"));
            }
            self.advance(&mut res);

            let Some(value) = res.register(self.expr()) else {
                return res;
            };
            let span = Span::new(name_start, value.span.end.clone());
            return res.success(Node::new(
                NodeKind::VarAssign {
                    name,
                    value: Box::new(value),
                    constant: true,
                },
                span,
            ));
        }

        let Some(node) = res.register(self.bin_op(
            Self::comp_expr,
            |tok| match &tok.kind {
                TokenKind::Keyword(Keyword::And) => Some(BinOp::And),
                TokenKind::Keyword(Keyword::Or) => Some(BinOp::Or),
                _ => None,
            },
            Self::comp_expr,
        )) else {
            return res.failure(self.expected(EXPECTED_EXPR));
        };

        if self.current().kind == TokenKind::Eq {
            return res.failure(Error::syntax(node.span.clone(), "Invalid assignment"));
        }

        res.success(node)
    }

    /// Speculatively parse `IDENT '=' expr`; the caller rewinds on failure.
    fn assign_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let pos_start = self.current().span.start.clone();

        let name = match self.current().kind.clone() {
            TokenKind::Ident(name) => name,
            _ => return res.failure(self.expected(EXPECTED_EXPR)),
        };
        self.advance(&mut res);

        if self.current().kind != TokenKind::Eq {
            return res.failure(self.expected("Expected '='"));
        }
        self.advance(&mut res);

        let Some(value) = res.register(self.expr()) else {
            return res;
        };

        let span = Span::new(pos_start, value.span.end.clone());
        res.success(Node::new(
            NodeKind::VarAssign {
                name,
                value: Box::new(value),
                constant: false,
            },
            span,
        ))
    }

    fn comp_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();

        if self.current().is_keyword(Keyword::Not) {
            let pos_start = self.current().span.start.clone();
            self.advance(&mut res);

            let Some(node) = res.register(self.comp_expr()) else {
                return res;
            };
            let span = Span::new(pos_start, node.span.end.clone());
            return res.success(Node::new(
                NodeKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(node),
                },
                span,
            ));
        }

        let Some(node) = res.register(self.bin_op(
            Self::arith_expr,
            |tok| match &tok.kind {
                TokenKind::EqEq => Some(BinOp::Eq),
                TokenKind::NotEq => Some(BinOp::Ne),
                TokenKind::Lt => Some(BinOp::Lt),
                TokenKind::Gt => Some(BinOp::Gt),
                TokenKind::LtEq => Some(BinOp::Lte),
                TokenKind::GtEq => Some(BinOp::Gte),
                _ => None,
            },
            Self::arith_expr,
        )) else {
            return res.failure(self.expected(EXPECTED_COMP));
        };

        res.success(node)
    }

    fn arith_expr(&mut self) -> ParseResult {
        self.bin_op(
            Self::term,
            |tok| match &tok.kind {
                TokenKind::Plus => Some(BinOp::Add),
                TokenKind::Minus => Some(BinOp::Sub),
                _ => None,
            },
            Self::term,
        )
    }

    fn term(&mut self) -> ParseResult {
        self.bin_op(
            Self::factor,
            |tok| match &tok.kind {
                TokenKind::Mul => Some(BinOp::Mul),
                TokenKind::Div => Some(BinOp::Div),
                TokenKind::Mod => Some(BinOp::Mod),
                _ => None,
            },
            Self::factor,
        )
    }

    fn factor(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let tok_kind = self.current().kind.clone();
        let pos_start = self.current().span.start.clone();

        if matches!(tok_kind, TokenKind::Plus | TokenKind::Minus) {
            self.advance(&mut res);
            let Some(operand) = res.register(self.factor()) else {
                return res;
            };
            let span = Span::new(pos_start, operand.span.end.clone());
            let node = match tok_kind {
                TokenKind::Minus => Node::new(
                    NodeKind::UnaryOp {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                    span,
                ),
                _ => operand,
            };
            return res.success(node);
        }

        self.power()
    }

    fn power(&mut self) -> ParseResult {
        self.bin_op(
            Self::call,
            |tok| match &tok.kind {
                TokenKind::Pow => Some(BinOp::Pow),
                _ => None,
            },
            Self::factor,
        )
    }

    fn call(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let Some(callee) = res.register(self.index()) else {
            return res;
        };

        if self.current().kind != TokenKind::LParen {
            return res.success(callee);
        }
        self.advance(&mut res);

        let mut args = Vec::new();
        if self.current().kind == TokenKind::RParen {
            let pos_end = self.current().span.end.clone();
            self.advance(&mut res);
            let span = Span::new(callee.span.start.clone(), pos_end);
            return res.success(Node::new(
                NodeKind::Call {
                    callee: Box::new(callee),
                    args,
                },
                span,
            ));
        }

        match res.register(self.expr()) {
            Some(arg) => args.push(arg),
            None => {
                return res.failure(self.expected(
                    "Expected ')', 'if', 'for', 'while', 'fun', 'namespace', int, float, \
                     identifier, '+', '-', '(', '[', '{' or 'not'",
                ))
            }
        }

        while self.current().kind == TokenKind::Comma {
            self.advance(&mut res);
            let Some(arg) = res.register(self.expr()) else {
                return res;
            };
            args.push(arg);
        }

        if self.current().kind != TokenKind::RParen {
            return res.failure(self.expected("Expected ',' or ')'"));
        }
        let pos_end = self.current().span.end.clone();
        self.advance(&mut res);

        let span = Span::new(callee.span.start.clone(), pos_end);
        res.success(Node::new(
            NodeKind::Call {
                callee: Box::new(callee),
                args,
            },
            span,
        ))
    }

    fn index(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let Some(mut node) = res.register(self.dot()) else {
            return res;
        };

        while self.current().kind == TokenKind::LSquare {
            self.advance(&mut res);
            let Some(index) = res.register(self.expr()) else {
                return res;
            };

            if self.current().kind != TokenKind::RSquare {
                return res.failure(self.expected("Expected ']'"));
            }
            let span = Span::new(node.span.start.clone(), self.current().span.end.clone());
            self.advance(&mut res);

            node = Node::new(
                NodeKind::IndexGet {
                    target: Box::new(node),
                    index: Box::new(index),
                },
                span,
            );
        }

        // A trailing '=' rewrites the final read into a write.
        if self.current().kind == TokenKind::Eq {
            if matches!(node.kind, NodeKind::IndexGet { .. }) {
                self.advance(&mut res);
                let Some(value) = res.register(self.expr()) else {
                    return res;
                };
                let span = Span::new(node.span.start.clone(), value.span.end.clone());
                node = match node.kind {
                    NodeKind::IndexGet { target, index } => Node::new(
                        NodeKind::IndexSet {
                            target,
                            index,
                            value: Box::new(value),
                        },
                        span,
                    ),
                    other => Node::new(other, span),
                };
            }
        }

        res.success(node)
    }

    fn dot(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let Some(mut node) = res.register(self.atom()) else {
            return res;
        };

        while self.current().kind == TokenKind::Dot {
            self.advance(&mut res);

            let field = match self.current().kind.clone() {
                TokenKind::Ident(name) => name,
                _ => return res.failure(self.expected("Expected identifier")),
            };
            let span = Span::new(node.span.start.clone(), self.current().span.end.clone());
            self.advance(&mut res);

            node = Node::new(
                NodeKind::DotGet {
                    target: Box::new(node),
                    field,
                },
                span,
            );
        }

        if self.current().kind == TokenKind::Eq {
            if matches!(node.kind, NodeKind::DotGet { .. }) {
                self.advance(&mut res);
                let Some(value) = res.register(self.expr()) else {
                    return res;
                };
                let span = Span::new(node.span.start.clone(), value.span.end.clone());
                node = match node.kind {
                    NodeKind::DotGet { target, field } => Node::new(
                        NodeKind::DotSet {
                            target,
                            field,
                            value: Box::new(value),
                        },
                        span,
                    ),
                    other => Node::new(other, span),
                };
            }
        }

        res.success(node)
    }

    fn atom(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let tok = self.current().clone();

        let node = match tok.kind {
            TokenKind::Int(v) => {
                self.advance(&mut res);
                Node::new(NodeKind::Number(v as f64), tok.span)
            }
            TokenKind::Float(v) => {
                self.advance(&mut res);
                Node::new(NodeKind::Number(v), tok.span)
            }
            TokenKind::Str(s) => {
                self.advance(&mut res);
                Node::new(NodeKind::Str(s), tok.span)
            }
            TokenKind::FStr(s) => {
                self.advance(&mut res);
                Node::new(NodeKind::FStr(s), tok.span)
            }
            TokenKind::Ident(name) => {
                // Empty braces right after an identifier instantiate a
                // struct; anything else is a plain variable access.
                if self.current_starts_struct_literal() {
                    self.advance(&mut res); // identifier
                    self.advance(&mut res); // '{'
                    let pos_end = self.current().span.end.clone();
                    self.advance(&mut res); // '}'
                    Node::new(
                        NodeKind::StructCreate(name),
                        Span::new(tok.span.start, pos_end),
                    )
                } else {
                    self.advance(&mut res);
                    Node::new(NodeKind::VarAccess(name), tok.span)
                }
            }
            TokenKind::LParen => {
                self.advance(&mut res);
                let Some(expr) = res.register(self.expr()) else {
                    return res;
                };
                if self.current().kind != TokenKind::RParen {
                    return res.failure(self.expected("Expected ')'"));
                }
                self.advance(&mut res);
                expr
            }
            TokenKind::LSquare => {
                let Some(node) = res.register(self.list_expr()) else {
                    return res;
                };
                node
            }
            TokenKind::LCurly => {
                let Some(node) = res.register(self.dict_expr()) else {
                    return res;
                };
                node
            }
            TokenKind::Keyword(Keyword::If) => {
                let Some(node) = res.register(self.if_expr()) else {
                    return res;
                };
                node
            }
            TokenKind::Keyword(Keyword::For) => {
                let Some(node) = res.register(self.for_expr()) else {
                    return res;
                };
                node
            }
            TokenKind::Keyword(Keyword::While) => {
                let Some(node) = res.register(self.while_expr()) else {
                    return res;
                };
                node
            }
            TokenKind::Keyword(Keyword::Fun) => {
                let Some(node) = res.register(self.func_def()) else {
                    return res;
                };
                node
            }
            TokenKind::Keyword(Keyword::Do) | TokenKind::Keyword(Keyword::Namespace) => {
                let Some(node) = res.register(self.do_expr()) else {
                    return res;
                };
                node
            }
            _ => return res.failure(Error::syntax(tok.span, EXPECTED_ATOM)),
        };

        res.success(node)
    }

    fn current_starts_struct_literal(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::LCurly))
            && matches!(self.tokens.get(self.idx + 2).map(|t| &t.kind), Some(TokenKind::RCurly))
    }

    fn list_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let pos_start = self.current().span.start.clone();
        let mut elements = Vec::new();

        if self.current().kind != TokenKind::LSquare {
            return res.failure(self.expected("Expected '['"));
        }
        self.advance(&mut res);

        if self.current().kind == TokenKind::RSquare {
            let pos_end = self.current().span.end.clone();
            self.advance(&mut res);
            return res.success(Node::new(
                NodeKind::List(elements),
                Span::new(pos_start, pos_end),
            ));
        }

        match res.register(self.expr()) {
            Some(element) => elements.push(element),
            None => {
                return res.failure(self.expected(
                    "Expected ']', 'if', 'for', 'while', 'fun', 'namespace', int, float, \
                     identifier, '+', '-', '(', '[', '{' or 'not'",
                ))
            }
        }

        while self.current().kind == TokenKind::Comma {
            self.advance(&mut res);
            let Some(element) = res.register(self.expr()) else {
                return res;
            };
            elements.push(element);
        }

        if self.current().kind != TokenKind::RSquare {
            return res.failure(self.expected("Expected ',' or ']'"));
        }
        let pos_end = self.current().span.end.clone();
        self.advance(&mut res);

        res.success(Node::new(
            NodeKind::List(elements),
            Span::new(pos_start, pos_end),
        ))
    }

    fn dict_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let pos_start = self.current().span.start.clone();
        let mut pairs = Vec::new();

        if self.current().kind != TokenKind::LCurly {
            return res.failure(self.expected("Expected '{'"));
        }
        self.advance(&mut res);

        if self.current().kind == TokenKind::RCurly {
            let pos_end = self.current().span.end.clone();
            self.advance(&mut res);
            return res.success(Node::new(
                NodeKind::Dict(pairs),
                Span::new(pos_start, pos_end),
            ));
        }

        loop {
            let Some(key) = res.register(self.expr()) else {
                return res;
            };

            if self.current().kind != TokenKind::Colon {
                return res.failure(self.expected("Expected ':'"));
            }
            self.advance(&mut res);

            let Some(value) = res.register(self.expr()) else {
                return res;
            };
            pairs.push((key, value));

            if self.current().kind != TokenKind::Comma {
                break;
            }
            self.advance(&mut res);
        }

        if self.current().kind != TokenKind::RCurly {
            return res.failure(self.expected("Expected ',' or '}'"));
        }
        let pos_end = self.current().span.end.clone();
        self.advance(&mut res);

        res.success(Node::new(
            NodeKind::Dict(pairs),
            Span::new(pos_start, pos_end),
        ))
    }

    fn if_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let pos_start = self.current().span.start.clone();
        let mut cases = Vec::new();

        if !self.current().is_keyword(Keyword::If) {
            return res.failure(self.expected("Expected 'if'"));
        }
        self.advance(&mut res);

        let Some(condition) = res.register(self.expr()) else {
            return res;
        };
        let Some(body) = res.register(self.block()) else {
            return res;
        };
        cases.push((condition, body));

        while self.current().is_keyword(Keyword::Elif) {
            self.advance(&mut res);
            let Some(condition) = res.register(self.expr()) else {
                return res;
            };
            let Some(body) = res.register(self.block()) else {
                return res;
            };
            cases.push((condition, body));
        }

        let mut else_case = None;
        if self.current().is_keyword(Keyword::Else) {
            self.advance(&mut res);
            let Some(body) = res.register(self.block()) else {
                return res;
            };
            else_case = Some(Box::new(body));
        }

        let pos_end = else_case
            .as_ref()
            .map(|n| n.span.end.clone())
            .unwrap_or_else(|| cases[cases.len() - 1].1.span.end.clone());

        res.success(Node::new(
            NodeKind::If { cases, else_case },
            Span::new(pos_start, pos_end),
        ))
    }

    fn for_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let pos_start = self.current().span.start.clone();

        if !self.current().is_keyword(Keyword::For) {
            return res.failure(self.expected("Expected 'for'"));
        }
        self.advance(&mut res);

        let var = match self.current().kind.clone() {
            TokenKind::Ident(name) => name,
            _ => return res.failure(self.expected("Expected identifier")),
        };
        self.advance(&mut res);

        if self.current().is_keyword(Keyword::In) {
            self.advance(&mut res);

            let Some(iterable) = res.register(self.expr()) else {
                return res;
            };
            let Some(body) = res.register(self.block()) else {
                return res;
            };

            let span = Span::new(pos_start, body.span.end.clone());
            return res.success(Node::new(
                NodeKind::ForIn {
                    var,
                    iterable: Box::new(iterable),
                    body: Box::new(body),
                    discard_result: true,
                },
                span,
            ));
        }

        if self.current().kind != TokenKind::Eq {
            return res.failure(self.expected("Expected '=' or 'in'"));
        }
        self.advance(&mut res);

        let Some(start) = res.register(self.expr()) else {
            return res;
        };

        if !self.current().is_keyword(Keyword::To) {
            return res.failure(self.expected("Expected 'to'"));
        }
        self.advance(&mut res);

        let Some(end) = res.register(self.expr()) else {
            return res;
        };

        let step = if self.current().is_keyword(Keyword::Step) {
            self.advance(&mut res);
            let Some(step) = res.register(self.expr()) else {
                return res;
            };
            Some(Box::new(step))
        } else {
            None
        };

        let Some(body) = res.register(self.block()) else {
            return res;
        };

        let span = Span::new(pos_start, body.span.end.clone());
        res.success(Node::new(
            NodeKind::For {
                var,
                start: Box::new(start),
                end: Box::new(end),
                step,
                body: Box::new(body),
                discard_result: true,
            },
            span,
        ))
    }

    fn while_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let pos_start = self.current().span.start.clone();

        if !self.current().is_keyword(Keyword::While) {
            return res.failure(self.expected("Expected 'while'"));
        }
        self.advance(&mut res);

        let Some(cond) = res.register(self.expr()) else {
            return res;
        };
        let Some(body) = res.register(self.block()) else {
            return res;
        };

        let span = Span::new(pos_start, body.span.end.clone());
        res.success(Node::new(
            NodeKind::While {
                cond: Box::new(cond),
                body: Box::new(body),
                discard_result: true,
            },
            span,
        ))
    }

    fn func_def(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let pos_start = self.current().span.start.clone();

        if !self.current().is_keyword(Keyword::Fun) {
            return res.failure(self.expected("Expected 'fun'"));
        }
        self.advance(&mut res);

        let name = match self.current().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance(&mut res);
                if self.current().kind != TokenKind::LParen {
                    return res.failure(self.expected("Expected '('"));
                }
                Some(name)
            }
            _ => {
                if self.current().kind != TokenKind::LParen {
                    return res.failure(self.expected("Expected identifier or '('"));
                }
                None
            }
        };
        self.advance(&mut res);

        let mut params: Vec<Param> = Vec::new();
        let mut has_optionals = false;

        if matches!(self.current().kind, TokenKind::Ident(_)) {
            loop {
                let param_span = self.current().span.clone();
                let param_name = match self.current().kind.clone() {
                    TokenKind::Ident(name) => name,
                    _ => return res.failure(self.expected("Expected identifier")),
                };
                self.advance(&mut res);

                let default = if self.current().kind == TokenKind::Eq {
                    self.advance(&mut res);
                    let Some(default) = res.register(self.expr()) else {
                        return res;
                    };
                    has_optionals = true;
                    Some(default)
                } else if has_optionals {
                    return res.failure(Error::syntax(param_span, "Expected optional parameter."));
                } else {
                    None
                };

                let dynamic = if self.current().is_keyword(Keyword::From) {
                    self.advance(&mut res);
                    let Some(dynamic) = res.register(self.expr()) else {
                        return res;
                    };
                    Some(dynamic)
                } else {
                    None
                };

                params.push(Param {
                    name: param_name,
                    default,
                    dynamic,
                });

                if self.current().kind != TokenKind::Comma {
                    break;
                }
                self.advance(&mut res);
                if !matches!(self.current().kind, TokenKind::Ident(_)) {
                    return res.failure(self.expected("Expected identifier"));
                }
            }

            if self.current().kind != TokenKind::RParen {
                return res.failure(self.expected("Expected ',', ')' or '='"));
            }
        } else if self.current().kind != TokenKind::RParen {
            return res.failure(self.expected("Expected identifier or ')'"));
        }
        self.advance(&mut res);

        if self.current().kind == TokenKind::Arrow {
            self.advance(&mut res);

            let Some(body) = res.register(self.expr()) else {
                return res;
            };
            let span = Span::new(pos_start, body.span.end.clone());
            return res.success(Node::new(
                NodeKind::FuncDef {
                    name,
                    params: Rc::new(params),
                    body: Rc::new(body),
                    auto_return: true,
                },
                span,
            ));
        }

        let Some(body) = res.register(self.block()) else {
            return res;
        };
        let span = Span::new(pos_start, body.span.end.clone());
        res.success(Node::new(
            NodeKind::FuncDef {
                name,
                params: Rc::new(params),
                body: Rc::new(body),
                auto_return: false,
            },
            span,
        ))
    }

    /// `do { … }` and `namespace { … }` are identical in effect: a block
    /// evaluated in a fresh child scope.
    fn do_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let pos_start = self.current().span.start.clone();

        self.advance(&mut res);

        let Some(body) = res.register(self.block()) else {
            return res;
        };

        let span = Span::new(pos_start, body.span.end.clone());
        res.success(Node::new(NodeKind::Do(Box::new(body)), span))
    }

    fn bin_op(
        &mut self,
        func_a: fn(&mut Self) -> ParseResult,
        to_op: fn(&Token) -> Option<BinOp>,
        func_b: fn(&mut Self) -> ParseResult,
    ) -> ParseResult {
        let mut res = ParseResult::new();
        let Some(mut left) = res.register(func_a(self)) else {
            return res;
        };

        while let Some(op) = to_op(self.current()) {
            self.advance(&mut res);
            let Some(right) = res.register(func_b(self)) else {
                return res;
            };
            let span = left.span.to(&right.span);
            left = Node::new(
                NodeKind::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        res.success(left)
    }
}

/// Lex and parse a source string into its program node.
pub fn parse_source(file: &str, text: &str) -> Result<Node, Error> {
    let tokens = crate::lexer::Lexer::new(file, text).tokenize()?;
    Parser::new(tokens).parse()
}
