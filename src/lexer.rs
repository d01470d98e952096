// ABOUTME: Position-tracking lexer turning source text into a token stream

use crate::error::Error;
use std::fmt;
use std::rc::Rc;

/// A point in a source file: character index plus human-readable line/column,
/// with the file name and full text attached for diagnostics.
#[derive(Debug, Clone)]
pub struct Position {
    pub idx: usize,
    pub line: usize,
    pub col: usize,
    pub file: Rc<str>,
    pub text: Rc<str>,
}

impl Position {
    pub fn start_of(file: &str, text: &str) -> Self {
        Position {
            idx: 0,
            line: 0,
            col: 0,
            file: file.into(),
            text: text.into(),
        }
    }

    /// A placeholder position for values that do not originate in source
    /// text (builtin internals, host adapters).
    pub fn synthetic(desc: &str) -> Self {
        Position::start_of(desc, "<native code>")
    }

    fn advance(&mut self, current_char: Option<char>) {
        self.idx += 1;
        self.col += 1;
        if current_char == Some('\n') {
            self.line += 1;
            self.col = 0;
        }
    }
}

/// Start/end pair bounding a token, AST node or runtime value.
#[derive(Debug, Clone)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    pub fn synthetic(desc: &str) -> Self {
        let pos = Position::synthetic(desc);
        Span {
            start: pos.clone(),
            end: pos,
        }
    }

    /// The span covering from `self`'s start to `other`'s end.
    pub fn to(&self, other: &Span) -> Span {
        Span {
            start: self.start.clone(),
            end: other.end.clone(),
        }
    }
}

/// Reserved words. An identifier matching one of these lexes as a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Or,
    Not,
    If,
    Elif,
    Else,
    For,
    To,
    Step,
    While,
    Fun,
    Return,
    Continue,
    Break,
    Import,
    Do,
    Try,
    Catch,
    As,
    From,
    In,
    Switch,
    Case,
    Const,
    Namespace,
    Struct,
}

impl Keyword {
    pub fn from_str(word: &str) -> Option<Keyword> {
        Some(match word {
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "if" => Keyword::If,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "for" => Keyword::For,
            "to" => Keyword::To,
            "step" => Keyword::Step,
            "while" => Keyword::While,
            "fun" => Keyword::Fun,
            "return" => Keyword::Return,
            "continue" => Keyword::Continue,
            "break" => Keyword::Break,
            "import" => Keyword::Import,
            "do" => Keyword::Do,
            "try" => Keyword::Try,
            "catch" => Keyword::Catch,
            "as" => Keyword::As,
            "from" => Keyword::From,
            "in" => Keyword::In,
            "switch" => Keyword::Switch,
            "case" => Keyword::Case,
            "const" => Keyword::Const,
            "namespace" => Keyword::Namespace,
            "struct" => Keyword::Struct,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::For => "for",
            Keyword::To => "to",
            Keyword::Step => "step",
            Keyword::While => "while",
            Keyword::Fun => "fun",
            Keyword::Return => "return",
            Keyword::Continue => "continue",
            Keyword::Break => "break",
            Keyword::Import => "import",
            Keyword::Do => "do",
            Keyword::Try => "try",
            Keyword::Catch => "catch",
            Keyword::As => "as",
            Keyword::From => "from",
            Keyword::In => "in",
            Keyword::Switch => "switch",
            Keyword::Case => "case",
            Keyword::Const => "const",
            Keyword::Namespace => "namespace",
            Keyword::Struct => "struct",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    FStr(String),
    Ident(String),
    Keyword(Keyword),
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    LParen,
    RParen,
    LSquare,
    RSquare,
    LCurly,
    RCurly,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Comma,
    Arrow,
    Colon,
    Dot,
    Newline,
    Eof,
}

impl TokenKind {
    /// Normalized label used by `--tokens` output.
    pub fn label(&self) -> String {
        match self {
            TokenKind::Int(v) => format!("NUMBER({v})"),
            TokenKind::Float(v) => format!("NUMBER({v})"),
            TokenKind::Str(v) => format!("STRING({v})"),
            TokenKind::FStr(v) => format!("FSTRING({v})"),
            TokenKind::Ident(v) => format!("IDENTIFIER({v})"),
            TokenKind::Keyword(kw) => kw.as_str().to_string(),
            TokenKind::Plus => "PLUS".to_string(),
            TokenKind::Minus => "MINUS".to_string(),
            TokenKind::Mul => "MUL".to_string(),
            TokenKind::Div => "DIV".to_string(),
            TokenKind::Mod => "MOD".to_string(),
            TokenKind::Pow => "POW".to_string(),
            TokenKind::Eq => "EQ".to_string(),
            TokenKind::LParen => "LPAREN".to_string(),
            TokenKind::RParen => "RPAREN".to_string(),
            TokenKind::LSquare => "LSQUARE".to_string(),
            TokenKind::RSquare => "RSQUARE".to_string(),
            TokenKind::LCurly => "LCURLY".to_string(),
            TokenKind::RCurly => "RCURLY".to_string(),
            TokenKind::EqEq => "EE".to_string(),
            TokenKind::NotEq => "NE".to_string(),
            TokenKind::Lt => "LT".to_string(),
            TokenKind::Gt => "GT".to_string(),
            TokenKind::LtEq => "LTE".to_string(),
            TokenKind::GtEq => "GTE".to_string(),
            TokenKind::Comma => "COMMA".to_string(),
            TokenKind::Arrow => "ARROW".to_string(),
            TokenKind::Colon => "COLON".to_string(),
            TokenKind::Dot => "DOT".to_string(),
            TokenKind::Newline => "NEWLINE".to_string(),
            TokenKind::Eof => "EOF".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(self.kind, TokenKind::Keyword(k) if k == kw)
    }
}

impl fmt::Display for Token {
    /// Surface form of the token, suitable for reconstructing source text
    /// modulo whitespace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Int(v) => write!(f, "{v}"),
            TokenKind::Float(v) => write!(f, "{v}"),
            TokenKind::Str(v) => write!(f, "\"{}\"", escape_string(v)),
            TokenKind::FStr(v) => write!(f, "f\"{}\"", escape_string(v)),
            TokenKind::Ident(v) => write!(f, "{v}"),
            TokenKind::Keyword(kw) => write!(f, "{}", kw.as_str()),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Mul => write!(f, "*"),
            TokenKind::Div => write!(f, "/"),
            TokenKind::Mod => write!(f, "%"),
            TokenKind::Pow => write!(f, "^"),
            TokenKind::Eq => write!(f, "="),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LSquare => write!(f, "["),
            TokenKind::RSquare => write!(f, "]"),
            TokenKind::LCurly => write!(f, "{{"),
            TokenKind::RCurly => write!(f, "}}"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Newline => writeln!(f),
            TokenKind::Eof => Ok(()),
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

/// Single-pass scanner over the source characters with one character of
/// lookahead. Semicolons and raw newlines both lex as NEWLINE.
pub struct Lexer {
    chars: Vec<char>,
    pos: Position,
    current: Option<char>,
}

impl Lexer {
    pub fn new(file: &str, text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let current = chars.first().copied();
        Lexer {
            chars,
            pos: Position::start_of(file, text),
            current,
        }
    }

    fn advance(&mut self) {
        self.pos.advance(self.current);
        self.current = self.chars.get(self.pos.idx).copied();
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos.idx + 1).copied()
    }

    /// The span of the single character at the cursor.
    fn here(&self) -> Span {
        let start = self.pos.clone();
        let mut end = self.pos.clone();
        end.advance(self.current);
        Span::new(start, end)
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(start, self.pos.clone())
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Error> {
        let mut tokens = Vec::new();

        while let Some(c) = self.current {
            match c {
                ';' | '\n' => {
                    let span = self.here();
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::Newline,
                        span,
                    });
                }
                c if c.is_whitespace() => self.advance(),
                '#' => self.skip_comment(),
                '0'..='9' => tokens.push(self.make_number()),
                'f' if self.peek() == Some('"') => tokens.push(self.make_fstring()),
                c if is_ident_start(c) => tokens.push(self.make_identifier()),
                '"' => tokens.push(self.make_string()),
                '-' => tokens.push(self.make_minus_or_arrow()),
                '!' => tokens.push(self.make_not_equals()?),
                '=' => tokens.push(self.two_char('=', TokenKind::Eq, TokenKind::EqEq)),
                '<' => tokens.push(self.two_char('=', TokenKind::Lt, TokenKind::LtEq)),
                '>' => tokens.push(self.two_char('=', TokenKind::Gt, TokenKind::GtEq)),
                '\\' => {
                    // Line continuation: the backslash and the following
                    // character are both swallowed.
                    self.advance();
                    self.advance();
                }
                '+' | '*' | '/' | '%' | '^' | '(' | ')' | '[' | ']' | '{' | '}' | ',' | ':'
                | '.' => {
                    let kind = match c {
                        '+' => TokenKind::Plus,
                        '*' => TokenKind::Mul,
                        '/' => TokenKind::Div,
                        '%' => TokenKind::Mod,
                        '^' => TokenKind::Pow,
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        '[' => TokenKind::LSquare,
                        ']' => TokenKind::RSquare,
                        '{' => TokenKind::LCurly,
                        '}' => TokenKind::RCurly,
                        ',' => TokenKind::Comma,
                        ':' => TokenKind::Colon,
                        _ => TokenKind::Dot,
                    };
                    let span = self.here();
                    self.advance();
                    tokens.push(Token { kind, span });
                }
                other => {
                    let start = self.pos.clone();
                    self.advance();
                    return Err(Error::illegal_char(
                        self.span_from(start),
                        format!("'{other}'"),
                    ));
                }
            }
        }

        let end = self.pos.clone();
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(end.clone(), end),
        });
        Ok(tokens)
    }

    fn make_number(&mut self) -> Token {
        let start = self.pos.clone();
        let mut text = String::new();
        let mut dots = 0;

        while let Some(c) = self.current {
            if c == '.' {
                if dots == 1 {
                    break;
                }
                dots += 1;
            } else if !c.is_ascii_digit() {
                break;
            }
            text.push(c);
            self.advance();
        }

        let kind = if dots == 0 {
            TokenKind::Int(text.parse().unwrap_or(i64::MAX))
        } else {
            TokenKind::Float(text.parse().unwrap_or(f64::INFINITY))
        };
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn make_identifier(&mut self) -> Token {
        let start = self.pos.clone();
        let mut text = String::new();

        while let Some(c) = self.current {
            if !is_ident_char(c) {
                break;
            }
            text.push(c);
            self.advance();
        }

        let kind = match Keyword::from_str(&text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(text),
        };
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    /// Collect the raw contents of a `"`-delimited string, honoring `\` as
    /// an escape for the following character, then decode the standard
    /// escape sequences.
    fn string_body(&mut self) -> String {
        let mut raw = String::new();
        let mut escaped = false;
        self.advance(); // opening quote

        while let Some(c) = self.current {
            if c == '"' && !escaped {
                break;
            }
            escaped = !escaped && c == '\\';
            raw.push(c);
            self.advance();
        }

        self.advance(); // closing quote
        decode_escapes(&raw)
    }

    fn make_string(&mut self) -> Token {
        let start = self.pos.clone();
        let value = self.string_body();
        Token {
            kind: TokenKind::Str(value),
            span: self.span_from(start),
        }
    }

    fn make_fstring(&mut self) -> Token {
        let start = self.pos.clone();
        self.advance(); // the 'f'
        let value = self.string_body();
        Token {
            kind: TokenKind::FStr(value),
            span: self.span_from(start),
        }
    }

    fn make_minus_or_arrow(&mut self) -> Token {
        let start = self.pos.clone();
        self.advance();
        let kind = if self.current == Some('>') {
            self.advance();
            TokenKind::Arrow
        } else {
            TokenKind::Minus
        };
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn make_not_equals(&mut self) -> Result<Token, Error> {
        let start = self.pos.clone();
        self.advance();

        if self.current == Some('=') {
            self.advance();
            return Ok(Token {
                kind: TokenKind::NotEq,
                span: self.span_from(start),
            });
        }

        self.advance();
        Err(Error::expected_char(
            self.span_from(start),
            "'=' (after '!')",
        ))
    }

    fn two_char(&mut self, next: char, single: TokenKind, double: TokenKind) -> Token {
        let start = self.pos.clone();
        self.advance();
        let kind = if self.current == Some(next) {
            self.advance();
            double
        } else {
            single
        };
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    /// `#` runs to end of line (the newline itself still lexes); `#* … *#`
    /// is a block comment with no nesting.
    fn skip_comment(&mut self) {
        self.advance(); // '#'
        let block = self.current == Some('*');

        if !block {
            while let Some(c) = self.current {
                if c == '\n' {
                    return;
                }
                self.advance();
            }
            return;
        }

        self.advance(); // '*'
        while let Some(c) = self.current {
            if c == '*' {
                self.advance();
                if self.current == Some('#') {
                    self.advance();
                    return;
                }
            } else {
                self.advance();
            }
        }
    }
}

/// Decode `\n`, `\t`, `\r`, `\"`, `\'`, `\\`, `\0`, `\xNN` and `\uNNNN`.
/// Unrecognized escapes keep the backslash.
pub fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some('0') => out.push('\0'),
            Some('x') => match hex_escape(&mut chars, 2) {
                Some(ch) => out.push(ch),
                None => out.push_str("\\x"),
            },
            Some('u') => match hex_escape(&mut chars, 4) {
                Some(ch) => out.push(ch),
                None => out.push_str("\\u"),
            },
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn hex_escape(chars: &mut std::iter::Peekable<std::str::Chars>, width: usize) -> Option<char> {
    let mut code = 0u32;
    for _ in 0..width {
        let digit = chars.peek()?.to_digit(16)?;
        chars.next();
        code = code * 16 + digit;
    }
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new("<test>", source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.25"),
            vec![TokenKind::Int(42), TokenKind::Float(3.25), TokenKind::Eof]
        );
    }

    #[test]
    fn test_second_dot_ends_number() {
        // "1.2.3" is a float, a dot, and an int.
        assert_eq!(
            kinds("1.2.3"),
            vec![
                TokenKind::Float(1.2),
                TokenKind::Dot,
                TokenKind::Int(3),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_identifiers_and_keywords() {
        assert_eq!(
            kinds("if foo _bar $x"),
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::Ident("foo".to_string()),
                TokenKind::Ident("_bar".to_string()),
                TokenKind::Ident("$x".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb\t\"c\\""#),
            vec![
                TokenKind::Str("a\nb\t\"c\\".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unicode_escape() {
        assert_eq!(
            kinds(r#""é \x41""#),
            vec![TokenKind::Str("\u{e9} A".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_fstring_token() {
        assert_eq!(
            kinds(r#"f"x = {x}""#),
            vec![TokenKind::FStr("x = {x}".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_multi_char_operators() {
        assert_eq!(
            kinds("-> == != <= >= < > ="),
            vec![
                TokenKind::Arrow,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Eq,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_newline_unification() {
        assert_eq!(
            kinds("1;2\n3"),
            vec![
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Int(2),
                TokenKind::Newline,
                TokenKind::Int(3),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_line_comment_keeps_newline() {
        assert_eq!(
            kinds("1 # comment\n2"),
            vec![
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Int(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_block_comment() {
        assert_eq!(
            kinds("1 #* lines\nand *stars* *# 2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn test_bang_without_equals_is_expected_char() {
        let err = Lexer::new("<test>", "!x").tokenize().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ExpectedChar);
        assert!(err.details.contains("'=' (after '!')"));
    }

    #[test]
    fn test_illegal_character() {
        let err = Lexer::new("<test>", "1 @ 2").tokenize().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::IllegalChar);
        assert_eq!(err.details, "'@'");
        assert_eq!(err.span.start.col, 2);
    }

    #[test]
    fn test_line_continuation_swallowed() {
        assert_eq!(
            kinds("1 \\\n 2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn test_spans_track_lines_and_columns() {
        let tokens = Lexer::new("<test>", "ab\ncd").tokenize().unwrap();
        assert_eq!(tokens[2].span.start.line, 1);
        assert_eq!(tokens[2].span.start.col, 0);
        assert_eq!(tokens[2].span.end.col, 2);
    }

    #[test]
    fn test_surface_roundtrip() {
        let source = "fun add(a, b) -> a + b";
        let tokens = Lexer::new("<test>", source).tokenize().unwrap();
        let printed: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        let rebuilt = printed.join(" ");
        let normalize = |s: &str| s.split_whitespace().collect::<String>();
        assert_eq!(normalize(&rebuilt), normalize(source));
    }
}
