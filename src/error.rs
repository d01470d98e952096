// ABOUTME: Diagnostic types for lexing, parsing and evaluation failures

use crate::lexer::{Position, Span};
use std::rc::Rc;
use thiserror::Error;

const TAB_WIDTH: usize = 4;

/// User-visible diagnostic categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("Illegal Character")]
    IllegalChar,
    #[error("Expected Character")]
    ExpectedChar,
    #[error("Invalid Syntax")]
    InvalidSyntax,
    #[error("Runtime Error")]
    Runtime,
    #[error("Try Error")]
    Try,
}

/// One frame of the call chain, used for traceback rendering.
#[derive(Debug)]
pub struct Context {
    pub display_name: String,
    pub parent: Option<Rc<Context>>,
    pub parent_entry_pos: Option<Position>,
}

impl Context {
    pub fn root(display_name: &str) -> Rc<Self> {
        Rc::new(Context {
            display_name: display_name.to_string(),
            parent: None,
            parent_entry_pos: None,
        })
    }

    pub fn frame(display_name: &str, parent: &Rc<Context>, entry_pos: Position) -> Rc<Self> {
        Rc::new(Context {
            display_name: display_name.to_string(),
            parent: Some(parent.clone()),
            parent_entry_pos: Some(entry_pos),
        })
    }
}

/// A source-anchored diagnostic. Lexer and parser errors carry no context;
/// runtime errors carry the call chain, and a `Try` error additionally chains
/// the error that was being handled when it was raised.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {details}")]
pub struct Error {
    pub kind: ErrorKind,
    pub details: String,
    pub span: Span,
    pub context: Option<Rc<Context>>,
    pub cause: Option<Box<Error>>,
}

impl Error {
    pub fn illegal_char(span: Span, details: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::IllegalChar,
            details: details.into(),
            span,
            context: None,
            cause: None,
        }
    }

    pub fn expected_char(span: Span, details: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::ExpectedChar,
            details: details.into(),
            span,
            context: None,
            cause: None,
        }
    }

    pub fn syntax(span: Span, details: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::InvalidSyntax,
            details: details.into(),
            span,
            context: None,
            cause: None,
        }
    }

    pub fn runtime(span: Span, details: impl Into<String>, context: &Rc<Context>) -> Self {
        Error {
            kind: ErrorKind::Runtime,
            details: details.into(),
            span,
            context: Some(context.clone()),
            cause: None,
        }
    }

    pub fn try_chain(inner: Error, handled: Error) -> Self {
        Error {
            kind: ErrorKind::Try,
            cause: Some(Box::new(handled)),
            ..inner
        }
    }

    /// One-line rendering, also the value bound by `catch as`.
    pub fn one_line(&self) -> String {
        format!("{}: {}", self.kind, self.details)
    }

    /// Full rendering with source excerpt, carets, traceback and hint.
    pub fn render(&self) -> String {
        let mut result = String::new();

        if let Some(cause) = &self.cause {
            result.push_str(&cause.render());
            result
                .push_str("\nDuring the handling of the above error, another error occurred:\n\n");
        }

        if self.context.is_some() {
            result.push_str(&self.traceback());
        }

        let line = self.span.start.line + 1;
        let col = self.span.start.col + 1;
        result.push_str(&format!("{}: {}\n", self.kind, self.details));
        result.push_str(&format!(
            "File {}, line {}, column {}",
            self.span.start.file, line, col
        ));
        result.push_str("\n\n");
        result.push_str(&underline_source(
            &self.span.start.text,
            &self.span.start,
            &self.span.end,
        ));

        if let Some(hint) = hint_for(self.kind, &self.details) {
            result.push_str(&format!("\n\nHint: {hint}"));
        }

        result
    }

    fn traceback(&self) -> String {
        let mut result = String::new();
        let mut pos = Some(self.span.start.clone());
        let mut ctx = self.context.clone();

        while let Some(frame) = ctx {
            if let Some(p) = &pos {
                result = format!(
                    "  File {}, line {}, in {}\n{}",
                    p.file,
                    p.line + 1,
                    frame.display_name,
                    result
                );
            }
            pos = frame.parent_entry_pos.clone();
            ctx = frame.parent.clone();
        }

        format!("Traceback (most recent call last):\n{result}")
    }
}

/// Reproduce the offending source lines with a caret gutter underneath.
/// Multi-line spans get one gutter/caret pair per spanned line; tabs are
/// expanded to [`TAB_WIDTH`] spaces so the carets stay aligned.
pub fn underline_source(text: &str, pos_start: &Position, pos_end: &Position) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::new();

    let mut idx_start = match chars[..pos_start.idx.min(chars.len())]
        .iter()
        .rposition(|&c| c == '\n')
    {
        Some(i) => i + 1,
        None => 0,
    };
    let mut idx_end = line_end(&chars, idx_start + 1);

    let line_count = pos_end.line.saturating_sub(pos_start.line) + 1;
    for i in 0..line_count {
        let raw_line: String = chars[idx_start.min(chars.len())..idx_end].iter().collect();
        let col_start = if i == 0 { pos_start.col } else { 0 };
        let col_end = if i == line_count - 1 {
            pos_end.col
        } else {
            raw_line.chars().count()
        };

        let line_no = pos_start.line + i + 1;
        let gutter = format!("{line_no} | ");
        let display_line = raw_line.replace('\t', &" ".repeat(TAB_WIDTH));
        let col_start = expand_col(col_start, &raw_line);
        let col_end = expand_col(col_end, &raw_line);

        result.push_str(&gutter);
        result.push_str(&display_line);
        result.push('\n');

        let caret_len = if col_end <= col_start {
            1
        } else {
            col_end - col_start
        };
        result.push_str(&" ".repeat(gutter.chars().count() + col_start));
        result.push_str(&"^".repeat(caret_len));
        result.push('\n');

        idx_start = idx_end;
        idx_end = line_end(&chars, idx_start + 1);
    }

    result.trim_end_matches('\n').to_string()
}

fn line_end(chars: &[char], from: usize) -> usize {
    if from >= chars.len() {
        return chars.len();
    }
    match chars[from..].iter().position(|&c| c == '\n') {
        Some(i) => from + i,
        None => chars.len(),
    }
}

fn expand_col(col: usize, raw_line: &str) -> usize {
    let extra: usize = raw_line.chars().take(col).filter(|&c| c == '\t').count() * (TAB_WIDTH - 1);
    col + extra
}

/// Pattern table mapping an error to a one-line suggestion.
fn hint_for(kind: ErrorKind, details: &str) -> Option<String> {
    if details.contains("Token cannot appear after previous tokens") {
        return Some("You may be missing a newline or a '}'.".to_string());
    }
    if details.contains("Expected") {
        let expected = details.replace("Expected", "").trim().to_string();
        if !expected.is_empty() {
            return Some(format!(
                "Expected: {expected}. Check the syntax near the highlighted area."
            ));
        }
        return Some("Check the syntax near the highlighted area.".to_string());
    }
    if details.contains("Illegal operation") {
        return Some(
            "Check operand types and whether the operation is supported for them.".to_string(),
        );
    }
    if details.contains("Division by zero") || details.contains("Modulo by zero") {
        return Some("Make sure the divisor is not 0.".to_string());
    }
    if details.contains("Unclosed '{' in f-string") {
        return Some("Add a closing '}' in the f-string.".to_string());
    }
    if details.contains("Empty expression in f-string") {
        return Some("Put an expression between '{' and '}'.".to_string());
    }
    if details.contains("Can't find module") {
        return Some("Check the module name and the path in the .path file.".to_string());
    }
    if kind == ErrorKind::IllegalChar {
        return Some("Remove the invalid character or escape it.".to_string());
    }
    None
}
