// ABOUTME: Builtin function descriptors and per-category registration

use crate::env::Scope;
use crate::error::{Context, Error};
use crate::interp::Interp;
use crate::lexer::Span;
use crate::value::Value;
use std::rc::Rc;

pub mod console;
pub mod files;
pub mod lists;
pub mod strings;
pub mod types;

pub use files::FileTable;

/// The host side of a builtin call. Arguments arrive already checked and
/// padded against the descriptor's parameter table.
pub type BuiltinFn = fn(&Rc<Interp>, Vec<Value>, &Span, &Rc<Context>) -> Result<Value, Error>;

/// Constant default for an optional builtin parameter.
#[derive(Debug, Clone, Copy)]
pub enum DefaultVal {
    Num(f64),
    Str(&'static str),
}

impl DefaultVal {
    fn to_value(self) -> Value {
        match self {
            DefaultVal::Num(n) => Value::Number(n),
            DefaultVal::Str(s) => Value::Str(s.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct BuiltinParam {
    pub name: &'static str,
    pub default: Option<DefaultVal>,
}

/// A named host callable with a fixed parameter vector. Builtins follow the
/// same check-and-populate argument rules as user functions.
#[derive(Debug)]
pub struct BuiltinDef {
    pub name: &'static str,
    pub params: &'static [BuiltinParam],
    pub func: BuiltinFn,
}

pub const fn param(name: &'static str) -> BuiltinParam {
    BuiltinParam {
        name,
        default: None,
    }
}

pub const fn param_with(name: &'static str, default: DefaultVal) -> BuiltinParam {
    BuiltinParam {
        name,
        default: Some(default),
    }
}

/// Check arity against the descriptor and pad missing trailing arguments
/// with their defaults.
pub fn bind_args(
    def: &BuiltinDef,
    mut args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Vec<Value>, Error> {
    if args.len() > def.params.len() {
        return Err(Error::runtime(
            span.clone(),
            format!(
                "{} too many args passed into <built-in function {}>",
                args.len() - def.params.len(),
                def.name
            ),
            context,
        ));
    }

    let required = def
        .params
        .iter()
        .filter(|p| p.default.is_none())
        .count();
    if args.len() < required {
        return Err(Error::runtime(
            span.clone(),
            format!(
                "{} too few args passed into <built-in function {}>",
                required - args.len(),
                def.name
            ),
            context,
        ));
    }

    for param in &def.params[args.len()..] {
        match param.default {
            Some(default) => args.push(default.to_value()),
            None => {
                return Err(Error::runtime(
                    span.clone(),
                    format!(
                        "{} too few args passed into <built-in function {}>",
                        required.saturating_sub(args.len()),
                        def.name
                    ),
                    context,
                ))
            }
        }
    }

    Ok(args)
}

/// Type-checking helpers shared by the category modules.
pub fn expect_number(
    value: &Value,
    what: &str,
    span: &Span,
    context: &Rc<Context>,
) -> Result<f64, Error> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(Error::runtime(
            span.clone(),
            format!("{what} must be number"),
            context,
        )),
    }
}

pub fn expect_string(
    value: &Value,
    what: &str,
    span: &Span,
    context: &Rc<Context>,
) -> Result<String, Error> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        _ => Err(Error::runtime(
            span.clone(),
            format!("{what} must be string"),
            context,
        )),
    }
}

pub fn expect_list(
    value: &Value,
    what: &str,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Rc<std::cell::RefCell<Vec<Value>>>, Error> {
    match value {
        Value::List(items) => Ok(items.clone()),
        _ => Err(Error::runtime(
            span.clone(),
            format!("{what} must be list"),
            context,
        )),
    }
}

pub fn expect_callable<'a>(
    value: &'a Value,
    what: &str,
    span: &Span,
    context: &Rc<Context>,
) -> Result<&'a Value, Error> {
    if value.is_callable() {
        Ok(value)
    } else {
        Err(Error::runtime(
            span.clone(),
            format!("{what} must be function"),
            context,
        ))
    }
}

/// Register every builtin category in the root scope.
pub fn register_all(scope: &Rc<Scope>) {
    console::register(scope);
    types::register(scope);
    lists::register(scope);
    strings::register(scope);
    files::register(scope);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(
        _interp: &Rc<Interp>,
        _args: Vec<Value>,
        _span: &Span,
        _context: &Rc<Context>,
    ) -> Result<Value, Error> {
        Ok(Value::null())
    }

    static FIXTURE: BuiltinDef = BuiltinDef {
        name: "fixture",
        params: &[param("a"), param_with("b", DefaultVal::Num(7.0))],
        func: noop,
    };

    fn ctx() -> Rc<Context> {
        Context::root("<test>")
    }

    #[test]
    fn test_bind_args_pads_defaults() {
        let args = bind_args(
            &FIXTURE,
            vec![Value::Number(1.0)],
            &Span::synthetic("<test>"),
            &ctx(),
        )
        .unwrap();
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1], Value::Number(n) if n == 7.0));
    }

    #[test]
    fn test_bind_args_too_many() {
        let err = bind_args(
            &FIXTURE,
            vec![Value::null(), Value::null(), Value::null()],
            &Span::synthetic("<test>"),
            &ctx(),
        )
        .unwrap_err();
        assert!(err.details.contains("1 too many args"));
    }

    #[test]
    fn test_bind_args_too_few() {
        let err = bind_args(&FIXTURE, vec![], &Span::synthetic("<test>"), &ctx()).unwrap_err();
        assert!(err.details.contains("1 too few args"));
    }
}
