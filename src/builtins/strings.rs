// ABOUTME: String builtins: join, split, trim family, startswith, endswith, contains

use super::{expect_list, expect_string, param, BuiltinDef};
use crate::env::Scope;
use crate::error::{Context, Error};
use crate::interp::Interp;
use crate::lexer::Span;
use crate::value::Value;
use std::rc::Rc;

static JOIN: BuiltinDef = BuiltinDef {
    name: "join",
    params: &[param("list"), param("sep")],
    func: builtin_join,
};

static SPLIT: BuiltinDef = BuiltinDef {
    name: "split",
    params: &[param("text"), param("sep")],
    func: builtin_split,
};

static TRIM: BuiltinDef = BuiltinDef {
    name: "trim",
    params: &[param("text")],
    func: builtin_trim,
};

static LTRIM: BuiltinDef = BuiltinDef {
    name: "ltrim",
    params: &[param("text")],
    func: builtin_ltrim,
};

static RTRIM: BuiltinDef = BuiltinDef {
    name: "rtrim",
    params: &[param("text")],
    func: builtin_rtrim,
};

static STARTSWITH: BuiltinDef = BuiltinDef {
    name: "startswith",
    params: &[param("text"), param("prefix")],
    func: builtin_startswith,
};

static ENDSWITH: BuiltinDef = BuiltinDef {
    name: "endswith",
    params: &[param("text"), param("suffix")],
    func: builtin_endswith,
};

static CONTAINS: BuiltinDef = BuiltinDef {
    name: "contains",
    params: &[param("text"), param("part")],
    func: builtin_contains,
};

fn builtin_join(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let items = expect_list(&args[0], "First argument", span, context)?;
    let sep = expect_string(&args[1], "Second argument", span, context)?;

    let parts: Vec<String> = items.borrow().iter().map(|v| v.to_string()).collect();
    Ok(Value::Str(parts.join(&sep)))
}

fn builtin_split(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let text = expect_string(&args[0], "First argument", span, context)?;
    let sep = expect_string(&args[1], "Second argument", span, context)?;

    if sep.is_empty() {
        return Err(Error::runtime(
            span.clone(),
            "Separator cannot be empty",
            context,
        ));
    }

    let parts: Vec<Value> = text
        .split(&sep)
        .map(|part| Value::Str(part.to_string()))
        .collect();
    Ok(Value::list(parts))
}

fn builtin_trim(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let text = expect_string(&args[0], "Argument", span, context)?;
    Ok(Value::Str(text.trim().to_string()))
}

fn builtin_ltrim(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let text = expect_string(&args[0], "Argument", span, context)?;
    Ok(Value::Str(text.trim_start().to_string()))
}

fn builtin_rtrim(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let text = expect_string(&args[0], "Argument", span, context)?;
    Ok(Value::Str(text.trim_end().to_string()))
}

fn builtin_startswith(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let text = expect_string(&args[0], "First argument", span, context)?;
    let prefix = expect_string(&args[1], "Second argument", span, context)?;
    Ok(Value::bool(text.starts_with(&prefix)))
}

fn builtin_endswith(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let text = expect_string(&args[0], "First argument", span, context)?;
    let suffix = expect_string(&args[1], "Second argument", span, context)?;
    Ok(Value::bool(text.ends_with(&suffix)))
}

fn builtin_contains(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let text = expect_string(&args[0], "First argument", span, context)?;
    let part = expect_string(&args[1], "Second argument", span, context)?;
    Ok(Value::bool(text.contains(&part)))
}

pub fn register(scope: &Rc<Scope>) {
    scope.define("join", Value::Builtin(&JOIN));
    scope.define("split", Value::Builtin(&SPLIT));
    scope.define("trim", Value::Builtin(&TRIM));
    scope.define("ltrim", Value::Builtin(&LTRIM));
    scope.define("rtrim", Value::Builtin(&RTRIM));
    scope.define("startswith", Value::Builtin(&STARTSWITH));
    scope.define("endswith", Value::Builtin(&ENDSWITH));
    scope.define("contains", Value::Builtin(&CONTAINS));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> Rc<Interp> {
        Interp::new(vec![], vec![])
    }

    fn span() -> Span {
        Span::synthetic("<test>")
    }

    fn ctx() -> Rc<Context> {
        Context::root("<test>")
    }

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    #[test]
    fn test_join_stringifies_elements() {
        let list = Value::list(vec![s("a"), Value::Number(1.0)]);
        let joined = builtin_join(&interp(), vec![list, s(", ")], &span(), &ctx()).unwrap();
        assert!(matches!(joined, Value::Str(out) if out == "a, 1"));
    }

    #[test]
    fn test_split_rejects_empty_separator() {
        let err = builtin_split(&interp(), vec![s("a,b"), s("")], &span(), &ctx()).unwrap_err();
        assert_eq!(err.details, "Separator cannot be empty");

        let parts = builtin_split(&interp(), vec![s("a,b"), s(",")], &span(), &ctx()).unwrap();
        assert_eq!(parts.repr(), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_trim_family() {
        assert!(matches!(
            builtin_trim(&interp(), vec![s("  x  ")], &span(), &ctx()).unwrap(),
            Value::Str(out) if out == "x"
        ));
        assert!(matches!(
            builtin_ltrim(&interp(), vec![s("  x  ")], &span(), &ctx()).unwrap(),
            Value::Str(out) if out == "x  "
        ));
        assert!(matches!(
            builtin_rtrim(&interp(), vec![s("  x  ")], &span(), &ctx()).unwrap(),
            Value::Str(out) if out == "  x"
        ));
    }

    #[test]
    fn test_predicates() {
        assert!(builtin_startswith(&interp(), vec![s("whoop"), s("wh")], &span(), &ctx())
            .unwrap()
            .is_true());
        assert!(builtin_endswith(&interp(), vec![s("whoop"), s("oop")], &span(), &ctx())
            .unwrap()
            .is_true());
        assert!(builtin_contains(&interp(), vec![s("whoop"), s("hoo")], &span(), &ctx())
            .unwrap()
            .is_true());
        assert!(!builtin_contains(&interp(), vec![s("whoop"), s("xyz")], &span(), &ctx())
            .unwrap()
            .is_true());
    }
}
