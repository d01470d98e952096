// ABOUTME: Type predicate builtins: is_num, is_str, is_list, is_fun

use super::{param, BuiltinDef};
use crate::env::Scope;
use crate::error::{Context, Error};
use crate::interp::Interp;
use crate::lexer::Span;
use crate::value::Value;
use std::rc::Rc;

static IS_NUM: BuiltinDef = BuiltinDef {
    name: "is_num",
    params: &[param("value")],
    func: builtin_is_num,
};

static IS_STR: BuiltinDef = BuiltinDef {
    name: "is_str",
    params: &[param("value")],
    func: builtin_is_str,
};

static IS_LIST: BuiltinDef = BuiltinDef {
    name: "is_list",
    params: &[param("value")],
    func: builtin_is_list,
};

static IS_FUN: BuiltinDef = BuiltinDef {
    name: "is_fun",
    params: &[param("value")],
    func: builtin_is_fun,
};

fn builtin_is_num(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    _span: &Span,
    _context: &Rc<Context>,
) -> Result<Value, Error> {
    Ok(Value::bool(matches!(args[0], Value::Number(_))))
}

fn builtin_is_str(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    _span: &Span,
    _context: &Rc<Context>,
) -> Result<Value, Error> {
    Ok(Value::bool(matches!(args[0], Value::Str(_))))
}

fn builtin_is_list(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    _span: &Span,
    _context: &Rc<Context>,
) -> Result<Value, Error> {
    Ok(Value::bool(matches!(args[0], Value::List(_))))
}

fn builtin_is_fun(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    _span: &Span,
    _context: &Rc<Context>,
) -> Result<Value, Error> {
    Ok(Value::bool(args[0].is_callable()))
}

pub fn register(scope: &Rc<Scope>) {
    scope.define("is_num", Value::Builtin(&IS_NUM));
    scope.define("is_str", Value::Builtin(&IS_STR));
    scope.define("is_list", Value::Builtin(&IS_LIST));
    scope.define("is_fun", Value::Builtin(&IS_FUN));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(def: &BuiltinDef, value: Value) -> bool {
        let interp = Interp::new(vec![], vec![]);
        let result = (def.func)(
            &interp,
            vec![value],
            &Span::synthetic("<test>"),
            &Context::root("<test>"),
        )
        .unwrap();
        result.is_true()
    }

    #[test]
    fn test_predicates() {
        assert!(call(&IS_NUM, Value::Number(1.0)));
        assert!(!call(&IS_NUM, Value::Str("1".into())));
        assert!(call(&IS_STR, Value::Str("x".into())));
        assert!(call(&IS_LIST, Value::list(vec![])));
        assert!(!call(&IS_FUN, Value::Number(0.0)));
        assert!(call(&IS_FUN, Value::Builtin(&IS_NUM)));
    }
}
