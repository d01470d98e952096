// ABOUTME: List builtins: append, pop, extend, len, range, map, filter, reduce

use super::{expect_callable, expect_list, expect_number, param, param_with, BuiltinDef, DefaultVal};
use crate::env::Scope;
use crate::error::{Context, Error};
use crate::interp::Interp;
use crate::lexer::Span;
use crate::value::Value;
use std::rc::Rc;

static APPEND: BuiltinDef = BuiltinDef {
    name: "append",
    params: &[param("list"), param("value")],
    func: builtin_append,
};

static POP: BuiltinDef = BuiltinDef {
    name: "pop",
    params: &[param("list"), param("index")],
    func: builtin_pop,
};

static EXTEND: BuiltinDef = BuiltinDef {
    name: "extend",
    params: &[param("listA"), param("listB")],
    func: builtin_extend,
};

static LEN: BuiltinDef = BuiltinDef {
    name: "len",
    params: &[param("list")],
    func: builtin_len,
};

static RANGE: BuiltinDef = BuiltinDef {
    name: "range",
    params: &[
        param("start"),
        param("end"),
        param_with("step", DefaultVal::Num(1.0)),
    ],
    func: builtin_range,
};

static MAP: BuiltinDef = BuiltinDef {
    name: "map",
    params: &[param("list"), param("func")],
    func: builtin_map,
};

static FILTER: BuiltinDef = BuiltinDef {
    name: "filter",
    params: &[param("list"), param("func")],
    func: builtin_filter,
};

static REDUCE: BuiltinDef = BuiltinDef {
    name: "reduce",
    params: &[param("list"), param("func"), param("initial")],
    func: builtin_reduce,
};

/// In-place push; the mutation is visible through every alias of the list.
fn builtin_append(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let items = expect_list(&args[0], "First argument", span, context)?;
    items.borrow_mut().push(args[1].clone());
    Ok(Value::null())
}

fn builtin_pop(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let items = expect_list(&args[0], "First argument", span, context)?;
    let index = expect_number(&args[1], "Second argument", span, context)?;

    let mut items = items.borrow_mut();
    let len = items.len();
    let resolved = if index < 0.0 {
        len as f64 + index
    } else {
        index
    };
    if resolved.fract() != 0.0 || resolved < 0.0 || resolved >= len as f64 {
        return Err(Error::runtime(
            span.clone(),
            "Element at this index could not be removed from list because index is out of bounds",
            context,
        ));
    }
    Ok(items.remove(resolved as usize))
}

fn builtin_extend(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let target = expect_list(&args[0], "First argument", span, context)?;
    let source = expect_list(&args[1], "Second argument", span, context)?;

    if Rc::ptr_eq(&target, &source) {
        let doubled: Vec<Value> = target.borrow().clone();
        target.borrow_mut().extend(doubled);
    } else {
        target.borrow_mut().extend(source.borrow().iter().cloned());
    }
    Ok(Value::null())
}

fn builtin_len(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let items = expect_list(&args[0], "Argument", span, context)?;
    let len = items.borrow().len();
    Ok(Value::Number(len as f64))
}

fn builtin_range(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let start = expect_number(&args[0], "First argument", span, context)?;
    let end = expect_number(&args[1], "Second argument", span, context)?;
    let step = expect_number(&args[2], "Third argument", span, context)?;

    if step == 0.0 {
        return Err(Error::runtime(span.clone(), "Step cannot be 0", context));
    }

    let mut elements = Vec::new();
    let mut i = start;
    if step > 0.0 {
        while i < end {
            elements.push(Value::Number(i));
            i += step;
        }
    } else {
        while i > end {
            elements.push(Value::Number(i));
            i += step;
        }
    }
    Ok(Value::list(elements))
}

fn builtin_map(
    interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let items = expect_list(&args[0], "First argument", span, context)?;
    let func = expect_callable(&args[1], "Second argument", span, context)?;

    let snapshot: Vec<Value> = items.borrow().clone();
    let mut results = Vec::with_capacity(snapshot.len());
    for element in snapshot {
        results.push(interp.call_value(func, vec![element], span, context)?);
    }
    Ok(Value::list(results))
}

fn builtin_filter(
    interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let items = expect_list(&args[0], "First argument", span, context)?;
    let func = expect_callable(&args[1], "Second argument", span, context)?;

    let snapshot: Vec<Value> = items.borrow().clone();
    let mut results = Vec::new();
    for element in snapshot {
        let keep = interp.call_value(func, vec![element.clone()], span, context)?;
        if keep.is_true() {
            results.push(element);
        }
    }
    Ok(Value::list(results))
}

fn builtin_reduce(
    interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let items = expect_list(&args[0], "First argument", span, context)?;
    let func = expect_callable(&args[1], "Second argument", span, context)?;

    let snapshot: Vec<Value> = items.borrow().clone();
    let mut acc = args[2].clone();
    for element in snapshot {
        acc = interp.call_value(func, vec![acc, element], span, context)?;
    }
    Ok(acc)
}

pub fn register(scope: &Rc<Scope>) {
    scope.define("append", Value::Builtin(&APPEND));
    scope.define("pop", Value::Builtin(&POP));
    scope.define("extend", Value::Builtin(&EXTEND));
    scope.define("len", Value::Builtin(&LEN));
    scope.define("range", Value::Builtin(&RANGE));
    scope.define("map", Value::Builtin(&MAP));
    scope.define("filter", Value::Builtin(&FILTER));
    scope.define("reduce", Value::Builtin(&REDUCE));
}
