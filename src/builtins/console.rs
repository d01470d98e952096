// ABOUTME: Console builtins: print, print_ret, input, input_int, clear

use super::{param, BuiltinDef};
use crate::env::Scope;
use crate::error::{Context, Error};
use crate::interp::Interp;
use crate::lexer::Span;
use crate::value::Value;
use std::io::{BufRead, Write};
use std::rc::Rc;

static PRINT: BuiltinDef = BuiltinDef {
    name: "print",
    params: &[param("value")],
    func: builtin_print,
};

static PRINT_RET: BuiltinDef = BuiltinDef {
    name: "print_ret",
    params: &[param("value")],
    func: builtin_print_ret,
};

static INPUT: BuiltinDef = BuiltinDef {
    name: "input",
    params: &[],
    func: builtin_input,
};

static INPUT_INT: BuiltinDef = BuiltinDef {
    name: "input_int",
    params: &[],
    func: builtin_input_int,
};

static CLEAR: BuiltinDef = BuiltinDef {
    name: "clear",
    params: &[],
    func: builtin_clear,
};

fn builtin_print(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    _span: &Span,
    _context: &Rc<Context>,
) -> Result<Value, Error> {
    println!("{}", args[0]);
    Ok(Value::null())
}

/// Like `print`, but returns the stringification instead of writing it.
fn builtin_print_ret(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    _span: &Span,
    _context: &Rc<Context>,
) -> Result<Value, Error> {
    Ok(Value::Str(args[0].to_string()))
}

fn read_line(span: &Span, context: &Rc<Context>) -> Result<String, Error> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| Error::runtime(span.clone(), format!("Cannot read stdin: {e}"), context))?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn builtin_input(
    _interp: &Rc<Interp>,
    _args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    Ok(Value::Str(read_line(span, context)?))
}

fn builtin_input_int(
    _interp: &Rc<Interp>,
    _args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    loop {
        let line = read_line(span, context)?;
        match line.trim().parse::<i64>() {
            Ok(number) => return Ok(Value::Number(number as f64)),
            Err(_) => println!("'{line}' must be an integer. Try again!"),
        }
    }
}

fn builtin_clear(
    _interp: &Rc<Interp>,
    _args: Vec<Value>,
    _span: &Span,
    _context: &Rc<Context>,
) -> Result<Value, Error> {
    print!("\x1B[2J\x1B[H");
    let _ = std::io::stdout().flush();
    Ok(Value::null())
}

pub fn register(scope: &Rc<Scope>) {
    scope.define("print", Value::Builtin(&PRINT));
    scope.define("print_ret", Value::Builtin(&PRINT_RET));
    scope.define("input", Value::Builtin(&INPUT));
    scope.define("input_int", Value::Builtin(&INPUT_INT));
    scope.define("clear", Value::Builtin(&CLEAR));
    scope.define("cls", Value::Builtin(&CLEAR));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_ret_stringifies() {
        let interp = Interp::new(vec![], vec![]);
        let result = builtin_print_ret(
            &interp,
            vec![Value::Number(4.0)],
            &Span::synthetic("<test>"),
            &Context::root("<test>"),
        )
        .unwrap();
        assert!(matches!(result, Value::Str(s) if s == "4"));
    }

    #[test]
    fn test_register_binds_aliases() {
        let scope = Scope::new();
        register(&scope);
        assert!(scope.get("print").is_some());
        assert!(scope.get("cls").is_some());
        assert!(scope.get("clear").is_some());
    }
}
