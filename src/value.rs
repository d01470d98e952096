// ABOUTME: Runtime value variant with operator, indexing and iteration hooks

use crate::ast::{BinOp, Node, Param, UnaryOp};
use crate::builtins::BuiltinDef;
use crate::env::Scope;
use crate::error::{Context, Error};
use crate::host::HostFn;
use crate::lexer::Span;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A user-defined function value: its body and parameter expressions are
/// shared with the AST, and the captured scope keeps the defining chain
/// alive for as long as the closure exists.
#[derive(Debug)]
pub struct FuncData {
    pub name: Option<String>,
    pub params: Rc<Vec<Param>>,
    pub body: Rc<Node>,
    pub auto_return: bool,
    pub scope: Rc<Scope>,
    pub context: Rc<Context>,
    pub span: Span,
}

impl FuncData {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// A host-language callable adapted through the host bridge.
pub struct HostFunc {
    pub name: String,
    pub func: HostFn,
}

impl fmt::Debug for HostFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<host function {}>", self.name)
    }
}

/// A loaded module: a first-class wrapper around the module's top-level
/// scope, so member writes are visible through every cached handle and to
/// closures the module defined.
#[derive(Debug)]
pub struct ModuleData {
    pub name: String,
    pub scope: Rc<Scope>,
}

/// A struct instance: declared name plus field map in declaration order.
#[derive(Debug)]
pub struct StructData {
    pub name: String,
    pub fields: RefCell<IndexMap<String, Value>>,
}

/// Lazy iteration state handed out by `for … in`. List iteration reads the
/// live backing store at each step; string and dict-key iteration snapshot
/// at creation.
#[derive(Debug)]
pub enum ValueIter {
    List { items: Rc<RefCell<Vec<Value>>>, idx: usize },
    Chars { chars: Vec<char>, idx: usize },
    Keys { keys: Vec<String>, idx: usize },
}

impl ValueIter {
    pub fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::List { items, idx } => {
                let item = items.borrow().get(*idx).cloned();
                if item.is_some() {
                    *idx += 1;
                }
                item
            }
            ValueIter::Chars { chars, idx } => {
                let item = chars.get(*idx).map(|c| Value::Str(c.to_string()));
                if item.is_some() {
                    *idx += 1;
                }
                item
            }
            ValueIter::Keys { keys, idx } => {
                let item = keys.get(*idx).map(|k| Value::Str(k.clone()));
                if item.is_some() {
                    *idx += 1;
                }
                item
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<IndexMap<String, Value>>>),
    Function(Rc<FuncData>),
    Builtin(&'static BuiltinDef),
    Host(Rc<HostFunc>),
    Iter(Rc<RefCell<ValueIter>>),
    Struct(Rc<StructData>),
    Module(Rc<ModuleData>),
}

/// Integral-valued numbers display without a decimal point.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl Value {
    pub fn null() -> Value {
        Value::Number(0.0)
    }

    pub fn bool(b: bool) -> Value {
        Value::Number(if b { 1.0 } else { 0.0 })
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(map: IndexMap<String, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(map)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Dict(_) => "Dict",
            Value::Function(_) => "Function",
            Value::Builtin(_) => "BuiltInFunction",
            Value::Host(_) => "HostFunction",
            Value::Iter(_) => "Iterator",
            Value::Struct(_) => "StructInstance",
            Value::Module(_) => "Module",
        }
    }

    /// Number ≠ 0, non-empty String; every other value is truthy.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Builtin(_) | Value::Host(_)
        )
    }

    /// REPL-facing rendering: strings quoted, containers element-wise.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{s}\""),
            Value::List(items) => {
                let parts: Vec<String> = items.borrow().iter().map(|v| v.repr()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Dict(map) => {
                let parts: Vec<String> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("\"{}\": {}", k, v.repr()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Struct(data) => {
                let parts: Vec<String> = data
                    .fields
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.repr()))
                    .collect();
                format!("{} {{{}}}", data.name, parts.join(", "))
            }
            other => other.to_string(),
        }
    }

    fn illegal_operation(span: &Span, context: &Rc<Context>) -> Error {
        Error::runtime(span.clone(), "Illegal operation", context)
    }

    /// Binary operator dispatch. `span` anchors "Illegal operation";
    /// division and modulo by zero anchor at the right operand's span.
    pub fn binary(
        &self,
        op: BinOp,
        rhs: &Value,
        span: &Span,
        rhs_span: &Span,
        context: &Rc<Context>,
    ) -> Result<Value, Error> {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => {
                number_binary(op, *a, *b, span, rhs_span, context)
            }
            (Value::Number(a), Value::Str(b)) if op == BinOp::Add => {
                Ok(Value::Str(format!("{}{}", format_number(*a), b)))
            }
            (Value::Str(a), Value::Str(b)) => match op {
                BinOp::Add => Ok(Value::Str(format!("{a}{b}"))),
                BinOp::Eq => Ok(Value::bool(a == b)),
                BinOp::Ne => Ok(Value::bool(a != b)),
                _ => Err(Self::illegal_operation(span, context)),
            },
            (Value::Str(a), other) if op == BinOp::Add => Ok(Value::Str(format!("{a}{other}"))),
            (Value::Str(a), Value::Number(n)) if op == BinOp::Mul => {
                if n.fract() != 0.0 {
                    return Err(Self::illegal_operation(span, context));
                }
                let count = (*n).max(0.0) as usize;
                Ok(Value::Str(a.repeat(count)))
            }
            (Value::List(items), other) => list_binary(op, items, other, span, rhs_span, context),
            (Value::Dict(a), Value::Dict(b)) if op == BinOp::Add => {
                let mut merged = a.borrow().clone();
                for (k, v) in b.borrow().iter() {
                    merged.insert(k.clone(), v.clone());
                }
                Ok(Value::dict(merged))
            }
            _ => Err(Self::illegal_operation(span, context)),
        }
    }

    pub fn unary(&self, op: UnaryOp, span: &Span, context: &Rc<Context>) -> Result<Value, Error> {
        match (op, self) {
            (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOp::Not, Value::Number(n)) => Ok(Value::bool(*n == 0.0)),
            _ => Err(Self::illegal_operation(span, context)),
        }
    }
}

fn number_binary(
    op: BinOp,
    a: f64,
    b: f64,
    _span: &Span,
    rhs_span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let value = match op {
        BinOp::Add => Value::Number(a + b),
        BinOp::Sub => Value::Number(a - b),
        BinOp::Mul => Value::Number(a * b),
        BinOp::Div => {
            if b == 0.0 {
                return Err(Error::runtime(rhs_span.clone(), "Division by zero", context));
            }
            Value::Number(a / b)
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(Error::runtime(rhs_span.clone(), "Modulo by zero", context));
            }
            // Floored modulo: the result follows the divisor's sign.
            Value::Number(a - b * (a / b).floor())
        }
        BinOp::Pow => Value::Number(a.powf(b)),
        BinOp::Eq => Value::bool(a == b),
        BinOp::Ne => Value::bool(a != b),
        BinOp::Lt => Value::bool(a < b),
        BinOp::Gt => Value::bool(a > b),
        BinOp::Lte => Value::bool(a <= b),
        BinOp::Gte => Value::bool(a >= b),
        BinOp::And => Value::bool(a != 0.0 && b != 0.0),
        BinOp::Or => Value::bool(a != 0.0 || b != 0.0),
    };
    Ok(value)
}

fn list_binary(
    op: BinOp,
    items: &Rc<RefCell<Vec<Value>>>,
    rhs: &Value,
    span: &Span,
    rhs_span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    match (op, rhs) {
        (BinOp::Add, other) => {
            let mut new_items = items.borrow().clone();
            new_items.push(other.clone());
            Ok(Value::list(new_items))
        }
        (BinOp::Sub, Value::Number(n)) => {
            let mut new_items = items.borrow().clone();
            match integral_index(*n, new_items.len()) {
                Some(idx) => {
                    new_items.remove(idx);
                    Ok(Value::list(new_items))
                }
                None => Err(Error::runtime(
                    rhs_span.clone(),
                    "Element at this index could not be removed from list because index is out \
                     of bounds",
                    context,
                )),
            }
        }
        (BinOp::Mul, Value::List(other)) => {
            let mut new_items = items.borrow().clone();
            new_items.extend(other.borrow().iter().cloned());
            Ok(Value::list(new_items))
        }
        (BinOp::Div, Value::Number(n)) => {
            let items = items.borrow();
            match integral_index(*n, items.len()) {
                Some(idx) => Ok(items[idx].clone()),
                None => Err(Error::runtime(
                    rhs_span.clone(),
                    "Element at this index could not be retrieved from list because index is out \
                     of bounds",
                    context,
                )),
            }
        }
        _ => Err(Value::illegal_operation(span, context)),
    }
}

impl Value {
    /// Read through `[index]`. Defined on String (read-only), List and Dict.
    pub fn get_index(
        &self,
        index: &Value,
        index_span: &Span,
        context: &Rc<Context>,
    ) -> Result<Value, Error> {
        match (self, index) {
            (Value::Str(s), Value::Number(n)) => {
                let chars: Vec<char> = s.chars().collect();
                match integral_index(*n, chars.len()) {
                    Some(idx) => Ok(Value::Str(chars[idx].to_string())),
                    None => Err(Error::runtime(
                        index_span.clone(),
                        format!(
                            "Cannot retrieve character {} from string \"{s}\" because it is out \
                             of bounds.",
                            format_number(*n)
                        ),
                        context,
                    )),
                }
            }
            (Value::List(items), Value::Number(n)) => {
                let items = items.borrow();
                match integral_index(*n, items.len()) {
                    Some(idx) => Ok(items[idx].clone()),
                    None => Err(Error::runtime(
                        index_span.clone(),
                        format!(
                            "Cannot retrieve element {} from list {} because it is out of bounds.",
                            format_number(*n),
                            self.repr()
                        ),
                        context,
                    )),
                }
            }
            (Value::Dict(map), Value::Str(key)) => match map.borrow().get(key) {
                Some(value) => Ok(value.clone()),
                None => Err(Error::runtime(
                    index_span.clone(),
                    format!("Could not find key \"{key}\" in dict {}", self.repr()),
                    context,
                )),
            },
            _ => Err(Self::illegal_operation(index_span, context)),
        }
    }

    /// Write through `[index] =`. A write past a List's last valid index
    /// does not extend the list; it errors.
    pub fn set_index(
        &self,
        index: &Value,
        value: Value,
        index_span: &Span,
        context: &Rc<Context>,
    ) -> Result<Value, Error> {
        match (self, index) {
            (Value::List(items), Value::Number(n)) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                match integral_index(*n, len) {
                    Some(idx) => {
                        items[idx] = value;
                        Ok(self.clone())
                    }
                    None => Err(Error::runtime(
                        index_span.clone(),
                        format!(
                            "Cannot set element {} of list because it is out of bounds.",
                            format_number(*n)
                        ),
                        context,
                    )),
                }
            }
            (Value::Dict(map), Value::Str(key)) => {
                map.borrow_mut().insert(key.clone(), value);
                Ok(self.clone())
            }
            _ => Err(Self::illegal_operation(index_span, context)),
        }
    }

    /// Read through `.field` on structs, modules and dicts.
    pub fn get_dot(
        &self,
        field: &str,
        span: &Span,
        context: &Rc<Context>,
    ) -> Result<Value, Error> {
        match self {
            Value::Struct(data) => match data.fields.borrow().get(field) {
                Some(value) => Ok(value.clone()),
                None => Err(Error::runtime(
                    span.clone(),
                    format!(
                        "Could not find property '{field}' in struct '{}'",
                        data.name
                    ),
                    context,
                )),
            },
            Value::Module(module) => match module.scope.get_local(field) {
                Some(value) => Ok(value),
                None => Err(Error::runtime(
                    span.clone(),
                    format!("Module '{}' has no member named '{field}'", module.name),
                    context,
                )),
            },
            Value::Dict(map) => match map.borrow().get(field) {
                Some(value) => Ok(value.clone()),
                None => Err(Error::runtime(
                    span.clone(),
                    format!("Could not find key \"{field}\" in dict {}", self.repr()),
                    context,
                )),
            },
            _ => Err(Error::runtime(
                span.clone(),
                format!(
                    "Object of type '{}' has no property of name '{field}'",
                    self.type_name()
                ),
                context,
            )),
        }
    }

    /// Write through `.field =`. Struct fields must already exist; module
    /// members are a mutable namespace; dict entries are created on write.
    pub fn set_dot(
        &self,
        field: &str,
        value: Value,
        span: &Span,
        context: &Rc<Context>,
    ) -> Result<Value, Error> {
        match self {
            Value::Struct(data) => {
                let mut fields = data.fields.borrow_mut();
                if !fields.contains_key(field) {
                    return Err(Error::runtime(
                        span.clone(),
                        format!(
                            "Could not find property '{field}' in struct '{}'",
                            data.name
                        ),
                        context,
                    ));
                }
                fields.insert(field.to_string(), value);
                Ok(Value::null())
            }
            Value::Module(module) => {
                module.scope.define(field, value);
                Ok(Value::null())
            }
            Value::Dict(map) => {
                map.borrow_mut().insert(field.to_string(), value);
                Ok(Value::null())
            }
            _ => Err(Self::illegal_operation(span, context)),
        }
    }

    /// Obtain the iteration hook for `for … in`. An Iterator iterates as
    /// itself; resuming one mid-way continues where it left off.
    pub fn iterate(&self, span: &Span, context: &Rc<Context>) -> Result<Value, Error> {
        let state = match self {
            Value::Str(s) => ValueIter::Chars {
                chars: s.chars().collect(),
                idx: 0,
            },
            Value::List(items) => ValueIter::List {
                items: items.clone(),
                idx: 0,
            },
            Value::Dict(map) => ValueIter::Keys {
                keys: map.borrow().keys().cloned().collect(),
                idx: 0,
            },
            Value::Iter(_) => return Ok(self.clone()),
            _ => return Err(Self::illegal_operation(span, context)),
        };
        Ok(Value::Iter(Rc::new(RefCell::new(state))))
    }
}

/// Resolve a Number to a container index, honoring negative offsets from the
/// end. `None` for non-integral or out-of-bounds values.
fn integral_index(n: f64, len: usize) -> Option<usize> {
    if n.fract() != 0.0 || !n.is_finite() {
        return None;
    }
    let idx = n as i64;
    let resolved = if idx < 0 { len as i64 + idx } else { idx };
    if resolved < 0 || resolved >= len as i64 {
        return None;
    }
    Some(resolved as usize)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                let parts: Vec<String> =
                    items.borrow().iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            Value::Dict(map) => {
                let parts: Vec<String> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect();
                write!(f, "{}", parts.join("\n"))
            }
            Value::Function(data) => write!(f, "<function {}>", data.display_name()),
            Value::Builtin(def) => write!(f, "<built-in function {}>", def.name),
            Value::Host(host) => write!(f, "<host function {}>", host.name),
            Value::Iter(_) => write!(f, "<iterator>"),
            Value::Struct(_) => write!(f, "{}", self.repr()),
            Value::Module(module) => write!(f, "<module {}>", module.name),
        }
    }
}
