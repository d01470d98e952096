// ABOUTME: Tree-walking evaluator threading value/error/return/break/continue signals

use crate::ast::{ImportPath, Node, NodeKind, Param};
use crate::builtins;
use crate::builtins::files::FileTable;
use crate::env::Scope;
use crate::error::{Context, Error};
use crate::host;
use crate::lexer::Span;
use crate::modules;
use crate::parser::parse_source;
use crate::value::{FuncData, StructData, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// The non-error evaluation signals. Together with the `Err` side of
/// [`VisitResult`] these are the four orthogonal ways a visit can end:
/// an ordinary value, a runtime error, a function-level return, or a loop
/// continue/break. The non-value signals propagate until a call frame or
/// loop body consumes them; they are never user-visible.
#[derive(Debug, Clone)]
pub enum Flow {
    Value(Value),
    Return(Value),
    Continue,
    Break,
}

pub type VisitResult = Result<Flow, Error>;

/// Unwrap an ordinary value out of a visit, propagating every other signal
/// to the caller.
macro_rules! value_of {
    ($e:expr) => {
        match $e? {
            Flow::Value(v) => v,
            flow => return Ok(flow),
        }
    };
}

/// One interpreter instance: the root scope, the module cache and the
/// script-visible file descriptor table. Embedders create a fresh instance
/// per isolated execution.
pub struct Interp {
    pub import_paths: Vec<PathBuf>,
    pub globals: Rc<Scope>,
    pub module_cache: RefCell<HashMap<String, Value>>,
    pub files: RefCell<FileTable>,
}

impl Interp {
    pub fn new(import_paths: Vec<PathBuf>, argv: Vec<String>) -> Rc<Self> {
        let globals = Scope::new();
        globals.define("null", Value::null());
        globals.define("false", Value::bool(false));
        globals.define("true", Value::bool(true));
        globals.define("math_pi", Value::Number(std::f64::consts::PI));
        globals.define(
            "argv",
            Value::list(argv.into_iter().map(Value::Str).collect()),
        );
        builtins::register_all(&globals);

        Rc::new(Interp {
            import_paths,
            globals,
            module_cache: RefCell::new(HashMap::new()),
            files: RefCell::new(FileTable::new()),
        })
    }

    /// Lex, parse and evaluate a source string against the given scope.
    pub fn run(
        self: &Rc<Self>,
        file: &str,
        text: &str,
        scope: &Rc<Scope>,
        context: &Rc<Context>,
    ) -> VisitResult {
        let ast = parse_source(file, text)?;
        self.visit(&ast, scope, context)
    }

    pub fn visit(
        self: &Rc<Self>,
        node: &Node,
        scope: &Rc<Scope>,
        context: &Rc<Context>,
    ) -> VisitResult {
        match &node.kind {
            NodeKind::Number(n) => Ok(Flow::Value(Value::Number(*n))),
            NodeKind::Str(s) => Ok(Flow::Value(Value::Str(s.clone()))),
            NodeKind::FStr(raw) => self.visit_fstring(raw, &node.span, scope, context),
            NodeKind::List(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(value_of!(self.visit(element, scope, context)));
                }
                Ok(Flow::Value(Value::list(values)))
            }
            NodeKind::Dict(pairs) => {
                let mut map = IndexMap::new();
                for (key_node, value_node) in pairs {
                    let key_value = value_of!(self.visit(key_node, scope, context));
                    let Value::Str(key) = &key_value else {
                        return Err(Error::runtime(
                            key_node.span.clone(),
                            format!("Non-string key for dict: '{}'", key_value.repr()),
                            context,
                        ));
                    };
                    let value = value_of!(self.visit(value_node, scope, context));
                    map.insert(key.clone(), value);
                }
                Ok(Flow::Value(Value::dict(map)))
            }
            NodeKind::VarAccess(name) => match scope.get(name) {
                Some(value) => Ok(Flow::Value(value)),
                None => Err(Error::runtime(
                    node.span.clone(),
                    format!("'{name}' is not defined"),
                    context,
                )),
            },
            NodeKind::VarAssign {
                name,
                value,
                constant,
            } => {
                let value = value_of!(self.visit(value, scope, context));
                if scope.is_const(name) {
                    return Err(Error::runtime(
                        node.span.clone(),
                        format!("Assignment to constant variable '{name}'"),
                        context,
                    ));
                }
                if *constant {
                    scope.define_const(name.clone(), value.clone());
                } else {
                    scope.define(name.clone(), value.clone());
                }
                Ok(Flow::Value(value))
            }
            NodeKind::BinOp { op, left, right } => {
                let lhs = value_of!(self.visit(left, scope, context));
                let rhs = value_of!(self.visit(right, scope, context));
                let result = lhs.binary(*op, &rhs, &node.span, &right.span, context)?;
                Ok(Flow::Value(result))
            }
            NodeKind::UnaryOp { op, operand } => {
                let value = value_of!(self.visit(operand, scope, context));
                Ok(Flow::Value(value.unary(*op, &node.span, context)?))
            }
            NodeKind::If { cases, else_case } => {
                for (condition, body) in cases {
                    let condition = value_of!(self.visit(condition, scope, context));
                    if condition.is_true() {
                        value_of!(self.visit(body, scope, context));
                        return Ok(Flow::Value(Value::null()));
                    }
                }
                if let Some(body) = else_case {
                    value_of!(self.visit(body, scope, context));
                }
                Ok(Flow::Value(Value::null()))
            }
            NodeKind::For {
                var,
                start,
                end,
                step,
                body,
                discard_result,
            } => self.visit_for(
                var,
                start,
                end,
                step.as_deref(),
                body,
                *discard_result,
                scope,
                context,
            ),
            NodeKind::ForIn {
                var,
                iterable,
                body,
                discard_result,
            } => {
                let iterable = value_of!(self.visit(iterable, scope, context));
                let iterator = iterable.iterate(&node.span, context)?;
                let Value::Iter(state) = &iterator else {
                    return Err(Error::runtime(node.span.clone(), "Illegal operation", context));
                };
                let mut values = Vec::new();

                loop {
                    let item = state.borrow_mut().next();
                    let Some(item) = item else {
                        break;
                    };
                    scope.define(var.clone(), item);
                    match self.visit(body, scope, context)? {
                        Flow::Value(v) => values.push(v),
                        Flow::Continue => continue,
                        Flow::Break => break,
                        flow => return Ok(flow),
                    }
                }

                Ok(Flow::Value(if *discard_result {
                    Value::null()
                } else {
                    Value::list(values)
                }))
            }
            NodeKind::While {
                cond,
                body,
                discard_result,
            } => {
                let mut values = Vec::new();
                loop {
                    let condition = value_of!(self.visit(cond, scope, context));
                    if !condition.is_true() {
                        break;
                    }
                    match self.visit(body, scope, context)? {
                        Flow::Value(v) => values.push(v),
                        Flow::Continue => continue,
                        Flow::Break => break,
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Value(if *discard_result {
                    Value::null()
                } else {
                    Value::list(values)
                }))
            }
            NodeKind::FuncDef {
                name,
                params,
                body,
                auto_return,
            } => {
                let func = Value::Function(Rc::new(FuncData {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    auto_return: *auto_return,
                    scope: scope.clone(),
                    context: context.clone(),
                    span: node.span.clone(),
                }));
                if let Some(name) = name {
                    scope.define(name.clone(), func.clone());
                }
                Ok(Flow::Value(func))
            }
            NodeKind::Call { callee, args } => {
                let callee_value = value_of!(self.visit(callee, scope, context));
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(value_of!(self.visit(arg, scope, context)));
                }
                let result = self.call_value(&callee_value, arg_values, &node.span, context)?;
                Ok(Flow::Value(result))
            }
            NodeKind::Return(value) => {
                let value = match value {
                    Some(node) => value_of!(self.visit(node, scope, context)),
                    None => Value::null(),
                };
                Ok(Flow::Return(value))
            }
            NodeKind::Continue => Ok(Flow::Continue),
            NodeKind::Break => Ok(Flow::Break),
            NodeKind::Import(ImportPath::File(filename)) => {
                modules::import_file(self, filename, &node.span, scope, context)?;
                Ok(Flow::Value(Value::null()))
            }
            NodeKind::Import(ImportPath::Dotted(parts)) => {
                let module = modules::load_module(self, parts, &node.span, context)?;
                modules::attach_module(scope, parts, module);
                Ok(Flow::Value(Value::null()))
            }
            NodeKind::FromImport { path, names } => {
                let module = modules::load_module(self, path, &node.span, context)?;
                let Value::Module(module) = &module else {
                    return Err(Error::runtime(
                        node.span.clone(),
                        "Import did not produce a module",
                        context,
                    ));
                };
                for name in names {
                    match module.scope.get_local(name) {
                        Some(value) => scope.define(name.clone(), value),
                        None => {
                            return Err(Error::runtime(
                                node.span.clone(),
                                format!(
                                    "Module '{}' has no member named '{name}'",
                                    module.name
                                ),
                                context,
                            ))
                        }
                    }
                }
                Ok(Flow::Value(Value::null()))
            }
            NodeKind::Do(body) => {
                let child_scope = Scope::with_parent(scope.clone());
                let child_context =
                    Context::frame("<do block>", context, node.span.start.clone());
                match self.visit(body, &child_scope, &child_context)? {
                    // A return raised inside the block becomes its value.
                    Flow::Return(v) => Ok(Flow::Value(v)),
                    Flow::Value(_) => Ok(Flow::Value(Value::null())),
                    flow => Ok(flow),
                }
            }
            NodeKind::Try {
                body,
                bind,
                handler,
            } => match self.visit(body, scope, context) {
                Ok(Flow::Value(_)) => Ok(Flow::Value(Value::null())),
                Ok(flow) => Ok(flow),
                Err(handled) => {
                    scope.define(bind.clone(), Value::Str(handled.one_line()));
                    match self.visit(handler, scope, context) {
                        Ok(Flow::Value(_)) => Ok(Flow::Value(Value::null())),
                        Ok(flow) => Ok(flow),
                        Err(inner) => Err(Error::try_chain(inner, handled)),
                    }
                }
            },
            NodeKind::IndexGet { target, index } => {
                let target_value = value_of!(self.visit(target, scope, context));
                let index_value = value_of!(self.visit(index, scope, context));
                let result = target_value.get_index(&index_value, &index.span, context)?;
                Ok(Flow::Value(result))
            }
            NodeKind::IndexSet {
                target,
                index,
                value,
            } => {
                let target_value = value_of!(self.visit(target, scope, context));
                let index_value = value_of!(self.visit(index, scope, context));
                let new_value = value_of!(self.visit(value, scope, context));
                let result =
                    target_value.set_index(&index_value, new_value, &index.span, context)?;
                Ok(Flow::Value(result))
            }
            NodeKind::DotGet { target, field } => {
                let target_value = value_of!(self.visit(target, scope, context));
                Ok(Flow::Value(target_value.get_dot(
                    field,
                    &node.span,
                    context,
                )?))
            }
            NodeKind::DotSet {
                target,
                field,
                value,
            } => {
                let target_value = value_of!(self.visit(target, scope, context));
                let new_value = value_of!(self.visit(value, scope, context));
                Ok(Flow::Value(target_value.set_dot(
                    field,
                    new_value,
                    &node.span,
                    context,
                )?))
            }
            NodeKind::Switch {
                scrutinee,
                cases,
                else_case,
            } => {
                let scrutinee_value = value_of!(self.visit(scrutinee, scope, context));
                for (case, body) in cases {
                    let case_value = value_of!(self.visit(case, scope, context));
                    let matched = scrutinee_value.binary(
                        crate::ast::BinOp::Eq,
                        &case_value,
                        &case.span,
                        &case.span,
                        context,
                    )?;
                    if matched.is_true() {
                        value_of!(self.visit(body, scope, context));
                        return Ok(Flow::Value(Value::null()));
                    }
                }
                if let Some(body) = else_case {
                    value_of!(self.visit(body, scope, context));
                }
                Ok(Flow::Value(Value::null()))
            }
            NodeKind::Struct { name, fields } => {
                scope.declare_struct(name.clone(), fields.clone());
                Ok(Flow::Value(Value::null()))
            }
            NodeKind::StructCreate(name) => match scope.struct_fields(name) {
                Some(fields) => {
                    let mut map = IndexMap::new();
                    for field in fields {
                        map.insert(field, Value::null());
                    }
                    Ok(Flow::Value(Value::Struct(Rc::new(StructData {
                        name: name.clone(),
                        fields: RefCell::new(map),
                    }))))
                }
                None => Err(Error::runtime(
                    node.span.clone(),
                    format!("Struct '{name}' is not defined"),
                    context,
                )),
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_for(
        self: &Rc<Self>,
        var: &str,
        start: &Node,
        end: &Node,
        step: Option<&Node>,
        body: &Node,
        discard_result: bool,
        scope: &Rc<Scope>,
        context: &Rc<Context>,
    ) -> VisitResult {
        let start_value = value_of!(self.visit(start, scope, context));
        let end_value = value_of!(self.visit(end, scope, context));

        let Value::Number(start_num) = start_value else {
            return Err(Error::runtime(start.span.clone(), "Illegal operation", context));
        };
        let Value::Number(end_num) = end_value else {
            return Err(Error::runtime(end.span.clone(), "Illegal operation", context));
        };

        let step_num = match step {
            Some(step_node) => {
                let step_value = value_of!(self.visit(step_node, scope, context));
                let Value::Number(step_num) = step_value else {
                    return Err(Error::runtime(
                        step_node.span.clone(),
                        "Illegal operation",
                        context,
                    ));
                };
                if step_num == 0.0 {
                    return Err(Error::runtime(
                        step_node.span.clone(),
                        "Step cannot be 0",
                        context,
                    ));
                }
                step_num
            }
            None => 1.0,
        };

        let mut values = Vec::new();
        let mut i = start_num;
        loop {
            let in_range = if step_num > 0.0 {
                i < end_num
            } else {
                i > end_num
            };
            if !in_range {
                break;
            }

            scope.define(var.to_string(), Value::Number(i));
            i += step_num;

            match self.visit(body, scope, context)? {
                Flow::Value(v) => values.push(v),
                Flow::Continue => continue,
                Flow::Break => break,
                flow => return Ok(flow),
            }
        }

        Ok(Flow::Value(if discard_result {
            Value::null()
        } else {
            Value::list(values)
        }))
    }

    /// F-strings re-enter the lexer and parser for every `{ … }` hole and
    /// evaluate the inner expression in the current scope.
    fn visit_fstring(
        self: &Rc<Self>,
        raw: &str,
        span: &Span,
        scope: &Rc<Scope>,
        context: &Rc<Context>,
    ) -> VisitResult {
        let chars: Vec<char> = raw.chars().collect();
        let mut out = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '{' if chars.get(i + 1) == Some(&'{') => {
                    out.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    out.push('}');
                    i += 2;
                }
                '{' => {
                    let close = chars[i + 1..].iter().position(|&c| c == '}');
                    let Some(offset) = close else {
                        return Err(Error::runtime(
                            span.clone(),
                            "Unclosed '{' in f-string",
                            context,
                        ));
                    };
                    let inner: String = chars[i + 1..i + 1 + offset].iter().collect();
                    let inner = inner.trim();
                    if inner.is_empty() {
                        return Err(Error::runtime(
                            span.clone(),
                            "Empty expression in f-string",
                            context,
                        ));
                    }

                    let value = value_of!(self.eval_fstring_expr(inner, span, scope, context));
                    out.push_str(&value.to_string());
                    i += offset + 2;
                }
                c => {
                    out.push(c);
                    i += 1;
                }
            }
        }

        Ok(Flow::Value(Value::Str(out)))
    }

    fn eval_fstring_expr(
        self: &Rc<Self>,
        text: &str,
        span: &Span,
        scope: &Rc<Scope>,
        context: &Rc<Context>,
    ) -> VisitResult {
        let ast = parse_source("<fstring>", text)?;

        let expr = match &ast.kind {
            NodeKind::List(statements) if statements.len() == 1 => &statements[0],
            NodeKind::List(_) => {
                return Err(Error::runtime(
                    span.clone(),
                    "f-string expression must be a single expression",
                    context,
                ))
            }
            _ => &ast,
        };

        self.visit(expr, scope, context)
    }

    /// The calling convention shared by every callable value kind.
    pub fn call_value(
        self: &Rc<Self>,
        callee: &Value,
        args: Vec<Value>,
        span: &Span,
        context: &Rc<Context>,
    ) -> Result<Value, Error> {
        match callee {
            Value::Function(func) => self.call_function(func, args, span, context),
            Value::Builtin(def) => {
                let frame = Context::frame(def.name, context, span.start.clone());
                let args = builtins::bind_args(def, args, span, &frame)?;
                (def.func)(self, args, span, &frame)
            }
            Value::Host(hostfn) => {
                let host_args: Vec<host::HostValue> =
                    args.iter().map(|v| host::from_value(v, self)).collect();
                match (hostfn.func)(&host_args) {
                    Ok(result) => Ok(host::to_value(&result)),
                    Err(message) => Err(Error::runtime(
                        span.clone(),
                        format!("Host error in {}: {message}", hostfn.name),
                        context,
                    )),
                }
            }
            _ => Err(Error::runtime(span.clone(), "Illegal operation", context)),
        }
    }

    fn call_function(
        self: &Rc<Self>,
        func: &Rc<FuncData>,
        args: Vec<Value>,
        span: &Span,
        context: &Rc<Context>,
    ) -> Result<Value, Error> {
        let params: &Vec<Param> = &func.params;
        let required = params.iter().filter(|p| p.default.is_none()).count();

        if args.len() > params.len() {
            return Err(Error::runtime(
                span.clone(),
                format!(
                    "{} too many args passed into <function {}>",
                    args.len() - params.len(),
                    func.display_name()
                ),
                context,
            ));
        }
        if args.len() < required {
            return Err(Error::runtime(
                span.clone(),
                format!(
                    "{} too few args passed into <function {}>",
                    required - args.len(),
                    func.display_name()
                ),
                context,
            ));
        }

        let call_scope = Scope::with_parent(func.scope.clone());
        let frame = Context::frame(func.display_name(), context, span.start.clone());

        let mut args = args.into_iter();
        for param in params.iter() {
            let mut value = match args.next() {
                Some(value) => value,
                None => {
                    // Defaults are expressions, evaluated on every call in
                    // the frame being built.
                    let default = param.default.as_ref().ok_or_else(|| {
                        Error::runtime(
                            span.clone(),
                            format!(
                                "{} too few args passed into <function {}>",
                                required, func.display_name()
                            ),
                            context,
                        )
                    })?;
                    match self.visit(default, &call_scope, &frame)? {
                        Flow::Value(v) => v,
                        _ => Value::null(),
                    }
                }
            };

            if let Some(dynamic) = &param.dynamic {
                let dynamic_scope = Scope::with_parent(call_scope.clone());
                dynamic_scope.define("$", value);
                let dynamic_frame = Context::frame(
                    &format!(
                        "{} (dynamic argument '{}')",
                        func.display_name(),
                        param.name
                    ),
                    &frame,
                    dynamic.span.start.clone(),
                );
                value = match self.visit(dynamic, &dynamic_scope, &dynamic_frame)? {
                    Flow::Value(v) => v,
                    _ => Value::null(),
                };
            }

            call_scope.define(param.name.clone(), value);
        }

        match self.visit(&func.body, &call_scope, &frame)? {
            Flow::Value(v) => Ok(if func.auto_return { v } else { Value::null() }),
            Flow::Return(v) => Ok(v),
            Flow::Continue => Err(Error::runtime(
                span.clone(),
                "'continue' outside of a loop",
                &frame,
            )),
            Flow::Break => Err(Error::runtime(
                span.clone(),
                "'break' outside of a loop",
                &frame,
            )),
        }
    }
}
