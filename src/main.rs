// ABOUTME: Command-line entry point: script runner, REPL, token and AST printers

use clap::Parser as ClapParser;
use quill::ast::{Node, NodeKind};
use quill::error::{Context, Error};
use quill::interp::{Flow, Interp};
use quill::lexer::{Lexer, TokenKind};
use quill::modules;
use quill::parser::parse_source;
use quill::value::{format_number, Value};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use std::process::exit;
use std::rc::Rc;

const HISTORY_FILE: &str = ".quill_history";

/// Interpreter for the Quill scripting language
#[derive(ClapParser, Debug)]
#[command(name = "quill")]
#[command(version)]
#[command(about = "A small dynamically-typed scripting language")]
struct CliArgs {
    /// Source code string or path to a script file (omit to start the REPL)
    #[arg(value_name = "SOURCE")]
    source: Option<String>,

    /// Print the token stream instead of running
    #[arg(long)]
    tokens: bool,

    /// Print the AST as a tree instead of running
    #[arg(long)]
    ast: bool,

    /// Arguments passed through to the script as argv
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

fn main() {
    let args = CliArgs::parse();

    let import_paths = match modules::load_import_paths() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Cannot read {}: {e}", modules::PATH_FILE);
            exit(1);
        }
    };

    let Some(source) = args.source else {
        repl(Interp::new(import_paths, vec![]));
        return;
    };

    let (text, filename) = read_source(&source);

    if args.tokens {
        exit(print_tokens(&text, &filename));
    }
    if args.ast {
        exit(print_ast(&text, &filename));
    }

    let mut argv = args.script_args;
    if argv.first().map(String::as_str) == Some("--") {
        argv.remove(0);
    }

    let interp = Interp::new(import_paths, argv);
    exit(run_program(&interp, &filename, &text));
}

/// A source argument is a file path when such a file exists, otherwise it
/// is taken as literal code.
fn read_source(source: &str) -> (String, String) {
    if Path::new(source).is_file() {
        match std::fs::read_to_string(source) {
            Ok(text) => return (text, source.to_string()),
            Err(e) => {
                eprintln!("Cannot read script file {source}: {e}");
                exit(1);
            }
        }
    }
    (source.to_string(), "<cmd>".to_string())
}

fn print_error(error: &Error) {
    eprintln!("{}", error.render());
}

fn run_program(interp: &Rc<Interp>, filename: &str, text: &str) -> i32 {
    let globals = interp.globals.clone();
    let context = Context::root("<program>");
    match interp.run(filename, text, &globals, &context) {
        Err(error) => {
            print_error(&error);
            1
        }
        Ok(Flow::Return(value)) => match value {
            // A top-level `return N` forces the process exit status.
            Value::Number(n) if n.fract() == 0.0 => n as i32,
            _ => {
                eprintln!("Runtime Error: Exit code must be an integer Number");
                1
            }
        },
        Ok(Flow::Continue) => {
            eprintln!("Runtime Error: 'continue' outside of a loop");
            1
        }
        Ok(Flow::Break) => {
            eprintln!("Runtime Error: 'break' outside of a loop");
            1
        }
        Ok(Flow::Value(_)) => 0,
    }
}

fn repl(interp: Rc<Interp>) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to initialize REPL: {e}");
            exit(1);
        }
    };
    let _ = rl.load_history(HISTORY_FILE);

    let globals = interp.globals.clone();
    let context = Context::root("<stdin>");

    loop {
        match rl.readline("quill > ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                match interp.run("<stdin>", &line, &globals, &context) {
                    Err(error) => print_error(&error),
                    Ok(Flow::Return(value)) => match value {
                        Value::Number(n) if n.fract() == 0.0 => {
                            let _ = rl.save_history(HISTORY_FILE);
                            exit(n as i32);
                        }
                        _ => eprintln!("Runtime Error: Exit code must be an integer Number"),
                    },
                    Ok(Flow::Continue) => eprintln!("Runtime Error: 'continue' outside of a loop"),
                    Ok(Flow::Break) => eprintln!("Runtime Error: 'break' outside of a loop"),
                    Ok(Flow::Value(value)) => {
                        let shown = unwrap_single_result(value);
                        println!("{}", shown.repr());
                        globals.define("_", shown);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
}

/// A one-statement program evaluates to a one-element list; show the
/// element itself.
fn unwrap_single_result(value: Value) -> Value {
    if let Value::List(items) = &value {
        let items = items.borrow();
        if items.len() == 1 {
            return items[0].clone();
        }
    }
    value
}

fn print_tokens(text: &str, filename: &str) -> i32 {
    match Lexer::new(filename, text).tokenize() {
        Ok(tokens) => {
            for token in tokens {
                if token.kind == TokenKind::Newline {
                    continue;
                }
                println!("{}", token.kind.label());
            }
            0
        }
        Err(error) => {
            print_error(&error);
            1
        }
    }
}

fn print_ast(text: &str, filename: &str) -> i32 {
    match parse_source(filename, text) {
        Ok(ast) => {
            let node = unwrap_single_statement(&ast);
            for line in build_tree_lines(node, "", true, true) {
                println!("{line}");
            }
            0
        }
        Err(error) => {
            print_error(&error);
            1
        }
    }
}

fn unwrap_single_statement(node: &Node) -> &Node {
    if let NodeKind::List(statements) = &node.kind {
        if statements.len() == 1 {
            return &statements[0];
        }
    }
    node
}

fn node_label(node: &Node) -> String {
    match &node.kind {
        NodeKind::Number(n) => format!("Number({})", format_number(*n)),
        NodeKind::Str(s) => format!("String({s})"),
        NodeKind::FStr(s) => format!("FString({s})"),
        NodeKind::List(_) => "List".to_string(),
        NodeKind::Dict(_) => "Dict".to_string(),
        NodeKind::VarAccess(name) => format!("VarAccess({name})"),
        NodeKind::VarAssign { name, constant, .. } => {
            if *constant {
                format!("VarAssign(const {name})")
            } else {
                format!("VarAssign({name})")
            }
        }
        NodeKind::BinOp { op, .. } => format!("BinaryOp({})", op.as_str()),
        NodeKind::UnaryOp { op, .. } => format!("UnaryOp({})", op.as_str()),
        NodeKind::If { .. } => "If".to_string(),
        NodeKind::For { .. } => "For".to_string(),
        NodeKind::ForIn { .. } => "ForIn".to_string(),
        NodeKind::While { .. } => "While".to_string(),
        NodeKind::FuncDef { .. } => "FuncDef".to_string(),
        NodeKind::Call { .. } => "Call".to_string(),
        NodeKind::Return(_) => "Return".to_string(),
        NodeKind::Continue => "Continue".to_string(),
        NodeKind::Break => "Break".to_string(),
        NodeKind::Import(_) => "Import".to_string(),
        NodeKind::FromImport { .. } => "FromImport".to_string(),
        NodeKind::Do(_) => "Do".to_string(),
        NodeKind::Try { .. } => "Try".to_string(),
        NodeKind::IndexGet { .. } => "IndexGet".to_string(),
        NodeKind::IndexSet { .. } => "IndexSet".to_string(),
        NodeKind::DotGet { field, .. } => format!("DotGet({field})"),
        NodeKind::DotSet { field, .. } => format!("DotSet({field})"),
        NodeKind::Switch { .. } => "Switch".to_string(),
        NodeKind::Struct { name, .. } => format!("Struct({name})"),
        NodeKind::StructCreate(name) => format!("StructCreation({name})"),
    }
}

fn node_children(node: &Node) -> Vec<&Node> {
    match &node.kind {
        NodeKind::BinOp { left, right, .. } => vec![left, right],
        NodeKind::UnaryOp { operand, .. } => vec![operand],
        NodeKind::List(elements) => elements.iter().collect(),
        NodeKind::Dict(pairs) => pairs.iter().flat_map(|(k, v)| [k, v]).collect(),
        NodeKind::VarAssign { value, .. } => vec![value],
        NodeKind::Call { callee, args } => {
            let mut children = vec![callee.as_ref()];
            children.extend(args.iter());
            children
        }
        NodeKind::FuncDef { body, .. } => vec![body],
        NodeKind::If { cases, else_case } => {
            let mut children = Vec::new();
            for (condition, body) in cases {
                children.push(condition);
                children.push(body);
            }
            if let Some(body) = else_case {
                children.push(body);
            }
            children
        }
        NodeKind::For {
            start,
            end,
            step,
            body,
            ..
        } => {
            let mut children = vec![start.as_ref(), end.as_ref()];
            if let Some(step) = step {
                children.push(step);
            }
            children.push(body);
            children
        }
        NodeKind::ForIn {
            iterable, body, ..
        } => vec![iterable, body],
        NodeKind::While { cond, body, .. } => vec![cond, body],
        NodeKind::Return(Some(value)) => vec![value],
        NodeKind::Do(body) => vec![body],
        NodeKind::Try { body, handler, .. } => vec![body, handler],
        NodeKind::IndexGet { target, index } => vec![target, index],
        NodeKind::IndexSet {
            target,
            index,
            value,
        } => vec![target, index, value],
        NodeKind::DotGet { target, .. } => vec![target],
        NodeKind::DotSet { target, value, .. } => vec![target, value],
        NodeKind::Switch {
            scrutinee,
            cases,
            else_case,
        } => {
            let mut children = vec![scrutinee.as_ref()];
            for (case, body) in cases {
                children.push(case);
                children.push(body);
            }
            if let Some(body) = else_case {
                children.push(body);
            }
            children
        }
        _ => vec![],
    }
}

fn build_tree_lines(node: &Node, prefix: &str, is_last: bool, is_root: bool) -> Vec<String> {
    let label = node_label(node);
    let mut lines = if is_root {
        vec![label]
    } else {
        let connector = if is_last { "└── " } else { "├── " };
        vec![format!("{prefix}{connector}{label}")]
    };

    let children = node_children(node);
    if children.is_empty() {
        return lines;
    }

    let child_prefix = if is_root {
        String::new()
    } else {
        format!("{prefix}{}", if is_last { "    " } else { "│   " })
    };
    for (idx, child) in children.iter().enumerate() {
        let last = idx == children.len() - 1;
        lines.extend(build_tree_lines(child, &child_prefix, last, false));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_source_literal_code() {
        let (text, filename) = read_source("1 + 2");
        assert_eq!(text, "1 + 2");
        assert_eq!(filename, "<cmd>");
    }

    #[test]
    fn test_unwrap_single_result() {
        let single = Value::list(vec![Value::Number(7.0)]);
        assert!(matches!(unwrap_single_result(single), Value::Number(n) if n == 7.0));

        let double = Value::list(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert!(matches!(unwrap_single_result(double), Value::List(_)));
    }

    #[test]
    fn test_tree_lines_shape() {
        let ast = parse_source("<test>", "1 + 2 * 3").unwrap();
        let node = unwrap_single_statement(&ast);
        let lines = build_tree_lines(node, "", true, true);
        assert_eq!(lines[0], "BinaryOp(+)");
        assert!(lines[1].contains("Number(1)"));
        assert!(lines[2].contains("BinaryOp(*)"));
        assert!(lines.iter().any(|l| l.contains("└── ")));
    }

    #[test]
    fn test_node_labels() {
        let ast = parse_source("<test>", "p.x = 3").unwrap();
        let node = unwrap_single_statement(&ast);
        assert_eq!(node_label(node), "DotSet(x)");
    }
}
