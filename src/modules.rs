// ABOUTME: Module resolution, caching, namespace attachment and the .path root list

use crate::env::Scope;
use crate::error::{Context, Error};
use crate::host;
use crate::interp::Interp;
use crate::lexer::Span;
use crate::native;
use crate::parser::parse_source;
use crate::value::{ModuleData, Value};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Source extension of the language.
pub const SOURCE_EXT: &str = "ql";
/// The working-directory file listing one filesystem root per line.
pub const PATH_FILE: &str = ".path";

/// Read the search roots from `.path`, creating it with the defaults
/// (`.` and `./std`) on first run. Blank lines are ignored.
pub fn load_import_paths() -> std::io::Result<Vec<PathBuf>> {
    let path = Path::new(PATH_FILE);
    if !path.is_file() {
        let defaults = vec![PathBuf::from("."), PathBuf::from("./std")];
        let contents: Vec<String> = defaults
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        std::fs::write(path, contents.join("\n"))?;
        return Ok(defaults);
    }

    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

fn module_name(parts: &[String]) -> String {
    parts.join(".")
}

fn find_module_file(roots: &[PathBuf], parts: &[String]) -> Option<PathBuf> {
    for root in roots {
        let mut candidate = root.clone();
        for part in parts {
            candidate.push(part);
        }
        candidate.set_extension(SOURCE_EXT);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Resolve a dotted path to its one canonical Module value: consult the
/// cache, then the filesystem roots (source modules), then the in-process
/// native registry.
pub fn load_module(
    interp: &Rc<Interp>,
    parts: &[String],
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let name = module_name(parts);
    if let Some(cached) = interp.module_cache.borrow().get(&name) {
        return Ok(cached.clone());
    }

    let module = if let Some(filepath) = find_module_file(&interp.import_paths, parts) {
        load_source_module(interp, &name, &filepath, span, context)?
    } else if let Some(exports) = native::native_exports(&name) {
        let scope = Scope::with_parent(interp.globals.clone());
        for (key, hv) in exports {
            scope.define(key, host::to_value(&hv));
        }
        Value::Module(Rc::new(ModuleData { name: name.clone(), scope }))
    } else {
        return Err(Error::runtime(
            span.clone(),
            format!("Can't find module '{name}'"),
            context,
        ));
    };

    interp
        .module_cache
        .borrow_mut()
        .insert(name, module.clone());
    Ok(module)
}

fn load_source_module(
    interp: &Rc<Interp>,
    name: &str,
    filepath: &Path,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let code = std::fs::read_to_string(filepath).map_err(|e| {
        Error::runtime(
            span.clone(),
            format!("Can't read module '{name}': {e}"),
            context,
        )
    })?;

    let file_label = filepath.to_string_lossy();
    let ast = parse_source(&file_label, &code)?;

    let module_scope = Scope::with_parent(interp.globals.clone());
    let module_context = Context::root(&format!("<module {name}>"));
    interp.visit(&ast, &module_scope, &module_context)?;

    Ok(Value::Module(Rc::new(ModuleData {
        name: name.to_string(),
        scope: module_scope,
    })))
}

/// Attach `module` under nested Module values for `a.b.c`, creating empty
/// shell modules for the intermediate parts as needed.
pub fn attach_module(scope: &Rc<Scope>, parts: &[String], module: Value) {
    if parts.len() == 1 {
        scope.define(parts[0].clone(), module);
        return;
    }

    let root = match scope.get(&parts[0]) {
        Some(Value::Module(existing)) => Value::Module(existing),
        _ => {
            let shell = Value::Module(Rc::new(ModuleData {
                name: parts[0].clone(),
                scope: Scope::new(),
            }));
            scope.define(parts[0].clone(), shell.clone());
            shell
        }
    };

    let mut current = root;
    for part in &parts[1..parts.len() - 1] {
        let Value::Module(current_module) = &current else {
            return;
        };
        let next = match current_module.scope.get_local(part) {
            Some(Value::Module(existing)) => Value::Module(existing),
            _ => {
                let shell = Value::Module(Rc::new(ModuleData {
                    name: part.clone(),
                    scope: Scope::new(),
                }));
                current_module.scope.define(part.clone(), shell.clone());
                shell
            }
        };
        current = next;
    }

    if let Value::Module(current_module) = &current {
        current_module
            .scope
            .define(parts[parts.len() - 1].clone(), module);
    }
}

/// Legacy `import "file.ql"`: locate the file under the same roots and
/// evaluate its statements directly in the importing scope.
pub fn import_file(
    interp: &Rc<Interp>,
    filename: &str,
    span: &Span,
    scope: &Rc<Scope>,
    context: &Rc<Context>,
) -> Result<(), Error> {
    let mut code = None;
    for root in &interp.import_paths {
        let candidate = root.join(filename);
        if let Ok(contents) = std::fs::read_to_string(&candidate) {
            code = Some((candidate, contents));
            break;
        }
    }

    let Some((filepath, code)) = code else {
        return Err(Error::runtime(
            span.clone(),
            format!(
                "Can't find file '{filename}' in '{PATH_FILE}'. Please add the directory your \
                 file is in to that file"
            ),
            context,
        ));
    };

    let file_label = filepath.to_string_lossy();
    let ast = parse_source(&file_label, &code)?;
    let frame = Context::frame("<program>", context, span.start.clone());
    interp.visit(&ast, scope, &frame)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp_with_root(root: &Path) -> Rc<Interp> {
        Interp::new(vec![root.to_path_buf()], vec![])
    }

    fn ctx() -> Rc<Context> {
        Context::root("<test>")
    }

    fn span() -> Span {
        Span::synthetic("<test>")
    }

    fn parts(path: &str) -> Vec<String> {
        path.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_load_source_module_binds_symbols() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("geometry.ql"), "two_pi = math_pi * 2\n").unwrap();

        let interp = interp_with_root(dir.path());
        let module = load_module(&interp, &parts("geometry"), &span(), &ctx()).unwrap();

        let value = module.get_dot("two_pi", &span(), &ctx()).unwrap();
        assert!(matches!(value, Value::Number(n) if n == std::f64::consts::TAU));
    }

    #[test]
    fn test_cache_returns_identical_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("counter.ql"), "n = 0\n").unwrap();

        let interp = interp_with_root(dir.path());
        let first = load_module(&interp, &parts("counter"), &span(), &ctx()).unwrap();
        let second = load_module(&interp, &parts("counter"), &span(), &ctx()).unwrap();

        // Mutations through one handle are visible through the other.
        first
            .set_dot("n", Value::Number(9.0), &span(), &ctx())
            .unwrap();
        let seen = second.get_dot("n", &span(), &ctx()).unwrap();
        assert!(matches!(seen, Value::Number(n) if n == 9.0));
    }

    #[test]
    fn test_nested_attachment_creates_shells() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/c.ql"), "leaf = 1\n").unwrap();

        let interp = interp_with_root(dir.path());
        let module = load_module(&interp, &parts("a.b.c"), &span(), &ctx()).unwrap();

        let scope = Scope::new();
        attach_module(&scope, &parts("a.b.c"), module);

        let a = scope.get("a").unwrap();
        let b = a.get_dot("b", &span(), &ctx()).unwrap();
        let c = b.get_dot("c", &span(), &ctx()).unwrap();
        let leaf = c.get_dot("leaf", &span(), &ctx()).unwrap();
        assert!(matches!(leaf, Value::Number(n) if n == 1.0));
    }

    #[test]
    fn test_missing_module_errors() {
        let dir = tempfile::tempdir().unwrap();
        let interp = interp_with_root(dir.path());
        let err = load_module(&interp, &parts("nowhere"), &span(), &ctx()).unwrap_err();
        assert!(err.details.contains("Can't find module 'nowhere'"));
    }

    #[test]
    fn test_native_module_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let interp = interp_with_root(dir.path());
        let module = load_module(&interp, &parts("math"), &span(), &ctx()).unwrap();
        let pi = module.get_dot("pi", &span(), &ctx()).unwrap();
        assert!(matches!(pi, Value::Number(n) if n == std::f64::consts::PI));
    }

    #[test]
    fn test_source_file_shadows_native_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("math.ql"), "pi = 3\n").unwrap();

        let interp = interp_with_root(dir.path());
        let module = load_module(&interp, &parts("math"), &span(), &ctx()).unwrap();
        let pi = module.get_dot("pi", &span(), &ctx()).unwrap();
        assert!(matches!(pi, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn test_import_file_evaluates_in_current_scope() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("defs.ql"), "shared = 11\n").unwrap();

        let interp = interp_with_root(dir.path());
        let scope = Scope::with_parent(interp.globals.clone());
        import_file(&interp, "defs.ql", &span(), &scope, &ctx()).unwrap();

        assert!(matches!(scope.get("shared"), Some(Value::Number(n)) if n == 11.0));
    }
}
