// ABOUTME: End-to-end tests for module loading, caching and the .path file

use quill::env::Scope;
use quill::error::{Context, Error};
use quill::interp::{Flow, Interp};
use quill::modules;
use quill::value::Value;
use serial_test::serial;
use std::path::Path;
use std::rc::Rc;

fn interp_rooted(root: &Path) -> Rc<Interp> {
    Interp::new(vec![root.to_path_buf()], vec![])
}

fn eval_with(interp: &Rc<Interp>, source: &str) -> Result<Value, Error> {
    let scope = Scope::with_parent(interp.globals.clone());
    let context = Context::root("<program>");
    match interp.run("<test>", source, &scope, &context)? {
        Flow::Value(Value::List(items)) => {
            Ok(items.borrow().last().cloned().unwrap_or(Value::null()))
        }
        Flow::Value(value) => Ok(value),
        Flow::Return(value) => Ok(value),
        other => panic!("unexpected control flow at top level: {other:?}"),
    }
}

#[test]
fn test_dotted_import_attaches_namespace() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("geometry.ql"),
        "fun area(w, h) -> w * h\nunit = 1\n",
    )
    .unwrap();

    let interp = interp_rooted(dir.path());
    let result = eval_with(&interp, "import geometry\ngeometry.area(3, 4)").unwrap();
    assert!(matches!(result, Value::Number(n) if n == 12.0));
}

#[test]
fn test_nested_dotted_import() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("pkg/inner")).unwrap();
    std::fs::write(dir.path().join("pkg/inner/leaf.ql"), "marker = 42\n").unwrap();

    let interp = interp_rooted(dir.path());
    let result = eval_with(&interp, "import pkg.inner.leaf\npkg.inner.leaf.marker").unwrap();
    assert!(matches!(result, Value::Number(n) if n == 42.0));
}

#[test]
fn test_from_import_copies_names() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("shapes.ql"), "circle = 1\nsquare = 2\n").unwrap();

    let interp = interp_rooted(dir.path());
    let result = eval_with(&interp, "from shapes import circle, square\ncircle + square").unwrap();
    assert!(matches!(result, Value::Number(n) if n == 3.0));

    let err = eval_with(&interp, "from shapes import hexagon").unwrap_err();
    assert!(err.details.contains("has no member named 'hexagon'"));
}

#[test]
fn test_module_cache_shares_one_instance() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("state.ql"), "value = 1\n").unwrap();

    let interp = interp_rooted(dir.path());
    let source = r#"
        import state
        state.value = 99
        from state import value
        value
    "#;
    // The from-import reloads through the cache and must observe the write.
    let result = eval_with(&interp, source).unwrap();
    assert!(matches!(result, Value::Number(n) if n == 99.0));
}

#[test]
fn test_module_closures_see_member_writes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cfg.ql"),
        "limit = 10\nfun current_limit() -> limit\n",
    )
    .unwrap();

    let interp = interp_rooted(dir.path());
    let source = r#"
        import cfg
        cfg.limit = 25
        cfg.current_limit()
    "#;
    let result = eval_with(&interp, source).unwrap();
    assert!(matches!(result, Value::Number(n) if n == 25.0));
}

#[test]
fn test_legacy_string_import_runs_in_current_scope() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("inline.ql"), "imported_flag = 7\n").unwrap();

    let interp = interp_rooted(dir.path());
    let result = eval_with(&interp, "import \"inline.ql\"\nimported_flag").unwrap();
    assert!(matches!(result, Value::Number(n) if n == 7.0));
}

#[test]
fn test_missing_module_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let interp = interp_rooted(dir.path());
    let err = eval_with(&interp, "import ghost").unwrap_err();
    assert!(err.details.contains("Can't find module 'ghost'"));
    assert!(err
        .render()
        .contains("Check the module name and the path in the .path file."));
}

#[test]
fn test_native_math_module_import() {
    let dir = tempfile::tempdir().unwrap();
    let interp = interp_rooted(dir.path());
    let result = eval_with(&interp, "import math\nmath.sqrt(16) + math.pi - math_pi").unwrap();
    assert!(matches!(result, Value::Number(n) if n == 4.0));
}

#[test]
fn test_native_json_module_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let interp = interp_rooted(dir.path());
    let source = r#"
        import json
        d = json.parse("{\"n\": 2, \"xs\": [1, 2]}")
        json.stringify(d.xs)
    "#;
    let result = eval_with(&interp, source).unwrap();
    assert!(matches!(result, Value::Str(s) if s == "[1,2]"));
}

#[test]
fn test_native_time_module_exec() {
    let dir = tempfile::tempdir().unwrap();
    let interp = interp_rooted(dir.path());
    let source = r#"
        import time
        pair = time.time_exec(fun() -> 21 * 2)
        pair[0]
    "#;
    let result = eval_with(&interp, source).unwrap();
    assert!(matches!(result, Value::Number(n) if n == 42.0));
}

#[test]
#[serial]
fn test_path_file_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let paths = modules::load_import_paths().unwrap();
    let written = std::fs::read_to_string(modules::PATH_FILE).unwrap();

    std::env::set_current_dir(original).unwrap();

    assert_eq!(paths.len(), 2);
    assert!(written.contains("std"));
}

#[test]
#[serial]
fn test_path_file_blank_lines_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    std::fs::write(modules::PATH_FILE, "lib\n\n  \nvendor/modules\n").unwrap();
    let paths = modules::load_import_paths().unwrap();

    std::env::set_current_dir(original).unwrap();

    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0], std::path::PathBuf::from("lib"));
    assert_eq!(paths[1], std::path::PathBuf::from("vendor/modules"));
}
