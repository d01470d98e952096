// ABOUTME: File descriptor builtins (open, read, write, close), run and wait

use super::{expect_number, expect_string, param, param_with, BuiltinDef, DefaultVal};
use crate::env::Scope;
use crate::error::{Context, Error};
use crate::interp::Interp;
use crate::lexer::Span;
use crate::value::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::rc::Rc;

/// Script-visible descriptor table. Descriptors 0/1/2 are the standard
/// streams and never live in the table; script-opened files get ids from 3.
#[derive(Debug, Default)]
pub struct FileTable {
    next_fd: i64,
    open: HashMap<i64, File>,
}

impl FileTable {
    pub fn new() -> Self {
        FileTable {
            next_fd: 3,
            open: HashMap::new(),
        }
    }

    fn insert(&mut self, file: File) -> i64 {
        let fd = self.next_fd;
        self.next_fd += 1;
        self.open.insert(fd, file);
        fd
    }
}

static OPEN: BuiltinDef = BuiltinDef {
    name: "open",
    params: &[param("fn"), param_with("mode", DefaultVal::Str("r"))],
    func: builtin_open,
};

static READ: BuiltinDef = BuiltinDef {
    name: "read",
    params: &[param("fd"), param("bytes")],
    func: builtin_read,
};

static WRITE: BuiltinDef = BuiltinDef {
    name: "write",
    params: &[param("fd"), param("bytes")],
    func: builtin_write,
};

static CLOSE: BuiltinDef = BuiltinDef {
    name: "close",
    params: &[param("fd")],
    func: builtin_close,
};

static RUN: BuiltinDef = BuiltinDef {
    name: "run",
    params: &[param("fn")],
    func: builtin_run,
};

static WAIT: BuiltinDef = BuiltinDef {
    name: "wait",
    params: &[param("secs")],
    func: builtin_wait,
};

fn fd_of(value: &Value, span: &Span, context: &Rc<Context>) -> Result<i64, Error> {
    let n = expect_number(value, "First argument", span, context)?;
    if n.fract() != 0.0 {
        return Err(Error::runtime(
            span.clone(),
            format!("Invalid file descriptor: {n}"),
            context,
        ));
    }
    Ok(n as i64)
}

fn builtin_open(
    interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let path = expect_string(&args[0], "First argument", span, context)?;
    let mode = expect_string(&args[1], "Second argument", span, context)?;

    let opened = match mode.as_str() {
        "r" => File::open(&path),
        "w" => File::create(&path),
        "a" => OpenOptions::new().append(true).create(true).open(&path),
        other => {
            return Err(Error::runtime(
                span.clone(),
                format!("Invalid file open mode: '{other}'"),
                context,
            ))
        }
    };

    let file = opened.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::runtime(span.clone(), format!("Cannot find file '{path}'"), context)
        } else {
            Error::runtime(span.clone(), e.to_string(), context)
        }
    })?;

    let fd = interp.files.borrow_mut().insert(file);
    Ok(Value::Number(fd as f64))
}

fn builtin_read(
    interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let fd = fd_of(&args[0], span, context)?;
    let count = expect_number(&args[1], "Second argument", span, context)?.max(0.0) as usize;

    let mut buf = vec![0u8; count];
    let read = match fd {
        0 => std::io::stdin().read(&mut buf),
        1 | 2 => {
            return Err(Error::runtime(
                span.clone(),
                format!("Invalid file descriptor: {fd}"),
                context,
            ))
        }
        _ => match interp.files.borrow_mut().open.get_mut(&fd) {
            Some(file) => file.read(&mut buf),
            None => {
                return Err(Error::runtime(
                    span.clone(),
                    format!("Invalid file descriptor: {fd}"),
                    context,
                ))
            }
        },
    };

    let read = read.map_err(|e| Error::runtime(span.clone(), e.to_string(), context))?;
    Ok(Value::Str(
        String::from_utf8_lossy(&buf[..read]).into_owned(),
    ))
}

fn builtin_write(
    interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let fd = fd_of(&args[0], span, context)?;
    let text = expect_string(&args[1], "Second argument", span, context)?;
    let bytes = text.as_bytes();

    let written = match fd {
        1 => std::io::stdout().write(bytes),
        2 => std::io::stderr().write(bytes),
        0 => {
            return Err(Error::runtime(
                span.clone(),
                format!("Invalid file descriptor: {fd}"),
                context,
            ))
        }
        _ => match interp.files.borrow_mut().open.get_mut(&fd) {
            Some(file) => file.write(bytes),
            None => {
                return Err(Error::runtime(
                    span.clone(),
                    format!("Invalid file descriptor: {fd}"),
                    context,
                ))
            }
        },
    };

    let written = written.map_err(|e| Error::runtime(span.clone(), e.to_string(), context))?;
    Ok(Value::Number(written as f64))
}

fn builtin_close(
    interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let fd = fd_of(&args[0], span, context)?;

    if (0..=2).contains(&fd) {
        let name = ["stdin", "stdout", "stderr"][fd as usize];
        return Err(Error::runtime(
            span.clone(),
            format!("Cannot close {name}"),
            context,
        ));
    }

    match interp.files.borrow_mut().open.remove(&fd) {
        Some(_) => Ok(Value::null()),
        None => Err(Error::runtime(
            span.clone(),
            format!("Invalid file descriptor '{fd}'"),
            context,
        )),
    }
}

/// Deprecated script loader kept for old programs; `import` supersedes it.
fn builtin_run(
    interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let path = expect_string(&args[0], "First argument", span, context)?;
    println!("WARNING: run() is deprecated. Use 'import' instead");

    let code = std::fs::read_to_string(&path).map_err(|e| {
        Error::runtime(
            span.clone(),
            format!("Failed to load script \"{path}\"\n{e}"),
            context,
        )
    })?;

    let program_context = Context::root("<program>");
    interp
        .run(&path, &code, &interp.globals.clone(), &program_context)
        .map_err(|e| {
            Error::runtime(
                span.clone(),
                format!(
                    "Failed to finish executing script \"{path}\"\n{}",
                    e.render()
                ),
                context,
            )
        })?;

    Ok(Value::null())
}

fn builtin_wait(
    _interp: &Rc<Interp>,
    args: Vec<Value>,
    span: &Span,
    context: &Rc<Context>,
) -> Result<Value, Error> {
    let secs = expect_number(&args[0], "First argument", span, context)?;
    if secs > 0.0 {
        std::thread::sleep(std::time::Duration::from_secs_f64(secs));
    }
    Ok(Value::null())
}

pub fn register(scope: &Rc<Scope>) {
    scope.define("open", Value::Builtin(&OPEN));
    scope.define("read", Value::Builtin(&READ));
    scope.define("write", Value::Builtin(&WRITE));
    scope.define("close", Value::Builtin(&CLOSE));
    scope.define("run", Value::Builtin(&RUN));
    scope.define("wait", Value::Builtin(&WAIT));
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

    #[test]
    fn test_open_read_close_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello file").unwrap();

        let interp = interp();
        let fd = builtin_open(
            &interp,
            vec![
                Value::Str(path.to_string_lossy().into_owned()),
                Value::Str("r".into()),
            ],
            &span(),
            &ctx(),
        )
        .unwrap();
        assert!(matches!(fd, Value::Number(n) if n >= 3.0));

        let text = builtin_read(
            &interp,
            vec![fd.clone(), Value::Number(5.0)],
            &span(),
            &ctx(),
        )
        .unwrap();
        assert!(matches!(text, Value::Str(s) if s == "hello"));

        builtin_close(&interp, vec![fd.clone()], &span(), &ctx()).unwrap();
        assert!(builtin_close(&interp, vec![fd], &span(), &ctx()).is_err());
    }

    #[test]
    fn test_write_mode_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let interp = interp();
        let fd = builtin_open(
            &interp,
            vec![
                Value::Str(path.to_string_lossy().into_owned()),
                Value::Str("w".into()),
            ],
            &span(),
            &ctx(),
        )
        .unwrap();

        let written = builtin_write(
            &interp,
            vec![fd.clone(), Value::Str("data".into())],
            &span(),
            &ctx(),
        )
        .unwrap();
        assert!(matches!(written, Value::Number(n) if n == 4.0));

        builtin_close(&interp, vec![fd], &span(), &ctx()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "data");
    }

    #[test]
    fn test_std_streams_cannot_be_closed() {
        let interp = interp();
        for fd in 0..3 {
            let err = builtin_close(&interp, vec![Value::Number(fd as f64)], &span(), &ctx())
                .unwrap_err();
            assert!(err.details.starts_with("Cannot close std"));
        }
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let err = builtin_open(
            &interp(),
            vec![Value::Str("x".into()), Value::Str("rw+".into())],
            &span(),
            &ctx(),
        )
        .unwrap_err();
        assert!(err.details.contains("Invalid file open mode"));
    }

    #[test]
    fn test_missing_file_reported() {
        let err = builtin_open(
            &interp(),
            vec![Value::Str("/definitely/not/here".into()), Value::Str("r".into())],
            &span(),
            &ctx(),
        )
        .unwrap_err();
        assert!(err.details.contains("Cannot find file"));
    }
}
