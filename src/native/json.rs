// ABOUTME: Native json module: parse, stringify, pretty

use crate::host::{self, HostValue};
use std::rc::Rc;

fn text_arg(args: &[HostValue], what: &str) -> Result<String, String> {
    match args.first() {
        Some(HostValue::Str(s)) => Ok(s.clone()),
        _ => Err(format!("{what} expects a string")),
    }
}

pub fn exports() -> Vec<(&'static str, HostValue)> {
    vec![
        (
            "parse",
            HostValue::Fn(
                "parse".to_string(),
                Rc::new(|args| {
                    let text = text_arg(args, "parse")?;
                    let json: serde_json::Value =
                        serde_json::from_str(&text).map_err(|e| e.to_string())?;
                    Ok(host::from_json(&json))
                }),
            ),
        ),
        (
            "stringify",
            HostValue::Fn(
                "stringify".to_string(),
                Rc::new(|args| {
                    let value = args.first().ok_or("stringify expects a value")?;
                    let json = host::to_json(value)?;
                    serde_json::to_string(&json)
                        .map(HostValue::Str)
                        .map_err(|e| e.to_string())
                }),
            ),
        ),
        (
            "pretty",
            HostValue::Fn(
                "pretty".to_string(),
                Rc::new(|args| {
                    let value = args.first().ok_or("pretty expects a value")?;
                    let json = host::to_json(value)?;
                    serde_json::to_string_pretty(&json)
                        .map(HostValue::Str)
                        .map_err(|e| e.to_string())
                }),
            ),
        ),
    ]
}
