// ABOUTME: Native time module: now() and time_exec()

use crate::host::HostValue;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub fn exports() -> Vec<(&'static str, HostValue)> {
    vec![
        (
            "now",
            HostValue::Fn(
                "now".to_string(),
                Rc::new(|_args| Ok(HostValue::Float(now_seconds()))),
            ),
        ),
        (
            "time_exec",
            HostValue::Fn(
                "time_exec".to_string(),
                Rc::new(|args| {
                    let Some(HostValue::Fn(_, func)) = args.first() else {
                        return Err("time_exec expects a function".to_string());
                    };
                    let start = now_seconds();
                    let result = func(&[])?;
                    let elapsed = now_seconds() - start;
                    Ok(HostValue::Seq(vec![result, HostValue::Float(elapsed)]))
                }),
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_positive() {
        assert!(now_seconds() > 0.0);
    }

    #[test]
    fn test_time_exec_measures_a_call() {
        let exports = exports();
        let (_, time_exec) = exports
            .into_iter()
            .find(|(name, _)| *name == "time_exec")
            .unwrap();
        let HostValue::Fn(_, func) = time_exec else {
            panic!("expected function export");
        };

        let callee = HostValue::Fn("probe".to_string(), Rc::new(|_| Ok(HostValue::Int(5))));
        let result = func(&[callee]).unwrap();
        match result {
            HostValue::Seq(items) => {
                assert!(matches!(items[0], HostValue::Int(5)));
                assert!(matches!(items[1], HostValue::Float(t) if t >= 0.0));
            }
            _ => panic!("expected [result, elapsed]"),
        }
    }

    #[test]
    fn test_time_exec_requires_function() {
        let exports = exports();
        let (_, time_exec) = exports
            .into_iter()
            .find(|(name, _)| *name == "time_exec")
            .unwrap();
        let HostValue::Fn(_, func) = time_exec else {
            panic!("expected function export");
        };
        assert!(func(&[HostValue::Int(1)]).is_err());
    }
}
