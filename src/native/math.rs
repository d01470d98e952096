// ABOUTME: Native math module: constants and elementary functions

use crate::host::HostValue;
use std::rc::Rc;

fn unary(name: &'static str, f: fn(f64) -> f64) -> (&'static str, HostValue) {
    (
        name,
        HostValue::Fn(
            name.to_string(),
            Rc::new(move |args| {
                let x = match args.first() {
                    Some(HostValue::Int(i)) => *i as f64,
                    Some(HostValue::Float(x)) => *x,
                    _ => return Err(format!("{name} expects a number")),
                };
                Ok(HostValue::Float(f(x)))
            }),
        ),
    )
}

pub fn exports() -> Vec<(&'static str, HostValue)> {
    vec![
        ("pi", HostValue::Float(std::f64::consts::PI)),
        ("e", HostValue::Float(std::f64::consts::E)),
        ("tau", HostValue::Float(std::f64::consts::TAU)),
        unary("sqrt", f64::sqrt),
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        unary("abs", f64::abs),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arg: HostValue) -> f64 {
        let (_, export) = exports().into_iter().find(|(n, _)| *n == name).unwrap();
        let HostValue::Fn(_, func) = export else {
            panic!("expected function export");
        };
        match func(&[arg]).unwrap() {
            HostValue::Float(x) => x,
            other => panic!("expected float, got non-float {:?}", std::mem::discriminant(&other)),
        }
    }

    #[test]
    fn test_constants() {
        let (_, pi) = exports().into_iter().find(|(n, _)| *n == "pi").unwrap();
        assert!(matches!(pi, HostValue::Float(x) if x == std::f64::consts::PI));
    }

    #[test]
    fn test_functions() {
        assert_eq!(call("sqrt", HostValue::Int(9)), 3.0);
        assert_eq!(call("floor", HostValue::Float(2.7)), 2.0);
        assert_eq!(call("ceil", HostValue::Float(2.1)), 3.0);
        assert_eq!(call("abs", HostValue::Float(-4.5)), 4.5);
    }
}
