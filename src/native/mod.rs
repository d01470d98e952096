// ABOUTME: In-process native module registry (the host-native interop surface)

use crate::host::HostValue;

pub mod json;
pub mod math;
pub mod time;

/// Look a module name up in the registry. Each native module exposes an
/// `exports()` returning string-keyed host values, adapted through the host
/// bridge by the module loader. A source file in the search roots always
/// shadows a native module of the same name.
pub fn native_exports(name: &str) -> Option<Vec<(&'static str, HostValue)>> {
    match name {
        "time" => Some(time::exports()),
        "math" => Some(math::exports()),
        "json" => Some(json::exports()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names() {
        assert!(native_exports("time").is_some());
        assert!(native_exports("math").is_some());
        assert!(native_exports("json").is_some());
        assert!(native_exports("nope").is_none());
    }

    #[test]
    fn test_exports_are_string_keyed_and_nonempty() {
        for name in ["time", "math", "json"] {
            let exports = native_exports(name).unwrap();
            assert!(!exports.is_empty());
            for (key, _) in exports {
                assert!(!key.is_empty());
            }
        }
    }
}
