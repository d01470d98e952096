// ABOUTME: Lexical scope chain carrying bindings, constants and struct declarations

use crate::value::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// One frame in the lexical chain. Lookup walks the parent chain; assignment
/// always writes in this frame. Constants, once bound anywhere in the chain,
/// reject reassignment from every descendant frame.
#[derive(Debug)]
pub struct Scope {
    bindings: RefCell<HashMap<String, Value>>,
    consts: RefCell<HashSet<String>>,
    structs: RefCell<HashMap<String, Vec<String>>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn new() -> Rc<Self> {
        Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            consts: RefCell::new(HashSet::new()),
            structs: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn with_parent(parent: Rc<Scope>) -> Rc<Self> {
        Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            consts: RefCell::new(HashSet::new()),
            structs: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Looks a name up in this frame and then the parent chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Looks a name up in this frame only.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.bindings.borrow().get(name).cloned()
    }

    /// Binds in this frame, shadowing any outer binding of the same name.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Binds in this frame and marks the name constant.
    pub fn define_const(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.consts.borrow_mut().insert(name.clone());
        self.bindings.borrow_mut().insert(name, value);
    }

    /// True if the name is bound as a constant anywhere in the chain.
    pub fn is_const(&self, name: &str) -> bool {
        if self.consts.borrow().contains(name) {
            return true;
        }
        self.parent.as_ref().is_some_and(|p| p.is_const(name))
    }

    pub fn declare_struct(&self, name: impl Into<String>, fields: Vec<String>) {
        self.structs.borrow_mut().insert(name.into(), fields);
    }

    /// Struct declarations resolve through the chain like names do.
    pub fn struct_fields(&self, name: &str) -> Option<Vec<String>> {
        if let Some(fields) = self.structs.borrow().get(name) {
            return Some(fields.clone());
        }
        self.parent.as_ref().and_then(|p| p.struct_fields(name))
    }

    /// The names bound in this frame, for module symbol listings.
    pub fn local_names(&self) -> Vec<String> {
        self.bindings.borrow().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let scope = Scope::new();
        scope.define("x", Value::Number(42.0));
        assert!(matches!(scope.get("x"), Some(Value::Number(n)) if n == 42.0));
    }

    #[test]
    fn test_missing_name() {
        let scope = Scope::new();
        assert!(scope.get("missing").is_none());
    }

    #[test]
    fn test_shadowing() {
        let parent = Scope::new();
        parent.define("x", Value::Number(1.0));
        let child = Scope::with_parent(parent.clone());
        child.define("x", Value::Number(2.0));

        assert!(matches!(child.get("x"), Some(Value::Number(n)) if n == 2.0));
        assert!(matches!(parent.get("x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn test_parent_lookup_through_levels() {
        let grandparent = Scope::new();
        grandparent.define("a", Value::Number(1.0));
        let parent = Scope::with_parent(grandparent);
        parent.define("b", Value::Number(2.0));
        let child = Scope::with_parent(parent);

        assert!(child.get("a").is_some());
        assert!(child.get("b").is_some());
    }

    #[test]
    fn test_const_visible_down_the_chain() {
        let parent = Scope::new();
        parent.define_const("K", Value::Number(9.0));
        let child = Scope::with_parent(parent);

        assert!(child.is_const("K"));
        assert!(matches!(child.get("K"), Some(Value::Number(n)) if n == 9.0));
    }

    #[test]
    fn test_struct_fields_resolve_through_chain() {
        let parent = Scope::new();
        parent.declare_struct("P", vec!["x".to_string(), "y".to_string()]);
        let child = Scope::with_parent(parent);

        assert_eq!(
            child.struct_fields("P"),
            Some(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(child.struct_fields("Q"), None);
    }
}
