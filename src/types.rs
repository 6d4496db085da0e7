//! Core types shared by the template runtime and the reconciler.
//!
//! - [`Value`] - values bound into template holes
//! - [`Key`] - explicit keys for keyed lists
//! - [`Handler`] / [`Directive`] - callbacks compared by identity
//! - [`NodeRef`] - cell exposing the nearest DOM node of a `Ref` op
//! - [`Event`] - event record handed to listeners
//! - [`Cleanup`] - deferred teardown closure

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::dom::{Dom, NodeId};
use crate::vdom::Op;

/// Cleanup function returned by effects and registered on components.
pub type Cleanup = Box<dyn FnOnce()>;

// =============================================================================
// Events
// =============================================================================

/// Event record passed to listeners.
///
/// `current_target` changes while the event bubbles; `target` stays the node
/// the event was dispatched on.
#[derive(Debug)]
pub struct Event {
    pub kind: String,
    pub target: NodeId,
    pub current_target: Cell<NodeId>,
    stopped: Cell<bool>,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target,
            current_target: Cell::new(target),
            stopped: Cell::new(false),
        }
    }

    /// Stop bubbling after the current node's listeners ran.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }
}

/// Event listener. Two handlers are the same listener only if they share
/// the same allocation, so re-rendering with a cloned handler is a no-op.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn same(&self, other: &Handler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Element directive. Invoked with the element when it is mounted or when
/// the directive value changes; `hydrating` is true while adopting
/// pre-rendered DOM.
#[derive(Clone)]
pub struct Directive(Rc<dyn Fn(&mut dyn Dom, NodeId, bool)>);

impl Directive {
    pub fn new(f: impl Fn(&mut dyn Dom, NodeId, bool) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn apply(&self, dom: &mut dyn Dom, element: NodeId, hydrating: bool) {
        (self.0)(dom, element, hydrating)
    }

    pub fn same(&self, other: &Directive) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Directive({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

// =============================================================================
// Value
// =============================================================================

/// A value bound into a template hole.
///
/// Attribute-like bindings treat `Null` and `Bool(false)` as "absent" and
/// remove the attribute; `Str("")` and `Int(0)` are real values.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Handler(Handler),
    Directive(Directive),
    /// Child content for expression children.
    Node(Op),
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Null | Value::Bool(false))
    }

    /// Identity/shallow comparison used to decide whether a binding changed.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Handler(a), Value::Handler(b)) => a.same(b),
            (Value::Directive(a), Value::Directive(b)) => a.same(b),
            (Value::Node(a), Value::Node(b)) => a.same(b),
            _ => false,
        }
    }

    /// String written for attribute, class and style bindings.
    /// `None` means the binding is absent.
    pub fn attr_string(&self) -> Option<String> {
        match self {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(String::new()),
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(format_float(*v)),
            Value::Str(s) => Some(s.to_string()),
            Value::Handler(_) | Value::Directive(_) | Value::Node(_) => None,
        }
    }

    /// Text used for text content bindings and text children.
    pub fn text(&self) -> Option<String> {
        match self {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some("true".to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(format_float(*v)),
            Value::Str(s) => Some(s.to_string()),
            Value::Handler(_) | Value::Directive(_) | Value::Node(_) => None,
        }
    }

    /// Converts a child expression value into an op.
    pub fn to_op(&self) -> Op {
        match self {
            Value::Node(op) => op.clone(),
            Value::Str(s) => Op::Text(s.clone()),
            other => match other.text() {
                Some(text) => Op::Text(text.into()),
                None => Op::Hole,
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

fn format_float(v: f64) -> String {
    if v.is_infinite() {
        if v > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else {
        v.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Handler(h) => h.fmt(f),
            Value::Directive(d) => d.fmt(f),
            Value::Node(op) => write!(f, "Node({op:?})"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(v: Rc<str>) -> Self {
        Value::Str(v)
    }
}

impl From<Handler> for Value {
    fn from(v: Handler) -> Self {
        Value::Handler(v)
    }
}

impl From<Directive> for Value {
    fn from(v: Directive) -> Self {
        Value::Directive(v)
    }
}

impl From<Op> for Value {
    fn from(v: Op) -> Self {
        Value::Node(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Explicit key of a keyed list entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Bool(v) => write!(f, "{v}"),
            Key::Int(v) => write!(f, "{v}"),
            Key::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for Key {
    fn from(v: bool) -> Self {
        Key::Bool(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(v as i64)
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<u32> for Key {
    fn from(v: u32) -> Self {
        Key::Int(v as i64)
    }
}

impl From<u64> for Key {
    fn from(v: u64) -> Self {
        Key::Int(v as i64)
    }
}

impl From<usize> for Key {
    fn from(v: usize) -> Self {
        Key::Int(v as i64)
    }
}

impl From<char> for Key {
    fn from(v: char) -> Self {
        Key::Str(v.to_string().into())
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Str(v.into())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Str(v.into())
    }
}

impl From<Rc<str>> for Key {
    fn from(v: Rc<str>) -> Self {
        Key::Str(v)
    }
}

// =============================================================================
// Node refs
// =============================================================================

/// Shared cell that a `Ref` op fills with the nearest DOM node of its child.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<Cell<Option<NodeId>>>);

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<NodeId> {
        self.0.get()
    }

    pub(crate) fn set(&self, node: Option<NodeId>) {
        self.0.set(node);
    }

    pub fn same(&self, other: &NodeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.0.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_values_have_no_attribute_string() {
        assert_eq!(Value::Null.attr_string(), None);
        assert_eq!(Value::Bool(false).attr_string(), None);
        assert_eq!(Value::Bool(true).attr_string(), Some(String::new()));
        assert_eq!(Value::from("").attr_string(), Some(String::new()));
        assert_eq!(Value::Int(0).attr_string(), Some("0".to_string()));
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(Value::Float(1.0).text().as_deref(), Some("1"));
        assert_eq!(Value::Float(1.5).text().as_deref(), Some("1.5"));
        assert_eq!(Value::Float(f64::INFINITY).text().as_deref(), Some("Infinity"));
    }

    #[test]
    fn test_handlers_compare_by_identity() {
        let a = Handler::new(|_| {});
        let b = Handler::new(|_| {});
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::Handler(b.clone()), Value::Handler(Handler::new(|_| {})));
    }

    #[test]
    fn test_strings_compare_by_value() {
        assert!(Value::from("a").same(&Value::from(String::from("a"))));
        assert!(!Value::from("a").same(&Value::from("b")));
        assert!(!Value::Int(1).same(&Value::Float(1.0)));
    }

    #[test]
    fn test_value_to_op() {
        assert!(matches!(Value::Null.to_op(), Op::Hole));
        assert!(matches!(Value::Bool(false).to_op(), Op::Hole));
        assert!(matches!(Value::Int(3).to_op(), Op::Text(ref t) if &**t == "3"));
    }

    #[test]
    fn test_keys_of_different_types_differ() {
        assert_ne!(Key::from(1), Key::from("1"));
        assert_ne!(Key::from(true), Key::from(1));
        assert_eq!(Key::from('a'), Key::from("a"));
    }
}
