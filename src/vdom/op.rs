//! Op tree - immutable description of what the UI should look like.
//!
//! Ops are rebuilt on every render and are cheap to clone: every variant
//! that carries data holds it behind an `Rc`, so identity (`Op::same`)
//! is a pointer comparison and a reused op lets the reconciler skip the
//! whole subtree.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::component::FactoryInner;
use crate::error::RenderError;
use crate::template::Descriptor;
use crate::types::{Handler, Key, NodeRef, Value};

#[derive(Clone, Default)]
pub enum Op {
    /// Renders nothing.
    #[default]
    Hole,
    Text(Rc<str>),
    /// Template block instance.
    Element(Rc<ElementOp>),
    Component(Rc<ComponentOp>),
    Context(Rc<ContextOp>),
    /// Keyed list; every entry must be `Op::Keyed`.
    TrackByKey(Rc<[Op]>),
    /// Only valid as an entry of `TrackByKey`.
    Keyed(Rc<KeyedOp>),
    /// Positional fragment.
    List(Rc<[Op]>),
    Events(Rc<EventsOp>),
    Ref(Rc<RefOp>),
}

pub struct ElementOp {
    pub descriptor: Rc<Descriptor>,
    /// Template-global values; shared by all blocks of one template render.
    pub values: Rc<[Value]>,
}

pub struct ComponentOp {
    pub(crate) factory: Rc<FactoryInner>,
    pub(crate) props: Rc<dyn Any>,
}

pub struct ContextOp {
    pub(crate) id: usize,
    pub(crate) value: Rc<dyn Any>,
    pub child: Op,
}

pub struct KeyedOp {
    pub key: Key,
    pub child: Op,
}

pub struct EventsOp {
    pub events: Vec<(String, Handler)>,
    pub child: Op,
}

pub struct RefOp {
    pub node_ref: NodeRef,
    pub child: Op,
}

impl Op {
    pub fn text(text: impl Into<Rc<str>>) -> Op {
        Op::Text(text.into())
    }

    /// Instance of a descriptor built outside a template, e.g.
    /// `Descriptor::element`.
    pub fn element(descriptor: Rc<Descriptor>, values: Vec<Value>) -> Op {
        Op::element_shared(descriptor, values.into())
    }

    pub(crate) fn element_shared(descriptor: Rc<Descriptor>, values: Rc<[Value]>) -> Op {
        Op::Element(Rc::new(ElementOp { descriptor, values }))
    }

    pub fn list(ops: Vec<Op>) -> Op {
        Op::List(ops.into())
    }

    pub fn track_by_key(entries: Vec<Op>) -> Op {
        Op::TrackByKey(entries.into())
    }

    pub fn keyed(key: impl Into<Key>, child: Op) -> Op {
        Op::Keyed(Rc::new(KeyedOp {
            key: key.into(),
            child,
        }))
    }

    /// Keyed list from items, a key function and a render function.
    pub fn keyed_list<T, K: Into<Key>>(
        items: impl IntoIterator<Item = T>,
        key: impl Fn(&T) -> K,
        render: impl Fn(&T) -> Op,
    ) -> Op {
        Op::track_by_key(
            items
                .into_iter()
                .map(|item| Op::keyed(key(&item), render(&item)))
                .collect(),
        )
    }

    pub fn events(events: Vec<(&str, Handler)>, child: Op) -> Op {
        Op::Events(Rc::new(EventsOp {
            events: events.into_iter().map(|(k, h)| (k.to_string(), h)).collect(),
            child,
        }))
    }

    pub fn with_ref(node_ref: &NodeRef, child: Op) -> Op {
        Op::Ref(Rc::new(RefOp {
            node_ref: node_ref.clone(),
            child,
        }))
    }

    /// Same op value: pointer identity, or equal text.
    pub fn same(&self, other: &Op) -> bool {
        match (self, other) {
            (Op::Hole, Op::Hole) => true,
            (Op::Text(a), Op::Text(b)) => Rc::ptr_eq(a, b) || a == b,
            (Op::Element(a), Op::Element(b)) => Rc::ptr_eq(a, b),
            (Op::Component(a), Op::Component(b)) => Rc::ptr_eq(a, b),
            (Op::Context(a), Op::Context(b)) => Rc::ptr_eq(a, b),
            (Op::TrackByKey(a), Op::TrackByKey(b)) => Rc::ptr_eq(a, b),
            (Op::Keyed(a), Op::Keyed(b)) => Rc::ptr_eq(a, b),
            (Op::List(a), Op::List(b)) => Rc::ptr_eq(a, b),
            (Op::Events(a), Op::Events(b)) => Rc::ptr_eq(a, b),
            (Op::Ref(a), Op::Ref(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Op::Hole)
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            Op::Keyed(k) => Some(&k.key),
            _ => None,
        }
    }
}

/// Check a keyed list before touching the DOM: every entry keyed, keys
/// unique.
pub(crate) fn validate_keys(entries: &[Op]) -> Result<(), RenderError> {
    let mut seen = HashSet::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Some(key) = entry.key() else {
            return Err(RenderError::NotKeyed { index });
        };
        if !seen.insert(key) {
            return Err(RenderError::DuplicateKey { key: key.clone() });
        }
    }
    Ok(())
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Hole => write!(f, "Hole"),
            Op::Text(t) => write!(f, "Text({t:?})"),
            Op::Element(e) => f
                .debug_struct("Element")
                .field("tag", &e.descriptor.tag())
                .field("values", &e.values)
                .finish(),
            Op::Component(c) => write!(f, "Component({})", c.factory.name),
            Op::Context(c) => f
                .debug_struct("Context")
                .field("id", &c.id)
                .field("child", &c.child)
                .finish(),
            Op::TrackByKey(entries) => f.debug_tuple("TrackByKey").field(entries).finish(),
            Op::Keyed(k) => f
                .debug_struct("Keyed")
                .field("key", &k.key)
                .field("child", &k.child)
                .finish(),
            Op::List(ops) => f.debug_tuple("List").field(ops).finish(),
            Op::Events(e) => f
                .debug_struct("Events")
                .field("events", &e.events.iter().map(|(k, _)| k).collect::<Vec<_>>())
                .field("child", &e.child)
                .finish(),
            Op::Ref(r) => f.debug_struct("Ref").field("child", &r.child).finish(),
        }
    }
}

impl From<&str> for Op {
    fn from(text: &str) -> Self {
        Op::text(text)
    }
}

impl From<String> for Op {
    fn from(text: String) -> Self {
        Op::text(text)
    }
}
