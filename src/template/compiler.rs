//! Template compiler - IR to descriptors.
//!
//! Every element root becomes one [`Descriptor`]. The passes, in order:
//!
//! ```text
//! validate     void children, duplicate bindings
//! shape        RTL: expression counts + next-sibling flags per node
//! slots        DFS LTR: which nodes the instance must remember
//! expr map     template-global index -> local input (props, then children)
//! static       prototype tree + markup, `<!>` between text around an expr
//! state ops    DOM walk that fills the slot array
//! prop ops     DFS LTR bindings
//! child ops    DFS RTL dynamic children
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use bitflags::bitflags;
use tracing::debug;

use super::descriptor::{
    ChildOp, Descriptor, PropOp, StateOp, StaticElement, StaticNode, StaticSource, TemplateFlags,
};
use super::ir::{is_void_element, Element, Node, Prop, PropKind, PropValue, TemplateIr};
use super::{Template, TemplateRoot};
use crate::error::CompileError;

pub const MAX_INPUTS: usize = 64;
pub const MAX_STATE_SLOTS: usize = 64;
pub const MAX_CHILD_SLOTS: usize = 64;

/// Compile parsed template IR.
pub fn compile(ir: &TemplateIr) -> Result<Template, CompileError> {
    let arity = count_exprs(&ir.roots);
    let roots = ir
        .roots
        .iter()
        .map(|node| match node {
            Node::Element(el) => {
                compile_block(el, ir.svg, arity).map(|d| TemplateRoot::Block(Rc::new(d)))
            }
            Node::Text(text) => Ok(TemplateRoot::Text(text.as_str().into())),
            Node::Expr(index) => Ok(TemplateRoot::Expr(*index)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Template::new(roots, arity, ir.svg))
}

fn count_exprs(nodes: &[Node]) -> usize {
    fn max_expr(nodes: &[Node], max: &mut Option<usize>) {
        for node in nodes {
            match node {
                Node::Expr(i) => *max = (*max).max(Some(*i)),
                Node::Element(el) => {
                    for prop in &el.props {
                        if let Some(i) = prop.value.expr() {
                            *max = (*max).max(Some(i));
                        }
                    }
                    max_expr(&el.children, max);
                }
                Node::Text(_) => {}
            }
        }
    }
    let mut max = None;
    max_expr(nodes, &mut max);
    max.map_or(0, |m| m + 1)
}

fn compile_block(root: &Element, svg: bool, arity: usize) -> Result<Descriptor, CompileError> {
    validate(root)?;

    let mut shape = Shape::element(root, ShapeFlags::empty());
    shape.slot = Some(0);
    let state_slots = assign_slots(&mut shape, 1);

    let exprs = ExprMap::new(root);
    if exprs.len() > MAX_INPUTS {
        return Err(CompileError::LimitExceeded {
            what: "expressions",
            limit: MAX_INPUTS,
        });
    }
    if state_slots > MAX_STATE_SLOTS {
        return Err(CompileError::LimitExceeded {
            what: "state slots",
            limit: MAX_STATE_SLOTS,
        });
    }

    let mut markup = String::new();
    let static_root = emit_static(&shape, &exprs, &mut markup);
    let bare = static_root.attrs.is_empty()
        && static_root
            .children
            .iter()
            .all(|c| matches!(c, StaticNode::Expr(_)));
    let source = if bare {
        StaticSource::Element(root.tag.clone())
    } else {
        StaticSource::Markup(markup)
    };

    let mut state_ops = Vec::new();
    emit_state_ops(&mut state_ops, &shape);

    let mut data = DataTable::default();
    let mut prop_ops = Vec::new();
    emit_prop_ops(&mut prop_ops, &shape, true, &mut data, &exprs);

    let mut child_ops = Vec::new();
    emit_child_ops(&mut child_ops, &shape, true, &exprs);
    let child_slots = child_ops
        .iter()
        .filter(|op| matches!(op, ChildOp::Child(_)))
        .count();
    if child_slots > MAX_CHILD_SLOTS {
        return Err(CompileError::LimitExceeded {
            what: "child slots",
            limit: MAX_CHILD_SLOTS,
        });
    }

    debug!(
        tag = %root.tag,
        inputs = exprs.len(),
        state_slots,
        child_slots,
        "compiled template block"
    );

    Ok(Descriptor {
        flags: TemplateFlags::new(state_slots, child_slots, svg),
        prop_ops,
        state_ops,
        child_ops,
        data: data.names,
        source,
        root: static_root,
        exprs: exprs.order,
        arity,
    })
}

// =============================================================================
// Validation
// =============================================================================

fn validate(el: &Element) -> Result<(), CompileError> {
    if is_void_element(&el.tag) && !el.children.is_empty() {
        return Err(CompileError::VoidElementChildren {
            tag: el.tag.clone(),
        });
    }

    let mut seen: Vec<(u8, &str)> = Vec::new();
    for prop in &el.props {
        let Some(key) = binding_key(prop) else {
            continue;
        };
        if seen.contains(&key) {
            return Err(CompileError::ConflictingBinding {
                tag: el.tag.clone(),
                name: prop.key.clone(),
            });
        }
        seen.push(key);
        if key == (1, "textContent") && !el.children.is_empty() {
            return Err(CompileError::ConflictingBinding {
                tag: el.tag.clone(),
                name: prop.key.clone(),
            });
        }
    }

    for child in &el.children {
        if let Node::Element(child) = child {
            validate(child)?;
        }
    }
    Ok(())
}

/// Namespace and name a binding writes to. Directives never conflict.
fn binding_key(prop: &Prop) -> Option<(u8, &str)> {
    let ns = match prop.kind {
        PropKind::Attribute => 0,
        PropKind::Value | PropKind::DomValue => 1,
        PropKind::Style => 2,
        PropKind::Event => 3,
        PropKind::Directive => return None,
    };
    Some((ns, prop.key.as_str()))
}

// =============================================================================
// Shape
// =============================================================================

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct ShapeFlags: u8 {
        /// Expressions somewhere in this subtree.
        const HAS_EXPRESSIONS      = 1 << 0;
        /// Expressions in the subtrees of following siblings.
        const HAS_NEXT_EXPRESSIONS = 1 << 1;
        /// A following sibling produces a DOM node.
        const HAS_NEXT_DOM_NODE    = 1 << 2;
    }
}

enum ShapeKind<'a> {
    Element(&'a Element),
    Text(&'a str),
    /// Template-global expression index.
    Expr(usize),
}

struct Shape<'a> {
    kind: ShapeKind<'a>,
    slot: Option<usize>,
    children: Vec<Shape<'a>>,
    prop_exprs: usize,
    child_exprs: usize,
    flags: ShapeFlags,
}

impl<'a> Shape<'a> {
    fn leaf(kind: ShapeKind<'a>, flags: ShapeFlags) -> Self {
        Self {
            kind,
            slot: None,
            children: Vec::new(),
            prop_exprs: 0,
            child_exprs: 0,
            flags,
        }
    }

    fn element(el: &'a Element, mut flags: ShapeFlags) -> Self {
        let prop_exprs = el.props.iter().filter(|p| p.is_dynamic()).count();

        let mut children = Vec::with_capacity(el.children.len());
        let mut siblings = ShapeFlags::empty();
        let mut child_exprs = 0;
        for child in el.children.iter().rev() {
            match child {
                Node::Element(child) => {
                    let shape = Shape::element(child, siblings);
                    if shape.flags.contains(ShapeFlags::HAS_EXPRESSIONS) {
                        flags |= ShapeFlags::HAS_EXPRESSIONS;
                        siblings |= ShapeFlags::HAS_NEXT_EXPRESSIONS;
                    }
                    siblings |= ShapeFlags::HAS_NEXT_DOM_NODE;
                    children.push(shape);
                }
                Node::Expr(index) => {
                    siblings |= ShapeFlags::HAS_NEXT_EXPRESSIONS;
                    child_exprs += 1;
                    children.push(Shape::leaf(ShapeKind::Expr(*index), siblings));
                }
                Node::Text(text) => {
                    children.push(Shape::leaf(ShapeKind::Text(text), siblings));
                    siblings |= ShapeFlags::HAS_NEXT_DOM_NODE;
                }
            }
        }
        children.reverse();

        if prop_exprs > 0 || child_exprs > 0 {
            flags |= ShapeFlags::HAS_EXPRESSIONS;
        }

        Self {
            kind: ShapeKind::Element(el),
            slot: None,
            children,
            prop_exprs,
            child_exprs,
            flags,
        }
    }

    fn has_next_expr_and_dom(&self) -> bool {
        self.flags
            .contains(ShapeFlags::HAS_NEXT_EXPRESSIONS | ShapeFlags::HAS_NEXT_DOM_NODE)
    }
}

/// Slots in DFS LTR order. An element is remembered when it follows an
/// expression or has bindings/child expressions; a text node when it
/// follows an expression. Returns the next free slot.
fn assign_slots(shape: &mut Shape<'_>, mut next: usize) -> usize {
    let mut prev_expr = false;
    for child in &mut shape.children {
        match child.kind {
            ShapeKind::Element(_) => {
                if prev_expr || child.prop_exprs > 0 || child.child_exprs > 0 {
                    child.slot = Some(next);
                    next += 1;
                }
                prev_expr = false;
                next = assign_slots(child, next);
            }
            ShapeKind::Text(_) => {
                if prev_expr {
                    child.slot = Some(next);
                    next += 1;
                }
                prev_expr = false;
            }
            ShapeKind::Expr(_) => prev_expr = true,
        }
    }
    next
}

// =============================================================================
// Expression map
// =============================================================================

/// Local input order: props before children, depth first.
struct ExprMap {
    order: Vec<usize>,
    local: HashMap<usize, usize>,
}

impl ExprMap {
    fn new(root: &Element) -> Self {
        let mut map = Self {
            order: Vec::new(),
            local: HashMap::new(),
        };
        map.collect(root);
        map
    }

    fn collect(&mut self, el: &Element) {
        for prop in &el.props {
            if let Some(index) = prop.value.expr() {
                self.insert(index);
            }
        }
        for child in &el.children {
            match child {
                Node::Element(child) => self.collect(child),
                Node::Expr(index) => self.insert(*index),
                Node::Text(_) => {}
            }
        }
    }

    fn insert(&mut self, global: usize) {
        if !self.local.contains_key(&global) {
            self.local.insert(global, self.order.len());
            self.order.push(global);
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn get(&self, global: usize) -> usize {
        self.local.get(&global).copied().unwrap_or_default()
    }
}

// =============================================================================
// Static template
// =============================================================================

fn emit_static(shape: &Shape<'_>, exprs: &ExprMap, out: &mut String) -> StaticElement {
    let ShapeKind::Element(el) = shape.kind else {
        unreachable!("static emission starts at an element");
    };

    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut style = String::new();
    for prop in &el.props {
        match (prop.kind, &prop.value) {
            (PropKind::Attribute, PropValue::Static(value)) if prop.key == "style" => {
                push_style(&mut style, value);
            }
            (PropKind::Attribute, PropValue::Static(value)) => {
                attrs.push((prop.key.clone(), value.clone()));
            }
            (PropKind::Attribute, PropValue::True) => {
                attrs.push((prop.key.clone(), String::new()));
            }
            (PropKind::Style, PropValue::Static(value)) => {
                push_style(&mut style, &format!("{}:{}", prop.key, value));
            }
            _ => {}
        }
    }
    if !style.is_empty() {
        attrs.push(("style".into(), style));
    }

    out.push('<');
    out.push_str(&el.tag);
    for (name, value) in &attrs {
        out.push(' ');
        out.push_str(name);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
    }
    out.push('>');

    let mut children = Vec::new();
    if !is_void_element(&el.tag) {
        let (mut prev_text, mut prev_expr) = (false, false);
        for child in &shape.children {
            match child.kind {
                ShapeKind::Element(_) => {
                    children.push(StaticNode::Element(emit_static(child, exprs, out)));
                    (prev_text, prev_expr) = (false, false);
                }
                ShapeKind::Text(value) => {
                    if prev_text && prev_expr {
                        out.push_str("<!>");
                        children.push(StaticNode::Separator);
                    }
                    (prev_text, prev_expr) = (true, false);
                    out.push_str(&escape_text(value));
                    children.push(StaticNode::Text {
                        value: value.to_string(),
                        slot: child.slot,
                    });
                }
                ShapeKind::Expr(index) => {
                    prev_expr = true;
                    children.push(StaticNode::Expr(exprs.get(index)));
                }
            }
        }
        out.push_str("</");
        out.push_str(&el.tag);
        out.push('>');
    }

    StaticElement {
        tag: el.tag.clone(),
        attrs,
        children,
        slot: shape.slot,
    }
}

fn push_style(style: &mut String, entry: &str) {
    if !style.is_empty() {
        style.push(';');
    }
    style.push_str(entry);
}

pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub(crate) fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

// =============================================================================
// State ops
// =============================================================================

fn emit_state_ops(ops: &mut Vec<StateOp>, shape: &Shape<'_>) {
    let (mut prev_text, mut prev_expr) = (false, false);
    for child in &shape.children {
        match child.kind {
            ShapeKind::Element(_) => {
                let save = prev_expr || child.child_exprs > 0 || child.prop_exprs > 0;
                let at = ops.len();
                ops.push(StateOp::Visit { save, enter: 0 });

                let mut enter = 0;
                if child.flags.contains(ShapeFlags::HAS_EXPRESSIONS) {
                    emit_state_ops(ops, child);
                    enter = ops.len() - (at + 1);
                    if enter > 0 {
                        ops[at] = StateOp::Visit { save, enter };
                    }
                }
                if !child.has_next_expr_and_dom() {
                    if !save && enter == 0 {
                        ops.pop();
                    }
                    break;
                }
                (prev_text, prev_expr) = (false, false);
            }
            ShapeKind::Text(_) => {
                if prev_text && prev_expr {
                    ops.push(StateOp::Remove);
                } else if prev_expr {
                    ops.push(StateOp::Visit {
                        save: true,
                        enter: 0,
                    });
                } else if !child.has_next_expr_and_dom() {
                    break;
                } else {
                    ops.push(StateOp::Visit {
                        save: false,
                        enter: 0,
                    });
                }
                (prev_text, prev_expr) = (true, false);
            }
            ShapeKind::Expr(_) => prev_expr = true,
        }
    }
}

// =============================================================================
// Prop ops
// =============================================================================

#[derive(Default)]
struct DataTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl DataTable {
    fn get(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), i);
        i
    }
}

fn emit_prop_ops(
    ops: &mut Vec<PropOp>,
    shape: &Shape<'_>,
    is_root: bool,
    data: &mut DataTable,
    exprs: &ExprMap,
) {
    let ShapeKind::Element(el) = shape.kind else {
        return;
    };
    if shape.prop_exprs > 0 {
        if !is_root {
            if let Some(slot) = shape.slot {
                ops.push(PropOp::SetNode { slot });
            }
        }
        for prop in &el.props {
            let Some(global) = prop.value.expr() else {
                continue;
            };
            let input = exprs.get(global);
            let key = prop.key.as_str();
            ops.push(match prop.kind {
                PropKind::Attribute if key == "class" => PropOp::ClassName { input },
                PropKind::Attribute => PropOp::Attribute {
                    data: data.get(key),
                    input,
                },
                PropKind::Value | PropKind::DomValue if key == "textContent" => {
                    PropOp::TextContent { input }
                }
                PropKind::Value => PropOp::Property {
                    data: data.get(key),
                    input,
                },
                PropKind::DomValue => PropOp::DomProperty {
                    data: data.get(key),
                    input,
                },
                PropKind::Style => PropOp::Style {
                    data: data.get(key),
                    input,
                },
                PropKind::Event => PropOp::Event {
                    data: data.get(key),
                    input,
                },
                PropKind::Directive => PropOp::Directive { input },
            });
        }
    }
    for child in &shape.children {
        emit_prop_ops(ops, child, false, data, exprs);
    }
}

// =============================================================================
// Child ops
// =============================================================================

fn emit_child_ops(ops: &mut Vec<ChildOp>, shape: &Shape<'_>, is_root: bool, exprs: &ExprMap) {
    if shape.child_exprs > 0 {
        if !is_root {
            if let Some(slot) = shape.slot {
                ops.push(ChildOp::SetParent(slot));
            }
        }
        let mut prev: Option<&Shape<'_>> = None;
        for child in shape.children.iter().rev() {
            if let ShapeKind::Expr(global) = child.kind {
                if let Some(next) = prev.filter(|p| !matches!(p.kind, ShapeKind::Expr(_))) {
                    if let Some(slot) = next.slot {
                        ops.push(ChildOp::SetNext(slot));
                    }
                }
                ops.push(ChildOp::Child(exprs.get(global)));
            }
            prev = Some(child);
        }
    }
    for child in shape.children.iter().rev() {
        if matches!(child.kind, ShapeKind::Element(_)) {
            emit_child_ops(ops, child, false, exprs);
        }
    }
}
