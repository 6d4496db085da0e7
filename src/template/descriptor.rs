//! Compiled template descriptor.
//!
//! A descriptor is the instruction program for one element root of a
//! template. It is built once by the compiler and shared (`Rc`) by every
//! instance of the template; the runtime executes it to create and patch
//! DOM.
//!
//! ```text
//!   static tree ──► prototype (built once, cloned per instance)
//!   state_ops   ──► slot array  [root, node, node, ...]
//!   prop_ops    ──► bindings applied to slot nodes
//!   child_ops   ──► dynamic children inserted relative to slot nodes
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// =============================================================================
// Flags
// =============================================================================

/// Packed sizes of the per-instance arrays plus the SVG bit.
///
/// ```text
/// bits 0..7   state slot count
/// bits 7..14  child slot count
/// bit  14     svg
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemplateFlags(u32);

impl TemplateFlags {
    const MASK: u32 = (1 << 7) - 1;
    const CHILD_SHIFT: u32 = 7;
    const SVG: u32 = 1 << 14;

    pub fn new(state_slots: usize, child_slots: usize, svg: bool) -> Self {
        let mut bits = (state_slots as u32 & Self::MASK)
            | ((child_slots as u32 & Self::MASK) << Self::CHILD_SHIFT);
        if svg {
            bits |= Self::SVG;
        }
        Self(bits)
    }

    pub fn state_slots(self) -> usize {
        (self.0 & Self::MASK) as usize
    }

    pub fn child_slots(self) -> usize {
        ((self.0 >> Self::CHILD_SHIFT) & Self::MASK) as usize
    }

    pub fn is_svg(self) -> bool {
        self.0 & Self::SVG != 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

// =============================================================================
// Opcodes
// =============================================================================

/// Binding instruction. `input` indexes the block's local inputs, `data`
/// the descriptor's name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PropOp {
    /// Following bindings apply to the node in `slot`.
    SetNode { slot: usize },
    ClassName { input: usize },
    TextContent { input: usize },
    Attribute { data: usize, input: usize },
    Property { data: usize, input: usize },
    /// Property diffed against the live DOM value instead of the previous
    /// input.
    DomProperty { data: usize, input: usize },
    Style { data: usize, input: usize },
    Event { data: usize, input: usize },
    Directive { input: usize },
}

/// DOM walk instruction executed after the root is created.
///
/// The walk starts at the root's first child and advances to the next
/// sibling after every op of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StateOp {
    /// Optionally save the current node, then run the next `enter` ops
    /// inside it.
    Visit { save: bool, enter: usize },
    /// The current node is a `<!>` separator: remove it and save the text
    /// node that follows.
    Remove,
}

/// Dynamic children instruction, executed right to left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChildOp {
    /// Insert following children into the node in this slot, at the end.
    SetParent(usize),
    /// Insert following children before the node in this slot.
    SetNext(usize),
    /// Mount the child expression with this local input index.
    Child(usize),
}

// =============================================================================
// Static parts
// =============================================================================

/// How the root element is instantiated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StaticSource {
    /// No static attributes and no static children: create the element.
    Element(String),
    /// Static markup, cloned from a prototype.
    Markup(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StaticElement {
    pub tag: String,
    /// Static attributes, with static style entries merged into `style`.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<StaticNode>,
    /// State slot holding this node, if any.
    pub slot: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StaticNode {
    Element(StaticElement),
    Text { value: String, slot: Option<usize> },
    /// `<!>` comment separating two text nodes around an expression.
    Separator,
    /// Child expression; local input index.
    Expr(usize),
}

// =============================================================================
// Descriptor
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Descriptor {
    pub flags: TemplateFlags,
    pub prop_ops: Vec<PropOp>,
    pub state_ops: Vec<StateOp>,
    pub child_ops: Vec<ChildOp>,
    /// Attribute, property, style and event names used by `prop_ops`.
    pub data: Vec<String>,
    pub source: StaticSource,
    pub root: StaticElement,
    /// Template-global expression index of every local input.
    pub exprs: Vec<usize>,
    /// Number of expressions of the whole template this block belongs to.
    pub arity: usize,
}

impl Descriptor {
    /// Descriptor for a bare element with no bindings.
    pub fn element(tag: &str, svg: bool) -> Self {
        Self {
            flags: TemplateFlags::new(1, 0, svg),
            prop_ops: Vec::new(),
            state_ops: Vec::new(),
            child_ops: Vec::new(),
            data: Vec::new(),
            source: StaticSource::Element(tag.to_string()),
            root: StaticElement {
                tag: tag.to_string(),
                attrs: Vec::new(),
                children: Vec::new(),
                slot: Some(0),
            },
            exprs: Vec::new(),
            arity: 0,
        }
    }

    pub fn state_slots(&self) -> usize {
        self.flags.state_slots()
    }

    pub fn child_slots(&self) -> usize {
        self.flags.child_slots()
    }

    pub fn is_svg(&self) -> bool {
        self.flags.is_svg()
    }

    pub fn input_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn tag(&self) -> &str {
        &self.root.tag
    }

    /// Position among the block's child slots of each local input that is
    /// a child expression.
    pub fn child_index(&self, input: usize) -> Option<usize> {
        self.child_ops
            .iter()
            .filter_map(|op| match op {
                ChildOp::Child(i) => Some(*i),
                _ => None,
            })
            .position(|i| i == input)
    }
}
