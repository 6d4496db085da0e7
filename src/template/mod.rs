//! Templates - parse, compile and instantiate interpolated UI markup.
//!
//! ```text
//! statics ──► markup::parse / indent::parse ──► TemplateIr
//!                                                  │
//!                                       compiler::compile
//!                                                  ▼
//!                     Template { roots: [Block(Descriptor) | Text | Expr] }
//!                                                  │
//!                                       Template::render(values)
//!                                                  ▼
//!                                                 Op
//! ```
//!
//! Compiling is the expensive part, so call sites keep a [`TemplateCache`]
//! and ask it for templates by their literal segments:
//!
//! ```ignore
//! let mut cache = TemplateCache::new();
//! let op = cache.html(&["<p class=", ">", "</p>"])?.render(vec![cls.into(), text.into()]);
//! ```

pub mod compiler;
pub mod descriptor;
pub mod indent;
pub mod ir;
pub mod markup;
pub mod scanner;

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

pub use descriptor::{
    ChildOp, Descriptor, PropOp, StateOp, StaticElement, StaticNode, StaticSource, TemplateFlags,
};
pub use ir::TemplateIr;

use crate::error::TemplateError;
use crate::types::Value;
use crate::vdom::Op;

/// Surface syntax of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syntax {
    /// `<div class=${}>...</div>`
    Markup,
    /// `div${} ...` with children on deeper-indented lines.
    Indent,
}

/// One root of a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateRoot {
    Block(Rc<Descriptor>),
    Text(Rc<str>),
    /// Template-global expression index.
    Expr(usize),
}

/// A compiled template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    roots: Vec<TemplateRoot>,
    arity: usize,
    svg: bool,
}

impl Template {
    pub(crate) fn new(roots: Vec<TemplateRoot>, arity: usize, svg: bool) -> Self {
        Self { roots, arity, svg }
    }

    pub fn roots(&self) -> &[TemplateRoot] {
        &self.roots
    }

    /// Number of values `render` expects.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_svg(&self) -> bool {
        self.svg
    }

    /// Build the op for one render of this template.
    ///
    /// All element roots share the value array; the reconciler rejects it
    /// with `RenderError::ValueCount` when its length is not the arity.
    pub fn render(&self, values: Vec<Value>) -> Op {
        let values: Rc<[Value]> = values.into();
        let mut ops: Vec<Op> = self
            .roots
            .iter()
            .map(|root| match root {
                TemplateRoot::Block(d) => Op::element_shared(d.clone(), values.clone()),
                TemplateRoot::Text(text) => Op::Text(text.clone()),
                TemplateRoot::Expr(i) => values.get(*i).map_or(Op::Hole, Value::to_op),
            })
            .collect();
        match ops.len() {
            0 => Op::Hole,
            1 => ops.pop().unwrap_or(Op::Hole),
            _ => Op::list(ops),
        }
    }
}

/// Parse and compile a template without caching.
pub fn compile(statics: &[&str], syntax: Syntax, svg: bool) -> Result<Template, TemplateError> {
    let ir = match syntax {
        Syntax::Markup => markup::parse(statics, svg)?,
        Syntax::Indent => indent::parse(statics, svg)?,
    };
    Ok(compiler::compile(&ir)?)
}

// =============================================================================
// Cache
// =============================================================================

type CacheKey = (Syntax, bool, Vec<String>);

/// Compiled templates by `(syntax, svg, statics)`.
///
/// Identical literal segments always map to the same `Rc<Template>`, so
/// every render of a call site reuses the same descriptors and with them
/// the renderer's clone prototypes.
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: HashMap<CacheKey, Rc<Template>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        statics: &[&str],
        syntax: Syntax,
        svg: bool,
    ) -> Result<Rc<Template>, TemplateError> {
        let key = (syntax, svg, statics.iter().map(|s| s.to_string()).collect());
        if let Some(template) = self.templates.get(&key) {
            return Ok(template.clone());
        }
        let template = Rc::new(compile(statics, syntax, svg)?);
        debug!(
            ?syntax,
            svg,
            roots = template.roots.len(),
            arity = template.arity,
            "template cached"
        );
        self.templates.insert(key, template.clone());
        Ok(template)
    }

    pub fn html(&mut self, statics: &[&str]) -> Result<Rc<Template>, TemplateError> {
        self.get(statics, Syntax::Markup, false)
    }

    pub fn svg(&mut self, statics: &[&str]) -> Result<Rc<Template>, TemplateError> {
        self.get(statics, Syntax::Markup, true)
    }

    pub fn htm(&mut self, statics: &[&str]) -> Result<Rc<Template>, TemplateError> {
        self.get(statics, Syntax::Indent, false)
    }

    pub fn htm_svg(&mut self, statics: &[&str]) -> Result<Rc<Template>, TemplateError> {
        self.get(statics, Syntax::Indent, true)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Markup template in the HTML namespace.
pub fn html(statics: &[&str]) -> Result<Template, TemplateError> {
    compile(statics, Syntax::Markup, false)
}

/// Markup template in the SVG namespace.
pub fn svg(statics: &[&str]) -> Result<Template, TemplateError> {
    compile(statics, Syntax::Markup, true)
}

/// Indentation template in the HTML namespace.
pub fn htm(statics: &[&str]) -> Result<Template, TemplateError> {
    compile(statics, Syntax::Indent, false)
}

/// Indentation template in the SVG namespace.
pub fn htm_svg(statics: &[&str]) -> Result<Template, TemplateError> {
    compile(statics, Syntax::Indent, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_returns_same_template_for_same_statics() {
        let mut cache = TemplateCache::new();
        let a = cache.html(&["<p>", "</p>"]).unwrap();
        let b = cache.html(&["<p>", "</p>"]).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        let c = cache.svg(&["<p>", "</p>"]).unwrap();
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_reports_parse_errors() {
        let mut cache = TemplateCache::new();
        let err = cache.html(&["<div"]).unwrap_err();
        assert!(matches!(err, TemplateError::Parse(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_render_single_element_root() {
        let template = html(&["<b>", "</b>"]).unwrap();
        let op = template.render(vec![Value::from("x")]);
        assert!(matches!(op, Op::Element(ref e) if e.values.len() == 1));
    }

    #[test]
    fn test_render_multiple_roots_is_a_list() {
        let template = html(&["<i></i> ", ""]).unwrap();
        let Op::List(ops) = template.render(vec![Value::Int(7)]) else {
            panic!("expected list");
        };
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[1], Op::Text(ref t) if &**t == " "));
        assert!(matches!(ops[2], Op::Text(ref t) if &**t == "7"));
    }

    #[test]
    fn test_indent_and_markup_compile_alike() {
        let a = htm(&["div.box\n  span =", ""]).unwrap();
        let b = html(&["<div class=\"box\"><span .textContent=", "></span></div>"]).unwrap();
        assert_eq!(a, b);
    }
}
