//! Selector nodes: elements, combinators, attributes, and whole selectors.
//!
//! LESS selector work is textual: mixin lookup matches element values as
//! strings, and the extend engine compares elements one by one.  Nothing
//! here matches against a DOM.

use crate::context::Context;
use crate::error::Result;
use crate::node::{Node, NodeKind, Visibility};
use crate::output::{CssContext, Output};

/// The combinator preceding an element: empty (compound), descendant,
/// `>`, `+`, `~`, or `|`.
#[derive(Debug, Clone, PartialEq)]
pub struct Combinator {
    pub value: String,
}

impl Combinator {
    pub fn new(value: impl Into<String>) -> Combinator {
        Combinator {
            value: value.into(),
        }
    }

    pub fn descendant() -> Combinator {
        Combinator::new(" ")
    }

    pub fn none() -> Combinator {
        Combinator::new("")
    }

    pub fn gen_css(&self, ctx: &mut CssContext, out: &mut Output) {
        let no_space = matches!(self.value.as_str(), "" | " " | "|");
        if no_space {
            out.add(&self.value, None, None);
        } else if ctx.compress {
            out.add(&self.value, None, None);
        } else {
            out.add(&format!(" {} ", self.value), None, None);
        }
    }
}

/// One simple selector fragment, e.g. `.button`, `#id`, `:hover`, `&`.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub combinator: Combinator,
    pub value: String,

    /// The element text still contains `@{...}` interpolation; resolving it
    /// is the parser's job and such elements pass through untouched here.
    pub is_variable: bool,
}

impl Element {
    pub fn new(combinator: Combinator, value: impl Into<String>) -> Element {
        Element {
            combinator,
            value: value.into(),
            is_variable: false,
        }
    }

    pub fn is_parent_ref(&self) -> bool {
        self.value == "&"
    }

    pub fn gen_css(&self, ctx: &mut CssContext, out: &mut Output) {
        self.combinator.gen_css(ctx, out);
        out.add(&self.value, None, None);
    }
}

/// An attribute selector, `[key op value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub op: Option<String>,
    pub value: Option<Node>,
}

impl Attribute {
    pub fn gen_css(&self, ctx: &mut CssContext, out: &mut Output) {
        out.add("[", None, None);
        out.add(&self.key, None, None);
        if let (Some(op), Some(value)) = (&self.op, &self.value) {
            out.add(op, None, None);
            value.gen_css(ctx, out);
        }
        out.add("]", None, None);
    }
}

/// A full selector: elements, optional `:extend` list, optional guard.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub elements: Vec<Element>,

    /// Inline `:extend(...)` targets attached to this selector.
    pub extend_list: Vec<Node>,

    /// `when (...)` guard; dropped once evaluated.
    pub condition: Option<Node>,

    pub evald_condition: bool,

    /// Synthetic selector created for an at-rule body; never printed.
    pub media_empty: bool,

    pub visibility: Visibility,
}

impl Selector {
    pub fn new(elements: Vec<Element>) -> Selector {
        Selector {
            elements,
            extend_list: Vec::new(),
            condition: None,
            evald_condition: true,
            media_empty: false,
            visibility: Visibility::default(),
        }
    }

    pub fn with_condition(elements: Vec<Element>, condition: Node) -> Selector {
        let mut s = Selector::new(elements);
        s.condition = Some(condition);
        s.evald_condition = false;
        s
    }

    /// A single-class selector, mostly for tests and synthetic paths.
    pub fn from_value(value: &str) -> Selector {
        Selector::new(vec![Element::new(Combinator::none(), value)])
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let evaluated = self.eval_parts(ctx)?;
        Ok(Node::new(
            NodeKind::Selector(Box::new(evaluated)),
            node.index,
            node.file_info.clone(),
        ))
    }

    /// Evaluates the guard and extend targets, returning a derived selector
    /// with `evald_condition` resolved and the guard dropped.
    pub fn eval_parts(&self, ctx: &mut Context<'_>) -> Result<Selector> {
        let evald_condition = match &self.condition {
            Some(cond) => {
                let result = cond.eval(ctx)?;
                result.is_true_keyword()
            }
            None => self.evald_condition,
        };

        let mut extend_list = Vec::with_capacity(self.extend_list.len());
        for extend in &self.extend_list {
            extend_list.push(extend.eval(ctx)?);
        }

        Ok(Selector {
            elements: self.elements.clone(),
            extend_list,
            condition: None,
            evald_condition,
            media_empty: self.media_empty,
            visibility: self.visibility,
        })
    }

    /// Whether the selector is exactly `&`, i.e. a parent-selector wrapper
    /// whose rules fold into the enclosing ruleset.
    pub fn is_just_parent_selector(&self) -> bool {
        !self.media_empty
            && self.elements.len() == 1
            && self.elements[0].value == "&"
            && matches!(self.elements[0].combinator.value.as_str(), "" | " ")
    }

    pub fn has_parent_ref(&self) -> bool {
        self.elements.iter().any(Element::is_parent_ref)
    }

    /// Element values for mixin-path matching, `&` stripped.
    pub fn mixin_elements(&self) -> Vec<String> {
        self.elements
            .iter()
            .filter(|e| !e.is_parent_ref())
            .map(|e| e.value.clone())
            .collect()
    }

    /// How many leading elements of `call_selector` this selector matches.
    /// Zero means no match.
    pub fn match_prefix(&self, call_selector: &Selector) -> usize {
        let own = self.mixin_elements();
        let other = call_selector.mixin_elements();
        if other.is_empty() || own.len() < 1 {
            return 0;
        }
        // The callee's first element must equal the call path's first
        // element; deeper elements are matched by descending into rules.
        if own[0] == other[0] {
            1
        } else {
            0
        }
    }

    pub fn css_text(&self) -> String {
        let mut ctx = CssContext::default();
        let mut out = Output::new();
        self.gen_css(&mut ctx, &mut out);
        out.into_string().trim().to_string()
    }

    pub fn gen_css(&self, ctx: &mut CssContext, out: &mut Output) {
        for (i, element) in self.elements.iter().enumerate() {
            if i == 0 && matches!(element.combinator.value.as_str(), "" | " ") {
                out.add(&element.value, None, None);
            } else {
                element.gen_css(ctx, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_text_joins_elements() {
        let sel = Selector::new(vec![
            Element::new(Combinator::none(), ".a"),
            Element::new(Combinator::descendant(), ".b"),
            Element::new(Combinator::new(">"), ".c"),
        ]);
        assert_eq!(sel.css_text(), ".a .b > .c");
    }

    #[test]
    fn compress_tightens_combinators() {
        let sel = Selector::new(vec![
            Element::new(Combinator::none(), ".a"),
            Element::new(Combinator::new(">"), ".c"),
        ]);
        let mut ctx = CssContext {
            compress: true,
            ..CssContext::default()
        };
        let mut out = Output::new();
        sel.gen_css(&mut ctx, &mut out);
        assert_eq!(out.into_string(), ".a>.c");
    }

    #[test]
    fn parent_selector_detection() {
        let sel = Selector::from_value("&");
        assert!(sel.is_just_parent_selector());

        let sel = Selector::from_value(".a");
        assert!(!sel.is_just_parent_selector());
    }

    #[test]
    fn mixin_elements_skip_parent_refs() {
        let sel = Selector::new(vec![
            Element::new(Combinator::none(), "&"),
            Element::new(Combinator::none(), ".m"),
        ]);
        assert_eq!(sel.mixin_elements(), vec![".m".to_string()]);
    }
}
