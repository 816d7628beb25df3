//! The AST node model.
//!
//! A LESS stylesheet is a tree of [`Node`]s.  Each node couples a closed
//! [`NodeKind`] union with the metadata every node carries: the byte offset
//! it came from, the file it came from, and its visibility state (used by
//! `@import (reference)`).
//!
//! Every node kind supports three operations:
//!
//! * [`Node::eval`] — reduce the node in an evaluation [`Context`], producing
//!   a new node.  Nodes that need no evaluation return themselves.
//! * [`Node::gen_css`] — serialize the node into an [`Output`] sink.
//! * [`Node::visit_children`] — shallow, in-place traversal of child nodes,
//!   for visitors that do not special-case node kinds.
//!
//! The tree is plain owned data; evaluation never mutates its input.  The
//! only shared structures are the scope frames captured by mixin definitions
//! and detached rulesets, which are reference-counted (see [`crate::context`]).

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::atrule::{AtRule, Container, Media};
use crate::color::Color;
use crate::context::Context;
use crate::declaration::Declaration;
use crate::dimension::Dimension;
use crate::error::Result;
use crate::expression::{Condition, Expression, Operation, ValueList};
use crate::extend::Extend;
use crate::functions::Call;
use crate::import::Import;
use crate::mixin::{MixinCall, MixinDefinition};
use crate::output::{CssContext, Output};
use crate::ruleset::{DetachedRuleset, Ruleset};
use crate::selector::{Attribute, Combinator, Element, Selector};
use crate::value::{Anonymous, JavaScript, Keyword, Quoted, UnicodeDescriptor, Url};
use crate::variable::{NamespaceValue, Property, Variable, VariableCall};

/// Which file a node came from, plus the flags that travel with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileInfo {
    pub filename: String,

    /// Prefix for rewritten relative URLs in this file.
    pub root_path: String,

    /// The file was pulled in through `@import (reference)`.
    pub reference: bool,
}

impl FileInfo {
    pub fn named(filename: impl Into<String>) -> FileInfo {
        FileInfo {
            filename: filename.into(),
            ..FileInfo::default()
        }
    }
}

/// Visibility state of a node.
///
/// A node with `blocks > 0` is hidden from the output unless an explicit
/// `Some(true)` override re-exposes it.  Reference imports add a block to
/// everything they inline; processing `:extend` can re-expose individual
/// selectors.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Visibility {
    blocks: u32,
    node_visible: Option<bool>,
}

impl Visibility {
    pub fn add_block(&mut self) {
        self.blocks += 1;
    }

    pub fn remove_block(&mut self) {
        self.blocks = self.blocks.saturating_sub(1);
    }

    pub fn blocks_visibility(&self) -> bool {
        self.blocks > 0
    }

    pub fn ensure_visibility(&mut self) {
        self.node_visible = Some(true);
    }

    pub fn ensure_invisibility(&mut self) {
        self.node_visible = Some(false);
    }

    pub fn node_visible(&self) -> Option<bool> {
        self.node_visible
    }

    /// Whether the node should reach the output.
    pub fn is_visible(&self) -> bool {
        match self.node_visible {
            Some(v) => v,
            None => self.blocks == 0,
        }
    }

    /// Copying visibility is an explicit operation; it never happens as a
    /// side effect of cloning a node into a new tree position.
    pub fn copy_from(&mut self, other: &Visibility) {
        self.blocks = other.blocks;
        self.node_visible = other.node_visible;
    }
}

/// One node of the stylesheet tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,

    /// Byte offset in the originating source.
    pub index: usize,

    pub file_info: Rc<FileInfo>,

    pub visibility: Visibility,
}

/// The closed union of node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Terminals / values.
    Dimension(Dimension),
    Color(Color),
    Quoted(Quoted),
    Keyword(Keyword),
    Anonymous(Anonymous),
    UnicodeDescriptor(UnicodeDescriptor),
    JavaScript(JavaScript),
    Url(Box<Url>),

    // Composites.
    Expression(Expression),
    Value(ValueList),
    Operation(Box<Operation>),
    Negative(Box<Node>),
    Paren(Box<Node>),
    Comment(Comment),
    Condition(Box<Condition>),
    Call(Box<Call>),

    // References.
    Variable(Variable),
    Property(Property),
    VariableCall(VariableCall),
    NamespaceValue(Box<NamespaceValue>),

    // Selectors.
    Element(Element),
    Selector(Box<Selector>),
    Attribute(Box<Attribute>),
    Combinator(Combinator),

    // Declarations and rulesets.
    Declaration(Box<Declaration>),
    Ruleset(Box<Ruleset>),
    MixinCall(Box<MixinCall>),
    MixinDefinition(Rc<MixinDefinition>),
    DetachedRuleset(DetachedRuleset),
    Extend(Box<Extend>),

    // At-rules.
    AtRule(Box<AtRule>),
    Media(Box<Media>),
    Container(Box<Container>),
    Import(Box<Import>),
}

/// A comment.  Line comments never reach the output; block comments do
/// unless compression silences them.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub is_line_comment: bool,
}

impl Node {
    pub fn new(kind: NodeKind, index: usize, file_info: Rc<FileInfo>) -> Node {
        Node {
            kind,
            index,
            file_info,
            visibility: Visibility::default(),
        }
    }

    /// A node with empty metadata; used by builtins and tests.
    pub fn from_kind(kind: NodeKind) -> Node {
        Node::new(kind, 0, Rc::new(FileInfo::default()))
    }

    /// The same kind at another node's source position.
    pub fn with_meta_of(mut self, other: &Node) -> Node {
        self.index = other.index;
        self.file_info = Rc::clone(&other.file_info);
        self
    }

    pub fn keyword(value: impl Into<String>) -> Node {
        Node::from_kind(NodeKind::Keyword(Keyword::new(value)))
    }

    pub fn anonymous(value: impl Into<String>) -> Node {
        Node::from_kind(NodeKind::Anonymous(Anonymous::new(value)))
    }

    pub fn dimension(value: f64, unit: &str) -> Node {
        Node::from_kind(NodeKind::Dimension(Dimension::with_unit(value, unit)))
    }

    pub fn number(value: f64) -> Node {
        Node::from_kind(NodeKind::Dimension(Dimension::new(value)))
    }

    pub fn color(rgb: [f64; 3], alpha: f64) -> Node {
        Node::from_kind(NodeKind::Color(Color::new(rgb, alpha)))
    }

    pub fn quoted(quote: char, value: impl Into<String>, escaped: bool) -> Node {
        Node::from_kind(NodeKind::Quoted(Quoted::new(quote, value, escaped)))
    }

    pub fn is_true_keyword(&self) -> bool {
        matches!(&self.kind, NodeKind::Keyword(k) if k.value == "true")
    }

    pub fn is_visible(&self) -> bool {
        self.visibility.is_visible()
    }

    /// Reduces this node in `ctx`, returning a new node.
    pub fn eval(&self, ctx: &mut Context<'_>) -> Result<Node> {
        match &self.kind {
            NodeKind::Dimension(_)
            | NodeKind::Color(_)
            | NodeKind::Keyword(_)
            | NodeKind::Anonymous(_)
            | NodeKind::UnicodeDescriptor(_)
            | NodeKind::Comment(_)
            | NodeKind::Element(_)
            | NodeKind::Attribute(_)
            | NodeKind::Combinator(_)
            | NodeKind::Extend(_) => Ok(self.clone()),

            NodeKind::Quoted(q) => q.eval(self, ctx),
            NodeKind::JavaScript(js) => js.eval(self, ctx),
            NodeKind::Url(u) => u.eval(self, ctx),

            NodeKind::Expression(e) => e.eval(self, ctx),
            NodeKind::Value(v) => v.eval(self, ctx),
            NodeKind::Operation(op) => op.eval(self, ctx),
            NodeKind::Negative(inner) => crate::expression::eval_negative(self, inner, ctx),
            NodeKind::Paren(inner) => crate::expression::eval_paren(self, inner, ctx),
            NodeKind::Condition(c) => c.eval_node(self, ctx),
            NodeKind::Call(c) => c.eval(self, ctx),

            NodeKind::Variable(v) => v.eval(self, ctx),
            NodeKind::Property(p) => p.eval(self, ctx),
            NodeKind::VariableCall(vc) => vc.eval(self, ctx),
            NodeKind::NamespaceValue(nv) => nv.eval(self, ctx),

            NodeKind::Selector(s) => s.eval(self, ctx),

            NodeKind::Declaration(d) => d.eval(self, ctx),
            NodeKind::Ruleset(r) => r.eval(self, ctx),
            NodeKind::MixinCall(mc) => mc.eval(self, ctx),
            NodeKind::MixinDefinition(md) => md.eval(self, ctx),
            NodeKind::DetachedRuleset(dr) => dr.eval(self, ctx),

            NodeKind::AtRule(a) => a.eval(self, ctx),
            NodeKind::Media(m) => m.eval(self, ctx),
            NodeKind::Container(c) => c.eval(self, ctx),
            NodeKind::Import(i) => i.eval(self, ctx),
        }
    }

    /// Serializes this node.
    pub fn gen_css(&self, ctx: &mut CssContext, out: &mut Output) {
        match &self.kind {
            NodeKind::Dimension(d) => d.gen_css(self, ctx, out),
            NodeKind::Color(c) => c.gen_css(self, ctx, out),
            NodeKind::Quoted(q) => q.gen_css(self, ctx, out),
            NodeKind::Keyword(k) => out.add(&k.value, Some(&self.file_info), Some(self.index)),
            NodeKind::Anonymous(a) => a.gen_css(self, ctx, out),
            NodeKind::UnicodeDescriptor(u) => {
                out.add(&u.text, Some(&self.file_info), Some(self.index))
            }
            // Host-evaluated; an unevaluated backtick expression never
            // reaches the emitter.
            NodeKind::JavaScript(_) => {}
            NodeKind::Url(u) => u.gen_css(self, ctx, out),

            NodeKind::Expression(e) => e.gen_css(ctx, out),
            NodeKind::Value(v) => v.gen_css(ctx, out),
            NodeKind::Operation(op) => op.gen_css(ctx, out),
            NodeKind::Negative(inner) => {
                out.add("-", Some(&self.file_info), Some(self.index));
                inner.gen_css(ctx, out);
            }
            NodeKind::Paren(inner) => {
                out.add("(", Some(&self.file_info), Some(self.index));
                inner.gen_css(ctx, out);
                out.add(")", None, None);
            }
            NodeKind::Comment(c) => {
                if !c.is_line_comment {
                    out.add(&c.text, Some(&self.file_info), Some(self.index));
                }
            }
            NodeKind::Condition(_) => {}
            NodeKind::Call(c) => c.gen_css(self, ctx, out),

            NodeKind::Variable(v) => out.add(&v.name, None, None),
            NodeKind::Property(p) => out.add(&p.name, None, None),
            NodeKind::VariableCall(_) | NodeKind::NamespaceValue(_) => {}

            NodeKind::Element(e) => e.gen_css(ctx, out),
            NodeKind::Selector(s) => s.gen_css(ctx, out),
            NodeKind::Attribute(a) => a.gen_css(ctx, out),
            NodeKind::Combinator(c) => c.gen_css(ctx, out),

            NodeKind::Declaration(d) => d.gen_css(self, ctx, out),
            NodeKind::Ruleset(r) => r.gen_css(self, ctx, out),
            NodeKind::MixinCall(_)
            | NodeKind::MixinDefinition(_)
            | NodeKind::DetachedRuleset(_)
            | NodeKind::Extend(_) => {}

            NodeKind::AtRule(a) => a.gen_css(self, ctx, out),
            NodeKind::Media(m) => m.gen_css(self, ctx, out),
            NodeKind::Container(c) => c.gen_css(self, ctx, out),
            NodeKind::Import(i) => i.gen_css(self, ctx, out),
        }
    }

    /// The node's CSS text, with default formatting.  Used for pattern
    /// matching, guard comparison, and diagnostics.
    pub fn to_css_string(&self) -> String {
        let mut ctx = CssContext::default();
        let mut out = Output::new();
        self.gen_css(&mut ctx, &mut out);
        out.into_string()
    }

    /// Shallow traversal over this node's direct children.
    pub fn visit_children(&mut self, f: &mut dyn FnMut(&mut Node)) {
        match &mut self.kind {
            NodeKind::Dimension(_)
            | NodeKind::Color(_)
            | NodeKind::Quoted(_)
            | NodeKind::Keyword(_)
            | NodeKind::Anonymous(_)
            | NodeKind::UnicodeDescriptor(_)
            | NodeKind::JavaScript(_)
            | NodeKind::Comment(_)
            | NodeKind::Element(_)
            | NodeKind::Combinator(_)
            | NodeKind::Variable(_)
            | NodeKind::Property(_)
            | NodeKind::VariableCall(_)
            | NodeKind::MixinDefinition(_) => {}

            NodeKind::Url(u) => f(&mut u.value),
            NodeKind::Expression(e) => e.value.iter_mut().for_each(f),
            NodeKind::Value(v) => v.value.iter_mut().for_each(f),
            NodeKind::Operation(op) => {
                f(&mut op.lhs);
                f(&mut op.rhs);
            }
            NodeKind::Negative(inner) | NodeKind::Paren(inner) => f(inner),
            NodeKind::Condition(c) => {
                f(&mut c.lhs);
                f(&mut c.rhs);
            }
            NodeKind::Call(c) => c.args.iter_mut().for_each(f),
            NodeKind::NamespaceValue(nv) => f(&mut nv.value),
            NodeKind::Selector(s) => {
                if let Some(cond) = &mut s.condition {
                    f(cond);
                }
            }
            NodeKind::Attribute(a) => {
                if let Some(v) = &mut a.value {
                    f(v);
                }
            }
            NodeKind::Declaration(d) => f(&mut d.value),
            NodeKind::Ruleset(r) => r.rules.iter_mut().for_each(f),
            NodeKind::MixinCall(mc) => mc.args.iter_mut().for_each(|arg| f(&mut arg.value)),
            NodeKind::DetachedRuleset(dr) => f(&mut dr.ruleset),
            NodeKind::Extend(e) => f(&mut e.selector),
            NodeKind::AtRule(a) => {
                if let Some(v) = &mut a.body.value {
                    f(v);
                }
                a.body.rules.iter_mut().for_each(f);
            }
            NodeKind::Media(m) => {
                if let Some(v) = &mut m.body.value {
                    f(v);
                }
                m.body.rules.iter_mut().for_each(f);
            }
            NodeKind::Container(c) => {
                if let Some(v) = &mut c.body.value {
                    f(v);
                }
                c.body.rules.iter_mut().for_each(f);
            }
            NodeKind::Import(i) => {
                f(&mut i.path);
                if let Some(feat) = &mut i.features {
                    f(feat);
                }
            }
        }
    }

    /// Orders two evaluated values for guard comparison.
    ///
    /// `None` means the values are not comparable; guards treat that as a
    /// failed comparison, not an error.
    pub fn compare(a: &Node, b: &Node) -> Option<Ordering> {
        match (&a.kind, &b.kind) {
            (NodeKind::Dimension(da), NodeKind::Dimension(db)) => da.compare(db),
            (NodeKind::Quoted(qa), NodeKind::Quoted(qb)) if !qa.escaped && !qb.escaped => {
                Some(qa.value.cmp(&qb.value))
            }
            (NodeKind::Keyword(ka), NodeKind::Keyword(kb)) => {
                if ka.value.eq_ignore_ascii_case(&kb.value) {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
            (NodeKind::Color(ca), NodeKind::Color(cb)) => {
                if ca.rgb == cb.rgb && ca.alpha == cb.alpha {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
            _ => {
                if a.to_css_string() == b.to_css_string() {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_css_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_node_is_hidden() {
        let mut v = Visibility::default();
        assert!(v.is_visible());

        v.add_block();
        assert!(!v.is_visible());

        v.ensure_visibility();
        assert!(v.is_visible());

        v.remove_block();
        assert!(v.is_visible());
    }

    #[test]
    fn keyword_comparison_ignores_case() {
        let a = Node::keyword("Red");
        let b = Node::keyword("red");
        assert_eq!(Node::compare(&a, &b), Some(Ordering::Equal));
    }

    #[test]
    fn mixed_kinds_compare_by_css_text() {
        let a = Node::keyword("red");
        let b = Node::anonymous("red");
        assert_eq!(Node::compare(&a, &b), Some(Ordering::Equal));

        let c = Node::anonymous("blue");
        assert_eq!(Node::compare(&a, &c), None);
    }
}
