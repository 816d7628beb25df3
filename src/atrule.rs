//! At-rules: the generic `@`-rule, plus the bubbling `@media` and
//! `@container` blocks.
//!
//! `Media` and `Container` share one body shape and one bubbling algorithm;
//! the shared state is the [`AtRuleBody`] embedded in each and the free
//! functions below, rather than any inheritance between node kinds.
//!
//! Bubbling works through two context buffers.  `media_blocks` collects
//! every media-like block in source order; `media_path` tracks the blocks
//! enclosing the current evaluation point.  A block evaluated inside
//! another block merges the feature lists of its same-kind ancestors into
//! its own (Cartesian product, fragments joined with `and`) and leaves an
//! empty placeholder at its call site; the enclosing rulesets then wrap the
//! hoisted block's body in their selectors as they finish evaluating, so
//! the block carries its whole selector chain to the top.

use std::cell::RefCell;
use std::rc::Rc;

use itertools::Itertools;

use crate::context::Context;
use crate::error::Result;
use crate::expression::{Expression, ValueList};
use crate::node::{FileInfo, Node, NodeKind, Visibility};
use crate::output::{CssContext, Output};
use crate::ruleset::Ruleset;
use crate::selector::Selector;

/// The prelude-plus-body shared by every at-rule shape.
#[derive(Debug, Clone, PartialEq)]
pub struct AtRuleBody {
    pub value: Option<Node>,
    pub rules: Vec<Node>,
}

/// Which bubbling family a block belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BubbleKind {
    Media,
    Container,
}

impl BubbleKind {
    fn keyword(self) -> &'static str {
        match self {
            BubbleKind::Media => "@media",
            BubbleKind::Container => "@container",
        }
    }
}

/// A media-like block sitting in the bubbling buffers during evaluation.
#[derive(Debug, Clone)]
pub struct BubbledBlock {
    pub kind: BubbleKind,
    pub features: Node,
    pub rules: Vec<Node>,
    pub index: usize,
    pub file_info: Rc<FileInfo>,
    pub visibility: Visibility,
}

impl BubbledBlock {
    /// Wraps the block's body in the given selectors, so a hoisted block
    /// keeps the selector chain of the scopes it bubbled out of.
    pub fn bubble_selectors(&mut self, selectors: &[Selector]) {
        if selectors.is_empty() || self.rules.is_empty() {
            return;
        }
        let inner = std::mem::take(&mut self.rules);
        let wrapper = Node::new(
            NodeKind::Ruleset(Box::new(Ruleset::new(selectors.to_vec(), inner))),
            self.index,
            Rc::clone(&self.file_info),
        );
        self.rules = vec![wrapper];
    }

    fn materialize(self) -> Node {
        let body = AtRuleBody {
            value: Some(self.features),
            rules: self.rules,
        };
        let kind = match self.kind {
            BubbleKind::Media => NodeKind::Media(Box::new(Media { body })),
            BubbleKind::Container => NodeKind::Container(Box::new(Container { body })),
        };
        let mut node = Node::new(kind, self.index, self.file_info);
        node.visibility = self.visibility;
        node
    }
}

/// `@media features { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Media {
    pub body: AtRuleBody,
}

impl Media {
    pub fn new(features: Node, rules: Vec<Node>) -> Media {
        Media {
            body: AtRuleBody {
                value: Some(features),
                rules,
            },
        }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        eval_bubbling(BubbleKind::Media, &self.body, node, ctx)
    }

    pub fn gen_css(&self, node: &Node, ctx: &mut CssContext, out: &mut Output) {
        gen_bubbling_css(BubbleKind::Media, &self.body, node, ctx, out);
    }
}

/// `@container features { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub body: AtRuleBody,
}

impl Container {
    pub fn new(features: Node, rules: Vec<Node>) -> Container {
        Container {
            body: AtRuleBody {
                value: Some(features),
                rules,
            },
        }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        eval_bubbling(BubbleKind::Container, &self.body, node, ctx)
    }

    pub fn gen_css(&self, node: &Node, ctx: &mut CssContext, out: &mut Output) {
        gen_bubbling_css(BubbleKind::Container, &self.body, node, ctx, out);
    }
}

fn eval_bubbling(
    kind: BubbleKind,
    body: &AtRuleBody,
    node: &Node,
    ctx: &mut Context<'_>,
) -> Result<Node> {
    if ctx.media_blocks.is_none() {
        ctx.media_blocks = Some(Vec::new());
        ctx.media_path.clear();
    }

    let features = match &body.value {
        Some(v) => v.eval(ctx)?,
        None => Node::anonymous("").with_meta_of(node),
    };

    let block = Rc::new(RefCell::new(BubbledBlock {
        kind,
        features,
        rules: Vec::new(),
        index: node.index,
        file_info: Rc::clone(&node.file_info),
        visibility: node.visibility,
    }));

    ctx.media_path.push(Rc::clone(&block));
    if let Some(blocks) = ctx.media_blocks.as_mut() {
        blocks.push(Rc::clone(&block));
    }

    let mut bag = Ruleset::bag(body.rules.clone());
    bag.allow_imports = true;
    let body_node = Node::new(
        NodeKind::Ruleset(Box::new(bag)),
        node.index,
        node.file_info.clone(),
    );
    let body_result = body_node.eval(ctx);
    ctx.media_path.pop();
    let evaluated_body = body_result?;

    block.borrow_mut().rules = vec![evaluated_body];

    if ctx.media_path.is_empty() {
        eval_top(node, ctx)
    } else {
        eval_nested(kind, &block, node, ctx)
    }
}

/// The outermost block of a bubbling group hands back everything the group
/// collected, in source order.
fn eval_top(node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
    let blocks = ctx.media_blocks.take().unwrap_or_default();
    ctx.media_path.clear();

    let mut materialized: Vec<Node> = blocks
        .into_iter()
        .map(|rc| {
            Rc::try_unwrap(rc)
                .map(RefCell::into_inner)
                .unwrap_or_else(|rc| rc.borrow().clone())
                .materialize()
        })
        .collect();

    if materialized.len() == 1 {
        return Ok(materialized.pop().expect("one block"));
    }

    let mut container = Ruleset::new(Vec::new(), materialized);
    container.multi_media = true;
    Ok(Node::new(
        NodeKind::Ruleset(Box::new(container)),
        node.index,
        node.file_info.clone(),
    ))
}

/// A nested block merges its ancestors' features into its own and leaves an
/// empty placeholder behind; its content is already in `media_blocks`.
fn eval_nested(
    kind: BubbleKind,
    block: &Rc<RefCell<BubbledBlock>>,
    node: &Node,
    ctx: &mut Context<'_>,
) -> Result<Node> {
    let mut feature_lists: Vec<Vec<Node>> = Vec::new();
    let ancestors: Vec<Rc<RefCell<BubbledBlock>>> = ctx
        .media_path
        .iter()
        .cloned()
        .chain(std::iter::once(Rc::clone(block)))
        .collect();

    for entry in &ancestors {
        let entry = entry.borrow();
        // Blocks of another family keep their own queries; they contribute
        // nothing to this block's feature permutation.
        if entry.kind != kind {
            continue;
        }
        let list = match &entry.features.kind {
            NodeKind::Value(v) => v.value.clone(),
            _ => vec![entry.features.clone()],
        };
        feature_lists.push(list);
    }

    let permuted: Vec<Node> = feature_lists
        .into_iter()
        .multi_cartesian_product()
        .map(|combo| {
            let mut parts = Vec::with_capacity(combo.len() * 2 - 1);
            for (i, feature) in combo.into_iter().enumerate() {
                if i > 0 {
                    parts.push(Node::anonymous("and"));
                }
                parts.push(feature);
            }
            Node::from_kind(NodeKind::Expression(Expression::new(parts))).with_meta_of(node)
        })
        .collect();

    block.borrow_mut().features = Node::new(
        NodeKind::Value(ValueList::new(permuted)),
        node.index,
        node.file_info.clone(),
    );

    Ok(Node::new(
        NodeKind::Ruleset(Box::new(Ruleset::bag(Vec::new()))),
        node.index,
        node.file_info.clone(),
    ))
}

fn gen_bubbling_css(
    kind: BubbleKind,
    body: &AtRuleBody,
    node: &Node,
    ctx: &mut CssContext,
    out: &mut Output,
) {
    if !ctx.compress {
        out.add(&ctx.indent(), None, None);
    }
    out.add(
        &format!("{} ", kind.keyword()),
        Some(&node.file_info),
        Some(node.index),
    );
    if let Some(features) = &body.value {
        features.gen_css(ctx, out);
    }
    output_rule_block(ctx, out, &body.rules);
}

/// A generic at-rule: `@supports`, `@document`, `@keyframes`, `@charset`,
/// vendor-prefixed variants, and anything else the parser hands through.
#[derive(Debug, Clone, PartialEq)]
pub struct AtRule {
    /// Includes the `@`, e.g. `@supports`.
    pub name: String,
    pub body: AtRuleBody,

    /// Rooted at-rules (`@keyframes`, `@font-face`) do not participate in
    /// selector joining; their inner rulesets stand alone.
    pub is_rooted: bool,
}

impl AtRule {
    pub fn new(name: impl Into<String>, value: Option<Node>, rules: Option<Vec<Node>>) -> AtRule {
        let name = name.into();
        let is_rooted = {
            let base = name.trim_start_matches('@');
            let base = base
                .trim_start_matches("-webkit-")
                .trim_start_matches("-moz-")
                .trim_start_matches("-o-")
                .trim_start_matches("-ms-");
            matches!(base, "keyframes" | "font-face" | "counter-style" | "page")
        };
        AtRule {
            name,
            body: AtRuleBody {
                value,
                rules: rules.unwrap_or_default(),
            },
            is_rooted,
        }
    }

    pub fn has_body(&self) -> bool {
        !self.body.rules.is_empty()
    }

    /// Evaluates prelude and body in place; joining with outer selectors is
    /// the join visitor's job.
    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let value = match &self.body.value {
            Some(v) => Some(v.eval(ctx)?),
            None => None,
        };

        let rules = if self.body.rules.is_empty() {
            Vec::new()
        } else {
            let mut bag = Ruleset::bag(self.body.rules.clone());
            bag.allow_imports = true;
            let body_node = Node::new(
                NodeKind::Ruleset(Box::new(bag)),
                node.index,
                node.file_info.clone(),
            );
            match body_node.eval(ctx)?.kind {
                NodeKind::Ruleset(rs) => rs.rules,
                other => vec![Node::new(other, node.index, node.file_info.clone())],
            }
        };

        let mut out = Node::new(
            NodeKind::AtRule(Box::new(AtRule {
                name: self.name.clone(),
                body: AtRuleBody { value, rules },
                is_rooted: self.is_rooted,
            })),
            node.index,
            node.file_info.clone(),
        );
        out.visibility.copy_from(&node.visibility);
        Ok(out)
    }

    pub fn gen_css(&self, node: &Node, ctx: &mut CssContext, out: &mut Output) {
        if !ctx.compress {
            out.add(&ctx.indent(), None, None);
        }
        out.add(&self.name, Some(&node.file_info), Some(node.index));
        if let Some(value) = &self.body.value {
            out.add(" ", None, None);
            value.gen_css(ctx, out);
        }
        if self.has_body() {
            output_rule_block(ctx, out, &self.body.rules);
        } else {
            out.add(";", None, None);
            if !ctx.compress {
                out.add("\n", None, None);
            }
        }
    }
}

/// Emits ` { rules }` with one extra indent level for the body.
pub(crate) fn output_rule_block(ctx: &mut CssContext, out: &mut Output, rules: &[Node]) {
    if ctx.compress {
        out.add("{", None, None);
        for rule in rules {
            rule.gen_css(ctx, out);
        }
        out.add("}", None, None);
        return;
    }

    out.add(" {\n", None, None);
    ctx.tab_level += 1;
    for rule in rules {
        match &rule.kind {
            NodeKind::Declaration(_) | NodeKind::Comment(_) | NodeKind::Anonymous(_) => {
                out.add(&ctx.indent(), None, None);
                rule.gen_css(ctx, out);
                out.add("\n", None, None);
            }
            _ => {
                rule.gen_css(ctx, out);
                if out.last_char() != Some('\n') {
                    out.add("\n", None, None);
                }
            }
        }
    }
    ctx.tab_level -= 1;
    out.add(&format!("{}}}", ctx.indent()), None, None);
    out.add("\n", None, None);
}
