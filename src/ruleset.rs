//! Rulesets: the scope-carrying workhorse of evaluation, plus detached
//! rulesets.
//!
//! `Ruleset::eval` is the center of the evaluator.  It pushes itself as a
//! scope frame, inlines imports, splices mixin- and variable-call results
//! into place, evaluates the remaining rules, folds `&`-only children, and
//! wraps any at-rule blocks that bubbled up out of its body with its own
//! selectors so they keep their selector chain after hoisting.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, Frame};
use crate::error::Result;
use crate::functions::FunctionRegistry;
use crate::node::{Node, NodeKind};
use crate::output::{CssContext, Output};
use crate::selector::Selector;

#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    pub selectors: Vec<Selector>,
    pub rules: Vec<Node>,

    /// Fully joined selector paths, filled in by the join-selectors visitor.
    pub paths: Vec<Selector>,

    pub root: bool,
    pub first_root: bool,
    pub strict_imports: bool,
    pub allow_imports: bool,

    /// Synthetic container holding multiple bubbled at-rule blocks.
    pub multi_media: bool,
}

impl Ruleset {
    pub fn new(selectors: Vec<Selector>, rules: Vec<Node>) -> Ruleset {
        Ruleset {
            selectors,
            rules,
            paths: Vec::new(),
            root: false,
            first_root: false,
            strict_imports: false,
            allow_imports: false,
            multi_media: false,
        }
    }

    /// The parser marks the top of a file this way.
    pub fn file_root(rules: Vec<Node>) -> Ruleset {
        let mut rs = Ruleset::new(Vec::new(), rules);
        rs.root = true;
        rs.first_root = true;
        rs.allow_imports = true;
        rs
    }

    /// A selector-less carrier for spliced rules.
    pub(crate) fn bag(rules: Vec<Node>) -> Ruleset {
        Ruleset::new(Vec::new(), rules)
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        if ctx.eval_depth >= crate::limits::MAX_EVAL_DEPTH {
            return Err(crate::error::LessError::runtime(format!(
                "maximum nesting depth of {} exceeded",
                crate::limits::MAX_EVAL_DEPTH
            ))
            .at(node.index, &node.file_info));
        }
        ctx.eval_depth += 1;
        let result = self.eval_guarded(node, ctx);
        ctx.eval_depth -= 1;
        result
    }

    fn eval_guarded(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        // Guards on plain CSS selectors may not call default().
        let mut selectors = Vec::with_capacity(self.selectors.len());
        let mut has_passing_selector = self.selectors.is_empty();
        ctx.default_func
            .error("default() is only allowed in parametric mixin guards");
        let selector_result = (|| -> Result<()> {
            for selector in &self.selectors {
                let evaluated = selector.eval_parts(ctx)?;
                if evaluated.evald_condition {
                    has_passing_selector = true;
                }
                selectors.push(evaluated);
            }
            Ok(())
        })();
        ctx.default_func.reset();
        selector_result?;

        let rules = if has_passing_selector {
            self.rules.clone()
        } else {
            Vec::new()
        };

        let registry = Rc::new(FunctionRegistry::inherit(&ctx.current_registry()));
        let frame = Rc::new(Frame::from_rules(rules, registry));

        ctx.push_frame(Rc::clone(&frame));
        ctx.selectors_stack.push(selectors.clone());
        if let Some(host) = ctx.host {
            host.scope_enter();
        }
        let media_block_count = ctx.media_block_count();

        let body_result = self.eval_body(&frame, ctx);

        if let Some(host) = ctx.host {
            host.scope_exit();
        }
        ctx.selectors_stack.pop();
        ctx.pop_frame();
        body_result?;

        // Blocks that bubbled out of this body carry our selectors along.
        if let Some(blocks) = &ctx.media_blocks {
            for block in blocks.iter().skip(media_block_count) {
                block.borrow_mut().bubble_selectors(&selectors);
            }
        }

        let mut evaluated = Ruleset::new(selectors, frame.rules_snapshot());
        evaluated.root = self.root;
        evaluated.first_root = self.first_root;
        evaluated.strict_imports = self.strict_imports;
        evaluated.allow_imports = self.allow_imports;
        evaluated.multi_media = self.multi_media;

        let mut out = Node::new(
            NodeKind::Ruleset(Box::new(evaluated)),
            node.index,
            node.file_info.clone(),
        );
        out.visibility.copy_from(&node.visibility);
        Ok(out)
    }

    fn eval_body(&self, frame: &Rc<Frame>, ctx: &mut Context<'_>) -> Result<()> {
        // Inline imports first so their rules join this scope.
        if self.root || self.allow_imports || !self.strict_imports {
            let mut i = 0;
            while i < frame.rules_len() {
                let Some(rule) = frame.rule_at(i) else { break };
                if matches!(rule.kind, NodeKind::Import(_)) {
                    let evaluated = rule.eval(ctx)?;
                    match evaluated.kind {
                        NodeKind::Ruleset(rs)
                            if rs.selectors.is_empty() && !rs.root && !rs.multi_media =>
                        {
                            let count = frame.splice_rules(i, rs.rules);
                            i += count;
                        }
                        _ => {
                            frame.set_rule(i, evaluated);
                            i += 1;
                        }
                    }
                } else {
                    i += 1;
                }
            }
        }

        // Mixin definitions capture their environment before anything can
        // call them.
        for i in 0..frame.rules_len() {
            let Some(rule) = frame.rule_at(i) else { break };
            if matches!(rule.kind, NodeKind::MixinDefinition(_)) {
                frame.set_rule(i, rule.eval(ctx)?);
            }
        }

        // Splice mixin and detached-ruleset calls into place.  Variables the
        // scope already defines shadow same-named variables a call returns.
        let mut i = 0;
        while i < frame.rules_len() {
            let Some(rule) = frame.rule_at(i) else { break };
            match &rule.kind {
                NodeKind::MixinCall(_) => {
                    let evaluated = rule.eval(ctx)?;
                    let produced = into_rules(evaluated);
                    let kept: Vec<Node> = produced
                        .into_iter()
                        .filter(|r| match &r.kind {
                            NodeKind::Declaration(d) if d.is_variable => {
                                frame.variable(&d.name).is_none()
                            }
                            _ => true,
                        })
                        .collect();
                    i += frame.splice_rules(i, kept);
                }
                NodeKind::VariableCall(_) => {
                    let evaluated = rule.eval(ctx)?;
                    let produced = into_rules(evaluated);
                    let kept: Vec<Node> = produced
                        .into_iter()
                        .filter(|r| !matches!(&r.kind, NodeKind::Declaration(d) if d.is_variable))
                        .collect();
                    i += frame.splice_rules(i, kept);
                }
                _ => i += 1,
            }
        }

        // Evaluate the remaining rules in place.
        for i in 0..frame.rules_len() {
            let Some(rule) = frame.rule_at(i) else { break };
            if !matches!(rule.kind, NodeKind::MixinDefinition(_)) {
                frame.set_rule(i, rule.eval(ctx)?);
            }
        }

        // Fold `&`-only children into this scope.
        let mut i = 0;
        while i < frame.rules_len() {
            let Some(rule) = frame.rule_at(i) else { break };
            let folds = match &rule.kind {
                NodeKind::Ruleset(rs) => {
                    rs.selectors.len() == 1 && rs.selectors[0].is_just_parent_selector()
                }
                _ => false,
            };
            if !folds {
                i += 1;
                continue;
            }

            let NodeKind::Ruleset(rs) = rule.kind else {
                unreachable!()
            };
            let visibility = rule.visibility;
            let hoisted: Vec<Node> = rs
                .rules
                .into_iter()
                .filter(|r| !matches!(&r.kind, NodeKind::Declaration(d) if d.is_variable))
                .map(|mut r| {
                    r.visibility.copy_from(&visibility);
                    r
                })
                .collect();
            frame.splice_rules(i, hoisted);
            // Re-examine from the same spot; hoisted rules may fold again.
        }

        Ok(())
    }

    /// Recursively marks every declaration `!important`, for
    /// `.mixin() !important` calls.
    pub fn make_important(&self) -> Ruleset {
        let rules = self
            .rules
            .iter()
            .map(|rule| {
                let mut rule = rule.clone();
                match &mut rule.kind {
                    NodeKind::Declaration(d) => {
                        let important = d.make_important();
                        **d = important;
                    }
                    NodeKind::Ruleset(rs) => {
                        let important = rs.make_important();
                        **rs = important;
                    }
                    _ => {}
                }
                rule
            })
            .collect();

        let mut out = self.clone();
        out.rules = rules;
        out
    }

    fn effective_paths(&self) -> Vec<&Selector> {
        let source: &[Selector] = if self.paths.is_empty() {
            &self.selectors
        } else {
            &self.paths
        };
        source.iter().filter(|s| !s.media_empty).collect()
    }

    pub fn gen_css(&self, node: &Node, ctx: &mut CssContext, out: &mut Output) {
        let paths = self.effective_paths();
        let braces = !self.root && !paths.is_empty();

        let (decl_like, nested): (Vec<&Node>, Vec<&Node>) =
            self.rules.iter().partition(|rule| {
                !matches!(
                    rule.kind,
                    NodeKind::Ruleset(_)
                        | NodeKind::Media(_)
                        | NodeKind::Container(_)
                        | NodeKind::AtRule(_)
                        | NodeKind::Import(_)
                )
            });

        if !braces {
            // Root or transparent container: charset first, then imports,
            // then everything else.
            let mut ordered: Vec<&Node> = Vec::with_capacity(self.rules.len());
            if self.root {
                let (charsets, rest): (Vec<&Node>, Vec<&Node>) =
                    self.rules.iter().partition(|r| {
                        matches!(&r.kind, NodeKind::AtRule(a) if a.name.eq_ignore_ascii_case("@charset"))
                    });
                let (imports, rest): (Vec<&Node>, Vec<&Node>) = rest
                    .into_iter()
                    .partition(|r| matches!(r.kind, NodeKind::Import(_)));
                ordered.extend(charsets);
                ordered.extend(imports);
                ordered.extend(rest);
            } else {
                ordered.extend(self.rules.iter());
            }

            for rule in ordered {
                if is_silent(rule, ctx) {
                    continue;
                }
                let before = out.is_empty();
                if !before && !ctx.compress && out.last_char() != Some('\n') {
                    out.add("\n", None, None);
                }
                if matches!(
                    rule.kind,
                    NodeKind::Declaration(_) | NodeKind::Comment(_) | NodeKind::Anonymous(_)
                ) {
                    if !ctx.compress {
                        out.add(&ctx.indent(), None, None);
                    }
                }
                rule.gen_css(ctx, out);
                if !ctx.compress && out.last_char() != Some('\n') {
                    out.add("\n", None, None);
                }
            }
            return;
        }

        // Selector block.
        let parent_indent = ctx.indent();
        ctx.tab_level += 1;
        let child_indent = ctx.indent();

        let emit_block = decl_like.iter().any(|r| !is_silent(r, ctx));

        if emit_block {
            let sep = if ctx.compress {
                ",".to_string()
            } else {
                format!(",\n{parent_indent}")
            };
            let mut first = true;
            for path in &paths {
                if !first {
                    out.add(&sep, None, None);
                } else if !ctx.compress {
                    out.add(&parent_indent, None, None);
                }
                first = false;
                path.gen_css(ctx, out);
            }

            out.add(if ctx.compress { "{" } else { " {" }, None, None);

            let visible: Vec<&&Node> = decl_like.iter().filter(|r| !is_silent(r, ctx)).collect();
            for (i, rule) in visible.iter().enumerate() {
                if !ctx.compress {
                    out.add("\n", None, None);
                    out.add(&child_indent, None, None);
                }
                ctx.last_rule = i + 1 == visible.len();
                rule.gen_css(ctx, out);
                ctx.last_rule = false;
            }

            if ctx.compress {
                out.add("}", None, None);
            } else {
                out.add(&format!("\n{parent_indent}}}"), None, None);
            }
        }

        ctx.tab_level -= 1;

        // Nested blocks un-nest: they come after the closing brace, at the
        // same depth as this ruleset.
        for rule in nested {
            if !ctx.compress && !out.is_empty() && out.last_char() != Some('\n') {
                out.add("\n", None, None);
            }
            rule.gen_css(ctx, out);
        }
    }
}

fn is_silent(rule: &Node, ctx: &CssContext) -> bool {
    match &rule.kind {
        NodeKind::Declaration(d) => d.is_variable,
        NodeKind::Comment(c) => {
            c.is_line_comment || (ctx.compress && !c.text.starts_with("/*!"))
        }
        NodeKind::MixinDefinition(_)
        | NodeKind::MixinCall(_)
        | NodeKind::Extend(_)
        | NodeKind::DetachedRuleset(_)
        | NodeKind::Condition(_) => true,
        NodeKind::Ruleset(rs) => rs.rules.is_empty(),
        NodeKind::Anonymous(a) => a.value.is_empty(),
        _ => false,
    }
}

/// Unwraps an evaluated statement into the rules it contributes.
pub(crate) fn into_rules(node: Node) -> Vec<Node> {
    match node.kind {
        NodeKind::Ruleset(rs) if !rs.root && rs.selectors.is_empty() && !rs.multi_media => rs.rules,
        NodeKind::Anonymous(a) if a.value.is_empty() => Vec::new(),
        _ => vec![node],
    }
}

/// Searches `rules` for mixins reachable by the call path `elements`,
/// descending through namespace rulesets.
pub(crate) fn find_in_rules(rules: &[Node], elements: &[String], found: &mut Vec<Node>) {
    if elements.is_empty() {
        return;
    }
    let first = &elements[0];

    for rule in rules {
        match &rule.kind {
            NodeKind::MixinDefinition(md) => {
                if md.name == *first && elements.len() == 1 {
                    found.push(rule.clone());
                }
            }
            NodeKind::Ruleset(rs) => {
                for selector in &rs.selectors {
                    let own = selector.mixin_elements();
                    if own.is_empty() {
                        continue;
                    }
                    let matched = own
                        .iter()
                        .zip(elements.iter())
                        .take_while(|(a, b)| a == b)
                        .count();
                    if matched == 0 || matched < own.len().min(elements.len()) {
                        continue;
                    }
                    if matched == elements.len() && own.len() == matched {
                        found.push(rule.clone());
                    } else if matched < elements.len() && own.len() == matched {
                        find_in_rules(&rs.rules, &elements[matched..], found);
                    }
                    break;
                }
            }
            _ => {}
        }
    }
}

/// A ruleset stored in a variable; carries its definition environment.
#[derive(Debug, Clone)]
pub struct DetachedRuleset {
    pub ruleset: Box<Node>,
    frames: RefCell<Option<Vec<Rc<Frame>>>>,
}

impl PartialEq for DetachedRuleset {
    fn eq(&self, other: &Self) -> bool {
        self.ruleset == other.ruleset
    }
}

impl DetachedRuleset {
    pub fn new(ruleset: Node) -> DetachedRuleset {
        DetachedRuleset {
            ruleset: Box::new(ruleset),
            frames: RefCell::new(None),
        }
    }

    /// Evaluating a detached ruleset captures the frame stack; the body
    /// evaluates later, when the variable is called.
    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let captured = DetachedRuleset {
            ruleset: self.ruleset.clone(),
            frames: RefCell::new(Some(ctx.frames_snapshot())),
        };
        Ok(Node::new(
            NodeKind::DetachedRuleset(captured),
            node.index,
            node.file_info.clone(),
        ))
    }

    /// Evaluates the body with the captured frames stacked under the
    /// caller's.
    pub fn call_eval(&self, _node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let saved = ctx.frames.clone();
        if let Some(captured) = self.frames.borrow().as_ref() {
            for frame in captured.iter().rev() {
                ctx.push_frame(Rc::clone(frame));
            }
        }
        let result = self.ruleset.eval(ctx);
        ctx.restore_frames(saved);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::Declaration;

    fn decl(name: &str, value: Node) -> Node {
        Node::from_kind(NodeKind::Declaration(Box::new(Declaration::new(
            name, value,
        ))))
    }

    fn var_decl(name: &str, value: Node) -> Node {
        Node::from_kind(NodeKind::Declaration(Box::new(Declaration::variable(
            name, value,
        ))))
    }

    fn ruleset_node(selector: &str, rules: Vec<Node>) -> Node {
        Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
            vec![Selector::from_value(selector)],
            rules,
        ))))
    }

    #[test]
    fn variables_resolve_within_scope() {
        let mut ctx = crate::context::Context::for_tests();
        let root = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::file_root(vec![
            var_decl("@c", Node::keyword("red")),
            ruleset_node(
                ".x",
                vec![decl(
                    "color",
                    Node::from_kind(NodeKind::Variable(crate::variable::Variable::new("@c"))),
                )],
            ),
        ]))));

        let evaluated = root.eval(&mut ctx).unwrap();
        let NodeKind::Ruleset(root_rs) = &evaluated.kind else {
            panic!("expected ruleset");
        };
        let NodeKind::Ruleset(x) = &root_rs.rules[1].kind else {
            panic!("expected nested ruleset");
        };
        let NodeKind::Declaration(d) = &x.rules[0].kind else {
            panic!("expected declaration");
        };
        assert_eq!(d.value.to_css_string(), "red");
    }

    #[test]
    fn frames_balance_across_eval() {
        let mut ctx = crate::context::Context::for_tests();
        let root = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::file_root(vec![
            ruleset_node(".a", vec![ruleset_node(".b", vec![])]),
        ]))));

        assert_eq!(ctx.frames.len(), 0);
        root.eval(&mut ctx).unwrap();
        assert_eq!(ctx.frames.len(), 0);
        assert!(ctx.selectors_stack.is_empty());
    }

    #[test]
    fn guarded_ruleset_with_false_condition_is_empty() {
        use crate::expression::{CondOp, Condition};

        let mut ctx = crate::context::Context::for_tests();
        let cond = Node::from_kind(NodeKind::Condition(Box::new(Condition::new(
            CondOp::Greater,
            Node::number(0.0),
            Node::number(1.0),
            false,
        ))));
        let selector = Selector::with_condition(
            vec![crate::selector::Element::new(
                crate::selector::Combinator::none(),
                ".x",
            )],
            cond,
        );
        let guarded = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
            vec![selector],
            vec![decl("color", Node::keyword("red"))],
        ))));

        let evaluated = guarded.eval(&mut ctx).unwrap();
        let NodeKind::Ruleset(rs) = &evaluated.kind else {
            panic!("expected ruleset");
        };
        assert!(rs.rules.is_empty());
    }

    #[test]
    fn parent_only_child_folds_into_scope() {
        let mut ctx = crate::context::Context::for_tests();
        let folded = ruleset_node(
            ".x",
            vec![Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
                vec![Selector::from_value("&")],
                vec![decl("color", Node::keyword("red"))],
            ))))],
        );

        let evaluated = folded.eval(&mut ctx).unwrap();
        let NodeKind::Ruleset(rs) = &evaluated.kind else {
            panic!("expected ruleset");
        };
        assert_eq!(rs.rules.len(), 1);
        assert!(matches!(rs.rules[0].kind, NodeKind::Declaration(_)));
    }
}
