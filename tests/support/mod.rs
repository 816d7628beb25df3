//! Shared helpers for integration tests: AST construction shorthands (the
//! external parser's job in production) and a pipeline driver.

#![allow(dead_code)]

use lessc::context::{Context, EvalOptions};
use lessc::declaration::Declaration;
use lessc::expression::{CondOp, Condition, Expression, Operation};
use lessc::functions::Call;
use lessc::mixin::{MixinArg, MixinCall, MixinDefinition, MixinParam};
use lessc::node::{Node, NodeKind};
use lessc::output::{CssContext, Output};
use lessc::ruleset::Ruleset;
use lessc::selector::{Combinator, Element, Selector};
use lessc::value::Operator;
use lessc::visitor::{JoinSelectors, NodeVisitor, ToCss};

use std::rc::Rc;

pub fn kw(value: &str) -> Node {
    Node::keyword(value)
}

pub fn dim(value: f64, unit: &str) -> Node {
    Node::dimension(value, unit)
}

pub fn num(value: f64) -> Node {
    Node::number(value)
}

pub fn anon(value: &str) -> Node {
    Node::anonymous(value)
}

pub fn var(name: &str) -> Node {
    Node::from_kind(NodeKind::Variable(lessc::variable::Variable::new(name)))
}

pub fn decl(name: &str, value: Node) -> Node {
    Node::from_kind(NodeKind::Declaration(Box::new(Declaration::new(
        name, value,
    ))))
}

pub fn vardecl(name: &str, value: Node) -> Node {
    Node::from_kind(NodeKind::Declaration(Box::new(Declaration::variable(
        name, value,
    ))))
}

pub fn op(symbol: &str, lhs: Node, rhs: Node) -> Node {
    Node::from_kind(NodeKind::Operation(Box::new(Operation::new(
        Operator::from_symbol(symbol).unwrap(),
        lhs,
        rhs,
        true,
    ))))
}

pub fn call(name: &str, args: Vec<Node>) -> Node {
    Node::from_kind(NodeKind::Call(Box::new(Call::new(name, args))))
}

pub fn selector(values: &[&str]) -> Selector {
    Selector::new(
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let combinator = if i == 0 {
                    Combinator::none()
                } else {
                    Combinator::descendant()
                };
                Element::new(combinator, *v)
            })
            .collect(),
    )
}

pub fn ruleset(sel: &str, rules: Vec<Node>) -> Node {
    Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
        vec![selector(&[sel])],
        rules,
    ))))
}

pub fn guarded_ruleset(sel: &str, condition: Node, rules: Vec<Node>) -> Node {
    let selector = Selector::with_condition(
        vec![Element::new(Combinator::none(), sel)],
        condition,
    );
    Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
        vec![selector],
        rules,
    ))))
}

pub fn root(rules: Vec<Node>) -> Node {
    Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::file_root(rules))))
}

pub fn greater_than(lhs: Node, rhs: Node) -> Node {
    Node::from_kind(NodeKind::Condition(Box::new(Condition::new(
        CondOp::Greater,
        lhs,
        rhs,
        false,
    ))))
}

pub fn mixin_def(name: &str, params: Vec<MixinParam>, rules: Vec<Node>) -> Node {
    Node::from_kind(NodeKind::MixinDefinition(Rc::new(MixinDefinition::new(
        name, params, rules, None,
    ))))
}

pub fn guarded_mixin_def(
    name: &str,
    params: Vec<MixinParam>,
    condition: Node,
    rules: Vec<Node>,
) -> Node {
    Node::from_kind(NodeKind::MixinDefinition(Rc::new(MixinDefinition::new(
        name,
        params,
        rules,
        Some(condition),
    ))))
}

pub fn mixin_call(name: &str, args: Vec<Node>) -> Node {
    Node::from_kind(NodeKind::MixinCall(Box::new(MixinCall::new(
        selector(&[name]),
        args.into_iter().map(MixinArg::positional).collect(),
    ))))
}

pub fn media(features: Node, rules: Vec<Node>) -> Node {
    Node::from_kind(NodeKind::Media(Box::new(lessc::atrule::Media::new(
        features, rules,
    ))))
}

pub fn container(features: Node, rules: Vec<Node>) -> Node {
    Node::from_kind(NodeKind::Container(Box::new(
        lessc::atrule::Container::new(features, rules),
    )))
}

pub fn spaced(parts: Vec<Node>) -> Node {
    Node::from_kind(NodeKind::Expression(Expression::new(parts)))
}

/// Runs the post-parse pipeline: evaluate, join selectors, process extends,
/// clean up, emit.
pub fn render(tree: Node) -> String {
    render_with(tree, EvalOptions::default(), false)
}

pub fn render_compressed(tree: Node) -> String {
    render_with(tree, EvalOptions::default(), true)
}

pub fn render_with(tree: Node, options: EvalOptions, compress: bool) -> String {
    let mut ctx = Context::new(options);
    let mut evaluated = tree.eval(&mut ctx).expect("evaluation failed");

    JoinSelectors.visit(&mut evaluated);
    lessc::extend::process_extends(&mut evaluated);
    ToCss::new().visit(&mut evaluated);

    let mut css_ctx = CssContext {
        compress,
        ..CssContext::default()
    };
    let mut out = Output::new();
    evaluated.gen_css(&mut css_ctx, &mut out);
    out.into_string()
}
