//! The function registry, call dispatch, and the builtin catalogue.
//!
//! Registries are hierarchical: each scope frame carries one that chains to
//! its parent, and the root falls back to the immutable builtin catalogue.
//! The catalogue itself is a process-wide table built once; every compile
//! gets its own registry instances so concurrent compiles never contend.
//!
//! Calling is where math gating does most of its work: a literal `calc(...)`
//! switches math off for its arguments, while any other call switches it on,
//! and the previous state is restored on every exit path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::color::Color;
use crate::context::Context;
use crate::dimension::Dimension;
use crate::error::{LessError, Result};
use crate::node::{FileInfo, Node, NodeKind};
use crate::output::{CssContext, Output};
use crate::value::Operator;

mod boolean;
mod color;
mod color_blending;
mod color_ops;
mod list;
mod math;
mod string;
mod types;

/// What a builtin returns; [`Call::eval`] coerces it into a node.
pub enum FunctionValue {
    Node(Node),
    Bool(bool),
    Str(String),
    Num(f64),

    /// Coerced to an empty anonymous value.
    Nothing,

    /// The function declines the arguments; the call is emitted to CSS
    /// verbatim, like an unknown function.
    Passthrough,
}

/// Call-site state handed to builtins.
pub struct FnContext<'a, 'b> {
    pub ctx: &'a mut Context<'b>,
    pub name: String,
    pub index: usize,
    pub file_info: Rc<FileInfo>,
}

impl FnContext<'_, '_> {
    /// A node positioned at the call site.
    pub fn node(&self, kind: NodeKind) -> Node {
        Node::new(kind, self.index, Rc::clone(&self.file_info))
    }
}

pub type BuiltinImpl = fn(&mut FnContext<'_, '_>, &[Node]) -> Result<FunctionValue>;

#[derive(Copy, Clone)]
pub struct FunctionDefinition {
    /// Most builtins take evaluated arguments; `if`, `boolean`, `isdefined`,
    /// `default` and `each` receive them raw.
    pub needs_eval_args: bool,
    pub imp: BuiltinImpl,
}

/// The per-scope function table.
pub struct FunctionRegistry {
    local: RefCell<HashMap<String, FunctionDefinition>>,
    parent: Option<Rc<FunctionRegistry>>,
}

impl FunctionRegistry {
    /// A root registry backed by the builtin catalogue.
    pub fn with_builtins() -> FunctionRegistry {
        FunctionRegistry {
            local: RefCell::new(HashMap::new()),
            parent: None,
        }
    }

    /// A child registry that sees everything its parent sees.
    pub fn inherit(parent: &Rc<FunctionRegistry>) -> FunctionRegistry {
        FunctionRegistry {
            local: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        }
    }

    pub fn add(&self, name: &str, definition: FunctionDefinition) {
        self.local
            .borrow_mut()
            .insert(name.to_lowercase(), definition);
    }

    pub fn lookup(&self, lower_name: &str) -> Option<FunctionDefinition> {
        if let Some(def) = self.local.borrow().get(lower_name) {
            return Some(*def);
        }
        if let Some(parent) = &self.parent {
            return parent.lookup(lower_name);
        }
        CATALOGUE.get(lower_name).copied()
    }
}

static CATALOGUE: Lazy<HashMap<&'static str, FunctionDefinition>> = Lazy::new(|| {
    let mut map = HashMap::new();
    boolean::register(&mut map);
    math::register(&mut map);
    color::register(&mut map);
    color_ops::register(&mut map);
    color_blending::register(&mut map);
    list::register(&mut map);
    string::register(&mut map);
    types::register(&mut map);

    map.insert(
        "_self",
        FunctionDefinition {
            needs_eval_args: true,
            imp: |_fctx, args| match args.first() {
                Some(node) => Ok(FunctionValue::Node(node.clone())),
                None => Ok(FunctionValue::Nothing),
            },
        },
    );

    map
});

pub(crate) fn eager(imp: BuiltinImpl) -> FunctionDefinition {
    FunctionDefinition {
        needs_eval_args: true,
        imp,
    }
}

pub(crate) fn lazy(imp: BuiltinImpl) -> FunctionDefinition {
    FunctionDefinition {
        needs_eval_args: false,
        imp,
    }
}

/// A function invocation node.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Node>,
}

impl Call {
    pub fn new(name: impl Into<String>, args: Vec<Node>) -> Call {
        Call {
            name: name.into(),
            args,
        }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let is_calc = self.name.eq_ignore_ascii_case("calc");

        let saved_math_on = ctx.math_on;
        ctx.math_on = !is_calc;
        let entered_calc = is_calc || ctx.in_calc;
        if entered_calc {
            ctx.enter_calc();
        }

        let result = self.eval_inner(node, ctx);

        if entered_calc {
            ctx.exit_calc();
        }
        ctx.math_on = saved_math_on;

        result
    }

    fn eval_inner(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let lower = self.name.to_lowercase();
        let registry = ctx.current_registry();

        if let Some(def) = registry.lookup(&lower) {
            let args = if def.needs_eval_args {
                preprocess_args(&self.args, ctx)?
            } else {
                self.args.clone()
            };

            let mut fctx = FnContext {
                ctx,
                name: lower.clone(),
                index: node.index,
                file_info: Rc::clone(&node.file_info),
            };

            let value = (def.imp)(&mut fctx, &args).map_err(|e| {
                e.at(node.index, &node.file_info)
                    .with_prefix(&format!("error evaluating function `{}`: ", self.name))
            })?;

            match value {
                FunctionValue::Passthrough => {}
                other => return Ok(coerce(other, node)),
            }
        } else if let Some(host) = ctx.host {
            if host.has_function(&lower) {
                let mut args = Vec::with_capacity(self.args.len());
                for arg in &self.args {
                    args.push(arg.eval(ctx)?);
                }
                let scope = crate::plugin::HostScope::new(&ctx.frames);
                log::debug!("dispatching function `{}` to the plugin host", self.name);
                let result = host.call_function(&lower, &args, &scope).map_err(|e| {
                    LessError::runtime(e.message)
                        .at(node.index, &node.file_info)
                        .with_prefix(&format!("error evaluating function `{}`: ", self.name))
                })?;
                return Ok(match result {
                    Some(host_node) => crate::plugin::coerce_host_node(host_node, node),
                    None => Node::anonymous("").with_meta_of(node),
                });
            }
        }

        // Unknown functions pass through to the CSS output with their
        // arguments evaluated.
        log::debug!("passing unknown function `{}` through to CSS", self.name);
        let mut args = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            args.push(arg.eval(ctx)?);
        }
        Ok(Node::new(
            NodeKind::Call(Box::new(Call::new(self.name.clone(), args))),
            node.index,
            node.file_info.clone(),
        ))
    }

    pub fn gen_css(&self, node: &Node, ctx: &mut CssContext, out: &mut Output) {
        out.add(
            &format!("{}(", self.name),
            Some(&node.file_info),
            Some(node.index),
        );
        let sep = if ctx.compress { "," } else { ", " };
        for (i, arg) in self.args.iter().enumerate() {
            arg.gen_css(ctx, out);
            if i + 1 < self.args.len() {
                out.add(sep, None, None);
            }
        }
        out.add(")", None, None);
    }
}

fn coerce(value: FunctionValue, call_site: &Node) -> Node {
    match value {
        FunctionValue::Node(n) => n.with_meta_of(call_site),
        FunctionValue::Bool(_) => Node::anonymous("").with_meta_of(call_site),
        FunctionValue::Str(s) if s.is_empty() => Node::anonymous("").with_meta_of(call_site),
        FunctionValue::Str(s) => Node::anonymous(s).with_meta_of(call_site),
        FunctionValue::Num(n) => {
            Node::anonymous(crate::output::format_number(n, 8)).with_meta_of(call_site)
        }
        FunctionValue::Nothing => Node::anonymous("").with_meta_of(call_site),
        FunctionValue::Passthrough => unreachable!("handled by the caller"),
    }
}

/// Evaluates and cleans up arguments before a builtin sees them: comments
/// stripped, top-level parentheses unwrapped, one-element expressions
/// flattened.  A parenthesized expression wrapping a bare division survives,
/// so `(1/2)` stays a division inside a call under parens-division mode.
fn preprocess_args(args: &[Node], ctx: &mut Context<'_>) -> Result<Vec<Node>> {
    let mut out = Vec::with_capacity(args.len());

    for arg in args {
        let mut value = arg.eval(ctx)?;

        while let NodeKind::Paren(inner) = value.kind {
            value = *inner;
        }

        if matches!(value.kind, NodeKind::Comment(_)) {
            continue;
        }

        if let NodeKind::Expression(expr) = &value.kind {
            let sub: Vec<Node> = expr
                .value
                .iter()
                .filter(|n| !matches!(n.kind, NodeKind::Comment(_)))
                .cloned()
                .collect();

            if sub.len() == 1 {
                let keeps_division = expr.parens
                    && matches!(&sub[0].kind, NodeKind::Operation(op) if op.op == Operator::Divide);
                if keeps_division {
                    out.push(value);
                } else {
                    out.push(sub.into_iter().next().unwrap());
                }
            } else {
                let mut flattened = expr.clone();
                flattened.value = sub;
                out.push(Node::new(
                    NodeKind::Expression(flattened),
                    value.index,
                    value.file_info.clone(),
                ));
            }
            continue;
        }

        out.push(value);
    }

    Ok(out)
}

// Argument coercion helpers shared by the builtin modules.

pub(crate) fn expect_dimension(node: &Node) -> Result<Dimension> {
    match &node.kind {
        NodeKind::Dimension(d) => Ok(d.clone()),
        NodeKind::Anonymous(a) => a
            .to_dimension()
            .ok_or_else(|| LessError::argument("argument must be a number")),
        _ => Err(LessError::argument("argument must be a number")),
    }
}

pub(crate) fn expect_color(node: &Node) -> Result<Color> {
    match &node.kind {
        NodeKind::Color(c) => Ok(c.clone()),
        NodeKind::Keyword(k) => Color::from_keyword(&k.value)
            .ok_or_else(|| LessError::argument(format!("`{}` is not a color", k.value))),
        _ => Err(LessError::argument("argument must be a color")),
    }
}

/// A plain number; percentages read as fractions.
pub(crate) fn number(node: &Node) -> Result<f64> {
    let d = expect_dimension(node)?;
    if d.unit.to_unit_string() == "%" {
        Ok(d.value / 100.0)
    } else {
        Ok(d.value)
    }
}

/// A channel-like number; percentages scale to `size`.
pub(crate) fn scaled(node: &Node, size: f64) -> Result<f64> {
    let d = expect_dimension(node)?;
    if d.unit.to_unit_string() == "%" {
        Ok(d.value * size / 100.0)
    } else {
        Ok(d.value)
    }
}

pub(crate) fn string_value(node: &Node) -> String {
    match &node.kind {
        NodeKind::Quoted(q) => q.value.clone(),
        _ => node.to_css_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn call(name: &str, args: Vec<Node>) -> Node {
        Node::from_kind(NodeKind::Call(Box::new(Call::new(name, args))))
    }

    #[test]
    fn unknown_function_passes_through() {
        let mut ctx = Context::for_tests();
        let node = call("translate", vec![Node::dimension(4.0, "px")]);
        let result = node.eval(&mut ctx).unwrap();
        assert_eq!(result.to_css_string(), "translate(4px)");
    }

    #[test]
    fn calc_keeps_math_off() {
        use crate::expression::Operation;

        let mut ctx = Context::for_tests();
        ctx.options.math = crate::context::MathMode::ParensDivision;

        let sum = Node::from_kind(NodeKind::Operation(Box::new(Operation::new(
            Operator::Add,
            Node::dimension(1.0, "px"),
            Node::dimension(2.0, "px"),
            true,
        ))));
        let node = call("calc", vec![sum]);
        let result = node.eval(&mut ctx).unwrap();
        assert_eq!(result.to_css_string(), "calc(1px + 2px)");
        assert!(ctx.math_on);
        assert!(!ctx.in_calc);
    }

    #[test]
    fn math_state_is_restored_after_calls() {
        let mut ctx = Context::for_tests();
        let before = ctx.math_on;
        let node = call("ceil", vec![Node::number(0.4)]);
        let result = node.eval(&mut ctx).unwrap();
        assert_eq!(result.to_css_string(), "1");
        assert_eq!(ctx.math_on, before);
    }

    #[test]
    fn comments_are_stripped_from_arguments() {
        let mut ctx = Context::for_tests();
        let comment = Node::from_kind(NodeKind::Comment(crate::node::Comment {
            text: "/* x */".to_string(),
            is_line_comment: false,
        }));
        let node = call("length", vec![Node::keyword("a"), comment]);
        let result = node.eval(&mut ctx).unwrap();
        assert_eq!(result.to_css_string(), "1");
    }
}
