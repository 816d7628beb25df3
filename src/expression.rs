//! Composite value nodes: space-separated expressions, comma-separated value
//! lists, arithmetic operations, parentheses, and guard conditions.
//!
//! This is where math-mode gating lives.  An [`Operation`] only computes when
//! the context says math is on for its operator; otherwise the evaluated
//! operands are reassembled into a literal operation that passes through to
//! the output.  Parenthesized expressions push the paren stack so that
//! `parens-division` mode can tell `(1/2)` apart from `1/2`.

use std::cmp::Ordering;

use crate::context::{Context, MathMode};
use crate::error::{LessError, Result};
use crate::node::{Node, NodeKind};
use crate::output::{CssContext, Output};
use crate::value::{Keyword, Operator};

/// A space-separated run of values, e.g. `1px solid red`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub value: Vec<Node>,

    /// The expression was written inside parentheses.
    pub parens: bool,

    /// The parentheses wrap an operand of an outer operation; such a wrapper
    /// survives single-element flattening when it guards a division.
    pub parens_in_op: bool,

    pub no_spacing: bool,
}

impl Expression {
    pub fn new(value: Vec<Node>) -> Expression {
        Expression {
            value,
            parens: false,
            parens_in_op: false,
            no_spacing: false,
        }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let math_on = ctx.is_math_on(None);
        let in_parens = self.parens;
        let mut double_paren = false;

        if in_parens {
            ctx.in_parenthesis();
        }

        let result = (|| -> Result<Node> {
            match self.value.len() {
                0 => Ok(node.clone()),
                1 => {
                    if let NodeKind::Expression(inner) = &self.value[0].kind {
                        if inner.parens && !inner.parens_in_op && !ctx.in_calc {
                            double_paren = true;
                        }
                    }
                    self.value[0].eval(ctx)
                }
                _ => {
                    let mut evaluated = Vec::with_capacity(self.value.len());
                    for child in &self.value {
                        evaluated.push(child.eval(ctx)?);
                    }
                    let mut expr = Expression::new(evaluated);
                    expr.no_spacing = self.no_spacing;
                    Ok(Node::new(
                        NodeKind::Expression(expr),
                        node.index,
                        node.file_info.clone(),
                    ))
                }
            }
        })();

        if in_parens {
            ctx.out_of_parenthesis();
        }
        let result = result?;

        // A parenthesized operand whose math did not run keeps its
        // parentheses in the output, so `(1/2)` stays `(1/2)`.
        if self.parens
            && self.parens_in_op
            && !math_on
            && !double_paren
            && !matches!(result.kind, NodeKind::Dimension(_))
        {
            return Ok(Node::new(
                NodeKind::Paren(Box::new(result)),
                node.index,
                node.file_info.clone(),
            ));
        }

        Ok(result)
    }

    pub fn gen_css(&self, ctx: &mut CssContext, out: &mut Output) {
        for (i, child) in self.value.iter().enumerate() {
            child.gen_css(ctx, out);
            if !self.no_spacing && i + 1 < self.value.len() {
                out.add(" ", None, None);
            }
        }
    }
}

/// A comma-separated list of expressions, e.g. `a, b, c`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueList {
    pub value: Vec<Node>,
}

impl ValueList {
    pub fn new(value: Vec<Node>) -> ValueList {
        ValueList { value }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        if self.value.len() == 1 {
            return self.value[0].eval(ctx);
        }

        let mut evaluated = Vec::with_capacity(self.value.len());
        for child in &self.value {
            evaluated.push(child.eval(ctx)?);
        }
        Ok(Node::new(
            NodeKind::Value(ValueList::new(evaluated)),
            node.index,
            node.file_info.clone(),
        ))
    }

    pub fn gen_css(&self, ctx: &mut CssContext, out: &mut Output) {
        let sep = if ctx.compress { "," } else { ", " };
        for (i, child) in self.value.iter().enumerate() {
            child.gen_css(ctx, out);
            if i + 1 < self.value.len() {
                out.add(sep, None, None);
            }
        }
    }
}

/// A binary arithmetic operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op: Operator,
    pub lhs: Node,
    pub rhs: Node,
    pub is_spaced: bool,
}

impl Operation {
    pub fn new(op: Operator, lhs: Node, rhs: Node, is_spaced: bool) -> Operation {
        Operation {
            op,
            lhs,
            rhs,
            is_spaced,
        }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let a = self.lhs.eval(ctx)?;
        let b = self.rhs.eval(ctx)?;

        if !ctx.is_math_on(Some(self.op)) {
            return Ok(Node::new(
                NodeKind::Operation(Box::new(Operation::new(self.op, a, b, self.is_spaced))),
                node.index,
                node.file_info.clone(),
            ));
        }

        let result = operate(self.op, &a, &b, ctx);
        match result {
            Some(Ok(kind)) => Ok(Node::new(kind, node.index, node.file_info.clone())),
            Some(Err(e)) => Err(e.at(node.index, &node.file_info)),
            None => {
                // An unevaluated division on the left keeps the whole
                // operation literal under parens-division.
                let lhs_is_div = matches!(&a.kind, NodeKind::Operation(op) if op.op == Operator::Divide);
                if lhs_is_div && ctx.options.math == MathMode::ParensDivision {
                    return Ok(Node::new(
                        NodeKind::Operation(Box::new(Operation::new(
                            self.op,
                            a,
                            b,
                            self.is_spaced,
                        ))),
                        node.index,
                        node.file_info.clone(),
                    ));
                }
                Err(LessError::operation("operation on an invalid type")
                    .at(node.index, &node.file_info))
            }
        }
    }

    pub fn gen_css(&self, ctx: &mut CssContext, out: &mut Output) {
        self.lhs.gen_css(ctx, out);
        if self.is_spaced {
            out.add(" ", None, None);
        }
        out.add(self.op.symbol(), None, None);
        if self.is_spaced {
            out.add(" ", None, None);
        }
        self.rhs.gen_css(ctx, out);
    }
}

/// Computes `a op b` if both operands are operable.  `None` means the
/// operands do not support arithmetic.
fn operate(
    op: Operator,
    a: &Node,
    b: &Node,
    ctx: &Context<'_>,
) -> Option<Result<NodeKind>> {
    use NodeKind::*;

    let strict = ctx.options.strict_units;

    match (&a.kind, &b.kind) {
        (Dimension(da), Dimension(db)) => {
            Some(da.operate(strict, op, db).map(Dimension))
        }
        (Color(ca), Color(cb)) => Some(ca.operate(op, cb).map(Color)),
        (Dimension(d), Color(c)) => Some(d.to_color().operate(op, c).map(Color)),
        (Color(c), Dimension(d)) => Some(c.operate(op, &d.to_color()).map(Color)),
        (Anonymous(an), Dimension(db)) => an
            .to_dimension()
            .map(|da| da.operate(strict, op, db).map(Dimension)),
        (Dimension(da), Anonymous(an)) => an
            .to_dimension()
            .map(|db| da.operate(strict, op, &db).map(Dimension)),
        (Anonymous(aa), Anonymous(ab)) => match (aa.to_dimension(), ab.to_dimension()) {
            (Some(da), Some(db)) => Some(da.operate(strict, op, &db).map(Dimension)),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn eval_negative(node: &Node, inner: &Node, ctx: &mut Context<'_>) -> Result<Node> {
    if ctx.is_math_on(None) {
        let operation = Operation::new(
            Operator::Multiply,
            Node::number(-1.0).with_meta_of(node),
            inner.clone(),
            false,
        );
        let op_node = Node::new(
            NodeKind::Operation(Box::new(operation)),
            node.index,
            node.file_info.clone(),
        );
        return op_node.eval(ctx);
    }

    let evaluated = inner.eval(ctx)?;
    Ok(Node::new(
        NodeKind::Negative(Box::new(evaluated)),
        node.index,
        node.file_info.clone(),
    ))
}

pub(crate) fn eval_paren(node: &Node, inner: &Node, ctx: &mut Context<'_>) -> Result<Node> {
    ctx.in_parenthesis();
    let result = inner.eval(ctx);
    ctx.out_of_parenthesis();
    Ok(Node::new(
        NodeKind::Paren(Box::new(result?)),
        node.index,
        node.file_info.clone(),
    ))
}

/// Comparison and logical operators usable in guards.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CondOp {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    And,
    Or,
}

impl CondOp {
    pub fn from_symbol(s: &str) -> Option<CondOp> {
        match s {
            "<" => Some(CondOp::Less),
            "<=" | "=<" => Some(CondOp::LessOrEqual),
            ">" => Some(CondOp::Greater),
            ">=" => Some(CondOp::GreaterOrEqual),
            "=" => Some(CondOp::Equal),
            "and" => Some(CondOp::And),
            "or" => Some(CondOp::Or),
            _ => None,
        }
    }
}

/// A guard condition, e.g. `(@a > 0) and (iscolor(@c))`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub op: CondOp,
    pub lhs: Node,
    pub rhs: Node,
    pub negate: bool,
}

impl Condition {
    pub fn new(op: CondOp, lhs: Node, rhs: Node, negate: bool) -> Condition {
        Condition {
            op,
            lhs,
            rhs,
            negate,
        }
    }

    pub fn eval_node(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let value = self.eval_bool(ctx)?;
        Ok(Node::new(
            Keyword::truth(value),
            node.index,
            node.file_info.clone(),
        ))
    }

    pub fn eval_bool(&self, ctx: &mut Context<'_>) -> Result<bool> {
        let result = match self.op {
            CondOp::And => truthy(&self.lhs.eval(ctx)?) && truthy(&self.rhs.eval(ctx)?),
            CondOp::Or => truthy(&self.lhs.eval(ctx)?) || truthy(&self.rhs.eval(ctx)?),
            _ => {
                let a = self.lhs.eval(ctx)?;
                let b = self.rhs.eval(ctx)?;
                match Node::compare(&a, &b) {
                    Some(Ordering::Less) => {
                        matches!(self.op, CondOp::Less | CondOp::LessOrEqual)
                    }
                    Some(Ordering::Equal) => matches!(
                        self.op,
                        CondOp::Equal | CondOp::LessOrEqual | CondOp::GreaterOrEqual
                    ),
                    Some(Ordering::Greater) => {
                        matches!(self.op, CondOp::Greater | CondOp::GreaterOrEqual)
                    }
                    None => false,
                }
            }
        };

        Ok(if self.negate { !result } else { result })
    }
}

fn truthy(node: &Node) -> bool {
    node.is_true_keyword()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn op(sym: &str, lhs: Node, rhs: Node) -> Node {
        Node::from_kind(NodeKind::Operation(Box::new(Operation::new(
            Operator::from_symbol(sym).unwrap(),
            lhs,
            rhs,
            false,
        ))))
    }

    #[test]
    fn multiplication_with_math_on() {
        let mut ctx = Context::for_tests();
        let node = op("*", Node::dimension(10.0, "px"), Node::number(2.0));
        let result = node.eval(&mut ctx).unwrap();
        assert_eq!(result.to_css_string(), "20px");
    }

    #[test]
    fn toplevel_division_stays_literal_in_parens_division_mode() {
        let mut ctx = Context::for_tests();
        let node = op("/", Node::number(1.0), Node::number(2.0));
        let result = node.eval(&mut ctx).unwrap();
        assert_eq!(result.to_css_string(), "1/2");
    }

    #[test]
    fn parenthesized_division_evaluates() {
        let mut ctx = Context::for_tests();
        let division = op("/", Node::number(1.0), Node::number(2.0));
        let mut expr = Expression::new(vec![division]);
        expr.parens = true;
        expr.parens_in_op = true;
        let node = Node::from_kind(NodeKind::Expression(expr));

        let result = node.eval(&mut ctx).unwrap();
        assert_eq!(result.to_css_string(), "0.5");
    }

    #[test]
    fn condition_comparisons() {
        let mut ctx = Context::for_tests();
        let cond = Condition::new(
            CondOp::Greater,
            Node::number(1.0),
            Node::number(0.0),
            false,
        );
        assert!(cond.eval_bool(&mut ctx).unwrap());

        let cond = Condition::new(
            CondOp::Greater,
            Node::number(0.0),
            Node::number(0.0),
            false,
        );
        assert!(!cond.eval_bool(&mut ctx).unwrap());
    }

    #[test]
    fn negated_condition() {
        let mut ctx = Context::for_tests();
        let cond = Condition::new(
            CondOp::Equal,
            Node::keyword("a"),
            Node::keyword("b"),
            true,
        );
        assert!(cond.eval_bool(&mut ctx).unwrap());
    }
}
