//! List functions: `length`, `extract`, `range`, and `each`.

use std::collections::HashMap;
use std::rc::Rc;

use super::{eager, expect_dimension, lazy, FnContext, FunctionDefinition, FunctionValue};
use crate::context::Frame;
use crate::declaration::Declaration;
use crate::dimension::Dimension;
use crate::error::{LessError, Result};
use crate::expression::Expression;
use crate::node::{Node, NodeKind};
use crate::ruleset::Ruleset;
use crate::selector::Selector;

pub(super) fn register(map: &mut HashMap<&'static str, FunctionDefinition>) {
    map.insert("length", eager(length));
    map.insert("extract", eager(extract));
    map.insert("range", eager(range));
    map.insert("each", lazy(each));
}

fn items_of(node: &Node) -> Vec<Node> {
    match &node.kind {
        NodeKind::Value(v) => v.value.clone(),
        NodeKind::Expression(e) => e.value.clone(),
        _ => vec![node.clone()],
    }
}

fn length(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(list) = args.first() else {
        return Err(LessError::argument("length() expects a list"));
    };
    let n = items_of(list).len();
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension::new(n as f64),
    ))))
}

/// One-based indexing, like the rest of LESS.
fn extract(_fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(list) = args.first() else {
        return Err(LessError::argument("extract() expects a list and an index"));
    };
    let Some(index_node) = args.get(1) else {
        return Err(LessError::argument("extract() expects a list and an index"));
    };

    let index = expect_dimension(index_node)?.value;
    if index.fract() != 0.0 || index < 1.0 {
        return Ok(FunctionValue::Passthrough);
    }

    let items = items_of(list);
    match items.get(index as usize - 1) {
        Some(item) => Ok(FunctionValue::Node(item.clone())),
        None => Ok(FunctionValue::Passthrough),
    }
}

fn range(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let (start, end, step) = match args.len() {
        0 => return Err(LessError::argument("range() expects an end value")),
        1 => (1.0, expect_dimension(&args[0])?, 1.0),
        2 => (
            expect_dimension(&args[0])?.value,
            expect_dimension(&args[1])?,
            1.0,
        ),
        _ => (
            expect_dimension(&args[0])?.value,
            expect_dimension(&args[1])?,
            expect_dimension(&args[2])?.value,
        ),
    };

    if step <= 0.0 {
        return Err(LessError::argument("range() step must be positive"));
    }

    let mut items = Vec::new();
    let mut current = start;
    while current <= end.value {
        items.push(fctx.node(NodeKind::Dimension(Dimension {
            value: current,
            unit: end.unit.clone(),
        })));
        current += step;
    }

    Ok(FunctionValue::Node(
        fctx.node(NodeKind::Expression(Expression::new(items))),
    ))
}

/// Calls a detached ruleset once per list item, binding `@value`, `@key`,
/// and `@index` in each iteration's scope.  The collected rules come back
/// as a `&`-selector ruleset, which the calling ruleset folds into itself.
fn each(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(list_arg) = args.first() else {
        return Err(LessError::argument("each() expects a list and a ruleset"));
    };
    let Some(ruleset_arg) = args.get(1) else {
        return Err(LessError::argument("each() expects a list and a ruleset"));
    };

    let list = list_arg.eval(fctx.ctx)?;
    let body = ruleset_arg.eval(fctx.ctx)?;

    let body_rules = match &body.kind {
        NodeKind::DetachedRuleset(dr) => match &dr.ruleset.kind {
            NodeKind::Ruleset(rs) => rs.rules.clone(),
            _ => return Err(LessError::argument("each() expects a ruleset")),
        },
        NodeKind::Ruleset(rs) => rs.rules.clone(),
        _ => return Err(LessError::argument("each() expects a ruleset")),
    };

    let registry = Rc::new(crate::functions::FunctionRegistry::inherit(
        &fctx.ctx.current_registry(),
    ));

    let mut collected = Vec::new();
    for (i, item) in items_of(&list).into_iter().enumerate() {
        let (key, value) = match &item.kind {
            NodeKind::Declaration(d) if d.is_variable => {
                (Node::keyword(d.name.clone()), d.value.clone())
            }
            _ => (Node::number((i + 1) as f64), item.clone()),
        };

        let bindings = vec![
            Node::from_kind(NodeKind::Declaration(Box::new(Declaration::variable(
                "@value", value,
            )))),
            Node::from_kind(NodeKind::Declaration(Box::new(Declaration::variable(
                "@key", key,
            )))),
            Node::from_kind(NodeKind::Declaration(Box::new(Declaration::variable(
                "@index",
                Node::number((i + 1) as f64),
            )))),
        ];

        let frame = Rc::new(Frame::from_rules(
            bindings.iter().chain(body_rules.iter()).cloned().collect(),
            Rc::clone(&registry),
        ));

        fctx.ctx.push_frame(frame);
        let mut iteration = Vec::with_capacity(body_rules.len());
        let mut failed = None;
        for rule in &body_rules {
            match rule.eval(fctx.ctx) {
                Ok(evaluated) => iteration.push(evaluated),
                Err(e) => {
                    failed = Some(e);
                    break;
                }
            }
        }
        fctx.ctx.pop_frame();
        if let Some(e) = failed {
            return Err(e);
        }
        collected.extend(iteration);
    }

    let mut ruleset = Ruleset::new(vec![Selector::from_value("&")], collected);
    ruleset.allow_imports = true;
    Ok(FunctionValue::Node(
        fctx.node(NodeKind::Ruleset(Box::new(ruleset))),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::expression::ValueList;
    use crate::functions::Call;

    fn eval_call(name: &str, args: Vec<Node>) -> Node {
        let mut ctx = Context::for_tests();
        Node::from_kind(NodeKind::Call(Box::new(Call::new(name, args))))
            .eval(&mut ctx)
            .unwrap()
    }

    fn list(items: Vec<Node>) -> Node {
        Node::from_kind(NodeKind::Value(ValueList::new(items)))
    }

    #[test]
    fn length_counts_comma_list_items() {
        let result = eval_call(
            "length",
            vec![list(vec![
                Node::keyword("a"),
                Node::keyword("b"),
                Node::keyword("c"),
            ])],
        );
        assert_eq!(result.to_css_string(), "3");
    }

    #[test]
    fn extract_is_one_based() {
        let result = eval_call(
            "extract",
            vec![
                list(vec![Node::keyword("a"), Node::keyword("b")]),
                Node::number(2.0),
            ],
        );
        assert_eq!(result.to_css_string(), "b");
    }

    #[test]
    fn extract_out_of_range_passes_through() {
        let result = eval_call(
            "extract",
            vec![list(vec![Node::keyword("a")]), Node::number(5.0)],
        );
        assert_eq!(result.to_css_string(), "extract(a, 5)");
    }

    #[test]
    fn range_carries_end_unit() {
        let result = eval_call("range", vec![Node::dimension(3.0, "px")]);
        assert_eq!(result.to_css_string(), "1px 2px 3px");
    }
}
