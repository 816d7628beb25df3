//! Type predicates and unit manipulation.

use std::collections::HashMap;

use super::{eager, expect_dimension, FnContext, FunctionDefinition, FunctionValue};
use crate::dimension::{Dimension, Unit};
use crate::error::{LessError, Result};
use crate::node::{Node, NodeKind};
use crate::value::Keyword;

pub(super) fn register(map: &mut HashMap<&'static str, FunctionDefinition>) {
    map.insert("iscolor", eager(|f, a| predicate(f, a, is_color)));
    map.insert("isnumber", eager(|f, a| predicate(f, a, is_number)));
    map.insert("isstring", eager(|f, a| {
        predicate(f, a, |n| matches!(n.kind, NodeKind::Quoted(_)))
    }));
    map.insert("iskeyword", eager(|f, a| {
        predicate(f, a, |n| matches!(n.kind, NodeKind::Keyword(_)))
    }));
    map.insert("isurl", eager(|f, a| {
        predicate(f, a, |n| matches!(n.kind, NodeKind::Url(_)))
    }));
    map.insert("ispixel", eager(|f, a| predicate(f, a, |n| has_unit(n, "px"))));
    map.insert("isem", eager(|f, a| predicate(f, a, |n| has_unit(n, "em"))));
    map.insert("ispercentage", eager(|f, a| {
        predicate(f, a, |n| has_unit(n, "%"))
    }));
    map.insert("isruleset", eager(|f, a| {
        predicate(f, a, |n| matches!(n.kind, NodeKind::DetachedRuleset(_)))
    }));
    map.insert("isunit", eager(isunit));
    map.insert("unit", eager(unit));
    map.insert("get-unit", eager(get_unit));
    map.insert("convert", eager(convert));
}

fn predicate(
    fctx: &mut FnContext<'_, '_>,
    args: &[Node],
    test: fn(&Node) -> bool,
) -> Result<FunctionValue> {
    let Some(value) = args.first() else {
        return Err(LessError::argument("expected one argument"));
    };
    Ok(FunctionValue::Node(fctx.node(Keyword::truth(test(value)))))
}

fn is_color(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Color(_) => true,
        NodeKind::Keyword(k) => crate::color::Color::from_keyword(&k.value).is_some(),
        _ => false,
    }
}

fn is_number(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Dimension(_))
}

fn has_unit(node: &Node, unit: &str) -> bool {
    matches!(&node.kind, NodeKind::Dimension(d) if d.unit.to_unit_string() == unit)
}

fn unit_text(node: &Node) -> String {
    match &node.kind {
        NodeKind::Keyword(k) => k.value.clone(),
        NodeKind::Quoted(q) => q.value.clone(),
        _ => node.to_css_string(),
    }
}

fn isunit(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(value) = args.first() else {
        return Err(LessError::argument("isunit() expects a value and a unit"));
    };
    let Some(unit) = args.get(1) else {
        return Err(LessError::argument("isunit() expects a value and a unit"));
    };

    let result = matches!(
        &value.kind,
        NodeKind::Dimension(d) if d.unit.to_unit_string() == unit_text(unit)
    );
    Ok(FunctionValue::Node(fctx.node(Keyword::truth(result))))
}

/// Replaces or strips the unit without converting the value.
fn unit(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(value) = args.first() else {
        return Err(LessError::argument("unit() expects a dimension"));
    };
    let d = expect_dimension(value)?;

    let unit = match args.get(1) {
        Some(u) => Unit::single(&unit_text(u)),
        None => Unit::default(),
    };
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension {
            value: d.value,
            unit,
        },
    ))))
}

fn get_unit(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(value) = args.first() else {
        return Err(LessError::argument("get-unit() expects a dimension"));
    };
    let d = expect_dimension(value)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Anonymous(
        crate::value::Anonymous::new(d.unit.to_unit_string()),
    ))))
}

fn convert(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(value) = args.first() else {
        return Err(LessError::argument("convert() expects a dimension and a unit"));
    };
    let Some(unit) = args.get(1) else {
        return Err(LessError::argument("convert() expects a dimension and a unit"));
    };

    let d = expect_dimension(value)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        d.convert_to(&unit_text(unit)),
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::functions::Call;

    fn eval_call(name: &str, args: Vec<Node>) -> Node {
        let mut ctx = Context::for_tests();
        Node::from_kind(NodeKind::Call(Box::new(Call::new(name, args))))
            .eval(&mut ctx)
            .unwrap()
    }

    #[test]
    fn iscolor_accepts_keywords() {
        assert_eq!(
            eval_call("iscolor", vec![Node::keyword("red")]).to_css_string(),
            "true"
        );
        assert_eq!(
            eval_call("iscolor", vec![Node::keyword("solid")]).to_css_string(),
            "false"
        );
    }

    #[test]
    fn unit_swaps_without_conversion() {
        assert_eq!(
            eval_call(
                "unit",
                vec![Node::dimension(5.0, "px"), Node::keyword("em")]
            )
            .to_css_string(),
            "5em"
        );
    }

    #[test]
    fn convert_changes_value() {
        assert_eq!(
            eval_call(
                "convert",
                vec![Node::dimension(1.0, "in"), Node::keyword("px")]
            )
            .to_css_string(),
            "96px"
        );
    }

    #[test]
    fn ispercentage() {
        assert_eq!(
            eval_call("ispercentage", vec![Node::dimension(50.0, "%")]).to_css_string(),
            "true"
        );
    }
}
