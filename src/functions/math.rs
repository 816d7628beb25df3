//! Numeric functions.

use std::collections::HashMap;

use super::{eager, expect_dimension, FnContext, FunctionDefinition, FunctionValue};
use crate::dimension::{Dimension, Unit};
use crate::error::{LessError, Result};
use crate::node::{Node, NodeKind};

pub(super) fn register(map: &mut HashMap<&'static str, FunctionDefinition>) {
    map.insert("ceil", eager(|f, a| keep_unit(f, a, f64::ceil)));
    map.insert("floor", eager(|f, a| keep_unit(f, a, f64::floor)));
    map.insert("sqrt", eager(|f, a| keep_unit(f, a, f64::sqrt)));
    map.insert("abs", eager(|f, a| keep_unit(f, a, f64::abs)));
    map.insert("sin", eager(|f, a| trig(f, a, f64::sin)));
    map.insert("cos", eager(|f, a| trig(f, a, f64::cos)));
    map.insert("tan", eager(|f, a| trig(f, a, f64::tan)));
    map.insert("asin", eager(|f, a| arc(f, a, f64::asin)));
    map.insert("acos", eager(|f, a| arc(f, a, f64::acos)));
    map.insert("atan", eager(|f, a| arc(f, a, f64::atan)));
    map.insert("pi", eager(pi));
    map.insert("pow", eager(pow));
    map.insert("mod", eager(mod_));
    map.insert("round", eager(round));
    map.insert("min", eager(|f, a| min_max(f, a, true)));
    map.insert("max", eager(|f, a| min_max(f, a, false)));
    map.insert("percentage", eager(percentage));
}

fn first_dimension(args: &[Node]) -> Result<Dimension> {
    let Some(node) = args.first() else {
        return Err(LessError::argument("expected a number argument"));
    };
    expect_dimension(node)
}

fn keep_unit(
    fctx: &mut FnContext<'_, '_>,
    args: &[Node],
    f: fn(f64) -> f64,
) -> Result<FunctionValue> {
    let d = first_dimension(args)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension {
            value: f(d.value),
            unit: d.unit,
        },
    ))))
}

/// Trigonometric input: unit-aware, normalized to radians first.
fn trig(fctx: &mut FnContext<'_, '_>, args: &[Node], f: fn(f64) -> f64) -> Result<FunctionValue> {
    let d = first_dimension(args)?.unify();
    Ok(FunctionValue::Node(
        fctx.node(NodeKind::Dimension(Dimension::new(f(d.value)))),
    ))
}

fn arc(fctx: &mut FnContext<'_, '_>, args: &[Node], f: fn(f64) -> f64) -> Result<FunctionValue> {
    let d = first_dimension(args)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension::with_unit(f(d.value), "rad"),
    ))))
}

fn pi(fctx: &mut FnContext<'_, '_>, _args: &[Node]) -> Result<FunctionValue> {
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension::new(std::f64::consts::PI),
    ))))
}

fn pow(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    if args.len() < 2 {
        return Err(LessError::argument("pow() expects two numbers"));
    }
    let x = expect_dimension(&args[0])?;
    let y = expect_dimension(&args[1])?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension {
            value: x.value.powf(y.value),
            unit: x.unit,
        },
    ))))
}

fn mod_(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    if args.len() < 2 {
        return Err(LessError::argument("mod() expects two numbers"));
    }
    let a = expect_dimension(&args[0])?;
    let b = expect_dimension(&args[1])?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension {
            value: a.value % b.value,
            unit: a.unit,
        },
    ))))
}

fn round(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let d = first_dimension(args)?;
    let fraction = match args.get(1) {
        Some(n) => expect_dimension(n)?.value.max(0.0) as i32,
        None => 0,
    };
    let factor = 10f64.powi(fraction);
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension {
            value: (d.value * factor).round() / factor,
            unit: d.unit,
        },
    ))))
}

/// `min`/`max` over any number of dimensions.  Mixed, unconvertible units
/// make the whole call pass through as CSS, which has its own `min()` and
/// `max()`.
fn min_max(
    _fctx: &mut FnContext<'_, '_>,
    args: &[Node],
    minimum: bool,
) -> Result<FunctionValue> {
    if args.is_empty() {
        return Err(LessError::argument("expected at least one argument"));
    }

    let mut best: Option<(usize, Dimension)> = None;
    for (i, arg) in args.iter().enumerate() {
        let NodeKind::Dimension(d) = &arg.kind else {
            return Ok(FunctionValue::Passthrough);
        };

        match &best {
            None => best = Some((i, d.clone())),
            Some((_, current)) => {
                let Some(ordering) = d.compare(current) else {
                    return Ok(FunctionValue::Passthrough);
                };
                let wins = if minimum {
                    ordering == std::cmp::Ordering::Less
                } else {
                    ordering == std::cmp::Ordering::Greater
                };
                if wins {
                    best = Some((i, d.clone()));
                }
            }
        }
    }

    let (i, _) = best.expect("args checked non-empty");
    Ok(FunctionValue::Node(args[i].clone()))
}

fn percentage(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let d = first_dimension(args)?;
    if !d.unit.is_empty() && d.unit.to_unit_string() != "%" {
        return Err(LessError::argument(
            "percentage() expects a unitless number",
        ));
    }
    let value = if d.unit.to_unit_string() == "%" {
        d.value
    } else {
        d.value * 100.0
    };
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension {
            value,
            unit: Unit::single("%"),
        },
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
    fn ceil_keeps_unit() {
        assert_eq!(
            eval_call("ceil", vec![Node::dimension(2.1, "px")]).to_css_string(),
            "3px"
        );
    }

    #[test]
    fn sin_understands_degrees() {
        let result = eval_call("sin", vec![Node::dimension(90.0, "deg")]);
        match &result.kind {
            NodeKind::Dimension(d) => {
                assert!((d.value - 1.0).abs() < 1e-9);
                assert!(d.unit.is_empty());
            }
            _ => panic!("expected a dimension"),
        }
    }

    #[test]
    fn min_converts_units() {
        assert_eq!(
            eval_call("min", vec![Node::dimension(1.0, "in"), Node::dimension(50.0, "px")])
                .to_css_string(),
            "50px"
        );
    }

    #[test]
    fn min_passes_through_on_mixed_units() {
        assert_eq!(
            eval_call("min", vec![Node::dimension(1.0, "px"), Node::dimension(2.0, "s")])
                .to_css_string(),
            "min(1px, 2s)"
        );
    }

    #[test]
    fn percentage_scales() {
        assert_eq!(
            eval_call("percentage", vec![Node::number(0.5)]).to_css_string(),
            "50%"
        );
    }

    #[test]
    fn round_with_places() {
        assert_eq!(
            eval_call(
                "round",
                vec![Node::number(1.0052), Node::number(2.0)]
            )
            .to_css_string(),
            "1.01"
        );
    }
}
