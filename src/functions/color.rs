//! Color constructors and channel accessors.

use std::collections::HashMap;

use super::{eager, expect_color, expect_dimension, number, scaled, FnContext, FunctionDefinition, FunctionValue};
use crate::color::{Color, Hsla, Hsva};
use crate::dimension::Dimension;
use crate::error::{LessError, Result};
use crate::node::{Node, NodeKind};

pub(super) fn register(map: &mut HashMap<&'static str, FunctionDefinition>) {
    map.insert("rgb", eager(rgb));
    map.insert("rgba", eager(rgba));
    map.insert("hsl", eager(hsl));
    map.insert("hsla", eager(hsla));
    map.insert("hsv", eager(hsv));
    map.insert("hsva", eager(hsva));
    map.insert("argb", eager(argb));
    map.insert("color", eager(color));
    map.insert("hue", eager(hue));
    map.insert("saturation", eager(saturation));
    map.insert("lightness", eager(lightness));
    map.insert("red", eager(|f, a| channel(f, a, 0)));
    map.insert("green", eager(|f, a| channel(f, a, 1)));
    map.insert("blue", eager(|f, a| channel(f, a, 2)));
    map.insert("alpha", eager(alpha));
    map.insert("luma", eager(luma));
    map.insert("luminance", eager(luminance));
}

fn nth(args: &[Node], i: usize, what: &str) -> Result<Node> {
    args.get(i)
        .cloned()
        .ok_or_else(|| LessError::argument(format!("missing {what} argument")))
}

fn color_node(fctx: &FnContext<'_, '_>, c: Color) -> FunctionValue {
    FunctionValue::Node(fctx.node(NodeKind::Color(c)))
}

fn rgb(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    rgba_impl(fctx, args, false)
}

fn rgba(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    rgba_impl(fctx, args, true)
}

fn rgba_impl(
    fctx: &mut FnContext<'_, '_>,
    args: &[Node],
    with_alpha: bool,
) -> Result<FunctionValue> {
    let r = scaled(&nth(args, 0, "red")?, 255.0)?;
    let g = scaled(&nth(args, 1, "green")?, 255.0)?;
    let b = scaled(&nth(args, 2, "blue")?, 255.0)?;
    let a = if with_alpha {
        number(&nth(args, 3, "alpha")?)?
    } else {
        1.0
    };
    Ok(color_node(fctx, Color::new([r, g, b], a.clamp(0.0, 1.0))))
}

fn hsl(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    hsla_impl(fctx, args, false)
}

fn hsla(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    hsla_impl(fctx, args, true)
}

fn hsla_impl(
    fctx: &mut FnContext<'_, '_>,
    args: &[Node],
    with_alpha: bool,
) -> Result<FunctionValue> {
    let h = expect_dimension(&nth(args, 0, "hue")?)?.value;
    let s = number(&nth(args, 1, "saturation")?)?;
    let l = number(&nth(args, 2, "lightness")?)?;
    let a = if with_alpha {
        number(&nth(args, 3, "alpha")?)?
    } else {
        1.0
    };
    Ok(color_node(fctx, Color::from_hsl(Hsla { h, s, l, a })))
}

fn hsv(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    hsva_impl(fctx, args, false)
}

fn hsva(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    hsva_impl(fctx, args, true)
}

fn hsva_impl(
    fctx: &mut FnContext<'_, '_>,
    args: &[Node],
    with_alpha: bool,
) -> Result<FunctionValue> {
    let h = expect_dimension(&nth(args, 0, "hue")?)?.value;
    let s = number(&nth(args, 1, "saturation")?)?;
    let v = number(&nth(args, 2, "value")?)?;
    let a = if with_alpha {
        number(&nth(args, 3, "alpha")?)?
    } else {
        1.0
    };
    Ok(color_node(fctx, Color::from_hsv(Hsva { h, s, v, a })))
}

/// `#aarrggbb` form, used by older IE filters.
fn argb(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let c = expect_color(&nth(args, 0, "color")?)?;
    let byte = |v: f64| (v.clamp(0.0, 255.0).round() as u8);
    let text = format!(
        "#{:02x}{:02x}{:02x}{:02x}",
        (c.clamped_alpha() * 255.0).round() as u8,
        byte(c.rgb[0]),
        byte(c.rgb[1]),
        byte(c.rgb[2]),
    );
    Ok(FunctionValue::Node(
        fctx.node(NodeKind::Anonymous(crate::value::Anonymous::new(text))),
    ))
}

/// Parses a color out of a string, e.g. `color("#aabbcc")`.
fn color(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let arg = nth(args, 0, "color string")?;
    let text = match &arg.kind {
        NodeKind::Quoted(q) => q.value.clone(),
        NodeKind::Keyword(k) => k.value.clone(),
        _ => {
            return Err(LessError::argument(
                "argument must be a string or a color keyword",
            ))
        }
    };

    let parsed = if text.starts_with('#') {
        Color::from_hex(&text)?
    } else {
        Color::from_keyword(&text)
            .ok_or_else(|| LessError::argument(format!("`{text}` is not a color")))?
    };
    Ok(color_node(fctx, parsed))
}

fn hue(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let c = expect_color(&nth(args, 0, "color")?)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension::new(c.to_hsl().h.round()),
    ))))
}

fn saturation(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let c = expect_color(&nth(args, 0, "color")?)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension::with_unit((c.to_hsl().s * 100.0).round(), "%"),
    ))))
}

fn lightness(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let c = expect_color(&nth(args, 0, "color")?)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension::with_unit((c.to_hsl().l * 100.0).round(), "%"),
    ))))
}

fn channel(fctx: &mut FnContext<'_, '_>, args: &[Node], i: usize) -> Result<FunctionValue> {
    let c = expect_color(&nth(args, 0, "color")?)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension::new(c.rgb[i].clamp(0.0, 255.0)),
    ))))
}

fn alpha(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let c = expect_color(&nth(args, 0, "color")?)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension::new(c.clamped_alpha()),
    ))))
}

fn luma(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let c = expect_color(&nth(args, 0, "color")?)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension::with_unit(
            (c.luma() * c.clamped_alpha() * 100.0 * 1e8).round() / 1e8,
            "%",
        ),
    ))))
}

fn luminance(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let c = expect_color(&nth(args, 0, "color")?)?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Dimension(
        Dimension::with_unit(
            (c.luminance() * c.clamped_alpha() * 100.0 * 1e8).round() / 1e8,
            "%",
        ),
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
    fn rgb_builds_a_color() {
        let result = eval_call(
            "rgb",
            vec![Node::number(255.0), Node::number(0.0), Node::number(0.0)],
        );
        assert_eq!(result.to_css_string(), "#ff0000");
    }

    #[test]
    fn rgba_with_percent_channels() {
        let result = eval_call(
            "rgba",
            vec![
                Node::dimension(100.0, "%"),
                Node::number(0.0),
                Node::number(0.0),
                Node::number(0.5),
            ],
        );
        assert_eq!(result.to_css_string(), "rgba(255, 0, 0, 0.5)");
    }

    #[test]
    fn hue_of_a_keyword_color() {
        let result = eval_call("hue", vec![Node::keyword("red")]);
        assert_eq!(result.to_css_string(), "0");
    }

    #[test]
    fn lightness_is_a_percentage() {
        let result = eval_call("lightness", vec![Node::keyword("white")]);
        assert_eq!(result.to_css_string(), "100%");
    }
}
