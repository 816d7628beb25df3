//! Color operations: HSL adjustments, fading, spinning, and mixing.

use std::collections::HashMap;

use super::{eager, expect_color, number, FnContext, FunctionDefinition, FunctionValue};
use crate::color::Color;
use crate::error::{LessError, Result};
use crate::node::{Node, NodeKind};

pub(super) fn register(map: &mut HashMap<&'static str, FunctionDefinition>) {
    map.insert("saturate", eager(|f, a| adjust_hsl(f, a, Channel::S, 1.0)));
    map.insert(
        "desaturate",
        eager(|f, a| adjust_hsl(f, a, Channel::S, -1.0)),
    );
    map.insert("lighten", eager(|f, a| adjust_hsl(f, a, Channel::L, 1.0)));
    map.insert("darken", eager(|f, a| adjust_hsl(f, a, Channel::L, -1.0)));
    map.insert("fadein", eager(|f, a| fade_by(f, a, 1.0)));
    map.insert("fadeout", eager(|f, a| fade_by(f, a, -1.0)));
    map.insert("fade", eager(fade));
    map.insert("spin", eager(spin));
    map.insert("mix", eager(mix));
    map.insert("tint", eager(tint));
    map.insert("shade", eager(shade));
    map.insert("greyscale", eager(greyscale));
    map.insert("contrast", eager(contrast));
}

enum Channel {
    S,
    L,
}

fn args_color_amount(args: &[Node]) -> Result<(Color, f64, bool)> {
    let color = args
        .first()
        .ok_or_else(|| LessError::argument("missing color argument"))
        .and_then(expect_color)?;
    let amount = match args.get(1) {
        Some(n) => number(n)?,
        None => 0.1,
    };
    let relative = matches!(
        args.get(2).map(|n| &n.kind),
        Some(NodeKind::Keyword(k)) if k.value == "relative"
    );
    Ok((color, amount, relative))
}

fn adjust_hsl(
    fctx: &mut FnContext<'_, '_>,
    args: &[Node],
    channel: Channel,
    sign: f64,
) -> Result<FunctionValue> {
    // `saturate` doubles as a plain CSS filter; a non-color argument means
    // the call was the CSS one.
    let Some(first) = args.first() else {
        return Ok(FunctionValue::Passthrough);
    };
    if expect_color(first).is_err() {
        return Ok(FunctionValue::Passthrough);
    }

    let (color, amount, relative) = args_color_amount(args)?;
    let mut hsl = color.to_hsl();

    let target = match channel {
        Channel::S => &mut hsl.s,
        Channel::L => &mut hsl.l,
    };
    if relative {
        *target += *target * amount * sign;
    } else {
        *target += amount * sign;
    }
    *target = target.clamp(0.0, 1.0);

    Ok(FunctionValue::Node(
        fctx.node(NodeKind::Color(Color::from_hsl(hsl))),
    ))
}

fn fade_by(fctx: &mut FnContext<'_, '_>, args: &[Node], sign: f64) -> Result<FunctionValue> {
    let (color, amount, relative) = args_color_amount(args)?;
    let mut alpha = color.clamped_alpha();
    if relative {
        alpha += alpha * amount * sign;
    } else {
        alpha += amount * sign;
    }
    let mut out = color;
    out.alpha = alpha.clamp(0.0, 1.0);
    out.original_text = None;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Color(out))))
}

fn fade(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let (color, amount, _) = args_color_amount(args)?;
    let mut out = color;
    out.alpha = amount.clamp(0.0, 1.0);
    out.original_text = None;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Color(out))))
}

fn spin(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let color = args
        .first()
        .ok_or_else(|| LessError::argument("missing color argument"))
        .and_then(expect_color)?;
    let degrees = match args.get(1) {
        Some(n) => super::expect_dimension(n)?.value,
        None => 0.0,
    };

    let mut hsl = color.to_hsl();
    hsl.h = (hsl.h + degrees).rem_euclid(360.0);
    Ok(FunctionValue::Node(
        fctx.node(NodeKind::Color(Color::from_hsl(hsl))),
    ))
}

fn mix(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let c1 = args
        .first()
        .ok_or_else(|| LessError::argument("mix() expects two colors"))
        .and_then(expect_color)?;
    let c2 = args
        .get(1)
        .ok_or_else(|| LessError::argument("mix() expects two colors"))
        .and_then(expect_color)?;
    let weight = match args.get(2) {
        Some(n) => number(n)?,
        None => 0.5,
    };

    Ok(FunctionValue::Node(
        fctx.node(NodeKind::Color(mix_colors(&c1, &c2, weight))),
    ))
}

/// Alpha-aware weighted mix, the Sass-compatible formula.
fn mix_colors(c1: &Color, c2: &Color, p: f64) -> Color {
    let w = p * 2.0 - 1.0;
    let a = c1.clamped_alpha() - c2.clamped_alpha();

    let w1 = (if w * a == -1.0 { w } else { (w + a) / (1.0 + w * a) } + 1.0) / 2.0;
    let w2 = 1.0 - w1;

    Color::new(
        [
            c1.rgb[0] * w1 + c2.rgb[0] * w2,
            c1.rgb[1] * w1 + c2.rgb[1] * w2,
            c1.rgb[2] * w1 + c2.rgb[2] * w2,
        ],
        c1.clamped_alpha() * p + c2.clamped_alpha() * (1.0 - p),
    )
}

fn tint(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    mix_with(fctx, args, Color::new([255.0, 255.0, 255.0], 1.0))
}

fn shade(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    mix_with(fctx, args, Color::new([0.0, 0.0, 0.0], 1.0))
}

fn mix_with(
    fctx: &mut FnContext<'_, '_>,
    args: &[Node],
    base: Color,
) -> Result<FunctionValue> {
    let color = args
        .first()
        .ok_or_else(|| LessError::argument("missing color argument"))
        .and_then(expect_color)?;
    let weight = match args.get(1) {
        Some(n) => number(n)?,
        None => 0.5,
    };
    Ok(FunctionValue::Node(
        fctx.node(NodeKind::Color(mix_colors(&base, &color, weight))),
    ))
}

fn greyscale(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let color = args
        .first()
        .ok_or_else(|| LessError::argument("missing color argument"))
        .and_then(expect_color)?;
    let mut hsl = color.to_hsl();
    hsl.s = 0.0;
    Ok(FunctionValue::Node(
        fctx.node(NodeKind::Color(Color::from_hsl(hsl))),
    ))
}

/// Picks whichever of two candidates reads better on the given background.
fn contrast(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    // A non-color first argument means this is the CSS `contrast()` filter.
    let Some(first) = args.first() else {
        return Ok(FunctionValue::Passthrough);
    };
    let Ok(color) = expect_color(first) else {
        return Ok(FunctionValue::Passthrough);
    };

    let dark = match args.get(1) {
        Some(n) => expect_color(n)?,
        None => Color::new([0.0, 0.0, 0.0], 1.0),
    };
    let light = match args.get(2) {
        Some(n) => expect_color(n)?,
        None => Color::new([255.0, 255.0, 255.0], 1.0),
    };
    let threshold = match args.get(3) {
        Some(n) => number(n)?,
        None => 0.43,
    };

    // Normalize so `dark` really is the darker of the two.
    let (dark, light) = if dark.luma() > light.luma() {
        (light, dark)
    } else {
        (dark, light)
    };

    let chosen = if color.luma() < threshold { light } else { dark };
    Ok(FunctionValue::Node(fctx.node(NodeKind::Color(chosen))))
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
    fn lighten_moves_lightness_up() {
        let result = eval_call(
            "lighten",
            vec![Node::color([100.0, 100.0, 100.0], 1.0), Node::dimension(10.0, "%")],
        );
        match &result.kind {
            NodeKind::Color(c) => assert!(c.to_hsl().l > 0.4),
            _ => panic!("expected a color"),
        }
    }

    #[test]
    fn mix_half_and_half() {
        let result = eval_call(
            "mix",
            vec![
                Node::color([255.0, 0.0, 0.0], 1.0),
                Node::color([0.0, 0.0, 255.0], 1.0),
            ],
        );
        assert_eq!(result.to_css_string(), "#800080");
    }

    #[test]
    fn contrast_picks_light_on_dark() {
        let result = eval_call("contrast", vec![Node::color([0.0, 0.0, 0.0], 1.0)]);
        assert_eq!(result.to_css_string(), "#ffffff");
    }

    #[test]
    fn contrast_passes_through_non_colors() {
        let result = eval_call("contrast", vec![Node::dimension(175.0, "%")]);
        assert_eq!(result.to_css_string(), "contrast(175%)");
    }
}
