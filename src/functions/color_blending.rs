//! Color blending modes, applied channel-wise over normalized values with
//! alpha compositing.

use std::collections::HashMap;

use super::{eager, expect_color, FnContext, FunctionDefinition, FunctionValue};
use crate::color::Color;
use crate::error::{LessError, Result};
use crate::node::{Node, NodeKind};

pub(super) fn register(map: &mut HashMap<&'static str, FunctionDefinition>) {
    map.insert("multiply", eager(|f, a| blend(f, a, multiply)));
    map.insert("screen", eager(|f, a| blend(f, a, screen)));
    map.insert("overlay", eager(|f, a| blend(f, a, overlay)));
    map.insert("softlight", eager(|f, a| blend(f, a, softlight)));
    map.insert("hardlight", eager(|f, a| blend(f, a, hardlight)));
    map.insert("difference", eager(|f, a| blend(f, a, difference)));
    map.insert("exclusion", eager(|f, a| blend(f, a, exclusion)));
    map.insert("average", eager(|f, a| blend(f, a, average)));
    map.insert("negation", eager(|f, a| blend(f, a, negation)));
}

fn blend(
    fctx: &mut FnContext<'_, '_>,
    args: &[Node],
    mode: fn(f64, f64) -> f64,
) -> Result<FunctionValue> {
    if args.len() < 2 {
        return Err(LessError::argument("blending expects two colors"));
    }
    let backdrop = expect_color(&args[0])?;
    let source = expect_color(&args[1])?;

    Ok(FunctionValue::Node(fctx.node(NodeKind::Color(
        blend_colors(mode, &backdrop, &source),
    ))))
}

pub(crate) fn blend_colors(mode: fn(f64, f64) -> f64, backdrop: &Color, source: &Color) -> Color {
    let ab = backdrop.clamped_alpha();
    let as_ = source.clamped_alpha();
    let ar = as_ + ab * (1.0 - as_);

    let mut rgb = [0.0; 3];
    for i in 0..3 {
        let cb = backdrop.rgb[i].clamp(0.0, 255.0) / 255.0;
        let cs = source.rgb[i].clamp(0.0, 255.0) / 255.0;
        let mut cr = mode(cb, cs);
        if ar != 0.0 {
            cr = (as_ * cs + ab * (cb - as_ * (cb + cs - cr))) / ar;
        }
        rgb[i] = cr * 255.0;
    }

    Color::new(rgb, ar)
}

fn multiply(cb: f64, cs: f64) -> f64 {
    cb * cs
}

fn screen(cb: f64, cs: f64) -> f64 {
    cb + cs - cb * cs
}

fn overlay(cb: f64, cs: f64) -> f64 {
    let cb = cb * 2.0;
    if cb <= 1.0 {
        multiply(cb, cs)
    } else {
        screen(cb - 1.0, cs)
    }
}

fn softlight(cb: f64, cs: f64) -> f64 {
    let mut d = 1.0;
    let mut e = cb;
    if cs > 0.5 {
        e = 1.0;
        d = if cb > 0.25 {
            cb.sqrt()
        } else {
            ((16.0 * cb - 12.0) * cb + 4.0) * cb
        };
    }
    cb - (1.0 - 2.0 * cs) * e * (d - cb)
}

fn hardlight(cb: f64, cs: f64) -> f64 {
    overlay(cs, cb)
}

fn difference(cb: f64, cs: f64) -> f64 {
    (cb - cs).abs()
}

fn exclusion(cb: f64, cs: f64) -> f64 {
    cb + cs - 2.0 * cb * cs
}

fn average(cb: f64, cs: f64) -> f64 {
    (cb + cs) / 2.0
}

fn negation(cb: f64, cs: f64) -> f64 {
    1.0 - (cb + cs - 1.0).abs()
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
    fn multiply_darkens() {
        let result = eval_call(
            "multiply",
            vec![
                Node::color([128.0, 128.0, 128.0], 1.0),
                Node::color([128.0, 128.0, 128.0], 1.0),
            ],
        );
        assert_eq!(result.to_css_string(), "#404040");
    }

    #[test]
    fn screen_lightens() {
        let result = eval_call(
            "screen",
            vec![
                Node::color([128.0, 128.0, 128.0], 1.0),
                Node::color([128.0, 128.0, 128.0], 1.0),
            ],
        );
        assert_eq!(result.to_css_string(), "#c0c0c0");
    }

    #[test]
    fn difference_of_equal_colors_is_black() {
        let c = Node::color([99.0, 99.0, 99.0], 1.0);
        let result = eval_call("difference", vec![c.clone(), c]);
        assert_eq!(result.to_css_string(), "#000000");
    }

    #[test]
    fn blending_stays_in_domain() {
        let result = blend_colors(
            overlay,
            &Color::new([300.0, -10.0, 128.0], 1.0),
            &Color::new([255.0, 255.0, 255.0], 1.0),
        );
        for channel in result.rgb {
            assert!((0.0..=255.0).contains(&channel));
        }
        assert!((0.0..=1.0).contains(&result.alpha));
    }
}
