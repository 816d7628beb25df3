//! Color values: storage, channel arithmetic, and color-space conversions.
//!
//! Channels are stored as floats in the 0..=255 range (fractional values are
//! kept internally), alpha in 0..=1.  Arithmetic may push channels out of
//! range; clamping happens on output and in the channel accessors, as the
//! blending and mixing functions expect.

use std::collections::HashMap;
use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::error::{LessError, Result};
use crate::node::{FileInfo, Node, NodeKind};
use crate::output::{format_number, CssContext, Output};
use crate::value::Operator;

/// Hue/saturation/lightness form, hue in degrees.
#[derive(Debug, Copy, Clone)]
pub struct Hsla {
    pub h: f64,
    pub s: f64,
    pub l: f64,
    pub a: f64,
}

/// Hue/saturation/value form, hue in degrees.
#[derive(Debug, Copy, Clone)]
pub struct Hsva {
    pub h: f64,
    pub s: f64,
    pub v: f64,
    pub a: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    pub rgb: [f64; 3],
    pub alpha: f64,

    /// The literal the color was written as (`red`, `#ff0000`), kept so an
    /// untouched color round-trips through the output unchanged.
    pub original_text: Option<String>,
}

impl Color {
    pub fn new(rgb: [f64; 3], alpha: f64) -> Color {
        Color {
            rgb,
            alpha,
            original_text: None,
        }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Color {
        Color::new([f64::from(r), f64::from(g), f64::from(b)], 1.0)
    }

    /// Parses `#rgb`, `#rgba`, `#rrggbb` and `#rrggbbaa` literals.
    pub fn from_hex(text: &str) -> Result<Color> {
        let digits = text.strip_prefix('#').unwrap_or(text);
        let parse2 = |s: &str| u8::from_str_radix(s, 16).map(f64::from);
        let parse1 = |s: &str| u8::from_str_radix(s, 16).map(|v| f64::from(v * 16 + v));

        let (rgb, alpha) = match digits.len() {
            3 | 4 => {
                let r = parse1(&digits[0..1]);
                let g = parse1(&digits[1..2]);
                let b = parse1(&digits[2..3]);
                let a = if digits.len() == 4 {
                    parse1(&digits[3..4]).map(|v| v / 255.0)
                } else {
                    Ok(1.0)
                };
                match (r, g, b, a) {
                    (Ok(r), Ok(g), Ok(b), Ok(a)) => ([r, g, b], a),
                    _ => return Err(bad_hex(text)),
                }
            }
            6 | 8 => {
                let r = parse2(&digits[0..2]);
                let g = parse2(&digits[2..4]);
                let b = parse2(&digits[4..6]);
                let a = if digits.len() == 8 {
                    parse2(&digits[6..8]).map(|v| v / 255.0)
                } else {
                    Ok(1.0)
                };
                match (r, g, b, a) {
                    (Ok(r), Ok(g), Ok(b), Ok(a)) => ([r, g, b], a),
                    _ => return Err(bad_hex(text)),
                }
            }
            _ => return Err(bad_hex(text)),
        };

        Ok(Color {
            rgb,
            alpha,
            original_text: Some(format!("#{digits}")),
        })
    }

    /// Resolves a CSS color keyword, `transparent` included.
    pub fn from_keyword(name: &str) -> Option<Color> {
        let lower = name.to_ascii_lowercase();
        if lower == "transparent" {
            return Some(Color {
                rgb: [0.0, 0.0, 0.0],
                alpha: 0.0,
                original_text: Some(name.to_string()),
            });
        }
        NAMED_COLORS.get(lower.as_str()).map(|&value| {
            let mut color = Color::from_rgb8(
                ((value >> 16) & 0xff) as u8,
                ((value >> 8) & 0xff) as u8,
                (value & 0xff) as u8,
            );
            color.original_text = Some(name.to_string());
            color
        })
    }

    pub fn into_node(self, index: usize, file_info: &Rc<FileInfo>) -> Node {
        Node::new(NodeKind::Color(self), index, Rc::clone(file_info))
    }

    fn channel(&self, i: usize) -> f64 {
        self.rgb[i].clamp(0.0, 255.0)
    }

    pub fn red(&self) -> f64 {
        self.channel(0)
    }

    pub fn green(&self) -> f64 {
        self.channel(1)
    }

    pub fn blue(&self) -> f64 {
        self.channel(2)
    }

    pub fn clamped_alpha(&self) -> f64 {
        self.alpha.clamp(0.0, 1.0)
    }

    /// Applies `op` channel-wise against `other`.  The result loses any
    /// original text; it is no longer the literal the author wrote.
    pub fn operate(&self, op: Operator, other: &Color) -> Result<Color> {
        let mut rgb = [0.0; 3];
        for i in 0..3 {
            let value = match op {
                Operator::Add => self.rgb[i] + other.rgb[i],
                Operator::Subtract => self.rgb[i] - other.rgb[i],
                Operator::Multiply => self.rgb[i] * other.rgb[i],
                Operator::Divide => self.rgb[i] / other.rgb[i],
            };
            if !value.is_finite() {
                return Err(LessError::operation(
                    "color operation produced a non-finite channel",
                ));
            }
            rgb[i] = value.clamp(0.0, 255.0);
        }
        let alpha = self.alpha * (1.0 - other.alpha) + other.alpha;
        Ok(Color::new(rgb, alpha.clamp(0.0, 1.0)))
    }

    /// Perceptual luma per ITU-R BT.709, gamma-corrected.
    pub fn luma(&self) -> f64 {
        let lin = |c: f64| {
            let c = c / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        };
        0.2126 * lin(self.red()) + 0.7152 * lin(self.green()) + 0.0722 * lin(self.blue())
    }

    /// Non-gamma-corrected luminance.
    pub fn luminance(&self) -> f64 {
        (0.2126 * self.red() + 0.7152 * self.green() + 0.0722 * self.blue()) / 255.0
    }

    pub fn to_hsl(&self) -> Hsla {
        let r = self.red() / 255.0;
        let g = self.green() / 255.0;
        let b = self.blue() / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let d = max - min;

        let (h, s) = if d == 0.0 {
            (0.0, 0.0)
        } else {
            let s = if l > 0.5 {
                d / (2.0 - max - min)
            } else {
                d / (max + min)
            };
            let h = if max == r {
                (g - b) / d + if g < b { 6.0 } else { 0.0 }
            } else if max == g {
                (b - r) / d + 2.0
            } else {
                (r - g) / d + 4.0
            };
            (h / 6.0, s)
        };

        Hsla {
            h: h * 360.0,
            s,
            l,
            a: self.clamped_alpha(),
        }
    }

    pub fn from_hsl(hsl: Hsla) -> Color {
        let h = (hsl.h.rem_euclid(360.0)) / 360.0;
        let s = hsl.s.clamp(0.0, 1.0);
        let l = hsl.l.clamp(0.0, 1.0);

        let m2 = if l <= 0.5 { l * (s + 1.0) } else { l + s - l * s };
        let m1 = l * 2.0 - m2;

        let hue = |h: f64| {
            let h = if h < 0.0 {
                h + 1.0
            } else if h > 1.0 {
                h - 1.0
            } else {
                h
            };
            if h * 6.0 < 1.0 {
                m1 + (m2 - m1) * h * 6.0
            } else if h * 2.0 < 1.0 {
                m2
            } else if h * 3.0 < 2.0 {
                m1 + (m2 - m1) * (2.0 / 3.0 - h) * 6.0
            } else {
                m1
            }
        };

        Color::new(
            [
                hue(h + 1.0 / 3.0) * 255.0,
                hue(h) * 255.0,
                hue(h - 1.0 / 3.0) * 255.0,
            ],
            hsl.a.clamp(0.0, 1.0),
        )
    }

    pub fn to_hsv(&self) -> Hsva {
        let r = self.red() / 255.0;
        let g = self.green() / 255.0;
        let b = self.blue() / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let v = max;
        let d = max - min;
        let s = if max == 0.0 { 0.0 } else { d / max };

        let h = if d == 0.0 {
            0.0
        } else if max == r {
            ((g - b) / d + if g < b { 6.0 } else { 0.0 }) / 6.0
        } else if max == g {
            ((b - r) / d + 2.0) / 6.0
        } else {
            ((r - g) / d + 4.0) / 6.0
        };

        Hsva {
            h: h * 360.0,
            s,
            v,
            a: self.clamped_alpha(),
        }
    }

    pub fn from_hsv(hsv: Hsva) -> Color {
        let h = (hsv.h.rem_euclid(360.0)) / 360.0 * 6.0;
        let s = hsv.s.clamp(0.0, 1.0);
        let v = hsv.v.clamp(0.0, 1.0);

        let i = h.floor() as i64 % 6;
        let f = h - h.floor();

        let vs = [v, v * (1.0 - s), v * (1.0 - f * s), v * (1.0 - (1.0 - f) * s)];
        let perm: [[usize; 3]; 6] = [
            [0, 3, 1],
            [2, 0, 1],
            [1, 0, 3],
            [1, 2, 0],
            [3, 1, 0],
            [0, 1, 2],
        ];
        let idx = perm[i as usize];

        Color::new(
            [vs[idx[0]] * 255.0, vs[idx[1]] * 255.0, vs[idx[2]] * 255.0],
            hsv.a.clamp(0.0, 1.0),
        )
    }

    /// Hex form, `#rrggbb`.
    pub fn to_hex(&self) -> String {
        let c = |v: f64| (v.clamp(0.0, 255.0).round() as u8);
        format!(
            "#{:02x}{:02x}{:02x}",
            c(self.rgb[0]),
            c(self.rgb[1]),
            c(self.rgb[2])
        )
    }

    pub fn gen_css(&self, node: &Node, ctx: &mut CssContext, out: &mut Output) {
        let text = self.to_output_string(ctx);
        out.add(&text, Some(&node.file_info), Some(node.index));
    }

    fn to_output_string(&self, ctx: &CssContext) -> String {
        if let Some(text) = &self.original_text {
            return text.clone();
        }

        let alpha = self.clamped_alpha();
        if alpha < 1.0 {
            let sep = if ctx.compress { "," } else { ", " };
            return format!(
                "rgba({}{sep}{}{sep}{}{sep}{})",
                self.red().round(),
                self.green().round(),
                self.blue().round(),
                format_number(alpha, ctx.num_precision),
            );
        }

        let hex = self.to_hex();
        if ctx.compress {
            let b = hex.as_bytes();
            if b[1] == b[2] && b[3] == b[4] && b[5] == b[6] {
                return format!(
                    "#{}{}{}",
                    &hex[1..2],
                    &hex[3..4],
                    &hex[5..6]
                );
            }
        }
        hex
    }
}

fn bad_hex(text: &str) -> LessError {
    LessError::argument(format!("'{text}' is not a valid hex color"))
}

/// The CSS named colors.  Immutable and process-wide, like the unit tables.
static NAMED_COLORS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    [
        ("aliceblue", 0xf0f8ff),
        ("antiquewhite", 0xfaebd7),
        ("aqua", 0x00ffff),
        ("aquamarine", 0x7fffd4),
        ("azure", 0xf0ffff),
        ("beige", 0xf5f5dc),
        ("bisque", 0xffe4c4),
        ("black", 0x000000),
        ("blanchedalmond", 0xffebcd),
        ("blue", 0x0000ff),
        ("blueviolet", 0x8a2be2),
        ("brown", 0xa52a2a),
        ("burlywood", 0xdeb887),
        ("cadetblue", 0x5f9ea0),
        ("chartreuse", 0x7fff00),
        ("chocolate", 0xd2691e),
        ("coral", 0xff7f50),
        ("cornflowerblue", 0x6495ed),
        ("cornsilk", 0xfff8dc),
        ("crimson", 0xdc143c),
        ("cyan", 0x00ffff),
        ("darkblue", 0x00008b),
        ("darkcyan", 0x008b8b),
        ("darkgoldenrod", 0xb8860b),
        ("darkgray", 0xa9a9a9),
        ("darkgrey", 0xa9a9a9),
        ("darkgreen", 0x006400),
        ("darkkhaki", 0xbdb76b),
        ("darkmagenta", 0x8b008b),
        ("darkolivegreen", 0x556b2f),
        ("darkorange", 0xff8c00),
        ("darkorchid", 0x9932cc),
        ("darkred", 0x8b0000),
        ("darksalmon", 0xe9967a),
        ("darkseagreen", 0x8fbc8f),
        ("darkslateblue", 0x483d8b),
        ("darkslategray", 0x2f4f4f),
        ("darkslategrey", 0x2f4f4f),
        ("darkturquoise", 0x00ced1),
        ("darkviolet", 0x9400d3),
        ("deeppink", 0xff1493),
        ("deepskyblue", 0x00bfff),
        ("dimgray", 0x696969),
        ("dimgrey", 0x696969),
        ("dodgerblue", 0x1e90ff),
        ("firebrick", 0xb22222),
        ("floralwhite", 0xfffaf0),
        ("forestgreen", 0x228b22),
        ("fuchsia", 0xff00ff),
        ("gainsboro", 0xdcdcdc),
        ("ghostwhite", 0xf8f8ff),
        ("gold", 0xffd700),
        ("goldenrod", 0xdaa520),
        ("gray", 0x808080),
        ("grey", 0x808080),
        ("green", 0x008000),
        ("greenyellow", 0xadff2f),
        ("honeydew", 0xf0fff0),
        ("hotpink", 0xff69b4),
        ("indianred", 0xcd5c5c),
        ("indigo", 0x4b0082),
        ("ivory", 0xfffff0),
        ("khaki", 0xf0e68c),
        ("lavender", 0xe6e6fa),
        ("lavenderblush", 0xfff0f5),
        ("lawngreen", 0x7cfc00),
        ("lemonchiffon", 0xfffacd),
        ("lightblue", 0xadd8e6),
        ("lightcoral", 0xf08080),
        ("lightcyan", 0xe0ffff),
        ("lightgoldenrodyellow", 0xfafad2),
        ("lightgray", 0xd3d3d3),
        ("lightgrey", 0xd3d3d3),
        ("lightgreen", 0x90ee90),
        ("lightpink", 0xffb6c1),
        ("lightsalmon", 0xffa07a),
        ("lightseagreen", 0x20b2aa),
        ("lightskyblue", 0x87cefa),
        ("lightslategray", 0x778899),
        ("lightslategrey", 0x778899),
        ("lightsteelblue", 0xb0c4de),
        ("lightyellow", 0xffffe0),
        ("lime", 0x00ff00),
        ("limegreen", 0x32cd32),
        ("linen", 0xfaf0e6),
        ("magenta", 0xff00ff),
        ("maroon", 0x800000),
        ("mediumaquamarine", 0x66cdaa),
        ("mediumblue", 0x0000cd),
        ("mediumorchid", 0xba55d3),
        ("mediumpurple", 0x9370d8),
        ("mediumseagreen", 0x3cb371),
        ("mediumslateblue", 0x7b68ee),
        ("mediumspringgreen", 0x00fa9a),
        ("mediumturquoise", 0x48d1cc),
        ("mediumvioletred", 0xc71585),
        ("midnightblue", 0x191970),
        ("mintcream", 0xf5fffa),
        ("mistyrose", 0xffe4e1),
        ("moccasin", 0xffe4b5),
        ("navajowhite", 0xffdead),
        ("navy", 0x000080),
        ("oldlace", 0xfdf5e6),
        ("olive", 0x808000),
        ("olivedrab", 0x6b8e23),
        ("orange", 0xffa500),
        ("orangered", 0xff4500),
        ("orchid", 0xda70d6),
        ("palegoldenrod", 0xeee8aa),
        ("palegreen", 0x98fb98),
        ("paleturquoise", 0xafeeee),
        ("palevioletred", 0xd87093),
        ("papayawhip", 0xffefd5),
        ("peachpuff", 0xffdab9),
        ("peru", 0xcd853f),
        ("pink", 0xffc0cb),
        ("plum", 0xdda0dd),
        ("powderblue", 0xb0e0e6),
        ("purple", 0x800080),
        ("rebeccapurple", 0x663399),
        ("red", 0xff0000),
        ("rosybrown", 0xbc8f8f),
        ("royalblue", 0x4169e1),
        ("saddlebrown", 0x8b4513),
        ("salmon", 0xfa8072),
        ("sandybrown", 0xf4a460),
        ("seagreen", 0x2e8b57),
        ("seashell", 0xfff5ee),
        ("sienna", 0xa0522d),
        ("silver", 0xc0c0c0),
        ("skyblue", 0x87ceeb),
        ("slateblue", 0x6a5acd),
        ("slategray", 0x708090),
        ("slategrey", 0x708090),
        ("snow", 0xfffafa),
        ("springgreen", 0x00ff7f),
        ("steelblue", 0x4682b4),
        ("tan", 0xd2b48c),
        ("teal", 0x008080),
        ("thistle", 0xd8bfd8),
        ("tomato", 0xff6347),
        ("turquoise", 0x40e0d0),
        ("violet", 0xee82ee),
        ("wheat", 0xf5deb3),
        ("white", 0xffffff),
        ("whitesmoke", 0xf5f5f5),
        ("yellow", 0xffff00),
        ("yellowgreen", 0x9acd32),
    ]
    .into_iter()
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn keyword_lookup_is_case_insensitive() {
        let c = Color::from_keyword("Red").unwrap();
        assert_eq!(c.rgb, [255.0, 0.0, 0.0]);
        assert_eq!(c.original_text.as_deref(), Some("Red"));
    }

    #[test]
    fn short_hex_expands() {
        let c = Color::from_hex("#1af").unwrap();
        assert_eq!(c.rgb, [17.0, 170.0, 255.0]);
    }

    #[test]
    fn operate_clamps_channels() {
        let white = Color::new([255.0, 255.0, 255.0], 1.0);
        let result = white.operate(Operator::Add, &white).unwrap();
        assert_eq!(result.rgb, [255.0, 255.0, 255.0]);
    }

    #[test]
    fn hsl_round_trip() {
        let c = Color::from_rgb8(64, 128, 192);
        let back = Color::from_hsl(c.to_hsl());
        for i in 0..3 {
            assert!(approx_eq!(f64, c.rgb[i], back.rgb[i], epsilon = 0.5));
        }
    }

    #[test]
    fn hsv_round_trip() {
        let c = Color::from_rgb8(10, 200, 90);
        let back = Color::from_hsv(c.to_hsv());
        for i in 0..3 {
            assert!(approx_eq!(f64, c.rgb[i], back.rgb[i], epsilon = 0.5));
        }
    }

    #[test]
    fn translucent_colors_print_rgba() {
        let c = Color::new([255.0, 0.0, 0.0], 0.5);
        let mut ctx = CssContext::default();
        assert_eq!(c.to_output_string(&mut ctx), "rgba(255, 0, 0, 0.5)");
    }
}
