//! The CSS output sink and formatting state.

use std::rc::Rc;

use crate::node::FileInfo;

/// Accumulates emitted CSS.
///
/// `add` takes the chunk plus the file/offset it came from; the location pair
/// is what a source-map generator would consume.  The core does not emit
/// source maps, but every emitter call site threads its location through so
/// a generator can be attached at this single seam.
pub struct Output {
    css: String,
}

impl Output {
    pub fn new() -> Output {
        Output { css: String::new() }
    }

    pub fn add(&mut self, chunk: &str, _file_info: Option<&Rc<FileInfo>>, _index: Option<usize>) {
        self.css.push_str(chunk);
    }

    pub fn is_empty(&self) -> bool {
        self.css.is_empty()
    }

    /// Last character currently in the buffer, for separator decisions.
    pub fn last_char(&self) -> Option<char> {
        self.css.chars().last()
    }

    pub fn into_string(self) -> String {
        self.css
    }
}

impl Default for Output {
    fn default() -> Self {
        Output::new()
    }
}

/// Formatting state threaded through `gen_css`.
#[derive(Debug, Clone)]
pub struct CssContext {
    /// Collapse all optional whitespace.
    pub compress: bool,

    /// Current indentation depth, two spaces per level.
    pub tab_level: usize,

    /// Significant digits kept on dimension values.
    pub num_precision: usize,

    /// Set by a ruleset while emitting its final declaration, so the
    /// declaration can drop its trailing `;` under compression.
    pub last_rule: bool,

    /// Set while emitting the first selector of a path list.
    pub first_selector: bool,
}

impl Default for CssContext {
    fn default() -> Self {
        CssContext {
            compress: false,
            tab_level: 0,
            num_precision: 8,
            last_rule: false,
            first_selector: false,
        }
    }
}

impl CssContext {
    pub fn indent(&self) -> String {
        "  ".repeat(self.tab_level)
    }
}

/// Formats a float the way CSS wants it: rounded to `precision` decimal
/// digits, no trailing zeros, no decimal point on integer values.
pub fn format_number(value: f64, precision: usize) -> String {
    let rounded = round_to_precision(value, precision);

    // Very small magnitudes would otherwise print in exponent notation.
    if rounded != 0.0 && rounded.abs() < 0.000001 {
        let s = format!("{rounded:.20}");
        let s = s.trim_end_matches('0').trim_end_matches('.');
        return s.to_string();
    }

    if rounded == rounded.trunc() && rounded.abs() < 1e15 {
        format!("{}", rounded.trunc() as i64)
    } else {
        format!("{rounded}")
    }
}

pub fn round_to_precision(value: f64, precision: usize) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_drop_the_decimal() {
        assert_eq!(format_number(20.0, 8), "20");
        assert_eq!(format_number(-3.0, 8), "-3");
        assert_eq!(format_number(0.0, 8), "0");
    }

    #[test]
    fn fractions_keep_shortest_form() {
        assert_eq!(format_number(0.5, 8), "0.5");
        assert_eq!(format_number(1.0 / 3.0, 8), "0.33333333");
    }

    #[test]
    fn precision_rounds() {
        assert_eq!(format_number(0.123456789, 4), "0.1235");
    }
}
