//! Numbers with units, and the unit algebra.
//!
//! A [`Dimension`] is a float paired with a [`Unit`].  Units are kept as
//! numerator/denominator lists so that multiplication and division compose
//! and cancel: `10px * 2` is `20px`, `10px / 2px` is the dimensionless `5`.
//! Addition and subtraction convert the right operand into the left
//! operand's unit when a conversion is defined; with `strict_units` an
//! unconvertible mix is an error, otherwise the first operand's unit wins.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use float_cmp::approx_eq;
use once_cell::sync::Lazy;

use crate::error::{LessError, Result};
use crate::node::{FileInfo, Node, NodeKind};
use crate::output::{format_number, CssContext, Output};
use crate::value::Operator;

/// Conversion factors between convertible units, grouped by quantity.
/// Factors are relative to the group's base unit.
static UNIT_CONVERSIONS: Lazy<HashMap<&'static str, HashMap<&'static str, f64>>> =
    Lazy::new(|| {
        let length: HashMap<&'static str, f64> = [
            ("m", 1.0),
            ("cm", 0.01),
            ("mm", 0.001),
            ("in", 0.0254),
            ("px", 0.0254 / 96.0),
            ("pt", 0.0254 / 72.0),
            ("pc", 0.0254 / 6.0),
        ]
        .into_iter()
        .collect();

        let duration: HashMap<&'static str, f64> =
            [("s", 1.0), ("ms", 0.001)].into_iter().collect();

        let angle: HashMap<&'static str, f64> = [
            ("rad", 1.0 / (2.0 * std::f64::consts::PI)),
            ("deg", 1.0 / 360.0),
            ("grad", 1.0 / 400.0),
            ("turn", 1.0),
        ]
        .into_iter()
        .collect();

        [("length", length), ("duration", duration), ("angle", angle)]
            .into_iter()
            .collect()
    });

const LENGTH_UNITS: &[&str] = &[
    "px", "em", "ex", "ch", "rem", "in", "cm", "mm", "pc", "pt", "vw", "vh", "vmin", "vmax",
];

/// The unit part of a dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unit {
    pub numerator: Vec<String>,
    pub denominator: Vec<String>,

    /// Remembers the original unit across operations that cancel it away, so
    /// non-strict output can still print something sensible.
    pub backup_unit: Option<String>,
}

impl Unit {
    pub fn new(numerator: Vec<String>, denominator: Vec<String>) -> Unit {
        let mut numerator = numerator;
        let mut denominator = denominator;
        numerator.sort();
        denominator.sort();
        let backup_unit = numerator.first().cloned();
        Unit {
            numerator,
            denominator,
            backup_unit,
        }
    }

    pub fn single(unit: &str) -> Unit {
        if unit.is_empty() {
            Unit::default()
        } else {
            Unit::new(vec![unit.to_string()], Vec::new())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.numerator.is_empty() && self.denominator.is_empty()
    }

    pub fn is_singular(&self) -> bool {
        self.numerator.len() <= 1 && self.denominator.is_empty()
    }

    pub fn is_length(&self) -> bool {
        self.denominator.is_empty()
            && self.numerator.len() == 1
            && LENGTH_UNITS.contains(&self.numerator[0].as_str())
    }

    /// Display form, e.g. `px`, `px*s`, `px/s`.
    pub fn to_unit_string(&self) -> String {
        let mut s = self.numerator.join("*");
        for d in &self.denominator {
            s.push('/');
            s.push_str(d);
        }
        s
    }

    /// The unit actually printed after a number.
    pub fn gen_css(&self, ctx: &CssContext, out: &mut Output) {
        let _ = ctx;
        if self.numerator.len() == 1 {
            out.add(&self.numerator[0], None, None);
        } else if let Some(backup) = &self.backup_unit {
            out.add(backup, None, None);
        } else if !self.denominator.is_empty() {
            out.add(&self.denominator[0], None, None);
        }
    }

    /// Removes unit pairs that appear in both lists.
    pub fn cancel(&mut self) {
        let mut counts: Vec<(String, i32)> = Vec::new();

        for u in &self.numerator {
            match counts.iter_mut().find(|(name, _)| name == u) {
                Some((_, n)) => *n += 1,
                None => counts.push((u.clone(), 1)),
            }
        }
        for u in &self.denominator {
            match counts.iter_mut().find(|(name, _)| name == u) {
                Some((_, n)) => *n -= 1,
                None => counts.push((u.clone(), -1)),
            }
        }

        self.numerator.clear();
        self.denominator.clear();
        for (unit, count) in counts {
            if count > 0 {
                for _ in 0..count {
                    self.numerator.push(unit.clone());
                }
            } else if count < 0 {
                for _ in 0..-count {
                    self.denominator.push(unit.clone());
                }
            }
        }
        self.numerator.sort();
        self.denominator.sort();
    }

    /// For each conversion group, the first of this unit's atoms that
    /// belongs to the group.
    pub fn used_units(&self) -> HashMap<&'static str, String> {
        let mut result = HashMap::new();
        for (group_name, group) in UNIT_CONVERSIONS.iter() {
            for atom in self.numerator.iter().chain(self.denominator.iter()) {
                if group.contains_key(atom.as_str()) {
                    result.entry(*group_name).or_insert_with(|| atom.clone());
                    break;
                }
            }
        }
        result
    }
}

/// A number with a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub value: f64,
    pub unit: Unit,
}

impl Dimension {
    pub fn new(value: f64) -> Dimension {
        Dimension {
            value,
            unit: Unit::default(),
        }
    }

    pub fn with_unit(value: f64, unit: &str) -> Dimension {
        Dimension {
            value,
            unit: Unit::single(unit),
        }
    }

    pub fn into_node(self, index: usize, file_info: &Rc<FileInfo>) -> Node {
        Node::new(NodeKind::Dimension(self), index, Rc::clone(file_info))
    }

    /// Unit algebra for the four arithmetic operators.
    pub fn operate(&self, strict_units: bool, op: Operator, other: &Dimension) -> Result<Dimension> {
        let mut value = apply(op, self.value, other.value);
        let mut unit = self.unit.clone();

        match op {
            Operator::Add | Operator::Subtract => {
                if unit.numerator.is_empty() && unit.denominator.is_empty() {
                    // A bare number takes the other operand's unit.
                    unit = other.unit.clone();
                    if let Some(backup) = &self.unit.backup_unit {
                        unit.backup_unit = Some(backup.clone());
                    }
                } else if other.unit.is_empty() {
                    // Other operand is a bare number; keep our unit.
                } else {
                    let converted = other.convert_to_units(&self.unit.used_units());

                    if strict_units
                        && converted.unit.to_unit_string() != unit.to_unit_string()
                    {
                        return Err(LessError::operation(format!(
                            "incompatible units; change the units or use the unit function; \
                             bad units: '{}' and '{}'",
                            unit.to_unit_string(),
                            other.unit.to_unit_string()
                        )));
                    }

                    value = apply(op, self.value, converted.value);
                }
            }
            Operator::Multiply => {
                unit.numerator.extend(other.unit.numerator.iter().cloned());
                unit.denominator
                    .extend(other.unit.denominator.iter().cloned());
                unit.cancel();
            }
            Operator::Divide => {
                unit.numerator.extend(other.unit.denominator.iter().cloned());
                unit.denominator
                    .extend(other.unit.numerator.iter().cloned());
                unit.cancel();
            }
        }

        if !value.is_finite() {
            return Err(LessError::operation(format!(
                "{} {} {} produced a non-finite number",
                self.value,
                op.symbol(),
                other.value
            )));
        }

        Ok(Dimension { value, unit })
    }

    /// Converts into the given unit, or into the given per-group units.
    pub fn convert_to(&self, unit: &str) -> Dimension {
        let mut targets = HashMap::new();
        for (group_name, group) in UNIT_CONVERSIONS.iter() {
            if group.contains_key(unit) {
                targets.insert(*group_name, unit.to_string());
            }
        }
        self.convert_to_units(&targets)
    }

    fn convert_to_units(&self, targets: &HashMap<&'static str, String>) -> Dimension {
        let mut value = self.value;
        let mut unit = self.unit.clone();

        for (group_name, target) in targets {
            let group = &UNIT_CONVERSIONS[group_name];
            let Some(&target_factor) = group.get(target.as_str()) else {
                continue;
            };

            let mut map_side = |units: &mut Vec<String>, denominator: bool| {
                for atom in units.iter_mut() {
                    if let Some(&factor) = group.get(atom.as_str()) {
                        if denominator {
                            value /= factor / target_factor;
                        } else {
                            value *= factor / target_factor;
                        }
                        *atom = target.clone();
                    }
                }
            };

            map_side(&mut unit.numerator, false);
            map_side(&mut unit.denominator, true);
        }

        unit.cancel();
        Dimension { value, unit }
    }

    /// Normalizes to base units (px, s, rad), for unit-blind comparison.
    pub fn unify(&self) -> Dimension {
        let targets: HashMap<&'static str, String> = [
            ("length", "px".to_string()),
            ("duration", "s".to_string()),
            ("angle", "rad".to_string()),
        ]
        .into_iter()
        .collect();
        self.convert_to_units(&targets)
    }

    pub fn compare(&self, other: &Dimension) -> Option<Ordering> {
        let (a, b) = if self.unit.is_empty() || other.unit.is_empty() {
            (self.clone(), other.clone())
        } else {
            let a = self.unify();
            let b = other.unify();
            if a.unit.to_unit_string() != b.unit.to_unit_string() {
                return None;
            }
            (a, b)
        };

        if approx_eq!(f64, a.value, b.value, ulps = 4) {
            Some(Ordering::Equal)
        } else {
            a.value.partial_cmp(&b.value)
        }
    }

    /// A gray color with this number on every channel, for mixed
    /// number/color arithmetic.
    pub fn to_color(&self) -> crate::color::Color {
        crate::color::Color::new([self.value, self.value, self.value], 1.0)
    }

    pub fn gen_css(&self, node: &Node, ctx: &mut CssContext, out: &mut Output) {
        let value = crate::output::round_to_precision(self.value, ctx.num_precision);
        let mut text = format_number(self.value, ctx.num_precision);

        if ctx.compress {
            // Zero lengths need no unit; fractions drop the leading zero.
            if value == 0.0 && self.unit.is_length() {
                out.add(&text, Some(&node.file_info), Some(node.index));
                return;
            }
            if value > 0.0 && value < 1.0 {
                text = text[1..].to_string();
            }
        }

        out.add(&text, Some(&node.file_info), Some(node.index));
        self.unit.gen_css(ctx, out);
    }
}

fn apply(op: Operator, a: f64, b: f64) -> f64 {
    match op {
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        Operator::Multiply => a * b,
        Operator::Divide => a / b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(v: f64) -> Dimension {
        Dimension::with_unit(v, "px")
    }

    #[test]
    fn addition_keeps_first_unit() {
        let r = px(10.0)
            .operate(false, Operator::Add, &Dimension::with_unit(1.0, "em"))
            .unwrap();
        assert_eq!(r.unit.to_unit_string(), "px");
        assert_eq!(r.value, 11.0);
    }

    #[test]
    fn addition_converts_compatible_units() {
        let r = px(10.0)
            .operate(false, Operator::Add, &Dimension::with_unit(1.0, "in"))
            .unwrap();
        assert_eq!(r.unit.to_unit_string(), "px");
        assert!(approx_eq!(f64, r.value, 106.0, ulps = 4));
    }

    #[test]
    fn strict_units_reject_incompatible_addition() {
        let err = px(10.0)
            .operate(true, Operator::Add, &Dimension::with_unit(1.0, "s"))
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Operation);
    }

    #[test]
    fn division_cancels_units() {
        let r = px(10.0).operate(false, Operator::Divide, &px(2.0)).unwrap();
        assert_eq!(r.value, 5.0);
        assert!(r.unit.is_empty());
    }

    #[test]
    fn multiplication_combines_units() {
        let r = px(10.0)
            .operate(false, Operator::Multiply, &Dimension::new(2.0))
            .unwrap();
        assert_eq!(r.value, 20.0);
        assert_eq!(r.unit.to_unit_string(), "px");
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = px(10.0)
            .operate(false, Operator::Divide, &Dimension::new(0.0))
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Operation);
    }

    #[test]
    fn unify_normalizes_angles() {
        let d = Dimension::with_unit(180.0, "deg").unify();
        assert_eq!(d.unit.to_unit_string(), "rad");
        assert!(approx_eq!(f64, d.value, std::f64::consts::PI, ulps = 4));
    }

    #[test]
    fn compare_across_units() {
        let a = Dimension::with_unit(1.0, "in");
        let b = px(96.0);
        assert_eq!(a.compare(&b), Some(Ordering::Equal));
    }
}
