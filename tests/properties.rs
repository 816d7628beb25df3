//! Property tests for the numeric and stateful invariants the engine
//! promises: unit algebra round-trips, color domains after clamping, and
//! context state balancing across calls.

mod support;

use proptest::prelude::*;

use lessc::color::Color;
use lessc::context::{Context, EvalOptions, MathMode};
use lessc::dimension::Dimension;
use lessc::node::{Node, NodeKind};
use lessc::value::Operator;

fn length_unit() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("px"),
        Just("cm"),
        Just("mm"),
        Just("in"),
        Just("pt"),
        Just("pc"),
    ]
}

proptest! {
    /// For compatible units, (a + b) - b recovers a up to float noise.
    #[test]
    fn addition_roundtrips(
        a in -1.0e6f64..1.0e6,
        b in -1.0e6f64..1.0e6,
        ua in length_unit(),
        ub in length_unit(),
    ) {
        let da = Dimension::with_unit(a, ua);
        let db = Dimension::with_unit(b, ub);

        let sum = da.operate(false, Operator::Add, &db).unwrap();
        let back = sum.operate(false, Operator::Subtract, &db).unwrap();

        prop_assert_eq!(back.unit.to_unit_string(), ua);
        let tolerance = 1e-6 * (1.0 + a.abs() + b.abs());
        prop_assert!((back.value - a).abs() <= tolerance);
    }

    /// Multiplying and dividing by the same non-zero scalar round-trips and
    /// keeps the unit.
    #[test]
    fn scaling_roundtrips(
        a in -1.0e6f64..1.0e6,
        k in prop_oneof![0.001f64..1000.0, -1000.0f64..-0.001],
    ) {
        let d = Dimension::with_unit(a, "px");
        let scaled = d.operate(false, Operator::Multiply, &Dimension::new(k)).unwrap();
        let back = scaled.operate(false, Operator::Divide, &Dimension::new(k)).unwrap();

        prop_assert_eq!(back.unit.to_unit_string(), "px");
        let tolerance = 1e-6 * (1.0 + a.abs());
        prop_assert!((back.value - a).abs() <= tolerance);
    }

    /// Channel arithmetic clamps into the color domain.
    #[test]
    fn color_operations_stay_in_domain(
        r1 in -500.0f64..800.0, g1 in -500.0f64..800.0, b1 in -500.0f64..800.0,
        r2 in -500.0f64..800.0, g2 in -500.0f64..800.0, b2 in -500.0f64..800.0,
        a1 in 0.0f64..1.0, a2 in 0.0f64..1.0,
    ) {
        let c1 = Color::new([r1, g1, b1], a1);
        let c2 = Color::new([r2, g2, b2], a2);

        for op in [Operator::Add, Operator::Subtract, Operator::Multiply] {
            let result = c1.operate(op, &c2).unwrap();
            for channel in result.rgb {
                prop_assert!((0.0..=255.0).contains(&channel));
            }
            prop_assert!((0.0..=1.0).contains(&result.alpha));
        }
    }

    /// HSL conversion round-trips within a channel step.
    #[test]
    fn hsl_roundtrips(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255) {
        let c = Color::from_rgb8(r, g, b);
        let back = Color::from_hsl(c.to_hsl());
        for i in 0..3 {
            prop_assert!((c.rgb[i] - back.rgb[i]).abs() < 1.0);
        }
    }

    /// Every function call restores `math_on` and the calc depth, whatever
    /// the function and math mode.
    #[test]
    fn calls_restore_math_state(
        name in prop_oneof![
            Just("calc"), Just("ceil"), Just("unknown-fn"), Just("min"), Just("e")
        ],
        math in prop_oneof![
            Just(MathMode::Always),
            Just(MathMode::ParensDivision),
            Just(MathMode::Parens),
        ],
    ) {
        let options = EvalOptions { math, ..EvalOptions::default() };
        let mut ctx = Context::new(options);
        let math_on_before = ctx.math_on;
        let in_calc_before = ctx.in_calc;

        let call = Node::from_kind(NodeKind::Call(Box::new(
            lessc::functions::Call::new(name, vec![Node::dimension(4.0, "px")]),
        )));
        // Some builtins reject a dimension argument; state must be restored
        // even then.
        let _ = call.eval(&mut ctx);

        prop_assert_eq!(ctx.math_on, math_on_before);
        prop_assert_eq!(ctx.in_calc, in_calc_before);
    }

    /// Evaluating a whole tree leaves the frame and selector stacks as it
    /// found them.
    #[test]
    fn frames_balance(names in proptest::collection::vec("[a-z]{1,8}", 1..6)) {
        let mut rules = Vec::new();
        for name in &names {
            rules.push(support::ruleset(
                &format!(".{name}"),
                vec![support::decl("color", support::kw("red"))],
            ));
        }
        let tree = support::root(rules);

        let mut ctx = Context::new(EvalOptions::default());
        tree.eval(&mut ctx).unwrap();

        prop_assert_eq!(ctx.frames.len(), 0);
        prop_assert!(ctx.selectors_stack.is_empty());
        prop_assert!(ctx.media_path.is_empty());
    }
}
