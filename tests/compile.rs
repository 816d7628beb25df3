//! Whole-pipeline tests over hand-built trees: what the evaluator, visitor
//! pipeline, and emitter produce together.

mod support;

use pretty_assertions::assert_eq;
use support::*;

use lessc::context::EvalOptions;
use lessc::mixin::MixinParam;
use lessc::node::{Node, NodeKind};

#[test]
fn variable_arithmetic_in_a_declaration() {
    // @a: 10px; .x { width: @a * 2; }
    let tree = root(vec![
        vardecl("@a", dim(10.0, "px")),
        ruleset(".x", vec![decl("width", op("*", var("@a"), num(2.0)))]),
    ]);

    assert_eq!(render(tree), ".x {\n  width: 20px;\n}\n");
}

#[test]
fn parametric_mixin_expands_into_caller() {
    // .m(@c) { color: @c }  .x { .m(red) }
    let tree = root(vec![
        mixin_def(
            ".m",
            vec![MixinParam::named("@c")],
            vec![decl("color", var("@c"))],
        ),
        ruleset(".x", vec![mixin_call(".m", vec![kw("red")])]),
    ]);

    assert_eq!(render(tree), ".x {\n  color: red;\n}\n");
}

#[test]
fn nested_media_bubbles_and_merges_features() {
    // @media screen { .x { @media (min-width: 1px) { color: red } } }
    let tree = root(vec![media(
        kw("screen"),
        vec![ruleset(
            ".x",
            vec![media(
                anon("(min-width: 1px)"),
                vec![decl("color", kw("red"))],
            )],
        )],
    )]);

    assert_eq!(
        render(tree),
        "@media screen and (min-width: 1px) {\n  .x {\n    color: red;\n  }\n}\n"
    );
}

#[test]
fn extend_adds_selector_to_target_rule() {
    // .a { color: red }  .b:extend(.a) {}
    use lessc::extend::{Extend, ExtendOption};

    let target = Node::from_kind(NodeKind::Selector(Box::new(selector(&[".a"]))));
    let mut sel_b = selector(&[".b"]);
    sel_b.extend_list = vec![Node::from_kind(NodeKind::Extend(Box::new(Extend::new(
        target,
        ExtendOption::Exact,
    ))))];

    let rs_b = Node::from_kind(NodeKind::Ruleset(Box::new(lessc::ruleset::Ruleset::new(
        vec![sel_b],
        vec![],
    ))));

    let tree = root(vec![
        ruleset(".a", vec![decl("color", kw("red"))]),
        rs_b,
    ]);

    assert_eq!(render(tree), ".a,\n.b {\n  color: red;\n}\n");
}

#[test]
fn calc_preserves_its_expression() {
    // .a { width: calc(100% - 20px) }  under parens-division
    let tree = root(vec![ruleset(
        ".a",
        vec![decl(
            "width",
            call("calc", vec![op("-", dim(100.0, "%"), dim(20.0, "px"))]),
        )],
    )]);

    assert_eq!(render(tree), ".a {\n  width: calc(100% - 20px);\n}\n");
}

#[test]
fn selector_guard_selects_on_variable() {
    // @a: 1; .x when (@a > 0) { color: red }
    let passing = root(vec![
        vardecl("@a", num(1.0)),
        guarded_ruleset(
            ".x",
            greater_than(var("@a"), num(0.0)),
            vec![decl("color", kw("red"))],
        ),
    ]);
    assert_eq!(render(passing), ".x {\n  color: red;\n}\n");

    // @a: 0 makes the same ruleset disappear entirely.
    let failing = root(vec![
        vardecl("@a", num(0.0)),
        guarded_ruleset(
            ".x",
            greater_than(var("@a"), num(0.0)),
            vec![decl("color", kw("red"))],
        ),
    ]);
    assert_eq!(render(failing), "");
}

#[test]
fn empty_tree_compiles_to_empty_css() {
    assert_eq!(render(root(vec![])), "");
}

#[test]
fn comment_only_input() {
    let line = Node::from_kind(NodeKind::Comment(lessc::node::Comment {
        text: "// gone".to_string(),
        is_line_comment: true,
    }));
    let block = Node::from_kind(NodeKind::Comment(lessc::node::Comment {
        text: "/* kept */".to_string(),
        is_line_comment: false,
    }));

    assert_eq!(render(root(vec![line])), "");
    assert_eq!(render(root(vec![block])), "/* kept */\n");
}

#[test]
fn unmatched_mixin_call_is_an_argument_error() {
    let tree = root(vec![ruleset(".x", vec![mixin_call(".missing", vec![])])]);

    let mut ctx = lessc::context::Context::new(EvalOptions::default());
    let err = tree.eval(&mut ctx).unwrap_err();
    assert_eq!(err.kind, lessc::ErrorKind::Argument);
    assert!(err.message.contains(".missing"));
}

#[test]
fn arity_mismatch_reports_counts() {
    let tree = root(vec![
        mixin_def(
            ".m",
            vec![MixinParam::named("@a"), MixinParam::named("@b")],
            vec![],
        ),
        ruleset(".x", vec![mixin_call(".m", vec![kw("red")])]),
    ]);

    let mut ctx = lessc::context::Context::new(EvalOptions::default());
    let err = tree.eval(&mut ctx).unwrap_err();
    assert_eq!(err.kind, lessc::ErrorKind::Argument);
}

#[test]
fn default_guard_yields_to_specific_candidate() {
    use lessc::expression::{CondOp, Condition};

    // .m(@x) when (@x > 10) { width: big }
    // .m(@x) when (default()) { width: small }
    let big = guarded_mixin_def(
        ".m",
        vec![MixinParam::named("@x")],
        greater_than(var("@x"), num(10.0)),
        vec![decl("width", kw("big"))],
    );
    let fallback = guarded_mixin_def(
        ".m",
        vec![MixinParam::named("@x")],
        Node::from_kind(NodeKind::Condition(Box::new(Condition::new(
            CondOp::Equal,
            call("default", vec![]),
            kw("true"),
            false,
        )))),
        vec![decl("width", kw("small"))],
    );

    let chooses_big = root(vec![
        big.clone(),
        fallback.clone(),
        ruleset(".a", vec![mixin_call(".m", vec![num(20.0)])]),
    ]);
    assert_eq!(render(chooses_big), ".a {\n  width: big;\n}\n");

    let chooses_fallback = root(vec![
        big,
        fallback,
        ruleset(".a", vec![mixin_call(".m", vec![num(5.0)])]),
    ]);
    assert_eq!(render(chooses_fallback), ".a {\n  width: small;\n}\n");
}

#[test]
fn pattern_mixins_dispatch_on_argument_text() {
    let dark = mixin_def(
        ".theme",
        vec![MixinParam::pattern(kw("dark"))],
        vec![decl("color", kw("white"))],
    );
    let light = mixin_def(
        ".theme",
        vec![MixinParam::pattern(kw("light"))],
        vec![decl("color", kw("black"))],
    );

    let tree = root(vec![
        dark,
        light,
        ruleset(".a", vec![mixin_call(".theme", vec![kw("dark")])]),
    ]);
    assert_eq!(render(tree), ".a {\n  color: white;\n}\n");
}

#[test]
fn variadic_mixin_packs_rest_arguments() {
    // .m(@first, @rest...) { first: @first; rest: @rest; }
    let tree = root(vec![
        mixin_def(
            ".m",
            vec![MixinParam::named("@first"), MixinParam::variadic("@rest")],
            vec![decl("first", var("@first")), decl("rest", var("@rest"))],
        ),
        ruleset(
            ".x",
            vec![mixin_call(".m", vec![num(1.0), num(2.0), num(3.0)])],
        ),
    ]);

    assert_eq!(render(tree), ".x {\n  first: 1;\n  rest: 2 3;\n}\n");
}

#[test]
fn mixin_call_with_important_marks_all_declarations() {
    let tree = root(vec![
        mixin_def(".m", vec![], vec![decl("color", kw("red"))]),
        ruleset(".x", vec![{
            let mut node = mixin_call(".m", vec![]);
            if let NodeKind::MixinCall(mc) = &mut node.kind {
                mc.important = true;
            }
            node
        }]),
    ]);

    assert_eq!(render(tree), ".x {\n  color: red !important;\n}\n");
}

#[test]
fn nested_rulesets_join_with_descendant_combinator() {
    let tree = root(vec![ruleset(
        ".a",
        vec![
            decl("color", kw("blue")),
            ruleset(".b", vec![decl("color", kw("red"))]),
        ],
    )]);

    assert_eq!(
        render(tree),
        ".a {\n  color: blue;\n}\n.a .b {\n  color: red;\n}\n"
    );
}

#[test]
fn parent_selector_variants() {
    use lessc::ruleset::Ruleset;
    use lessc::selector::{Combinator, Element, Selector};

    // .a { &:hover { color: red } &-suffix { color: blue } }
    let hover = Selector::new(vec![
        Element::new(Combinator::none(), "&"),
        Element::new(Combinator::none(), ":hover"),
    ]);
    let suffix = Selector::new(vec![
        Element::new(Combinator::none(), "&"),
        Element::new(Combinator::none(), "-suffix"),
    ]);

    let tree = root(vec![ruleset(
        ".a",
        vec![
            Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
                vec![hover],
                vec![decl("color", kw("red"))],
            )))),
            Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
                vec![suffix],
                vec![decl("color", kw("blue"))],
            )))),
        ],
    )]);

    assert_eq!(
        render(tree),
        ".a:hover {\n  color: red;\n}\n.a-suffix {\n  color: blue;\n}\n"
    );
}

#[test]
fn container_queries_bubble_like_media() {
    let tree = root(vec![ruleset(
        ".card",
        vec![container(
            anon("(min-width: 400px)"),
            vec![decl("display", kw("grid"))],
        )],
    )]);

    assert_eq!(
        render(tree),
        "@container (min-width: 400px) {\n  .card {\n    display: grid;\n  }\n}\n"
    );
}

#[test]
fn rooted_atrule_keeps_its_inner_selectors() {
    use lessc::atrule::AtRule;

    // @keyframes spin { from { ... } } nested inside a ruleset must not
    // gain the outer selector.
    let keyframes = Node::from_kind(NodeKind::AtRule(Box::new(AtRule::new(
        "@keyframes",
        Some(kw("spin")),
        Some(vec![ruleset(
            "from",
            vec![decl("transform", anon("rotate(0deg)"))],
        )]),
    ))));

    let tree = root(vec![ruleset(".x", vec![keyframes])]);
    let css = render(tree);
    assert!(css.contains("@keyframes spin"));
    assert!(css.contains("from {"));
    assert!(!css.contains(".x from"));
}

#[test]
fn compressed_output_drops_whitespace() {
    let tree = root(vec![
        vardecl("@a", dim(10.0, "px")),
        ruleset(
            ".x",
            vec![
                decl("width", op("*", var("@a"), num(2.0))),
                decl("color", kw("red")),
            ],
        ),
    ]);

    assert_eq!(render_compressed(tree), ".x{width:20px;color:red}");
}

#[test]
fn detached_ruleset_call_splices_rules() {
    use lessc::ruleset::{DetachedRuleset, Ruleset};
    use lessc::variable::VariableCall;

    // @dr: { color: red; };  .x { @dr(); }
    let body = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
        Vec::new(),
        vec![decl("color", kw("red"))],
    ))));
    let dr = Node::from_kind(NodeKind::DetachedRuleset(DetachedRuleset::new(body)));

    let tree = root(vec![
        vardecl("@dr", dr),
        ruleset(
            ".x",
            vec![Node::from_kind(NodeKind::VariableCall(VariableCall::new(
                "@dr",
            )))],
        ),
    ]);

    assert_eq!(render(tree), ".x {\n  color: red;\n}\n");
}

#[test]
fn evaluation_is_idempotent() {
    let tree = root(vec![
        vardecl("@a", dim(4.0, "px")),
        ruleset(".x", vec![decl("width", op("*", var("@a"), num(2.0)))]),
    ]);

    let mut ctx = lessc::context::Context::new(EvalOptions::default());
    let once = tree.eval(&mut ctx).unwrap();

    let mut ctx2 = lessc::context::Context::new(EvalOptions::default());
    let twice = once.eval(&mut ctx2).unwrap();

    assert_eq!(once, twice);
}

#[test]
fn strict_units_turn_mismatches_into_errors() {
    let tree = root(vec![ruleset(
        ".x",
        vec![decl("width", op("+", dim(1.0, "px"), dim(1.0, "s")))],
    )]);

    let options = EvalOptions {
        strict_units: true,
        ..EvalOptions::default()
    };
    let mut ctx = lessc::context::Context::new(options);
    let err = tree.eval(&mut ctx).unwrap_err();
    assert_eq!(err.kind, lessc::ErrorKind::Operation);
}

#[test]
fn math_always_divides_without_parens() {
    let tree = root(vec![ruleset(
        ".x",
        vec![decl("width", op("/", dim(10.0, "px"), num(2.0)))],
    )]);

    let options = EvalOptions {
        math: lessc::MathMode::Always,
        ..EvalOptions::default()
    };
    assert_eq!(
        render_with(tree, options, false),
        ".x {\n  width: 5px;\n}\n"
    );
}

#[test]
fn undefined_variable_is_a_name_error() {
    let tree = root(vec![ruleset(".x", vec![decl("color", var("@missing"))])]);

    let mut ctx = lessc::context::Context::new(EvalOptions::default());
    let err = tree.eval(&mut ctx).unwrap_err();
    assert_eq!(err.kind, lessc::ErrorKind::Name);
    assert!(err.message.contains("@missing"));
}

#[test]
fn quoted_interpolation_reads_variables() {
    let tree = root(vec![
        vardecl("@name", Node::quoted('"', "banner", false)),
        ruleset(
            ".x",
            vec![decl(
                "background",
                Node::quoted('"', "images/@{name}.png", false),
            )],
        ),
    ]);

    assert_eq!(
        render(tree),
        ".x {\n  background: \"images/banner.png\";\n}\n"
    );
}
