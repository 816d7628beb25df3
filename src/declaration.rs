//! Declarations: `property: value`, and `@name: value` for variables.

use crate::context::{Context, ImportantScope, MathMode};
use crate::error::{LessError, Result};
use crate::node::{Node, NodeKind};
use crate::output::{CssContext, Output};

/// How a `+`/`+_` declaration merges with earlier declarations of the same
/// property.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Merge {
    /// `prop+: v` joins values with commas.
    Comma,

    /// `prop+_: v` joins values with spaces.
    Spaced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: Node,
    pub important: bool,
    pub merge: Option<Merge>,

    /// Inline declarations suppress the trailing `;`.
    pub inline: bool,

    /// `@name: value` declarations never reach the output.
    pub is_variable: bool,
}

impl Declaration {
    pub fn new(name: impl Into<String>, value: Node) -> Declaration {
        Declaration {
            name: name.into(),
            value,
            important: false,
            merge: None,
            inline: false,
            is_variable: false,
        }
    }

    pub fn variable(name: impl Into<String>, value: Node) -> Declaration {
        let mut d = Declaration::new(name, value);
        d.is_variable = true;
        d
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        // The `font` shorthand contains slashes that must stay literal even
        // under `math: always`.
        let mut math_bypass = false;
        let prev_math = ctx.options.math;
        if !self.is_variable && self.name == "font" && ctx.options.math == MathMode::Always {
            ctx.options.math = MathMode::ParensDivision;
            math_bypass = true;
        }

        ctx.important_scope.push(ImportantScope::default());
        let result = self.value.eval(ctx);
        let scope = ctx.important_scope.pop().unwrap_or_default();

        if math_bypass {
            ctx.options.math = prev_math;
        }

        let evaluated = result.map_err(|e| e.at(node.index, &node.file_info))?;

        if !self.is_variable && matches!(evaluated.kind, NodeKind::DetachedRuleset(_)) {
            return Err(
                LessError::syntax("rulesets cannot be evaluated on a property")
                    .at(node.index, &node.file_info),
            );
        }

        let mut declaration = Declaration {
            name: self.name.clone(),
            value: evaluated,
            important: self.important || scope.important,
            merge: self.merge,
            inline: self.inline,
            is_variable: self.is_variable,
        };
        declaration.value.visibility.copy_from(&node.visibility);

        let mut out = Node::new(
            NodeKind::Declaration(Box::new(declaration)),
            node.index,
            node.file_info.clone(),
        );
        out.visibility.copy_from(&node.visibility);
        Ok(out)
    }

    pub fn make_important(&self) -> Declaration {
        let mut d = self.clone();
        d.important = true;
        d
    }

    pub fn gen_css(&self, node: &Node, ctx: &mut CssContext, out: &mut Output) {
        let colon = if ctx.compress { ":" } else { ": " };
        out.add(
            &format!("{}{colon}", self.name),
            Some(&node.file_info),
            Some(node.index),
        );
        self.value.gen_css(ctx, out);

        if self.important {
            out.add(" !important", None, None);
        }
        if !(self.inline || (ctx.last_rule && ctx.compress)) {
            out.add(";", None, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn decl_node(d: Declaration) -> Node {
        Node::from_kind(NodeKind::Declaration(Box::new(d)))
    }

    #[test]
    fn emits_name_value_semicolon() {
        let node = decl_node(Declaration::new("color", Node::keyword("red")));
        assert_eq!(node.to_css_string(), "color: red;");
    }

    #[test]
    fn important_is_emitted_before_semicolon() {
        let mut d = Declaration::new("color", Node::keyword("red"));
        d.important = true;
        assert_eq!(decl_node(d).to_css_string(), "color: red !important;");
    }

    #[test]
    fn detached_ruleset_value_is_rejected_on_a_property() {
        use crate::ruleset::{DetachedRuleset, Ruleset};

        let ruleset = Node::from_kind(NodeKind::Ruleset(Box::new(Ruleset::new(
            Vec::new(),
            Vec::new(),
        ))));
        let dr = Node::from_kind(NodeKind::DetachedRuleset(DetachedRuleset::new(ruleset)));
        let node = decl_node(Declaration::new("color", dr));

        let mut ctx = Context::for_tests();
        let err = node.eval(&mut ctx).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Syntax);
    }
}
