//! Mixin definitions and mixin calls.
//!
//! Call resolution walks the frame stack for definitions reachable by the
//! call's selector path, filters them by arity, pattern parameters, and
//! guards, and splices the surviving candidates' evaluated bodies into the
//! calling scope.  Guards may use `default()`: candidates whose guard only
//! passes when `default()` is true form the fallback group, chosen only
//! when no other candidate matches.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, Frame};
use crate::declaration::Declaration;
use crate::error::{LessError, Result};
use crate::expression::Expression;
use crate::functions::FunctionRegistry;
use crate::node::{Node, NodeKind};
use crate::ruleset::{find_in_rules, Ruleset};
use crate::selector::Selector;

/// One parameter of a mixin definition.
///
/// A parameter with a value but no name is a pattern: the call matches only
/// when the argument's CSS text equals the pattern's.
#[derive(Debug, Clone, PartialEq)]
pub struct MixinParam {
    pub name: Option<String>,
    pub value: Option<Node>,
    pub variadic: bool,
}

impl MixinParam {
    pub fn named(name: impl Into<String>) -> MixinParam {
        MixinParam {
            name: Some(name.into()),
            value: None,
            variadic: false,
        }
    }

    pub fn with_default(name: impl Into<String>, value: Node) -> MixinParam {
        MixinParam {
            name: Some(name.into()),
            value: Some(value),
            variadic: false,
        }
    }

    pub fn pattern(value: Node) -> MixinParam {
        MixinParam {
            name: None,
            value: Some(value),
            variadic: false,
        }
    }

    pub fn variadic(name: impl Into<String>) -> MixinParam {
        MixinParam {
            name: Some(name.into()),
            value: None,
            variadic: true,
        }
    }
}

/// One argument of a mixin call.
#[derive(Debug, Clone, PartialEq)]
pub struct MixinArg {
    pub name: Option<String>,
    pub value: Node,

    /// `...` after the value spreads a list into positional arguments.
    pub expand: bool,
}

impl MixinArg {
    pub fn positional(value: Node) -> MixinArg {
        MixinArg {
            name: None,
            value,
            expand: false,
        }
    }

    pub fn named(name: impl Into<String>, value: Node) -> MixinArg {
        MixinArg {
            name: Some(name.into()),
            value,
            expand: false,
        }
    }
}

#[derive(Debug)]
pub struct MixinDefinition {
    pub name: String,
    pub params: Vec<MixinParam>,
    pub rules: Vec<Node>,
    pub condition: Option<Node>,
    pub variadic: bool,
    frames: RefCell<Option<Vec<Rc<Frame>>>>,
}

impl Clone for MixinDefinition {
    fn clone(&self) -> Self {
        MixinDefinition {
            name: self.name.clone(),
            params: self.params.clone(),
            rules: self.rules.clone(),
            condition: self.condition.clone(),
            variadic: self.variadic,
            frames: RefCell::new(self.frames.borrow().clone()),
        }
    }
}

impl PartialEq for MixinDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.params == other.params
            && self.rules == other.rules
            && self.condition == other.condition
            && self.variadic == other.variadic
    }
}

impl MixinDefinition {
    pub fn new(
        name: impl Into<String>,
        params: Vec<MixinParam>,
        rules: Vec<Node>,
        condition: Option<Node>,
    ) -> MixinDefinition {
        let variadic = params.iter().any(|p| p.variadic);
        MixinDefinition {
            name: name.into(),
            params,
            rules,
            condition,
            variadic,
            frames: RefCell::new(None),
        }
    }

    /// An anonymous definition wrapping a plain ruleset called as a mixin.
    fn from_ruleset(rules: Vec<Node>) -> MixinDefinition {
        MixinDefinition::new("", Vec::new(), rules, None)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Parameters that must be bound by the call.
    pub fn required(&self) -> usize {
        self.params
            .iter()
            .filter(|p| p.name.is_none() || p.value.is_none())
            .count()
    }

    fn optional_names(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.value.is_some())
            .filter_map(|p| p.name.as_deref())
            .collect()
    }

    /// Evaluating a definition captures the frame stack at definition site;
    /// the closure is invoked later by matching calls.
    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let mut captured = self.clone();
        *captured.frames.borrow_mut() = Some(ctx.frames_snapshot());
        Ok(Node::new(
            NodeKind::MixinDefinition(Rc::new(captured)),
            node.index,
            node.file_info.clone(),
        ))
    }

    fn captured_frames(&self) -> Vec<Rc<Frame>> {
        self.frames.borrow().clone().unwrap_or_default()
    }

    /// Arity and pattern filtering, cheap enough to run on every candidate.
    pub fn match_args(&self, args: &[MixinArg], ctx: &mut Context<'_>) -> bool {
        let optional = self.optional_names();
        let required_args = args
            .iter()
            .filter(|a| match &a.name {
                Some(name) => !optional.contains(&name.as_str()),
                None => true,
            })
            .count();

        if !self.variadic {
            if required_args < self.required() || args.len() > self.params.len() {
                return false;
            }
        } else if required_args + 1 < self.required() {
            return false;
        }

        let len = required_args.min(self.arity());
        for i in 0..len {
            let p = &self.params[i];
            if p.name.is_none() && !p.variadic {
                let (Some(arg), Some(pattern)) = (args.get(i), &p.value) else {
                    continue;
                };
                let arg_css = match arg.value.eval(ctx) {
                    Ok(v) => v.to_css_string(),
                    Err(_) => return false,
                };
                let pattern_css = match pattern.eval(ctx) {
                    Ok(v) => v.to_css_string(),
                    Err(_) => return false,
                };
                if arg_css != pattern_css {
                    return false;
                }
            }
        }
        true
    }

    /// Evaluates the guard with arguments bound.  A failing or erroring
    /// guard rejects the candidate; it never aborts the compile.
    pub fn match_condition(&self, args: &[MixinArg], ctx: &mut Context<'_>) -> bool {
        let Some(condition) = &self.condition else {
            return true;
        };

        let mut mixin_frames = self.captured_frames();
        mixin_frames.extend(ctx.frames_snapshot());

        let mut evald = Vec::new();
        let Ok(frame) = self.eval_params(ctx, &mixin_frames, args, &mut evald) else {
            return false;
        };

        let mut env = vec![frame];
        env.extend(mixin_frames);
        let saved = ctx.swap_frames(env);
        let result = condition.eval(ctx);
        ctx.restore_frames(saved);

        matches!(result, Ok(node) if node.is_true_keyword())
    }

    /// Binds arguments to parameters, returning the parameter frame.
    /// Named arguments bind first, then positionals; a variadic parameter
    /// packs the rest; defaults evaluate in the mixin's own environment.
    fn eval_params(
        &self,
        ctx: &mut Context<'_>,
        mixin_frames: &[Rc<Frame>],
        args: &[MixinArg],
        evald: &mut Vec<Option<Node>>,
    ) -> Result<Rc<Frame>> {
        let registry = Rc::new(FunctionRegistry::inherit(&ctx.current_registry()));
        let frame = Rc::new(Frame::new(registry));

        let mut args: Vec<MixinArg> = args.to_vec();
        evald.resize(self.params.len().max(args.len()), None);

        let mut i = 0;
        while i < args.len() {
            let Some(name) = args[i].name.clone() else {
                i += 1;
                continue;
            };

            let mut found = false;
            for (j, p) in self.params.iter().enumerate() {
                if evald[j].is_none() && p.name.as_deref() == Some(name.as_str()) {
                    let value = args[i].value.eval(ctx)?;
                    evald[j] = Some(value.clone());
                    frame.insert_rule(0, variable_decl(&name, value));
                    found = true;
                    break;
                }
            }
            if !found {
                return Err(LessError::runtime(format!(
                    "named argument {name} for {} not found",
                    self.name
                )));
            }
            args.remove(i);
        }

        let mut arg_index = 0;
        for i in 0..self.params.len() {
            if evald.get(i).map_or(false, Option::is_some) {
                continue;
            }
            let param = &self.params[i];

            if let Some(name) = &param.name {
                if param.variadic {
                    let mut varargs = Vec::new();
                    for a in &args[arg_index.min(args.len())..] {
                        varargs.push(a.value.eval(ctx)?);
                    }
                    let packed = Node::from_kind(NodeKind::Expression(Expression::new(varargs)));
                    frame.insert_rule(0, variable_decl(name, packed.eval(ctx)?));
                } else {
                    let value = if let Some(arg) = args.get(arg_index) {
                        arg.value.eval(ctx)?
                    } else if let Some(default) = &param.value {
                        let saved = ctx.swap_frames({
                            let mut env = vec![Rc::clone(&frame)];
                            env.extend(mixin_frames.iter().cloned());
                            env
                        });
                        let result = default.eval(ctx);
                        ctx.restore_frames(saved);
                        frame.reset_cache();
                        result?
                    } else {
                        return Err(LessError::argument(format!(
                            "wrong number of arguments for {} ({} for {})",
                            self.name,
                            args.len(),
                            self.arity()
                        )));
                    };
                    frame.insert_rule(0, variable_decl(name, value.clone()));
                    if i < evald.len() {
                        evald[i] = Some(value);
                    }
                }
            }

            if param.variadic {
                for (j, a) in args[arg_index.min(args.len())..].iter().enumerate() {
                    evald[arg_index + j] = Some(a.value.eval(ctx)?);
                }
            }
            arg_index += 1;
        }

        Ok(frame)
    }

    /// Evaluates the body with arguments bound, returning a selector-less
    /// carrier ruleset.
    pub fn eval_call(
        &self,
        node: &Node,
        ctx: &mut Context<'_>,
        args: &[MixinArg],
        important: bool,
    ) -> Result<Node> {
        let mut mixin_frames = self.captured_frames();
        mixin_frames.extend(ctx.frames_snapshot());

        let mut evald = Vec::new();
        let frame = self.eval_params(ctx, &mixin_frames, args, &mut evald)?;

        let arguments = Node::from_kind(NodeKind::Expression(Expression::new(
            evald.into_iter().flatten().collect(),
        )))
        .eval(ctx)?;
        frame.insert_rule(0, variable_decl("@arguments", arguments));

        let body = Node::new(
            NodeKind::Ruleset(Box::new(Ruleset::bag(self.rules.clone()))),
            node.index,
            node.file_info.clone(),
        );

        let saved = ctx.swap_frames({
            let mut env = vec![frame];
            env.extend(mixin_frames);
            env
        });
        let result = body.eval(ctx);
        ctx.restore_frames(saved);
        let mut evaluated = result?;

        if important {
            if let NodeKind::Ruleset(rs) = &mut evaluated.kind {
                let important_rules = rs.make_important();
                **rs = important_rules;
            }
        }
        Ok(evaluated)
    }
}

/// A mixin invocation, `.m(args)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MixinCall {
    pub selector: Selector,
    pub args: Vec<MixinArg>,
    pub important: bool,
}

const DEF_NONE: usize = 0;
const DEF_TRUE: usize = 1;
const DEF_FALSE: usize = 2;

struct Candidate {
    mixin: Node,
    group: usize,
}

impl MixinCall {
    pub fn new(selector: Selector, args: Vec<MixinArg>) -> MixinCall {
        MixinCall {
            selector,
            args,
            important: false,
        }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let args = self.eval_args(ctx)?;
        let path = self.selector.mixin_elements();

        // The nearest scope that knows the name wins outright.
        let mut found = Vec::new();
        for frame in ctx.frames_snapshot() {
            frame.with_rules(|rules| find_in_rules(rules, &path, &mut found));
            if !found.is_empty() {
                break;
            }
        }

        if found.is_empty() {
            return Err(LessError::argument(format!(
                "{} is undefined",
                self.selector.css_text()
            ))
            .at(node.index, &node.file_info));
        }

        let candidates = self.filter_candidates(ctx, &found, &args)?;

        if candidates.is_empty() {
            return Err(LessError::argument(format!(
                "no matching definition was found for {}({} argument{})",
                self.selector.css_text(),
                args.len(),
                if args.len() == 1 { "" } else { "s" }
            ))
            .at(node.index, &node.file_info));
        }

        let mut count = [0usize; 3];
        for c in &candidates {
            count[c.group] += 1;
        }
        let default_result = if count[DEF_NONE] > 0 {
            DEF_FALSE
        } else {
            if count[DEF_TRUE] + count[DEF_FALSE] > 1 {
                return Err(LessError::runtime(format!(
                    "ambiguous use of `default()` found when matching for `{}`",
                    self.selector.css_text()
                ))
                .at(node.index, &node.file_info));
            }
            DEF_TRUE
        };

        let mut rules = Vec::new();
        for candidate in &candidates {
            if candidate.group != DEF_NONE && candidate.group != default_result {
                continue;
            }

            let produced = match &candidate.mixin.kind {
                NodeKind::MixinDefinition(md) => {
                    md.eval_call(node, ctx, &args, self.important)?
                }
                NodeKind::Ruleset(rs) => {
                    let anonymous = MixinDefinition::from_ruleset(rs.rules.clone());
                    anonymous.eval_call(node, ctx, &args, self.important)?
                }
                _ => continue,
            };

            if let NodeKind::Ruleset(rs) = produced.kind {
                let mut new_rules = rs.rules;
                if node.visibility.blocks_visibility() {
                    for rule in &mut new_rules {
                        rule.visibility.add_block();
                    }
                }
                rules.extend(new_rules);
            }
        }

        Ok(Node::new(
            NodeKind::Ruleset(Box::new(Ruleset::bag(rules))),
            node.index,
            node.file_info.clone(),
        ))
    }

    /// Evaluates arguments; `...` spreads a list value into positionals.
    fn eval_args(&self, ctx: &mut Context<'_>) -> Result<Vec<MixinArg>> {
        let mut out = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            let value = arg.value.eval(ctx)?;
            if arg.expand {
                let items = match &value.kind {
                    NodeKind::Value(v) => v.value.clone(),
                    NodeKind::Expression(e) => e.value.clone(),
                    _ => vec![value.clone()],
                };
                for item in items {
                    out.push(MixinArg {
                        name: None,
                        value: item,
                        expand: false,
                    });
                }
            } else {
                out.push(MixinArg {
                    name: arg.name.clone(),
                    value,
                    expand: false,
                });
            }
        }
        Ok(out)
    }

    /// Runs arity filtering, then guard evaluation under both `default()`
    /// polarities to classify candidates into the three groups.
    fn filter_candidates(
        &self,
        ctx: &mut Context<'_>,
        found: &[Node],
        args: &[MixinArg],
    ) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();

        for mixin in found {
            match &mixin.kind {
                NodeKind::MixinDefinition(md) => {
                    if !md.match_args(args, ctx) {
                        continue;
                    }

                    let mut results = [false, false];
                    for (f, slot) in results.iter_mut().enumerate() {
                        ctx.default_func.value(Some(f == 1));
                        *slot = md.match_condition(args, ctx);
                    }
                    ctx.default_func.reset();

                    let [with_false, with_true] = results;
                    if with_false || with_true {
                        let group = if with_false != with_true {
                            if with_true {
                                DEF_TRUE
                            } else {
                                DEF_FALSE
                            }
                        } else {
                            DEF_NONE
                        };
                        candidates.push(Candidate {
                            mixin: mixin.clone(),
                            group,
                        });
                    }
                }
                NodeKind::Ruleset(rs) => {
                    // A plain ruleset answers only zero-argument calls, and
                    // its guard lives on its last selector.
                    if !args.is_empty() {
                        continue;
                    }
                    let passes = match rs.selectors.last() {
                        Some(last) => match &last.condition {
                            Some(cond) => {
                                matches!(cond.eval(ctx), Ok(n) if n.is_true_keyword())
                            }
                            None => last.evald_condition,
                        },
                        None => true,
                    };
                    if passes {
                        candidates.push(Candidate {
                            mixin: mixin.clone(),
                            group: DEF_NONE,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(candidates)
    }
}

fn variable_decl(name: &str, value: Node) -> Node {
    Node::from_kind(NodeKind::Declaration(Box::new(Declaration::variable(
        name, value,
    ))))
}
