//! Reference nodes: variables, properties, detached-ruleset calls, and
//! namespace lookups.

use crate::context::{frame_key, Context};
use crate::error::{LessError, Result};
use crate::functions::Call;
use crate::node::{Node, NodeKind};

/// A variable reference, `@name`.  `@@name` resolves `@name` first and uses
/// its value as the name to look up.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Variable {
        Variable { name: name.into() }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        self.eval_named(node, ctx)
    }

    pub fn eval_named(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let mut name = self.name.clone();

        if let Some(indirect) = name.strip_prefix("@@") {
            let inner = Variable::new(format!("@{indirect}")).eval_named(node, ctx)?;
            name = format!("@{}", plain_text(&inner));
        }

        let frames = ctx.frames_snapshot();
        for frame in frames {
            let Some(decl_node) = frame.variable(&name) else {
                continue;
            };
            let NodeKind::Declaration(decl) = &decl_node.kind else {
                continue;
            };

            if decl.important {
                if let Some(scope) = ctx.important_scope.last_mut() {
                    scope.important = true;
                }
            }

            let key = (frame_key(&frame), name.clone());
            if ctx.evaluating.contains(&key) {
                return Err(
                    LessError::name(format!("recursive variable definition for {name}"))
                        .at(node.index, &node.file_info),
                );
            }

            ctx.evaluating.insert(key.clone());
            let result = if ctx.in_calc {
                // Inside calc() math is off; a nested function call context
                // switches it back on for the variable's own value.
                let call = Node::new(
                    NodeKind::Call(Box::new(Call::new("_SELF", vec![decl.value.clone()]))),
                    node.index,
                    node.file_info.clone(),
                );
                call.eval(ctx)
            } else {
                decl.value.eval(ctx)
            };
            ctx.evaluating.remove(&key);

            return result.map_err(|e| e.at(node.index, &node.file_info));
        }

        Err(LessError::name(format!("variable {name} is undefined"))
            .at(node.index, &node.file_info))
    }
}

fn plain_text(node: &Node) -> String {
    match &node.kind {
        NodeKind::Quoted(q) => q.value.clone(),
        NodeKind::Keyword(k) => k.value.clone(),
        _ => node.to_css_string(),
    }
}

/// A property reference, `$name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Property {
        Property { name: name.into() }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        self.eval_named(node, ctx)
    }

    pub fn eval_named(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let name = &self.name;

        let frames = ctx.frames_snapshot();
        for frame in frames {
            let Some(decls) = frame.property(name) else {
                continue;
            };
            // The last declaration in the scope wins.
            let Some(last) = decls.last() else { continue };

            let key = (frame_key(&frame), name.clone());
            if ctx.evaluating.contains(&key) {
                return Err(
                    LessError::name(format!("recursive property reference for {name}"))
                        .at(node.index, &node.file_info),
                );
            }

            ctx.evaluating.insert(key.clone());
            let result = last.eval(ctx);
            ctx.evaluating.remove(&key);

            let evaluated = result.map_err(|e| e.at(node.index, &node.file_info))?;
            if let NodeKind::Declaration(d) = &evaluated.kind {
                if d.important {
                    if let Some(scope) = ctx.important_scope.last_mut() {
                        scope.important = true;
                    }
                }
                return Ok(d.value.clone());
            }
            return Ok(evaluated);
        }

        Err(LessError::name(format!("property \"{name}\" is undefined"))
            .at(node.index, &node.file_info))
    }
}

/// A detached-ruleset invocation, `@name()`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableCall {
    pub name: String,
}

impl VariableCall {
    pub fn new(name: impl Into<String>) -> VariableCall {
        VariableCall { name: name.into() }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let value = Variable::new(self.name.as_str()).eval_named(node, ctx)?;

        match value.kind {
            NodeKind::DetachedRuleset(dr) => dr.call_eval(node, ctx),
            NodeKind::Ruleset(_) => {
                let dr = crate::ruleset::DetachedRuleset::new(value);
                dr.call_eval(node, ctx)
            }
            _ => Err(LessError::runtime(format!(
                "could not evaluate variable call {}",
                self.name
            ))
            .at(node.index, &node.file_info)),
        }
    }
}

/// A lookup chain into a namespace or detached ruleset: `@ns[@var]`,
/// `.ns[$prop]`, `@config[]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceValue {
    pub value: Node,
    pub lookups: Vec<String>,
}

impl NamespaceValue {
    pub fn new(value: Node, lookups: Vec<String>) -> NamespaceValue {
        NamespaceValue { value, lookups }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let mut current = self.value.eval(ctx)?;

        for lookup in &self.lookups {
            // A detached ruleset value opens up into its ruleset before the
            // next lookup applies.
            if let NodeKind::DetachedRuleset(dr) = &current.kind {
                current = dr.call_eval(node, ctx)?;
            }

            let rules = match &current.kind {
                NodeKind::Ruleset(rs) => rs.rules.clone(),
                _ => {
                    return Err(LessError::runtime(
                        "namespace lookup applied to a non-ruleset value",
                    )
                    .at(node.index, &node.file_info))
                }
            };

            let found = if lookup.is_empty() {
                last_declaration(&rules)
            } else if lookup.starts_with('@') {
                let mut name = lookup.clone();
                if name.starts_with("@@") {
                    let indirect = name[2..].to_string();
                    let inner = Variable::new(format!("@{indirect}")).eval_named(node, ctx)?;
                    name = format!("@{}", plain_text(&inner));
                }
                find_variable(&rules, &name)
            } else {
                let name = if let Some(rest) = lookup.strip_prefix("$@") {
                    let inner = Variable::new(format!("@{rest}")).eval_named(node, ctx)?;
                    format!("${}", plain_text(&inner))
                } else if lookup.starts_with('$') {
                    lookup.clone()
                } else {
                    format!("${lookup}")
                };
                find_property(&rules, &name)
            };

            let Some(found) = found else {
                return Err(LessError::name(format!(
                    "{} not found in namespace",
                    if lookup.is_empty() { "value" } else { lookup }
                ))
                .at(node.index, &node.file_info));
            };

            current = match &found.kind {
                NodeKind::Declaration(_) => {
                    let evaluated = found.eval(ctx)?;
                    match evaluated.kind {
                        NodeKind::Declaration(d) => d.value,
                        other => Node::new(other, node.index, node.file_info.clone()),
                    }
                }
                _ => found,
            };
        }

        if let NodeKind::DetachedRuleset(dr) = &current.kind {
            current = dr.call_eval(node, ctx)?;
        }

        Ok(current)
    }
}

fn last_declaration(rules: &[Node]) -> Option<Node> {
    rules
        .iter()
        .rev()
        .find(|r| matches!(&r.kind, NodeKind::Declaration(d) if !d.is_variable))
        .cloned()
}

fn find_variable(rules: &[Node], name: &str) -> Option<Node> {
    rules
        .iter()
        .rev()
        .find(|r| matches!(&r.kind, NodeKind::Declaration(d) if d.is_variable && d.name == name))
        .cloned()
}

fn find_property(rules: &[Node], name: &str) -> Option<Node> {
    let plain = name.strip_prefix('$').unwrap_or(name);
    rules
        .iter()
        .rev()
        .find(|r| matches!(&r.kind, NodeKind::Declaration(d) if !d.is_variable && d.name == plain))
        .cloned()
}
