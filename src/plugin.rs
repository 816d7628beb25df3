//! The host plugin contract: externally-defined functions, host visitors,
//! and JavaScript evaluation.
//!
//! The core never runs host code itself.  A [`PluginHost`] supplied by the
//! embedding application answers function lookups that miss the builtin
//! registry, contributes visitors to the pipeline, and (when enabled)
//! evaluates backtick expressions.  The bridge is lazy by construction:
//! the host is only consulted when a lookup actually misses.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::context::Frame;
use crate::error::{LessError, Result};
use crate::node::{Node, NodeKind};
use crate::visitor::NodeVisitor;

/// An error reported by the host runtime.
#[derive(Debug, Clone)]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> HostError {
        HostError {
            message: message.into(),
        }
    }
}

/// Read access to the evaluator's scope for host functions that look up
/// variables (e.g. a `theme-color(...)` reading design tokens).
pub struct HostScope<'a> {
    frames: &'a VecDeque<Rc<Frame>>,
}

impl<'a> HostScope<'a> {
    pub(crate) fn new(frames: &'a VecDeque<Rc<Frame>>) -> HostScope<'a> {
        HostScope { frames }
    }

    /// The unevaluated value of variable `name` (`@`-prefixed), innermost
    /// scope first.
    pub fn variable(&self, name: &str) -> Option<Node> {
        for frame in self.frames {
            if let Some(decl_node) = frame.variable(name) {
                if let NodeKind::Declaration(d) = &decl_node.kind {
                    return Some(d.value.clone());
                }
            }
        }
        None
    }
}

/// The host runtime contract.
pub trait PluginHost {
    fn has_function(&self, name: &str) -> bool;

    /// Calls a host function with evaluated arguments.  `Ok(None)` means
    /// the function produced nothing; the call collapses to an empty value.
    fn call_function(
        &self,
        name: &str,
        args: &[Node],
        scope: &HostScope<'_>,
    ) -> std::result::Result<Option<Node>, HostError>;

    fn pre_eval_visitors(&self) -> Vec<Box<dyn NodeVisitor>> {
        Vec::new()
    }

    fn post_eval_visitors(&self) -> Vec<Box<dyn NodeVisitor>> {
        Vec::new()
    }

    /// Scope notifications, so host-side scoping can shadow core scoping.
    fn scope_enter(&self) {}
    fn scope_exit(&self) {}

    /// Evaluates a backtick expression.  Only reached when the compile
    /// options enable JavaScript.
    fn evaluate_js(
        &self,
        _source: &str,
        _escaped: bool,
        _scope: &HostScope<'_>,
    ) -> Result<Node> {
        Err(LessError::runtime(
            "the configured plugin host does not evaluate JavaScript",
        ))
    }
}

/// Shallow validation of a host-returned node before it is spliced into
/// the tree: it gets the call site's location, and obviously structural
/// kinds are rejected down to text.
pub(crate) fn coerce_host_node(node: Node, call_site: &Node) -> Node {
    match node.kind {
        NodeKind::Ruleset(_) | NodeKind::MixinDefinition(_) | NodeKind::Import(_) => {
            log::warn!("host function returned a structural node; coercing to text");
            Node::anonymous(node.to_css_string()).with_meta_of(call_site)
        }
        _ => node.with_meta_of(call_site),
    }
}
