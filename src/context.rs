//! The evaluation context: scope frames, math gating, bubbling buffers, and
//! the collaborator handles threaded through a compile.
//!
//! One mutable [`Context`] travels through the whole evaluation.  Every push
//! onto one of its stacks is paired with a pop on every exit path; the
//! evaluator treats a missed pop as corruption of the rest of the compile,
//! so all pushing call sites restore state before propagating errors.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::api::Parser;
use crate::atrule::BubbledBlock;
use crate::error::Result;
use crate::functions::FunctionRegistry;
use crate::import::ImportResolver;
use crate::node::{Node, NodeKind};
use crate::plugin::PluginHost;
use crate::selector::Selector;
use crate::value::{Operator, RewriteUrls};

/// Policy controlling when arithmetic inside expressions is evaluated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MathMode {
    /// All operations evaluate everywhere.
    Always,

    /// Division evaluates only inside parentheses; other operators always.
    #[default]
    ParensDivision,

    /// All operations require parentheses.
    Parens,
}

/// The option subset the evaluator consults.
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// Search roots handed to the import resolver.
    pub paths: Vec<String>,
    pub math: MathMode,
    pub strict_units: bool,
    pub rewrite_urls: RewriteUrls,
    pub root_path: String,
    pub url_args: String,
    pub javascript_enabled: bool,
    pub import_multiple: bool,
}

/// State backing the `default()` guard function.
///
/// While mixin candidates are filtered, the caller parks the value that
/// `default()` should report; outside that window calling `default()` is a
/// syntax error.
#[derive(Debug, Default)]
pub struct DefaultFunc {
    value: Option<bool>,
    error: Option<String>,
}

impl DefaultFunc {
    pub fn value(&mut self, v: Option<bool>) {
        self.value = v;
    }

    pub fn error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    pub fn reset(&mut self) {
        self.value = None;
        self.error = None;
    }

    /// What `default()` evaluates to right now.
    pub fn eval(&self) -> Result<Option<bool>> {
        if let Some(msg) = &self.error {
            return Err(crate::error::LessError::syntax(msg.clone()));
        }
        Ok(self.value)
    }
}

/// Tracks `!important` travelling through variable substitution: a
/// declaration pushes a scope, and any important variable value read while
/// it evaluates marks the scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportantScope {
    pub important: bool,
}

/// A scope frame: the variables, properties, and mixins of one ruleset,
/// plus the function registry visible in that scope.
///
/// Frames are shared by reference; mixin definitions and detached rulesets
/// capture the frame stack at their definition site.  The rule list is
/// interior-mutable because mixin-call results are spliced into the scope
/// that invoked them, but that only ever happens while the frame is the
/// innermost scope.
pub struct Frame {
    rules: RefCell<Vec<Node>>,
    functions: Rc<FunctionRegistry>,
    var_cache: RefCell<Option<Rc<HashMap<String, Node>>>>,
    prop_cache: RefCell<Option<Rc<HashMap<String, Vec<Node>>>>>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({} rules)", self.rules.borrow().len())
    }
}

impl Frame {
    pub fn new(functions: Rc<FunctionRegistry>) -> Frame {
        Frame::from_rules(Vec::new(), functions)
    }

    pub fn from_rules(rules: Vec<Node>, functions: Rc<FunctionRegistry>) -> Frame {
        Frame {
            rules: RefCell::new(rules),
            functions,
            var_cache: RefCell::new(None),
            prop_cache: RefCell::new(None),
        }
    }

    pub fn functions(&self) -> &Rc<FunctionRegistry> {
        &self.functions
    }

    pub fn rules_len(&self) -> usize {
        self.rules.borrow().len()
    }

    pub fn rule_at(&self, i: usize) -> Option<Node> {
        self.rules.borrow().get(i).cloned()
    }

    pub fn set_rule(&self, i: usize, node: Node) {
        self.rules.borrow_mut()[i] = node;
    }

    /// Replaces the rule at `i` with `replacement`, returning how many rules
    /// now sit at that position.
    pub fn splice_rules(&self, i: usize, replacement: Vec<Node>) -> usize {
        let count = replacement.len();
        let mut rules = self.rules.borrow_mut();
        rules.splice(i..=i, replacement);
        drop(rules);
        self.reset_cache();
        count
    }

    pub fn remove_rule(&self, i: usize) {
        self.rules.borrow_mut().remove(i);
        self.reset_cache();
    }

    pub fn insert_rule(&self, i: usize, node: Node) {
        self.rules.borrow_mut().insert(i, node);
        self.reset_cache();
    }

    pub fn rules_snapshot(&self) -> Vec<Node> {
        self.rules.borrow().clone()
    }

    pub fn with_rules<R>(&self, f: impl FnOnce(&[Node]) -> R) -> R {
        f(&self.rules.borrow())
    }

    pub fn reset_cache(&self) {
        *self.var_cache.borrow_mut() = None;
        *self.prop_cache.borrow_mut() = None;
    }

    /// The declaration for variable `name` (`@`-prefixed), if this scope
    /// defines it.  The last declaration in the scope wins.
    pub fn variable(&self, name: &str) -> Option<Node> {
        self.ensure_var_cache();
        self.var_cache
            .borrow()
            .as_ref()
            .and_then(|map| map.get(name).cloned())
    }

    /// All declarations of property `name` (`$`-prefixed key).
    pub fn property(&self, name: &str) -> Option<Vec<Node>> {
        self.ensure_prop_cache();
        self.prop_cache
            .borrow()
            .as_ref()
            .and_then(|map| map.get(name).cloned())
    }

    fn ensure_var_cache(&self) {
        if self.var_cache.borrow().is_some() {
            return;
        }
        let mut map = HashMap::new();
        for rule in self.rules.borrow().iter() {
            if let NodeKind::Declaration(d) = &rule.kind {
                if d.is_variable {
                    map.insert(d.name.clone(), rule.clone());
                }
            }
        }
        *self.var_cache.borrow_mut() = Some(Rc::new(map));
    }

    fn ensure_prop_cache(&self) {
        if self.prop_cache.borrow().is_some() {
            return;
        }
        let mut map: HashMap<String, Vec<Node>> = HashMap::new();
        for rule in self.rules.borrow().iter() {
            if let NodeKind::Declaration(d) = &rule.kind {
                if !d.is_variable {
                    map.entry(format!("${}", d.name))
                        .or_default()
                        .push(rule.clone());
                }
            }
        }
        *self.prop_cache.borrow_mut() = Some(Rc::new(map));
    }
}

/// The mutable state of one compile.
pub struct Context<'a> {
    pub options: EvalOptions,

    /// Scope frames, innermost at the front.
    pub frames: VecDeque<Rc<Frame>>,

    /// Evaluated selector lists of the enclosing rulesets, for `&` capture
    /// by bubbling at-rules.
    pub selectors_stack: Vec<Vec<Selector>>,

    pub math_on: bool,
    pub in_calc: bool,
    calc_stack: Vec<bool>,
    parens_stack: Vec<bool>,

    /// All media-like blocks seen, in source order.  `None` until the first
    /// bubbling at-rule initializes it.
    pub media_blocks: Option<Vec<Rc<RefCell<BubbledBlock>>>>,

    /// The enclosing media-like blocks along the current evaluation path.
    pub media_path: Vec<Rc<RefCell<BubbledBlock>>>,

    pub default_func: DefaultFunc,
    pub important_scope: Vec<ImportantScope>,

    /// In-progress variable lookups, keyed by (frame address, name), for
    /// recursive-definition detection.
    pub evaluating: HashSet<(usize, String)>,

    /// Absolute paths of every resolved import, in resolution order.
    pub imports: Vec<String>,

    /// Files currently being inlined, for circular-import detection.
    pub import_stack: Vec<String>,

    /// Current ruleset nesting depth, bounded by
    /// [`crate::limits::MAX_EVAL_DEPTH`].
    pub eval_depth: usize,

    default_registry: Rc<FunctionRegistry>,

    pub parser: Option<&'a dyn Parser>,
    pub importer: Option<&'a dyn ImportResolver>,
    pub host: Option<&'a dyn PluginHost>,
}

impl<'a> Context<'a> {
    pub fn new(options: EvalOptions) -> Context<'a> {
        Context {
            options,
            frames: VecDeque::new(),
            selectors_stack: Vec::new(),
            math_on: true,
            in_calc: false,
            calc_stack: Vec::new(),
            parens_stack: Vec::new(),
            media_blocks: None,
            media_path: Vec::new(),
            default_func: DefaultFunc::default(),
            important_scope: Vec::new(),
            evaluating: HashSet::new(),
            imports: Vec::new(),
            import_stack: Vec::new(),
            eval_depth: 0,
            default_registry: Rc::new(FunctionRegistry::with_builtins()),
            parser: None,
            importer: None,
            host: None,
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Context<'static> {
        Context::new(EvalOptions::default())
    }

    /// Whether arithmetic should run for `op` at this point.
    pub fn is_math_on(&self, op: Option<Operator>) -> bool {
        if !self.math_on {
            return false;
        }
        if op == Some(Operator::Divide)
            && self.options.math != MathMode::Always
            && self.parens_stack.is_empty()
        {
            return false;
        }
        if self.options.math == MathMode::Parens {
            return !self.parens_stack.is_empty();
        }
        true
    }

    pub fn enter_calc(&mut self) {
        self.calc_stack.push(true);
        self.in_calc = true;
    }

    pub fn exit_calc(&mut self) {
        self.calc_stack.pop();
        self.in_calc = !self.calc_stack.is_empty();
    }

    pub fn in_parenthesis(&mut self) {
        self.parens_stack.push(true);
    }

    pub fn out_of_parenthesis(&mut self) {
        self.parens_stack.pop();
    }

    pub fn push_frame(&mut self, frame: Rc<Frame>) {
        self.frames.push_front(frame);
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop_front();
    }

    /// The function registry of the innermost scope.
    pub fn current_registry(&self) -> Rc<FunctionRegistry> {
        self.frames
            .front()
            .map(|f| Rc::clone(f.functions()))
            .unwrap_or_else(|| Rc::clone(&self.default_registry))
    }

    pub fn frames_snapshot(&self) -> Vec<Rc<Frame>> {
        self.frames.iter().cloned().collect()
    }

    /// Replaces the whole frame stack, returning the previous one.  Mixin
    /// bodies evaluate in their captured environment, not the caller's.
    pub fn swap_frames(&mut self, frames: Vec<Rc<Frame>>) -> VecDeque<Rc<Frame>> {
        std::mem::replace(&mut self.frames, frames.into())
    }

    pub fn restore_frames(&mut self, frames: VecDeque<Rc<Frame>>) {
        self.frames = frames;
    }

    pub fn media_block_count(&self) -> usize {
        self.media_blocks.as_ref().map_or(0, |b| b.len())
    }
}

pub fn frame_key(frame: &Rc<Frame>) -> usize {
    Rc::as_ptr(frame) as usize
}
