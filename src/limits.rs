//! Processing limits to mitigate malicious or degenerate stylesheets.

/// Maximum nesting depth of ruleset evaluation.
///
/// Evaluation is recursive; mixins calling mixins and deeply nested rulesets
/// grow the native stack.  Stylesheets that nest deeper than this are almost
/// certainly adversarial or broken, and get a clean error instead of stack
/// exhaustion.
pub const MAX_EVAL_DEPTH: usize = 256;
