//! Terminal value nodes: quoted strings, keywords, anonymous text, unicode
//! ranges, host-evaluated JavaScript, and URLs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::Context;
use crate::error::{LessError, Result};
use crate::node::{Node, NodeKind};
use crate::output::{CssContext, Output};
use crate::variable::{Property, Variable};

/// The four arithmetic operators.  The legacy `./` spelling normalizes to
/// division before it gets here.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub fn from_symbol(s: &str) -> Option<Operator> {
        match s {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Subtract),
            "*" => Some(Operator::Multiply),
            "/" | "./" => Some(Operator::Divide),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
        }
    }
}

/// A quoted string.  With `escaped` set (the `~"..."` form) the quotes are
/// dropped on output.
#[derive(Debug, Clone, PartialEq)]
pub struct Quoted {
    pub quote: char,
    pub value: String,
    pub escaped: bool,
}

static VAR_INTERP: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\{([\w-]+)\}").unwrap());
static PROP_INTERP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([\w-]+)\}").unwrap());

impl Quoted {
    pub fn new(quote: char, value: impl Into<String>, escaped: bool) -> Quoted {
        Quoted {
            quote,
            value: value.into(),
            escaped,
        }
    }

    /// Substitutes `@{name}` and `${name}` references, repeating until the
    /// string stops changing.  A self-referencing variable is caught by the
    /// evaluator's recursion marker, so the loop terminates.
    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let mut value = self.value.clone();

        loop {
            let var_match = VAR_INTERP
                .captures(&value)
                .map(|caps| (caps.get(0).unwrap().range(), caps[1].to_string()));
            let prop_match = PROP_INTERP
                .captures(&value)
                .map(|caps| (caps.get(0).unwrap().range(), caps[1].to_string()));

            if let Some((range, raw)) = var_match {
                let name = format!("@{raw}");
                let replacement = Variable::new(name).eval_named(node, ctx)?;
                let text = interpolation_text(&replacement);
                value.replace_range(range, &text);
            } else if let Some((range, raw)) = prop_match {
                let name = format!("${raw}");
                let replacement = Property::new(name).eval_named(node, ctx)?;
                let text = interpolation_text(&replacement);
                value.replace_range(range, &text);
            } else {
                break;
            }
        }

        Ok(Node::new(
            NodeKind::Quoted(Quoted::new(self.quote, value, self.escaped)),
            node.index,
            node.file_info.clone(),
        ))
    }

    pub fn gen_css(&self, node: &Node, _ctx: &mut CssContext, out: &mut Output) {
        if self.escaped {
            out.add(&self.value, Some(&node.file_info), Some(node.index));
        } else {
            let quoted = format!("{q}{v}{q}", q = self.quote, v = self.value);
            out.add(&quoted, Some(&node.file_info), Some(node.index));
        }
    }
}

fn interpolation_text(node: &Node) -> String {
    match &node.kind {
        NodeKind::Quoted(q) => q.value.clone(),
        _ => node.to_css_string(),
    }
}

/// A bare identifier, e.g. `solid` or `screen`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub value: String,
}

impl Keyword {
    pub fn new(value: impl Into<String>) -> Keyword {
        Keyword {
            value: value.into(),
        }
    }

    pub fn truth(value: bool) -> NodeKind {
        NodeKind::Keyword(Keyword::new(if value { "true" } else { "false" }))
    }
}

/// Verbatim text the parser passed through without deeper structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Anonymous {
    pub value: String,
    pub ruleset_like: bool,
    pub map_lines: bool,
}

impl Anonymous {
    pub fn new(value: impl Into<String>) -> Anonymous {
        Anonymous {
            value: value.into(),
            ruleset_like: false,
            map_lines: false,
        }
    }

    /// Numeric anonymous text participates in arithmetic as a plain number.
    pub fn to_dimension(&self) -> Option<crate::dimension::Dimension> {
        self.value
            .trim()
            .parse::<f64>()
            .ok()
            .map(crate::dimension::Dimension::new)
    }

    pub fn gen_css(&self, node: &Node, _ctx: &mut CssContext, out: &mut Output) {
        out.add(&self.value, Some(&node.file_info), Some(node.index));
    }
}

/// A `U+...` unicode range descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct UnicodeDescriptor {
    pub text: String,
}

/// A backtick expression, evaluated by the host when JavaScript is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct JavaScript {
    pub source: String,
    pub escaped: bool,
}

impl JavaScript {
    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        if !ctx.options.javascript_enabled {
            return Err(LessError::runtime(
                "you are using JavaScript, which has been disabled",
            )
            .at(node.index, &node.file_info));
        }

        let Some(host) = ctx.host else {
            return Err(LessError::runtime(
                "JavaScript evaluation requires a plugin host",
            )
            .at(node.index, &node.file_info));
        };

        let scope = crate::plugin::HostScope::new(&ctx.frames);
        let result = host
            .evaluate_js(&self.source, self.escaped, &scope)
            .map_err(|e| e.at(node.index, &node.file_info))?;
        Ok(result.with_meta_of(node))
    }
}

/// How `url(...)` values are rewritten.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RewriteUrls {
    #[default]
    Off,
    /// Rewrite only URLs that start with an explicit `.` or `..` segment.
    Local,
    /// Rewrite every relative URL.
    All,
}

/// A `url(...)` value.
#[derive(Debug, Clone, PartialEq)]
pub struct Url {
    pub value: Node,

    /// Rewriting happens once; re-evaluating an already evaluated URL is a
    /// no-op.
    pub is_evald: bool,
}

impl Url {
    pub fn new(value: Node) -> Url {
        Url {
            value,
            is_evald: false,
        }
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let mut val = self.value.eval(ctx)?;

        if !self.is_evald {
            let (text, quoted) = match &val.kind {
                NodeKind::Quoted(q) => (Some(q.value.clone()), true),
                NodeKind::Anonymous(a) => (Some(a.value.clone()), false),
                _ => (None, false),
            };

            if let Some(text) = text {
                let mut rewritten = if path_requires_rewrite(&text, ctx.options.rewrite_urls) {
                    let mut root = if node.file_info.root_path.is_empty() {
                        ctx.options.root_path.clone()
                    } else {
                        node.file_info.root_path.clone()
                    };
                    if !quoted {
                        root = escape_path(&root);
                    }
                    normalize_path(&format!("{root}{text}"))
                } else {
                    normalize_path(&text)
                };

                if !ctx.options.url_args.is_empty() && !rewritten.trim_start().starts_with("data:")
                {
                    let delimiter = if rewritten.contains('?') { "&" } else { "?" };
                    let args = format!("{delimiter}{}", ctx.options.url_args);
                    if let Some(pos) = rewritten.find('#') {
                        rewritten.insert_str(pos, &args);
                    } else {
                        rewritten.push_str(&args);
                    }
                }

                match &mut val.kind {
                    NodeKind::Quoted(q) => q.value = rewritten,
                    NodeKind::Anonymous(a) => a.value = rewritten,
                    _ => unreachable!(),
                }
            }
        }

        Ok(Node::new(
            NodeKind::Url(Box::new(Url {
                value: val,
                is_evald: true,
            })),
            node.index,
            node.file_info.clone(),
        ))
    }

    pub fn gen_css(&self, node: &Node, ctx: &mut CssContext, out: &mut Output) {
        out.add("url(", Some(&node.file_info), Some(node.index));
        self.value.gen_css(ctx, out);
        out.add(")", None, None);
    }
}

fn path_requires_rewrite(path: &str, mode: RewriteUrls) -> bool {
    match mode {
        RewriteUrls::Off => false,
        RewriteUrls::Local => path.starts_with('.'),
        RewriteUrls::All => is_path_relative(path),
    }
}

fn is_path_relative(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('#') {
        return false;
    }
    // Anything with a scheme is absolute.
    url::Url::parse(path).is_err()
}

fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if matches!(c, '(' | ')' | '\'' | '"') || c.is_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Collapses `.` and `..` segments without touching the filesystem.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                if matches!(segments.last(), Some(&s) if s != ".." && !s.is_empty()) {
                    segments.pop();
                } else {
                    segments.push(segment);
                }
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_detection() {
        assert!(is_path_relative("images/a.png"));
        assert!(is_path_relative("./images/a.png"));
        assert!(!is_path_relative("/images/a.png"));
        assert!(!is_path_relative("http://example.com/a.png"));
        assert!(!is_path_relative("data:image/png;base64,xyz"));
        assert!(!is_path_relative("#fragment"));
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(normalize_path("a/b/../c/./d.png"), "a/c/d.png");
        assert_eq!(normalize_path("../up.png"), "../up.png");
    }

    #[test]
    fn escaped_quotes_are_dropped_on_output() {
        let node = Node::quoted('"', "a b", true);
        assert_eq!(node.to_css_string(), "a b");

        let node = Node::quoted('\'', "a b", false);
        assert_eq!(node.to_css_string(), "'a b'");
    }
}
