//! String functions: `e`, `escape`, `replace`, and `%` formatting.

use std::collections::HashMap;

use regex::Regex;

use super::{eager, string_value, FnContext, FunctionDefinition, FunctionValue};
use crate::error::{LessError, Result};
use crate::node::{Node, NodeKind};
use crate::value::Quoted;

pub(super) fn register(map: &mut HashMap<&'static str, FunctionDefinition>) {
    map.insert("e", eager(e));
    map.insert("escape", eager(escape));
    map.insert("replace", eager(replace));
    map.insert("%", eager(format_));
}

fn first_text(args: &[Node], what: &str) -> Result<String> {
    args.first()
        .map(string_value)
        .ok_or_else(|| LessError::argument(format!("{what} expects a string")))
}

/// `e("...")` drops the quotes on output.
fn e(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let text = first_text(args, "e()")?;
    Ok(FunctionValue::Node(fctx.node(NodeKind::Quoted(
        Quoted::new('"', text, true),
    ))))
}

fn escape(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let text = first_text(args, "escape()")?;
    let encoded = percent_encode(&text, |c| {
        c.is_ascii_alphanumeric() || matches!(c, ',' | '/' | '?' | '@' | '&' | '+' | '$' | '-' | '_' | '.' | '!' | '~' | '*' | '\'')
    });
    Ok(FunctionValue::Node(fctx.node(NodeKind::Anonymous(
        crate::value::Anonymous::new(encoded),
    ))))
}

fn replace(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    if args.len() < 3 {
        return Err(LessError::argument(
            "replace() expects a string, a pattern, and a replacement",
        ));
    }

    let subject = &args[0];
    let text = string_value(subject);
    let pattern = string_value(&args[1]);
    let replacement = string_value(&args[2]);
    let flags = args.get(3).map(string_value).unwrap_or_default();

    let pattern = if flags.contains('i') {
        format!("(?i){pattern}")
    } else {
        pattern
    };
    let re = Regex::new(&pattern)
        .map_err(|e| LessError::argument(format!("invalid replace() pattern: {e}")))?;

    let result = if flags.contains('g') {
        re.replace_all(&text, replacement.as_str()).into_owned()
    } else {
        re.replace(&text, replacement.as_str()).into_owned()
    };

    let node = match &subject.kind {
        NodeKind::Quoted(q) => fctx.node(NodeKind::Quoted(Quoted::new(q.quote, result, q.escaped))),
        _ => fctx.node(NodeKind::Quoted(Quoted::new('"', result, true))),
    };
    Ok(FunctionValue::Node(node))
}

/// `%("format", args...)`: `%s`/`%d`/`%a` substitute arguments, uppercase
/// variants URL-encode the substituted text.
fn format_(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(fmt_node) = args.first() else {
        return Err(LessError::argument("%() expects a format string"));
    };
    let NodeKind::Quoted(fmt) = &fmt_node.kind else {
        return Err(LessError::argument("%() expects a quoted format string"));
    };

    let mut result = String::with_capacity(fmt.value.len());
    let mut arg_index = 1;
    let mut chars = fmt.value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => result.push('%'),
            Some(directive @ ('s' | 'S' | 'd' | 'D' | 'a' | 'A')) => {
                let Some(arg) = args.get(arg_index) else {
                    return Err(LessError::argument("not enough arguments for format"));
                };
                arg_index += 1;

                let text = if directive.eq_ignore_ascii_case(&'s') {
                    string_value(arg)
                } else {
                    arg.to_css_string()
                };
                if directive.is_ascii_uppercase() {
                    result.push_str(&percent_encode(&text, |c| {
                        c.is_ascii_alphanumeric()
                            || matches!(c, '-' | '_' | '.' | '!' | '~' | '*' | '\'' | '(' | ')')
                    }));
                } else {
                    result.push_str(&text);
                }
            }
            Some(other) => {
                result.push('%');
                result.push(other);
            }
            None => result.push('%'),
        }
    }

    Ok(FunctionValue::Node(fctx.node(NodeKind::Quoted(
        Quoted::new(fmt.quote, result, fmt.escaped),
    ))))
}

fn percent_encode(text: &str, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if keep(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::functions::Call;

    fn eval_call(name: &str, args: Vec<Node>) -> Node {
        let mut ctx = Context::for_tests();
        Node::from_kind(NodeKind::Call(Box::new(Call::new(name, args))))
            .eval(&mut ctx)
            .unwrap()
    }

    #[test]
    fn e_unquotes() {
        let result = eval_call("e", vec![Node::quoted('"', "ms:stuff()", false)]);
        assert_eq!(result.to_css_string(), "ms:stuff()");
    }

    #[test]
    fn escape_encodes_reserved_characters() {
        let result = eval_call("escape", vec![Node::quoted('"', "a=1 (b)", false)]);
        assert_eq!(result.to_css_string(), "a%3D1%20%28b%29");
    }

    #[test]
    fn replace_first_occurrence_by_default() {
        let result = eval_call(
            "replace",
            vec![
                Node::quoted('"', "one two one", false),
                Node::quoted('"', "one", false),
                Node::quoted('"', "1", false),
            ],
        );
        assert_eq!(result.to_css_string(), "\"1 two one\"");
    }

    #[test]
    fn replace_global_flag() {
        let result = eval_call(
            "replace",
            vec![
                Node::quoted('"', "one two one", false),
                Node::quoted('"', "one", false),
                Node::quoted('"', "1", false),
                Node::quoted('"', "g", false),
            ],
        );
        assert_eq!(result.to_css_string(), "\"1 two 1\"");
    }

    #[test]
    fn format_substitutes_in_order() {
        let result = eval_call(
            "%",
            vec![
                Node::quoted('"', "%s-%d", false),
                Node::quoted('"', "a", false),
                Node::number(3.0),
            ],
        );
        assert_eq!(result.to_css_string(), "\"a-3\"");
    }
}
