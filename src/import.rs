//! `@import` evaluation and the import-manager contract.
//!
//! The core never touches the filesystem: an [`ImportResolver`] supplied by
//! the caller turns an import path into file contents, and the external
//! parser turns those contents into a ruleset whose rules are inlined in
//! place of the import statement.

use std::rc::Rc;

use crate::context::Context;
use crate::error::{LessError, Result};
use crate::node::{FileInfo, Node, NodeKind};
use crate::output::{CssContext, Output};
use crate::ruleset::Ruleset;

/// What an import manager returns for one resolved path.
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    pub absolute_path: String,
    pub contents: String,

    /// The same path was handed out before during this compile.
    pub already_imported: bool,
}

/// Resolves `@import` targets.  Supplied by the embedding application.
/// `search_paths` are the compile option's import roots, in priority order.
pub trait ImportResolver {
    fn resolve(
        &self,
        path: &str,
        current_file: &str,
        search_paths: &[String],
    ) -> Result<ResolvedImport>;
}

/// Parsed `@import (...)` options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Inline the file but hide its rules from output unless re-exposed by
    /// an extend.
    pub reference: bool,

    /// Splice the raw file contents into the output without parsing.
    pub inline: bool,

    /// Keep the statement as a plain CSS `@import`.
    pub css: bool,

    /// Treat the file as LESS regardless of extension.
    pub less: bool,

    /// Re-import even if the file was imported before.
    pub multiple: bool,

    /// Never import twice, overriding `import_multiple`.
    pub once: bool,

    /// A failed resolve contributes nothing instead of erroring.
    pub optional: bool,
}

/// An `@import` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: Node,
    pub features: Option<Node>,
    pub options: ImportOptions,
}

impl Import {
    pub fn new(path: Node, features: Option<Node>, options: ImportOptions) -> Import {
        Import {
            path,
            features,
            options,
        }
    }

    fn path_string(&self, evaluated: &Node) -> Option<String> {
        match &evaluated.kind {
            NodeKind::Quoted(q) => Some(q.value.clone()),
            NodeKind::Url(u) => match &u.value.kind {
                NodeKind::Quoted(q) => Some(q.value.clone()),
                NodeKind::Anonymous(a) => Some(a.value.clone()),
                _ => None,
            },
            NodeKind::Anonymous(a) => Some(a.value.clone()),
            _ => None,
        }
    }

    fn is_css_import(&self, path: &str) -> bool {
        if self.options.less {
            return false;
        }
        self.options.css || path.ends_with(".css") || path.contains(".css?") || path.contains(".css#")
    }

    pub fn eval(&self, node: &Node, ctx: &mut Context<'_>) -> Result<Node> {
        let path = self.path.eval(ctx)?;
        let features = match &self.features {
            Some(f) => Some(f.eval(ctx)?),
            None => None,
        };

        let Some(path_text) = self.path_string(&path) else {
            return Err(LessError::import("import path must be a string or url")
                .at(node.index, &node.file_info));
        };

        // Plain CSS imports pass through to the output untouched.
        if self.is_css_import(&path_text) {
            let mut out = Node::new(
                NodeKind::Import(Box::new(Import {
                    path,
                    features,
                    options: self.options,
                })),
                node.index,
                node.file_info.clone(),
            );
            out.visibility.copy_from(&node.visibility);
            return Ok(out);
        }

        let Some(importer) = ctx.importer else {
            return Err(LessError::import(format!(
                "cannot import '{path_text}': no import resolver is configured"
            ))
            .at(node.index, &node.file_info));
        };

        let search_paths = ctx.options.paths.clone();
        let resolved = match importer.resolve(&path_text, &node.file_info.filename, &search_paths) {
            Ok(resolved) => resolved,
            Err(e) if self.options.optional => {
                log::debug!("optional import '{path_text}' skipped: {e}");
                return Ok(empty_bag(node));
            }
            Err(e) => return Err(e.at(node.index, &node.file_info)),
        };

        if ctx.import_stack.contains(&resolved.absolute_path) {
            return Err(LessError::import(format!(
                "recursive import of '{}'",
                resolved.absolute_path
            ))
            .at(node.index, &node.file_info));
        }

        let skip = resolved.already_imported
            && !self.options.multiple
            && !ctx.options.import_multiple
            || (resolved.already_imported && self.options.once);
        if skip {
            log::debug!("skipping repeated import of '{}'", resolved.absolute_path);
            return Ok(empty_bag(node));
        }

        if !ctx.imports.contains(&resolved.absolute_path) {
            ctx.imports.push(resolved.absolute_path.clone());
        }
        log::debug!("inlining import '{}'", resolved.absolute_path);

        let file_info = Rc::new(FileInfo {
            filename: resolved.absolute_path.clone(),
            root_path: node.file_info.root_path.clone(),
            reference: node.file_info.reference || self.options.reference,
        });

        if self.options.inline {
            let mut anon = crate::value::Anonymous::new(resolved.contents);
            anon.ruleset_like = true;
            let mut out = Node::new(NodeKind::Anonymous(anon), node.index, file_info);
            if self.options.reference {
                out.visibility.add_block();
            }
            return Ok(out);
        }

        let Some(parser) = ctx.parser else {
            return Err(LessError::import(format!(
                "cannot import '{path_text}': no parser is configured"
            ))
            .at(node.index, &node.file_info));
        };

        let parsed = parser
            .parse(&resolved.contents, &resolved.absolute_path)
            .map_err(|e| e.at(node.index, &node.file_info))?;

        let mut rules = match parsed.kind {
            NodeKind::Ruleset(rs) => rs.rules,
            other => vec![Node::new(other, node.index, Rc::clone(&file_info))],
        };

        // Imports inside the imported file inline here, inside the cycle
        // guard, before the host ruleset ever sees them.
        ctx.import_stack.push(resolved.absolute_path.clone());
        let inlined = inline_imports(&mut rules, ctx);
        ctx.import_stack.pop();
        inlined?;

        let blocks = self.options.reference || node.visibility.blocks_visibility();
        if blocks {
            for rule in &mut rules {
                rule.visibility.add_block();
            }
        }

        if let Some(features) = features {
            // A media-qualified import wraps the inlined rules.
            let media = crate::atrule::Media::new(features, rules);
            return Ok(Node::new(
                NodeKind::Media(Box::new(media)),
                node.index,
                file_info,
            ));
        }
        Ok(Node::new(
            NodeKind::Ruleset(Box::new(Ruleset::bag(rules))),
            node.index,
            file_info,
        ))
    }

    /// See [`inline_imports`].
    fn splice_target(evaluated: Node) -> std::result::Result<Vec<Node>, Node> {
        match evaluated.kind {
            NodeKind::Ruleset(rs) if rs.selectors.is_empty() && !rs.root && !rs.multi_media => {
                Ok(rs.rules)
            }
            _ => Err(evaluated),
        }
    }

    pub fn gen_css(&self, node: &Node, ctx: &mut CssContext, out: &mut Output) {
        if !ctx.compress {
            out.add(&ctx.indent(), None, None);
        }
        out.add("@import ", Some(&node.file_info), Some(node.index));
        self.path.gen_css(ctx, out);
        if let Some(features) = &self.features {
            out.add(" ", None, None);
            features.gen_css(ctx, out);
        }
        out.add(";", None, None);
        if !ctx.compress {
            out.add("\n", None, None);
        }
    }
}

/// Replaces every `@import` in `rules` with the rules it resolves to.
pub(crate) fn inline_imports(rules: &mut Vec<Node>, ctx: &mut Context<'_>) -> Result<()> {
    let mut i = 0;
    while i < rules.len() {
        if !matches!(rules[i].kind, NodeKind::Import(_)) {
            i += 1;
            continue;
        }
        let evaluated = rules[i].eval(ctx)?;
        match Import::splice_target(evaluated) {
            Ok(spliced) => {
                let count = spliced.len();
                rules.splice(i..=i, spliced);
                i += count;
            }
            Err(node) => {
                rules[i] = node;
                i += 1;
            }
        }
    }
    Ok(())
}

fn empty_bag(node: &Node) -> Node {
    Node::new(
        NodeKind::Ruleset(Box::new(Ruleset::bag(Vec::new()))),
        node.index,
        node.file_info.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_imports_pass_through() {
        let import = Import::new(
            Node::quoted('"', "theme.css", false),
            None,
            ImportOptions::default(),
        );
        let node = Node::from_kind(NodeKind::Import(Box::new(import)));

        let mut ctx = crate::context::Context::for_tests();
        let result = node.eval(&mut ctx).unwrap();
        assert!(matches!(result.kind, NodeKind::Import(_)));
        assert_eq!(result.to_css_string(), "@import \"theme.css\";\n");
    }

    #[test]
    fn missing_resolver_is_an_import_error() {
        let import = Import::new(
            Node::quoted('"', "mixins.less", false),
            None,
            ImportOptions::default(),
        );
        let node = Node::from_kind(NodeKind::Import(Box::new(import)));

        let mut ctx = crate::context::Context::for_tests();
        let err = node.eval(&mut ctx).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Import);
    }
}
