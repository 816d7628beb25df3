//! The public compile facade.
//!
//! A [`Compiler`] owns the external collaborators — the textual parser, the
//! import resolver, and the optional plugin host — and drives one compile:
//! inject option variables, parse, run host pre-eval visitors, evaluate,
//! join selectors, process extends, run host post-eval visitors, clean up,
//! and emit.
//!
//! ```no_run
//! # use lessc::{Compiler, Options, Parser};
//! # fn parser() -> Box<dyn Parser> { unimplemented!() }
//! let compiler = Compiler::new(parser());
//! let output = compiler.compile("@a: 10px; .x { width: @a }", &Options::default())?;
//! println!("{}", output.css);
//! # Ok::<(), lessc::LessError>(())
//! ```

use crate::context::{Context, EvalOptions, MathMode};
use crate::error::{LessError, Result};
use crate::import::ImportResolver;
use crate::node::{Node, NodeKind};
use crate::output::{CssContext, Output};
use crate::plugin::PluginHost;
use crate::value::RewriteUrls;
use crate::visitor::{JoinSelectors, NodeVisitor, ToCss};

/// The textual parser contract.  Parsing LESS source is outside the core;
/// implementations return a root ruleset (`root` and `first_root` set) of
/// well-formed, unevaluated nodes.
pub trait Parser {
    fn parse(&self, source: &str, filename: &str) -> Result<Node>;
}

/// Compile options.
#[derive(Clone)]
pub struct Options {
    /// Search roots the import resolver should consider.
    pub paths: Vec<String>,

    /// Root filename, for diagnostics and relative imports.
    pub filename: String,

    /// Collapse all optional whitespace in the output.
    pub compress: bool,

    /// Error on incompatible-unit arithmetic instead of keeping the first
    /// operand's unit.
    pub strict_units: bool,

    pub math: MathMode,

    pub rewrite_urls: RewriteUrls,

    /// Prefix prepended to rewritten URLs.
    pub root_path: String,

    /// Query string appended to URLs.
    pub url_args: String,

    /// Variables injected before the source; names carry no `@` prefix.
    pub global_vars: Vec<(String, String)>,

    /// Variables appended after the source, overriding its definitions.
    pub modify_vars: Vec<(String, String)>,

    /// Allow backtick expressions through the plugin host.
    pub javascript_enabled: bool,

    /// Default re-import policy for `@import` without options.
    pub import_multiple: bool,

    /// Significant digits kept on emitted numbers.
    pub num_precision: usize,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            paths: Vec::new(),
            filename: "input".to_string(),
            compress: false,
            strict_units: false,
            math: MathMode::default(),
            rewrite_urls: RewriteUrls::default(),
            root_path: String::new(),
            url_args: String::new(),
            global_vars: Vec::new(),
            modify_vars: Vec::new(),
            javascript_enabled: false,
            import_multiple: false,
            num_precision: 8,
        }
    }
}

/// The result of one compile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    pub css: String,

    /// Absolute path of every resolved import, in resolution order.
    pub imports: Vec<String>,
}

/// Compiles LESS rulesets to CSS through the configured collaborators.
pub struct Compiler {
    parser: Box<dyn Parser>,
    importer: Option<Box<dyn ImportResolver>>,
    host: Option<Box<dyn PluginHost>>,
}

impl Compiler {
    pub fn new(parser: Box<dyn Parser>) -> Compiler {
        Compiler {
            parser,
            importer: None,
            host: None,
        }
    }

    pub fn with_importer(mut self, importer: Box<dyn ImportResolver>) -> Compiler {
        self.importer = Some(importer);
        self
    }

    pub fn with_plugin_host(mut self, host: Box<dyn PluginHost>) -> Compiler {
        self.host = Some(host);
        self
    }

    pub fn compile(&self, source: &str, options: &Options) -> Result<CompileOutput> {
        let source = inject_option_variables(source, options);

        let mut root = self
            .parser
            .parse(&source, &options.filename)
            .map_err(|e| annotate(e, &source, options))?;

        if let NodeKind::Ruleset(rs) = &mut root.kind {
            rs.root = true;
            rs.first_root = true;
            rs.allow_imports = true;
        }

        let mut ctx = Context::new(EvalOptions {
            paths: options.paths.clone(),
            math: options.math,
            strict_units: options.strict_units,
            rewrite_urls: options.rewrite_urls,
            root_path: options.root_path.clone(),
            url_args: options.url_args.clone(),
            javascript_enabled: options.javascript_enabled,
            import_multiple: options.import_multiple,
        });
        ctx.parser = Some(&*self.parser);
        ctx.importer = self.importer.as_deref();
        ctx.host = self.host.as_deref();

        if let Some(host) = &self.host {
            for mut visitor in host.pre_eval_visitors() {
                visitor.visit(&mut root);
            }
        }

        let eval_result = root.eval(&mut ctx);
        let imports = std::mem::take(&mut ctx.imports);
        let mut evaluated = eval_result.map_err(|e| annotate(e, &source, options))?;

        JoinSelectors.visit(&mut evaluated);
        crate::extend::process_extends(&mut evaluated);

        if let Some(host) = &self.host {
            for mut visitor in host.post_eval_visitors() {
                visitor.visit(&mut evaluated);
            }
        }

        ToCss::new().visit(&mut evaluated);

        let mut css_ctx = CssContext {
            compress: options.compress,
            num_precision: options.num_precision,
            ..CssContext::default()
        };
        let mut out = Output::new();
        evaluated.gen_css(&mut css_ctx, &mut out);

        Ok(CompileOutput {
            css: out.into_string(),
            imports,
        })
    }
}

/// `global_vars` go before the source, `modify_vars` after it, as plain
/// variable declarations.
fn inject_option_variables(source: &str, options: &Options) -> String {
    if options.global_vars.is_empty() && options.modify_vars.is_empty() {
        return source.to_string();
    }

    let mut injected = String::with_capacity(source.len() + 64);
    for (name, value) in &options.global_vars {
        injected.push_str(&format!("@{name}: {value};\n"));
    }
    injected.push_str(source);
    for (name, value) in &options.modify_vars {
        injected.push_str(&format!("\n@{name}: {value};"));
    }
    injected
}

/// Fills in line/column for errors pointing into the root source.
fn annotate(mut err: LessError, source: &str, options: &Options) -> LessError {
    let in_root_file = match &err.filename {
        Some(f) => *f == options.filename,
        None => true,
    };
    if err.line.is_none() && in_root_file {
        if let Some(index) = err.index {
            let (line, column) = line_column(source, index);
            err.line = Some(line);
            err.column = Some(column);
        }
    }
    if err.filename.is_none() {
        err.filename = Some(options.filename.clone());
    }
    err
}

fn line_column(source: &str, index: usize) -> (usize, usize) {
    let index = index.min(source.len());
    let mut line = 1;
    let mut column = 0;
    for (i, c) in source.char_indices() {
        if i >= index {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_counts_from_one() {
        let source = "ab\ncd\nef";
        assert_eq!(line_column(source, 0), (1, 0));
        assert_eq!(line_column(source, 4), (2, 1));
        assert_eq!(line_column(source, 7), (3, 1));
    }

    #[test]
    fn option_variables_wrap_the_source() {
        let options = Options {
            global_vars: vec![("brand".to_string(), "#fff".to_string())],
            modify_vars: vec![("brand".to_string(), "#000".to_string())],
            ..Options::default()
        };
        let injected = inject_option_variables(".x { color: @brand }", &options);
        assert!(injected.starts_with("@brand: #fff;\n"));
        assert!(injected.ends_with("\n@brand: #000;"));
    }
}
