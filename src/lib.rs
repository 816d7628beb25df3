//! Compile [LESS] stylesheets to CSS.
//!
//! This crate is the semantic engine of a LESS compiler: the abstract
//! syntax tree, the evaluator that reduces it to plain CSS nodes, and the
//! CSS emitter.  It deliberately does **not** parse LESS source text, load
//! files, or run plugin code — those jobs belong to collaborators supplied
//! by the embedding application through narrow contracts:
//!
//! * [`Parser`] turns source text into a root [`node::Node`] ruleset.
//! * [`ImportResolver`] maps an `@import` target to file contents.
//! * [`PluginHost`] answers unknown function calls, contributes visitors,
//!   and evaluates backtick expressions when enabled.
//!
//! # Compilation pipeline
//!
//! A compile is one deterministic, single-threaded pass:
//!
//! 1. The parser produces an unevaluated ruleset tree.
//! 2. The evaluator reduces it: variables resolve against scope frames,
//!    mixin calls expand, guards filter, operations compute under the
//!    configured math mode, imports inline, and `@media`/`@container`
//!    blocks bubble toward the top while their feature lists merge.
//! 3. The visitor pipeline joins nested selectors (`&` resolution),
//!    collects and applies `:extend`, and prunes everything invisible.
//! 4. The emitter serializes, pretty-printed or compressed.
//!
//! Multiple compiles are independent; the only process-wide state is a set
//! of immutable tables (named colors, unit conversions), so callers may run
//! compiles from several threads, one compile per thread.
//!
//! # Example
//!
//! ```no_run
//! use lessc::{Compiler, Options};
//! # fn get_parser() -> Box<dyn lessc::Parser> { unimplemented!() }
//!
//! let compiler = Compiler::new(get_parser());
//! let output = compiler.compile(
//!     "@accent: #d03; .button { color: @accent; }",
//!     &Options::default(),
//! )?;
//! assert!(output.css.contains(".button"));
//! # Ok::<(), lessc::LessError>(())
//! ```
//!
//! [LESS]: https://lesscss.org/

#![warn(nonstandard_style, rust_2018_idioms, unused)]
#![warn(trivial_casts, trivial_numeric_casts)]
#![allow(clippy::too_many_arguments)]

pub use crate::api::*;
pub use crate::error::{ErrorKind, LessError};

pub mod api;
pub mod atrule;
pub mod color;
pub mod context;
pub mod declaration;
pub mod dimension;
pub mod error;
pub mod expression;
pub mod extend;
pub mod functions;
pub mod import;
pub mod limits;
pub mod mixin;
pub mod node;
pub mod output;
pub mod plugin;
pub mod ruleset;
pub mod selector;
pub mod value;
pub mod variable;
pub mod visitor;

pub use crate::context::MathMode;
pub use crate::import::{ImportResolver, ResolvedImport};
pub use crate::plugin::{HostError, HostScope, PluginHost};
pub use crate::value::RewriteUrls;
