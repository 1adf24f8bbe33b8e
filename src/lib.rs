//! JSONPath queries over [`serde_json::Value`]s, in two dialects.
//!
//! The query engine implements the filter semantics of [RFC 9535][rfc] and,
//! in a separate compatibility mode, the extended superset popularized by
//! the predecessor JavaScript libraries: bracket unions, script selectors,
//! parent (`^`) and property-name (`~`) steps, type selectors such as
//! `@number()`, and general-expression filters.
//!
//! [rfc]: https://www.rfc-editor.org/rfc/rfc9535.html
//!
//! # Querying
//!
//! The simplest surface is [`JsonPath`], which parses and compiles a query
//! for reuse across documents:
//!
//! ```rust
//! use serde_json::json;
//! use jsonpathx::JsonPath;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let value = json!({"store": {"book": [
//!     {"title": "Sayings of the Century", "price": 8.95},
//!     {"title": "Sword of Honour", "price": 12.99},
//! ]}});
//! let path = JsonPath::parse("$.store.book[?@.price < 10].title")?;
//! let nodes = path.query(&value)?;
//! assert_eq!(nodes.values(), vec!["Sayings of the Century"]);
//! # Ok(())
//! # }
//! ```
//!
//! The fused [`query`] entry point parses, compiles, and evaluates in one
//! call, backed by a process-wide compile cache; [`query_async`] is the
//! same operation behind an async signature for callers that want one (the
//! evaluator itself never suspends).
//!
//! # Options and result shapes
//!
//! [`QueryOptions`] selects the output shape ([`ResultType`]), wrapping and
//! flattening, the filter dialect ([`FilterMode`]), and the legacy
//! expression policy ([`EvalPolicy`]):
//!
//! ```rust
//! use serde_json::json;
//! use jsonpathx::{query, QueryOptions, ResultType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let value = json!({"a": {"b": [true]}});
//! let opts = QueryOptions::new().with_result_type(ResultType::Pointer);
//! let result = query("$..[?@ == true]", &value, &opts)?;
//! assert_eq!(result.values(), vec![json!("/a/b/0")]);
//! # Ok(())
//! # }
//! ```
//!
//! Legacy filters and scripts are evaluated by a small interpreter, never
//! by generated code. The default `safe` policy scans identifiers against
//! an allow-list (the built-in names plus the caller's sandbox) before any
//! expression runs; `eval = off` or `prevent_eval` rejects such segments
//! outright.
//!
//! # Custom filter functions
//!
//! RFC-mode filter functions are drawn from a distributed registry; see
//! [`functions`] for registering your own with `inventory::submit!`.
//!
//! # Feature flags
//!
//! - `trace`: internal tracing via [tracing](https://docs.rs/tracing)

#![warn(
    clippy::all,
    clippy::dbg_macro,
    clippy::todo,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::mem_forget,
    clippy::unused_self,
    clippy::filter_map_next,
    clippy::needless_continue,
    clippy::needless_borrow,
    clippy::if_let_mutex,
    clippy::await_holding_lock,
    clippy::imprecise_flops,
    clippy::lossy_float_literal,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::fn_params_excessive_bools,
    clippy::exit,
    clippy::inefficient_to_string,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::option_option,
    clippy::verbose_file_reads,
    clippy::unnested_or_patterns,
    clippy::str_to_string,
    rust_2018_idioms,
    future_incompatible,
    nonstandard_style,
    missing_docs
)]
#![allow(elided_lifetimes_in_paths, clippy::type_complexity)]
#![forbid(unsafe_code)]

pub mod ast;
mod cache;
mod error;
mod eval;
mod ext;
mod filter;
mod node;
mod options;
mod parser;
mod path;
mod result;

use serde_json::Value;

#[doc(inline)]
pub use error::{EvalError, ParseError, QueryError};
#[doc(inline)]
pub use eval::compile::{compile, CompiledPath};
#[doc(inline)]
pub use eval::context::{NormalizedPath, PathElement, PayloadKind};
#[doc(inline)]
pub use ext::JsonPathExt;
#[doc(inline)]
pub use filter::{FilterExpr, ScriptExpr};
#[doc(inline)]
pub use node::{AtMostOneError, ExactlyOneError, NodeList};
#[doc(inline)]
pub use options::{
    EvalPolicy, FilterMode, Flatten, QueryCallback, QueryOptions, ResultType, Sandbox,
};
#[doc(inline)]
pub use path::JsonPath;
#[doc(inline)]
pub use result::{ChainLink, QueryOutput, QueryResult, ResultRecord};

/// The function extension registry for RFC-mode filters
///
/// The built-in functions (`length`, `count`, `match`, `search`, `value`)
/// are registered here as well. Additional functions can be registered
/// from any linked source file:
///
/// ```rust
/// use once_cell::sync::Lazy;
/// use jsonpathx::functions::{expect_args, Evaluator, FuncKind, FuncValue, Function, Validator};
///
/// static FIRST_EVALUATOR: Evaluator = Lazy::new(|| {
///     Box::new(|mut args| match args.pop_front() {
///         Some(FuncValue::Nodes(nodes)) => match nodes.into_iter().next() {
///             Some(std::borrow::Cow::Borrowed(v)) => FuncValue::Node(v),
///             Some(std::borrow::Cow::Owned(v)) => FuncValue::Value(v),
///             None => FuncValue::Nothing,
///         },
///         _ => FuncValue::Nothing,
///     })
/// });
///
/// static FIRST_VALIDATOR: Validator =
///     Lazy::new(|| Box::new(|kinds| expect_args(&[FuncKind::Nodes], kinds)));
///
/// inventory::submit! {
///     Function::new("first", FuncKind::Value, &FIRST_EVALUATOR, &FIRST_VALIDATOR)
/// }
/// ```
pub mod functions {
    pub use crate::filter::rfc::functions::{
        expect_args, Evaluator, FuncKind, FuncValue, Function, FunctionError, Validator,
    };
}

/// Parse a JSONPath source string into its AST
///
/// Legacy grouping and filter unions are expanded first, so the result may
/// hold several branches. See [`compile`] to produce the reusable
/// executable form.
pub fn parse(source: &str) -> Result<ast::Path, ParseError> {
    parser::parse(source)
}

/// Parse, compile, and evaluate a query in one call
///
/// Compiled paths are cached per source string for the life of the
/// process, so repeated queries skip parsing.
pub fn query<'b>(
    source: &str,
    document: &'b Value,
    options: &QueryOptions<'b>,
) -> Result<QueryResult<'b>, QueryError> {
    let compiled = cache::compiled(source)?;
    compiled
        .evaluate(document, options)
        .map_err(QueryError::from)
}

/// [`query`], behind an async signature
///
/// Evaluation is synchronous and completes before the returned future is
/// first polled; this exists for callers whose call sites are async.
pub async fn query_async<'b>(
    source: &str,
    document: &'b Value,
    options: &QueryOptions<'b>,
) -> Result<QueryResult<'b>, QueryError> {
    query(source, document, options)
}
