//! The filter engine
//!
//! Filter and script bodies are captured verbatim by the parser and parsed
//! here on first use, once per semantics: the same compiled path can be
//! evaluated under any [`FilterMode`]. Parsed forms are cached in shared
//! cells inside the AST node, so reuse across documents parses only once.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{EvalError, ParseError};
use crate::eval::context::{Context, CtxValue, PathElement};
use crate::eval::segment::{apply_selector, expand_children};
use crate::eval::EvalEnv;
use crate::options::{EvalPolicy, FilterMode};

pub(crate) mod rfc;
pub(crate) mod script;

use script::{Program, SVal, Scope};

/// The verbatim body of a `[?…]` filter segment
///
/// Holds the captured source text plus lazily parsed forms for the RFC and
/// legacy engines. Equality and display use the raw text.
#[derive(Clone)]
pub struct FilterExpr(Arc<ExprInner>);

/// The verbatim body of a `[(…)]` script segment
#[derive(Clone)]
pub struct ScriptExpr(Arc<ExprInner>);

struct ExprInner {
    raw: String,
    rfc: OnceCell<Result<rfc::Filter, ParseError>>,
    program: OnceCell<Result<Program, ParseError>>,
}

impl ExprInner {
    fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            rfc: OnceCell::new(),
            program: OnceCell::new(),
        }
    }

    fn program(&self) -> Result<&Program, EvalError> {
        self.program
            .get_or_init(|| script::parse_program(&self.raw))
            .as_ref()
            .map_err(|e| EvalError::FilterParse(e.clone()))
    }
}

impl FilterExpr {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self(Arc::new(ExprInner::new(raw)))
    }

    /// The captured source text
    pub fn raw(&self) -> &str {
        &self.0.raw
    }

    /// Whether the expression observes candidate locations
    ///
    /// `@path` is the only variable resolved from the tracked location;
    /// `@property` and `@parentProperty` are carried per-context and work
    /// without tracking.
    pub(crate) fn references_path(&self) -> bool {
        self.0.raw.contains("@path")
    }

    fn rfc_cell(&self) -> &Result<rfc::Filter, ParseError> {
        self.0
            .rfc
            .get_or_init(|| rfc::parse::parse_filter_body(&self.0.raw))
    }

    /// Parse as an RFC filter now, surfacing the error at parse time
    pub(crate) fn force_rfc(&self) -> Result<(), ParseError> {
        self.rfc_cell().as_ref().map(|_| ()).map_err(Clone::clone)
    }

    fn rfc(&self) -> Result<&rfc::Filter, EvalError> {
        self.rfc_cell()
            .as_ref()
            .map_err(|e| EvalError::FilterParse(e.clone()))
    }

    fn program(&self) -> Result<&Program, EvalError> {
        self.0.program()
    }
}

impl ScriptExpr {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self(Arc::new(ExprInner::new(raw)))
    }

    /// The captured source text
    pub fn raw(&self) -> &str {
        &self.0.raw
    }

    /// Whether the expression observes candidate locations; see
    /// [`FilterExpr::references_path`]
    pub(crate) fn references_path(&self) -> bool {
        self.0.raw.contains("@path")
    }

    fn program(&self) -> Result<&Program, EvalError> {
        self.0.program()
    }
}

impl PartialEq for FilterExpr {
    fn eq(&self, other: &Self) -> bool {
        self.0.raw == other.0.raw
    }
}

impl PartialEq for ScriptExpr {
    fn eq(&self, other: &Self) -> bool {
        self.0.raw == other.0.raw
    }
}

impl std::fmt::Debug for FilterExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FilterExpr").field(&self.0.raw).finish()
    }
}

impl std::fmt::Debug for ScriptExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ScriptExpr").field(&self.0.raw).finish()
    }
}

impl std::fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{raw}", raw = self.0.raw)
    }
}

impl std::fmt::Display for ScriptExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{raw}", raw = self.0.raw)
    }
}

/// Run one filter segment over the frontier
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, skip(frontier, env), ret))]
pub(crate) fn run_filter<'a>(
    expr: &FilterExpr,
    frontier: Vec<Context<'a>>,
    env: &EvalEnv<'a, '_>,
) -> Result<Vec<Context<'a>>, EvalError> {
    match env.opts.filter_mode {
        FilterMode::Rfc => {
            let filter = expr.rfc()?;
            let mut out = Vec::new();
            for ctx in &frontier {
                for child in expand_children(ctx, env) {
                    let keep = child
                        .node()
                        .map(|value| filter.test(value, env))
                        .unwrap_or(false);
                    if keep {
                        out.push(child);
                    }
                }
            }
            Ok(out)
        }
        FilterMode::JsonPath => {
            let program = guarded_program(expr.program(), env)?;
            let mut out = Vec::new();
            for ctx in &frontier {
                for child in expand_children(ctx, env) {
                    let scope = candidate_scope(&child, env);
                    match script::eval::eval(&program.expr, &scope) {
                        Ok(val) => {
                            if script::eval::truthy(&val) {
                                out.push(child);
                            }
                        }
                        Err(message) => {
                            if !env.opts.ignore_eval_errors {
                                return Err(EvalError::runtime(message));
                            }
                        }
                    }
                }
            }
            Ok(out)
        }
        FilterMode::XPath => {
            let program = guarded_program(expr.program(), env)?;
            let mut out = Vec::new();
            for ctx in frontier {
                let scope = candidate_scope(&ctx, env);
                match script::eval::eval(&program.expr, &scope) {
                    Ok(val) => {
                        if script::eval::truthy(&val) {
                            out.push(ctx);
                        }
                    }
                    Err(message) => {
                        if !env.opts.ignore_eval_errors {
                            return Err(EvalError::runtime(message));
                        }
                    }
                }
            }
            Ok(out)
        }
    }
}

/// Run one script segment: the expression result becomes an index or name
/// selector applied to each frontier context
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, skip(frontier, env), ret))]
pub(crate) fn run_script<'a>(
    expr: &ScriptExpr,
    frontier: Vec<Context<'a>>,
    env: &EvalEnv<'a, '_>,
) -> Result<Vec<Context<'a>>, EvalError> {
    let program = guarded_program(expr.program(), env)?;
    let mut out = Vec::new();
    for ctx in &frontier {
        let scope = candidate_scope(ctx, env);
        match script::eval::eval(&program.expr, &scope) {
            Ok(val) => {
                if let Some(selector) = script::to_selector(&val) {
                    apply_selector(&selector, ctx, env, &mut out);
                }
            }
            Err(message) => {
                if !env.opts.ignore_eval_errors {
                    return Err(EvalError::runtime(message));
                }
            }
        }
    }
    Ok(out)
}

// The eval policy gate shared by legacy filters and scripts.
fn guarded_program<'p>(
    program: Result<&'p Program, EvalError>,
    env: &EvalEnv<'_, '_>,
) -> Result<&'p Program, EvalError> {
    if !env.opts.eval_allowed() {
        return Err(EvalError::EvalDisabled);
    }
    let program = program?;
    if matches!(env.opts.eval, EvalPolicy::Safe) {
        script::check_safe(program, &env.opts.sandbox)?;
    }
    Ok(program)
}

fn candidate_scope<'a, 'e>(candidate: &Context<'a>, env: &EvalEnv<'a, 'e>) -> Scope<'a, 'e> {
    Scope {
        value: match candidate.value {
            CtxValue::Node(v) => SVal::Node(v),
            CtxValue::Key(PathElement::Name(s)) => SVal::Str(s.to_owned()),
            CtxValue::Key(PathElement::Index(i)) => SVal::Num(i as f64),
        },
        parent: candidate.parent,
        property: candidate.parent_key,
        parent_property: candidate.grandparent_key,
        root: env.root,
        path: env.track.then(|| candidate.loc.to_string()),
        sandbox: &env.opts.sandbox,
    }
}
