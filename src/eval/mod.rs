//! The evaluator core
//!
//! Evaluation runs a frontier of [`Context`]s through the segment list.
//! The frontier order follows the documented traversal order: index order
//! for arrays, insertion order for objects, source order for unions, and
//! pre-order for recursive descent. An empty frontier short-circuits the
//! remaining segments.

use serde_json::Value;

use crate::ast::Segment;
use crate::error::EvalError;
use crate::options::QueryOptions;

pub(crate) mod compile;
pub(crate) mod context;
pub(crate) mod segment;

use context::{Context, CtxValue, NormalizedPath, PathElement, PayloadKind};

/// Everything a segment runner needs besides the frontier
#[derive(Debug, Clone, Copy)]
pub(crate) struct EvalEnv<'a, 'e> {
    pub(crate) root: &'a Value,
    pub(crate) opts: &'e QueryOptions<'a>,
    /// Whether contexts carry their locations
    pub(crate) track: bool,
}

impl<'a, 'e> EvalEnv<'a, 'e> {
    /// The same environment without location tracking, for embedded
    /// filter queries
    pub(crate) fn untracked(self) -> Self {
        Self {
            track: false,
            ..self
        }
    }
}

/// The root context, carrying the virtual parent overrides
///
/// Children of the root inherit the override key as their grandparent key.
pub(crate) fn root_context<'a>(env: &EvalEnv<'a, '_>) -> Context<'a> {
    Context {
        value: CtxValue::Node(env.root),
        loc: NormalizedPath::default(),
        parent: env.opts.parent,
        parent_key: env.opts.parent_property.map(PathElement::Name),
        grandparent_key: None,
        payload: PayloadKind::Value,
    }
}

/// Run a segment list over a seeded frontier
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, skip(seed, env), ret, err))]
pub(crate) fn eval_segments<'a>(
    segments: &[Segment],
    seed: Vec<Context<'a>>,
    env: &EvalEnv<'a, '_>,
) -> Result<Vec<Context<'a>>, EvalError> {
    let mut frontier = seed;
    for seg in segments {
        if frontier.is_empty() {
            break;
        }
        frontier = segment::run_segment(seg, frontier, env)?;
    }
    Ok(frontier)
}
