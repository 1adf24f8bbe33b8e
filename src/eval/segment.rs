//! Segment runners and selector kernels

use serde_json::Value;

use crate::ast::{JsonType, Segment, Selector, Slice};
use crate::error::EvalError;
use crate::filter::{run_filter, run_script};

use super::context::{Context, CtxValue, PathElement, PayloadKind};
use super::{root_context, EvalEnv};

/// Apply one segment to the frontier
pub(crate) fn run_segment<'a>(
    segment: &Segment,
    frontier: Vec<Context<'a>>,
    env: &EvalEnv<'a, '_>,
) -> Result<Vec<Context<'a>>, EvalError> {
    match segment {
        Segment::Root => Ok(vec![root_context(env)]),
        Segment::Current => Ok(frontier),
        Segment::Child(selector) => {
            let mut out = Vec::new();
            for ctx in &frontier {
                apply_selector(selector, ctx, env, &mut out);
            }
            Ok(out)
        }
        Segment::Recursive(selector) => {
            let mut out = Vec::new();
            for ctx in &frontier {
                descend(ctx, selector.as_ref(), env, &mut out);
            }
            Ok(out)
        }
        Segment::Filter(expr) => run_filter(expr, frontier, env),
        Segment::Script(expr) => run_script(expr, frontier, env),
        Segment::Parent => Ok(run_parent(frontier, env)),
        Segment::PropertyName => Ok(run_property_name(frontier)),
        Segment::Type(ty) => Ok(frontier
            .into_iter()
            .filter(|ctx| type_matches(*ty, ctx))
            .collect()),
    }
}

/// Apply one selector kernel to one context
pub(crate) fn apply_selector<'a>(
    selector: &Selector,
    ctx: &Context<'a>,
    env: &EvalEnv<'a, '_>,
    out: &mut Vec<Context<'a>>,
) {
    match selector {
        Selector::Name(name) => {
            if let Some(Value::Object(map)) = ctx.node() {
                if let Some((key, value)) = map.get_key_value(name.as_str()) {
                    out.push(ctx.child(PathElement::Name(key), value, env.track));
                }
            }
        }
        Selector::Index(index) => {
            if let Some(Value::Array(list)) = ctx.node() {
                if let Some(resolved) = resolve_index(*index, list.len()) {
                    if let Some(value) = list.get(resolved) {
                        out.push(ctx.child(PathElement::Index(resolved), value, env.track));
                    }
                }
            }
        }
        Selector::Slice(slice) => {
            if let Some(Value::Array(list)) = ctx.node() {
                for i in slice_positions(slice, list.len()) {
                    out.push(ctx.child(PathElement::Index(i), &list[i], env.track));
                }
            }
        }
        Selector::Wildcard => out.extend(expand_children(ctx, env)),
        Selector::Union(members) => {
            for member in members {
                apply_selector(member, ctx, env, out);
            }
        }
    }
}

/// Resolve a signed index against an array length
pub(crate) fn resolve_index(index: isize, len: usize) -> Option<usize> {
    if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        let i = index as usize;
        (i < len).then_some(i)
    }
}

/// The index sequence a slice visits, in traversal order
///
/// Shared by the slice kernel and the bulk fast path, so both produce the
/// same elements.
pub(crate) fn slice_positions(slice: &Slice, len: usize) -> Vec<usize> {
    let step = slice.step.unwrap_or(1);
    if step == 0 {
        return Vec::new();
    }
    let len = match isize::try_from(len) {
        Ok(len) => len,
        Err(_) => return Vec::new(),
    };
    let normalize = |i: isize| if i < 0 { len + i } else { i };
    let mut positions = Vec::new();
    if step > 0 {
        let start = normalize(slice.start.unwrap_or(0)).clamp(0, len);
        let end = normalize(slice.end.unwrap_or(len)).clamp(0, len);
        let mut i = start;
        while i < end {
            positions.push(i as usize);
            i += step;
        }
    } else {
        let start = normalize(slice.start.unwrap_or(len - 1)).clamp(-1, len - 1);
        // a defaulted end means "past the front" and is not normalized
        let end = slice.end.map(normalize).unwrap_or(-1).clamp(-1, len - 1);
        let mut i = start;
        while i > end {
            positions.push(i as usize);
            i += step;
        }
    }
    positions
}

/// Child contexts of a node: array elements in index order, object member
/// values in insertion order; scalars have none
pub(crate) fn expand_children<'a>(
    ctx: &Context<'a>,
    env: &EvalEnv<'a, '_>,
) -> Vec<Context<'a>> {
    match ctx.node() {
        Some(Value::Array(list)) => list
            .iter()
            .enumerate()
            .map(|(i, v)| ctx.child(PathElement::Index(i), v, env.track))
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| ctx.child(PathElement::Name(k), v, env.track))
            .collect(),
        _ => Vec::new(),
    }
}

// Pre-order recursive descent, inclusive of the visited node itself.
fn descend<'a>(
    ctx: &Context<'a>,
    selector: Option<&Selector>,
    env: &EvalEnv<'a, '_>,
    out: &mut Vec<Context<'a>>,
) {
    match selector {
        Some(selector) => apply_selector(selector, ctx, env, out),
        None => out.push(ctx.clone()),
    }
    for child in expand_children(ctx, env) {
        descend(&child, selector, env, out);
    }
}

// Step up one level by re-walking the tracked location from the root.
fn run_parent<'a>(frontier: Vec<Context<'a>>, env: &EvalEnv<'a, '_>) -> Vec<Context<'a>> {
    let mut out = Vec::new();
    for ctx in frontier {
        if ctx.loc.is_empty() {
            if let Some(parent) = env.opts.parent {
                out.push(Context {
                    value: CtxValue::Node(parent),
                    loc: ctx.loc,
                    parent: None,
                    parent_key: None,
                    grandparent_key: None,
                    payload: PayloadKind::Value,
                });
            }
            continue;
        }
        let parent_loc = ctx.loc.parent_path();
        let Some(value) = walk(env.root, parent_loc.iter().copied()) else {
            continue;
        };
        let (parent, parent_key, grandparent_key) = if parent_loc.is_empty() {
            (
                env.opts.parent,
                env.opts.parent_property.map(PathElement::Name),
                None,
            )
        } else {
            let grandparent_key = if parent_loc.len() >= 2 {
                parent_loc.iter().nth(parent_loc.len() - 2).copied()
            } else {
                env.opts.parent_property.map(PathElement::Name)
            };
            (
                walk(env.root, parent_loc.parent_path().iter().copied()),
                parent_loc.last().copied(),
                grandparent_key,
            )
        };
        out.push(Context {
            value: CtxValue::Node(value),
            loc: parent_loc,
            parent,
            parent_key,
            grandparent_key,
            payload: PayloadKind::Value,
        });
    }
    out
}

/// Walk the document along a sequence of path elements
pub(crate) fn walk<'a>(
    root: &'a Value,
    path: impl Iterator<Item = PathElement<'a>>,
) -> Option<&'a Value> {
    let mut current = root;
    for elem in path {
        current = match elem {
            PathElement::Name(name) => current.as_object()?.get(name)?,
            PathElement::Index(index) => current.as_array()?.get(index)?,
        };
    }
    Some(current)
}

// Emit the key or index under which each node hangs in its parent.
fn run_property_name(frontier: Vec<Context<'_>>) -> Vec<Context<'_>> {
    frontier
        .into_iter()
        .filter_map(|ctx| {
            ctx.parent_key.map(|key| Context {
                value: CtxValue::Key(key),
                loc: ctx.loc.clone(),
                parent: ctx.parent,
                parent_key: Some(key),
                grandparent_key: ctx.grandparent_key,
                payload: PayloadKind::Property,
            })
        })
        .collect()
}

fn type_matches(ty: JsonType, ctx: &Context<'_>) -> bool {
    match &ctx.value {
        CtxValue::Key(PathElement::Name(_)) => {
            matches!(ty, JsonType::String | JsonType::Scalar)
        }
        CtxValue::Key(PathElement::Index(_)) => matches!(
            ty,
            JsonType::Number | JsonType::Integer | JsonType::Scalar
        ),
        CtxValue::Node(value) => match ty {
            JsonType::Null => value.is_null(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Number => value.is_number(),
            JsonType::String => value.is_string(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
            JsonType::Integer => {
                value.as_i64().is_some()
                    || value.as_u64().is_some()
                    || value.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
            }
            JsonType::Scalar => !value.is_array() && !value.is_object(),
            // not representable in a JSON tree
            JsonType::Undefined | JsonType::Function | JsonType::NonFinite | JsonType::Other => {
                false
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::Slice;

    use super::{resolve_index, slice_positions};

    #[test]
    fn index_resolution() {
        assert_eq!(resolve_index(0, 3), Some(0));
        assert_eq!(resolve_index(2, 3), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(-3, 3), Some(0));
        assert_eq!(resolve_index(-4, 3), None);
    }

    #[test]
    fn forward_slices() {
        assert_eq!(slice_positions(&Slice::new(), 4), vec![0, 1, 2, 3]);
        assert_eq!(
            slice_positions(&Slice::new().with_start(1).with_end(3), 4),
            vec![1, 2]
        );
        assert_eq!(
            slice_positions(&Slice::new().with_step(2), 5),
            vec![0, 2, 4]
        );
        assert_eq!(
            slice_positions(&Slice::new().with_start(-2), 5),
            vec![3, 4]
        );
        assert_eq!(
            slice_positions(&Slice::new().with_end(-1), 4),
            vec![0, 1, 2]
        );
        // out-of-range bounds clamp
        assert_eq!(
            slice_positions(&Slice::new().with_start(-10).with_end(10), 3),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn reverse_slices() {
        assert_eq!(
            slice_positions(&Slice::new().with_step(-1), 4),
            vec![3, 2, 1, 0]
        );
        assert_eq!(
            slice_positions(&Slice::new().with_start(2).with_step(-1), 4),
            vec![2, 1, 0]
        );
        assert_eq!(
            slice_positions(&Slice::new().with_start(3).with_end(1).with_step(-1), 5),
            vec![3, 2]
        );
        // supplied negative end is normalized
        assert_eq!(
            slice_positions(&Slice::new().with_end(-3).with_step(-1), 4),
            vec![3, 2]
        );
    }

    #[test]
    fn zero_step_is_empty() {
        assert_eq!(
            slice_positions(&Slice::new().with_step(0), 4),
            Vec::<usize>::new()
        );
    }

    #[test]
    fn empty_arrays() {
        assert_eq!(slice_positions(&Slice::new(), 0), Vec::<usize>::new());
        assert_eq!(
            slice_positions(&Slice::new().with_step(-1), 0),
            Vec::<usize>::new()
        );
    }
}
