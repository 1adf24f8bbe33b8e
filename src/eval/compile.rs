//! Lowering of parsed paths into their reusable, executable form
//!
//! A compiled path is immutable and safe to share across threads and
//! documents. Compilation also decides whether evaluation must track node
//! locations, and recognizes two shapes with dedicated fast paths:
//! straight name/index chains, and `$.collection[slice].property` bulk
//! extraction. A fast path only runs when the caller's options make it
//! observably identical to the general evaluator.

use serde_json::Value;

use crate::ast::{Path, PathBranch, Segment, Selector, Slice};
use crate::error::EvalError;
use crate::options::{Flatten, QueryOptions, ResultType};
use crate::result::{assemble, BranchOutcome, QueryResult};

use super::segment::{resolve_index, slice_positions};
use super::{eval_segments, root_context, EvalEnv};

/// The executable form of a parsed path, reusable across documents
#[derive(Debug)]
pub struct CompiledPath {
    path: Path,
    plans: Vec<BranchPlan>,
    needs_location: bool,
}

#[derive(Debug)]
struct BranchPlan {
    fast: Option<FastPath>,
}

#[derive(Debug, Clone)]
enum FastPath {
    /// A pure dotted/indexed chain: direct walk, at most one result
    Chain(Vec<ChainStep>),
    /// `$.collection[slice].property`: bulk extraction without
    /// intermediate contexts
    SliceProperty {
        collection: String,
        slice: Slice,
        property: String,
    },
}

#[derive(Debug, Clone)]
enum ChainStep {
    Key(String),
    Index(isize),
}

/// Lower a parsed path into its compiled form
pub fn compile(path: Path) -> CompiledPath {
    let plans = path
        .branches
        .iter()
        .map(|branch| BranchPlan {
            fast: detect_chain(branch).or_else(|| detect_slice_property(branch)),
        })
        .collect();
    let needs_location = path.branches.iter().any(branch_needs_location);
    CompiledPath {
        path,
        plans,
        needs_location,
    }
}

fn branch_needs_location(branch: &PathBranch) -> bool {
    branch.segments.iter().any(|segment| match segment {
        Segment::Parent => true,
        Segment::Filter(expr) => expr.references_path(),
        Segment::Script(expr) => expr.references_path(),
        _ => false,
    })
}

fn detect_chain(branch: &PathBranch) -> Option<FastPath> {
    let mut steps = Vec::new();
    for segment in &branch.segments {
        match segment {
            Segment::Root | Segment::Current => {}
            Segment::Child(Selector::Name(name)) => {
                steps.push(ChainStep::Key(name.name.clone()));
            }
            Segment::Child(Selector::Index(index)) => steps.push(ChainStep::Index(*index)),
            _ => return None,
        }
    }
    Some(FastPath::Chain(steps))
}

fn detect_slice_property(branch: &PathBranch) -> Option<FastPath> {
    match branch.segments.as_slice() {
        [Segment::Root, Segment::Child(Selector::Name(collection)), Segment::Child(Selector::Slice(slice)), Segment::Child(Selector::Name(property))] => {
            Some(FastPath::SliceProperty {
                collection: collection.name.clone(),
                slice: *slice,
                property: property.name.clone(),
            })
        }
        _ => None,
    }
}

impl CompiledPath {
    /// The parsed path this was compiled from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Evaluate against a document
    ///
    /// The compiled path is never mutated; evaluation is synchronous and
    /// reads the document only.
    #[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, skip(self, document, options), ret, err))]
    pub fn evaluate<'b>(
        &self,
        document: &'b Value,
        options: &QueryOptions<'b>,
    ) -> Result<QueryResult<'b>, EvalError> {
        let track = self.needs_location
            || options.callback.is_some()
            || matches!(
                options.result_type,
                ResultType::Path | ResultType::Pointer | ResultType::ParentChain | ResultType::All
            );
        let env = EvalEnv {
            root: document,
            opts: options,
            track,
        };
        let mut outcomes = Vec::with_capacity(self.path.branches.len());
        for (branch, plan) in self.path.branches.iter().zip(&self.plans) {
            let outcome = match &plan.fast {
                Some(FastPath::Chain(steps)) if chain_eligible(options) => {
                    BranchOutcome::Values(run_chain(steps, document))
                }
                Some(FastPath::SliceProperty {
                    collection,
                    slice,
                    property,
                }) if slice_property_eligible(options, track) => BranchOutcome::Values(
                    run_slice_property(document, collection, slice, property),
                ),
                _ => BranchOutcome::Contexts(eval_segments(
                    &branch.segments,
                    vec![root_context(&env)],
                    &env,
                )?),
            };
            outcomes.push(outcome);
        }
        assemble(outcomes, &env)
    }
}

fn chain_eligible(options: &QueryOptions<'_>) -> bool {
    matches!(options.result_type, ResultType::Value) && options.callback.is_none()
}

fn slice_property_eligible(options: &QueryOptions<'_>, track: bool) -> bool {
    matches!(options.result_type, ResultType::Value)
        && options.callback.is_none()
        && matches!(options.flatten, Flatten::Off)
        && !track
}

fn run_chain<'b>(steps: &[ChainStep], document: &'b Value) -> Vec<&'b Value> {
    let mut current = document;
    for step in steps {
        let next = match step {
            ChainStep::Key(key) => current.as_object().and_then(|map| map.get(key)),
            ChainStep::Index(index) => current.as_array().and_then(|list| {
                resolve_index(*index, list.len()).and_then(|i| list.get(i))
            }),
        };
        match next {
            Some(value) => current = value,
            None => return Vec::new(),
        }
    }
    vec![current]
}

// Writes matching property values straight into a pre-sized buffer.
fn run_slice_property<'b>(
    document: &'b Value,
    collection: &str,
    slice: &Slice,
    property: &str,
) -> Vec<&'b Value> {
    let Some(list) = document
        .as_object()
        .and_then(|map| map.get(collection))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    let positions = slice_positions(slice, list.len());
    let mut out = Vec::with_capacity(positions.len());
    for i in positions {
        if let Some(value) = list[i].as_object().and_then(|map| map.get(property)) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::options::QueryOptions;
    use crate::parser;

    use super::compile;

    #[test]
    fn chain_and_general_paths_agree() {
        let doc = json!({"a": {"b": [10, 20, 30]}});
        for source in ["$.a.b[1]", "$.a.b[-1]", "$.a.missing", "$.a.b[9]"] {
            let compiled = compile(parser::parse(source).unwrap());
            let fast = compiled
                .evaluate(&doc, &QueryOptions::new())
                .unwrap()
                .values();
            // path results force the general evaluator
            let slow = compiled
                .evaluate(
                    &doc,
                    &QueryOptions::new().with_result_type(crate::options::ResultType::All),
                )
                .unwrap()
                .nodes()
                .values();
            assert_eq!(fast, slow, "{source}");
        }
    }

    #[test]
    fn slice_property_bulk_extraction() {
        let doc = json!({"rows": [
            {"v": 1}, {"v": 2}, {"no": 0}, {"v": 4}
        ]});
        let compiled = compile(parser::parse("$.rows[0:4].v").unwrap());
        let out = compiled
            .evaluate(&doc, &QueryOptions::new())
            .unwrap()
            .values();
        assert_eq!(out, vec![json!(1), json!(2), json!(4)]);
    }

    #[test]
    fn location_need_detection() {
        let with_parent = compile(parser::parse("$.a.b^").unwrap());
        assert!(with_parent.needs_location);
        let with_path_ref = compile(parser::parse("$[?(@path == \"$['x']\")]").unwrap());
        assert!(with_path_ref.needs_location);
        let plain = compile(parser::parse("$.a.b").unwrap());
        assert!(!plain.needs_location);
        // the grandparent key is carried per-context, so @parentProperty
        // works without location tracking
        let with_prop_ref = compile(parser::parse("$.a.b[(@parentProperty)]").unwrap());
        assert!(!with_prop_ref.needs_location);
        let with_prop_filter =
            compile(parser::parse("$.a.b[?(@parentProperty == 'a')]").unwrap());
        assert!(!with_prop_filter.needs_location);
    }
}
