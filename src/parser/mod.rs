use nom::combinator::all_consuming;
use nom::error::{VerboseError, VerboseErrorKind};
use nom::IResult;

use crate::ast::{Path, PathBranch, Segment};
use crate::error::ParseError;

pub(crate) mod normalize;
pub(crate) mod primitive;
pub(crate) mod segment;
pub(crate) mod selector;
pub(crate) mod utils;

pub(crate) type PResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

/// A nom error plus the machinery to surface it as a [`ParseError`]
#[derive(Debug)]
pub(crate) struct Error<'a>(VerboseError<&'a str>);

impl<'a> Error<'a> {
    pub(crate) fn from_verbose(err: VerboseError<&'a str>) -> Self {
        Self(err)
    }

    pub(crate) fn describe(&self) -> String {
        for (_, kind) in &self.0.errors {
            match kind {
                VerboseErrorKind::Context(ctx) => return format!("expected {ctx}"),
                VerboseErrorKind::Nom(nom::error::ErrorKind::Eof) => {
                    return String::from("unexpected trailing input")
                }
                _ => {}
            }
        }
        String::from("invalid JSONPath syntax")
    }

    /// 1-indexed position of the failure within `input`
    pub(crate) fn calculate_position(&self, input: &str) -> usize {
        self.0
            .errors
            .first()
            .map(|(remaining, _)| input.len() - remaining.len() + 1)
            .unwrap_or_default()
    }
}

/// Parse a JSONPath source string into its AST
///
/// The normalizer first expands legacy grouping and filter unions; each
/// resulting simple path is parsed into a branch. A branch that does not
/// open with `$` gets the root segment inserted, so segment zero is always
/// [`Segment::Root`].
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse(source: &str) -> Result<Path, ParseError> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(ParseError::new("empty path expression", 1));
    }
    let branches = normalize::expand(trimmed)
        .iter()
        .map(|src| parse_simple(src))
        .collect::<Result<Vec<PathBranch>, ParseError>>()?;
    Ok(Path { branches })
}

fn parse_simple(source: &str) -> Result<PathBranch, ParseError> {
    let (_, mut branch) =
        all_consuming(segment::parse_branch)(source).map_err(|err| match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => ParseError::from((source, Error(e))),
            nom::Err::Incomplete(_) => unreachable!("streaming parsers are not used"),
        })?;
    if branch.segments.is_empty() {
        return Err(ParseError::new("empty path expression", 1));
    }
    if !matches!(branch.segments.first(), Some(Segment::Root)) {
        branch.segments.insert(0, Segment::Root);
    }
    Ok(branch)
}

#[cfg(test)]
mod tests {
    use crate::ast::{Name, Segment, Selector};

    use super::parse;

    #[test]
    fn root_paths() {
        let p = parse("$").unwrap();
        assert_eq!(p.branches.len(), 1);
        assert_eq!(p.branches[0].segments, vec![Segment::Root]);
    }

    #[test]
    fn implicit_root_is_rewritten() {
        let p = parse("store.book").unwrap();
        assert_eq!(p.branches[0].segments[0], Segment::Root);
        assert_eq!(
            p.branches[0].segments[1],
            Segment::Child(Selector::Name(Name::bare("store")))
        );
        let p = parse("@.foo").unwrap();
        assert_eq!(p.branches[0].segments[0], Segment::Root);
        assert_eq!(p.branches[0].segments[1], Segment::Current);
    }

    #[test]
    fn segment_sequences() {
        let p = parse("$.names['first_name']..*").unwrap();
        let segs = &p.branches[0].segments;
        assert_eq!(segs[1], Segment::Child(Selector::Name(Name::bare("names"))));
        assert_eq!(
            segs[2],
            Segment::Child(Selector::Name(Name::quoted("first_name")))
        );
        assert_eq!(segs[3], Segment::Recursive(Some(Selector::Wildcard)));
    }

    #[test]
    fn union_sources_make_branches() {
        let p = parse("$.store.(book,bicycle).price").unwrap();
        assert_eq!(p.branches.len(), 2);
        assert!(p.is_union());
    }

    #[test]
    fn rejects_trailing_input() {
        let err = parse("$.a['b']tail").unwrap_err();
        assert!(err.position() > 0);
    }

    #[test]
    fn rejects_empty() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }

    #[test]
    fn whitespace_between_segments() {
        let p = parse("$.a .b").unwrap();
        assert_eq!(p.branches[0].segments.len(), 3);
    }
}
