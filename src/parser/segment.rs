use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{cut, map, map_opt, verify},
    error::context,
    multi::many0,
    sequence::{delimited, pair, preceded},
};

use crate::ast::{JsonType, Name, PathBranch, Segment, Selector};
use crate::filter::{FilterExpr, ScriptExpr};

use super::primitive::parse_ident;
use super::selector::{parse_member_list, parse_wildcard_selector};
use super::utils::{take_paren_group, take_until_bracket_close};
use super::PResult;

fn parse_escaped_name(input: &str) -> PResult<Name> {
    map(
        preceded(
            char('`'),
            take_while1(|c: char| {
                !matches!(c, '.' | '[' | ']' | '^' | '~') && !c.is_whitespace()
            }),
        ),
        |s: &str| Name {
            name: s.to_owned(),
            quoted: false,
            escaped: true,
        },
    )(input)
}

fn parse_bare_name(input: &str) -> PResult<Name> {
    map(parse_ident, Name::bare)(input)
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
fn parse_type_selector(input: &str) -> PResult<Segment> {
    map_opt(
        delimited(
            char('@'),
            parse_ident,
            pair(char('('), cut(char(')'))),
        ),
        |name| JsonType::from_name(name).map(Segment::Type),
    )(input)
}

// Body of `[?…]`, captured verbatim up to the closing bracket. Empty
// bracket content is rejected.
fn parse_filter_segment(input: &str) -> PResult<Segment> {
    map(
        verify(
            preceded(pair(char('?'), multispace0), take_until_bracket_close),
            |raw: &str| !raw.trim().is_empty(),
        ),
        |raw| Segment::Filter(FilterExpr::new(raw.trim_end())),
    )(input)
}

// Body of `[(…)]`, captured verbatim inside the balanced parentheses.
fn parse_script_segment(input: &str) -> PResult<Segment> {
    map(
        verify(take_paren_group, |raw: &str| !raw.trim().is_empty()),
        |raw| Segment::Script(ScriptExpr::new(raw.trim())),
    )(input)
}

fn parse_bracket(input: &str) -> PResult<Segment> {
    context(
        "bracket segment",
        delimited(
            pair(char('['), multispace0),
            alt((
                parse_filter_segment,
                parse_script_segment,
                map(parse_member_list, Segment::Child),
            )),
            cut(pair(multispace0, char(']'))),
        ),
    )(input)
}

fn parse_dot_child(input: &str) -> PResult<Segment> {
    preceded(
        char('.'),
        alt((
            map(parse_wildcard_selector, Segment::Child),
            parse_type_selector,
            map(parse_escaped_name, |n| Segment::Child(Selector::Name(n))),
            map(parse_bare_name, |n| Segment::Child(Selector::Name(n))),
        )),
    )(input)
}

// `..` followed by an optional tail. A tailless `..` yields every
// descendant; `..[?…]` and `..[(…)]` split into a descend-all step followed
// by the filter or script step, which then applies to each descendant.
fn parse_descendant(input: &str) -> PResult<Vec<Segment>> {
    preceded(
        tag(".."),
        alt((
            map(parse_wildcard_selector, |s| {
                vec![Segment::Recursive(Some(s))]
            }),
            map(parse_escaped_name, |n| {
                vec![Segment::Recursive(Some(Selector::Name(n)))]
            }),
            map(parse_bare_name, |n| {
                vec![Segment::Recursive(Some(Selector::Name(n)))]
            }),
            parse_descendant_bracket,
            // tolerate `...name` by folding the extra dot into the child
            map(parse_dot_child, |seg| match seg {
                Segment::Child(sel) => vec![Segment::Recursive(Some(sel))],
                other => vec![Segment::Recursive(None), other],
            }),
            map(multispace0, |_| vec![Segment::Recursive(None)]),
        )),
    )(input)
}

fn parse_descendant_bracket(input: &str) -> PResult<Vec<Segment>> {
    delimited(
        pair(char('['), multispace0),
        alt((
            map(parse_filter_segment, |f| vec![Segment::Recursive(None), f]),
            map(parse_script_segment, |s| vec![Segment::Recursive(None), s]),
            map(parse_member_list, |sel| {
                vec![Segment::Recursive(Some(sel))]
            }),
        )),
        cut(pair(multispace0, char(']'))),
    )(input)
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_segment(input: &str) -> PResult<Vec<Segment>> {
    alt((
        parse_descendant,
        map(char('$'), |_| vec![Segment::Root]),
        map(parse_type_selector, |t| vec![t]),
        map(char('@'), |_| vec![Segment::Current]),
        map(char('^'), |_| vec![Segment::Parent]),
        map(char('~'), |_| vec![Segment::PropertyName]),
        map(parse_dot_child, |s| vec![s]),
        map(parse_bracket, |s| vec![s]),
    ))(input)
}

// A leading child written without `.` or `$`, e.g. `store.book`. Only
// tried when no real segment matches, so `$`-prefixed names do not shadow
// the root marker.
fn parse_bare_head(input: &str) -> PResult<Segment> {
    alt((
        map(parse_escaped_name, |n| Segment::Child(Selector::Name(n))),
        map(parse_bare_name, |n| Segment::Child(Selector::Name(n))),
        map(parse_wildcard_selector, Segment::Child),
    ))(input)
}

/// Parse one simple path, without the implicit-root rewrite
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_branch(input: &str) -> PResult<PathBranch> {
    map(
        pair(
            alt((parse_segment, map(parse_bare_head, |s| vec![s]))),
            many0(preceded(multispace0, parse_segment)),
        ),
        |(first, steps)| {
            let mut segments = first;
            for step in steps {
                segments.extend(step);
            }
            PathBranch { segments }
        },
    )(input)
}
