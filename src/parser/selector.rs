use nom::{
    branch::alt,
    character::complete::{char, multispace0},
    combinator::{map, opt},
    error::context,
    multi::separated_list1,
    sequence::{delimited, preceded, separated_pair, terminated},
};

use crate::ast::{Name, Selector, Slice};

use super::primitive::int::parse_int;
use super::primitive::string::parse_string_literal;
use super::PResult;

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_wildcard_selector(input: &str) -> PResult<Selector> {
    map(char('*'), |_| Selector::Wildcard)(input)
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
fn parse_name_selector(input: &str) -> PResult<Selector> {
    map(parse_string_literal, |s| Selector::Name(Name::quoted(s)))(input)
}

fn parse_int_space_after(input: &str) -> PResult<isize> {
    terminated(parse_int, multispace0)(input)
}

fn parse_int_space_before(input: &str) -> PResult<isize> {
    preceded(multispace0, parse_int)(input)
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_slice(input: &str) -> PResult<Slice> {
    map(
        separated_pair(
            opt(parse_int_space_after),
            char(':'),
            preceded(
                multispace0,
                alt((
                    separated_pair(
                        opt(parse_int_space_after),
                        char(':'),
                        opt(parse_int_space_before),
                    ),
                    map(opt(parse_int_space_after), |i| (i, None)),
                )),
            ),
        ),
        |(start, (end, step))| Slice { start, end, step },
    )(input)
}

fn parse_slice_selector(input: &str) -> PResult<Selector> {
    map(parse_slice, Selector::Slice)(input)
}

fn parse_index_selector(input: &str) -> PResult<Selector> {
    map(parse_int, Selector::Index)(input)
}

/// Parse one member of a bracket selector list
///
/// Filters and scripts are not members; they are captured separately by the
/// segment parser (and legacy filter unions are expanded by the normalizer
/// before parsing).
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_union_member(input: &str) -> PResult<Selector> {
    context(
        "selector",
        alt((
            parse_wildcard_selector,
            parse_name_selector,
            parse_slice_selector,
            parse_index_selector,
        )),
    )(input)
}

/// Parse the comma-separated content of a plain bracket segment
///
/// A single member stays a plain selector; two or more become a
/// [`Selector::Union`], evaluated left to right without de-duplication.
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_member_list(input: &str) -> PResult<Selector> {
    map(
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            parse_union_member,
        ),
        |mut members| {
            if members.len() == 1 {
                members.remove(0)
            } else {
                Selector::Union(members)
            }
        },
    )(input)
}

#[cfg(test)]
mod tests {
    use crate::ast::{Name, Selector, Slice};

    use super::{parse_member_list, parse_slice, parse_union_member};

    #[test]
    fn members() {
        assert_eq!(parse_union_member("0"), Ok(("", Selector::Index(0))));
        assert_eq!(parse_union_member("-3"), Ok(("", Selector::Index(-3))));
        assert_eq!(
            parse_union_member("'name'"),
            Ok(("", Selector::Name(Name::quoted("name"))))
        );
        assert_eq!(
            parse_union_member("\"name\""),
            Ok(("", Selector::Name(Name::quoted("name"))))
        );
        assert_eq!(parse_union_member("*"), Ok(("", Selector::Wildcard)));
        assert_eq!(
            parse_union_member("0:3"),
            Ok(("", Selector::Slice(Slice::new().with_start(0).with_end(3))))
        );
    }

    #[test]
    fn slices() {
        assert_eq!(
            parse_slice("1:5:2"),
            Ok(("", Slice::new().with_start(1).with_end(5).with_step(2)))
        );
        assert_eq!(parse_slice("::"), Ok(("", Slice::new())));
        assert_eq!(
            parse_slice(":5"),
            Ok(("", Slice::new().with_end(5)))
        );
        assert_eq!(
            parse_slice("::-1"),
            Ok(("", Slice::new().with_step(-1)))
        );
        assert_eq!(
            parse_slice("1 : 5 :1"),
            Ok(("", Slice::new().with_start(1).with_end(5).with_step(1)))
        );
    }

    #[test]
    fn unions() {
        let (_, sel) = parse_member_list("'name',10,0:3").unwrap();
        assert_eq!(
            sel,
            Selector::Union(vec![
                Selector::Name(Name::quoted("name")),
                Selector::Index(10),
                Selector::Slice(Slice::new().with_start(0).with_end(3)),
            ])
        );
        let (_, sel) = parse_member_list("'single'").unwrap();
        assert_eq!(sel, Selector::Name(Name::quoted("single")));
        let (_, sel) = parse_member_list("0 , 1").unwrap();
        assert_eq!(
            sel,
            Selector::Union(vec![Selector::Index(0), Selector::Index(1)])
        );
    }
}
