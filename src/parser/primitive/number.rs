use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map_res, opt, recognize},
    sequence::{preceded, tuple},
};
use serde_json::Number;

use super::super::PResult;
use super::int::parse_int_string;

fn parse_fractional(input: &str) -> PResult<&str> {
    preceded(char('.'), digit1)(input)
}

fn parse_exponent(input: &str) -> PResult<&str> {
    recognize(tuple((one_of("eE"), opt(one_of("-+")), digit0)))(input)
}

fn parse_number_string(input: &str) -> PResult<&str> {
    recognize(tuple((
        alt((parse_int_string, tag("-0"))),
        opt(parse_fractional),
        opt(parse_exponent),
    )))(input)
}

/// Parse a JSON number literal for filter expressions
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_number(input: &str) -> PResult<Number> {
    map_res(parse_number_string, Number::from_str)(input)
}
