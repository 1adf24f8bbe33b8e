use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while_m_n},
    combinator::{recognize, value},
    sequence::pair,
};

use super::PResult;

pub(crate) mod int;
pub(crate) mod number;
pub(crate) mod string;

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_null(input: &str) -> PResult<()> {
    value((), tag("null"))(input)
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_bool(input: &str) -> PResult<bool> {
    let parse_true = value(true, tag("true"));
    let parse_false = value(false, tag("false"));
    alt((parse_true, parse_false))(input)
}

fn is_ident_first(chr: char) -> bool {
    chr.is_alphabetic() || chr == '_' || chr == '$' || chr >= '\u{0080}'
}

fn is_ident_char(chr: char) -> bool {
    is_ident_first(chr) || chr.is_ascii_digit()
}

/// Parse a bare identifier: a letter, `_`, or `$` start, continued by
/// letters, digits, `_`, or `$`
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_ident(input: &str) -> PResult<&str> {
    recognize(pair(
        take_while_m_n(1, 1, is_ident_first),
        take_while(is_ident_char),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::{parse_bool, parse_ident, parse_null};

    #[test]
    fn idents() {
        assert_eq!(parse_ident("name"), Ok(("", "name")));
        assert_eq!(parse_ident("_under_score9"), Ok(("", "_under_score9")));
        assert_eq!(parse_ident("$dollar.rest"), Ok((".rest", "$dollar")));
        assert_eq!(parse_ident("héllo"), Ok(("", "héllo")));
        assert!(parse_ident("9lives").is_err());
        assert!(parse_ident("-dash").is_err());
    }

    #[test]
    fn keywords() {
        assert_eq!(parse_null("null"), Ok(("", ())));
        assert_eq!(parse_bool("true"), Ok(("", true)));
        assert_eq!(parse_bool("false"), Ok(("", false)));
        assert!(parse_bool("maybe").is_err());
    }
}
