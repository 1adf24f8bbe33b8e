use nom::{
    branch::alt,
    character::complete::{anychar, char},
    combinator::{cut, verify},
    error::context,
    multi::fold_many0,
    sequence::{delimited, preceded},
};

use super::super::PResult;

#[derive(Debug, Copy, Clone)]
enum Quotes {
    Single,
    Double,
}

impl Quotes {
    fn delimiter(self) -> char {
        match self {
            Quotes::Single => '\'',
            Quotes::Double => '"',
        }
    }
}

// Escape policy for quoted names: `\\`, `\'`, and `\"` produce the bare
// character, and any other escaped character passes through unchanged.
fn parse_escaped_char(input: &str) -> PResult<char> {
    preceded(char('\\'), anychar)(input)
}

fn parse_unescaped(quoted_with: Quotes) -> impl Fn(&str) -> PResult<char> {
    move |input: &str| {
        verify(anychar, |&chr| {
            chr != quoted_with.delimiter() && chr != '\\'
        })(input)
    }
}

fn parse_fragment(quoted_with: Quotes) -> impl Fn(&str) -> PResult<char> {
    move |input: &str| alt((parse_unescaped(quoted_with), parse_escaped_char))(input)
}

fn parse_internal(quoted_with: Quotes) -> impl Fn(&str) -> PResult<String> {
    move |input: &str| {
        fold_many0(parse_fragment(quoted_with), String::new, |mut string, c| {
            string.push(c);
            string
        })(input)
    }
}

fn parse_single_quoted(input: &str) -> PResult<String> {
    context(
        "single quoted",
        delimited(
            char('\''),
            parse_internal(Quotes::Single),
            cut(char('\'')),
        ),
    )(input)
}

fn parse_double_quoted(input: &str) -> PResult<String> {
    context(
        "double quoted",
        delimited(char('"'), parse_internal(Quotes::Double), cut(char('"'))),
    )(input)
}

/// Parse a single- or double-quoted string literal
#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_string_literal(input: &str) -> PResult<String> {
    context(
        "string literal",
        alt((parse_single_quoted, parse_double_quoted)),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::parse_string_literal;

    #[test]
    fn double_quoted() {
        assert_eq!(
            parse_string_literal("\"test\""),
            Ok(("", String::from("test")))
        );
        assert_eq!(
            parse_string_literal("\"te\\\"st\""),
            Ok(("", String::from("te\"st")))
        );
        assert_eq!(
            parse_string_literal("\"tes't\""),
            Ok(("", String::from("tes't")))
        );
    }

    #[test]
    fn single_quoted() {
        assert_eq!(
            parse_string_literal("'test'"),
            Ok(("", String::from("test")))
        );
        assert_eq!(
            parse_string_literal(r#"'te"st'"#),
            Ok(("", String::from("te\"st")))
        );
        assert_eq!(
            parse_string_literal(r"'te\'st'"),
            Ok(("", String::from("te'st")))
        );
        assert_eq!(
            parse_string_literal(r"'back\\slash'"),
            Ok(("", String::from("back\\slash")))
        );
    }

    #[test]
    fn pass_through_escapes() {
        // unknown escapes drop the backslash and keep the character
        assert_eq!(parse_string_literal(r"'a\zb'"), Ok(("", String::from("azb"))));
    }

    #[test]
    fn unterminated() {
        assert!(parse_string_literal("'open").is_err());
        assert!(parse_string_literal("\"open").is_err());
    }
}
