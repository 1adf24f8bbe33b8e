use nom::error::{ErrorKind, ParseError as NomParseError, VerboseError};
use nom::{IResult, Parser};

/// Prevent a `cut` parser from poisoning an alt branch
pub(crate) fn uncut<I, O, E: NomParseError<I>, F: Parser<I, O, E>>(
    mut parser: F,
) -> impl FnMut(I) -> IResult<I, O, E> {
    move |input: I| match parser.parse(input) {
        Err(nom::Err::Failure(e)) => Err(nom::Err::Error(e)),
        rest => rest,
    }
}

fn skip_string(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, quote: char) {
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            c if c == quote => break,
            _ => {}
        }
    }
}

/// Capture everything up to the `]` that closes the enclosing bracket
///
/// Nested brackets and parentheses are balanced, and string literals are
/// skipped so a `]` inside quotes does not terminate the capture. The
/// closing `]` is left unconsumed.
pub(crate) fn take_until_bracket_close(
    input: &str,
) -> IResult<&str, &str, VerboseError<&str>> {
    let mut chars = input.char_indices().peekable();
    let mut squares: usize = 0;
    let mut parens: usize = 0;
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' => skip_string(&mut chars, c),
            '[' => squares += 1,
            '(' => parens += 1,
            ')' => parens = parens.saturating_sub(1),
            ']' => {
                if squares == 0 && parens == 0 {
                    return Ok((&input[i..], &input[..i]));
                }
                squares = squares.saturating_sub(1);
            }
            _ => {}
        }
    }
    Err(nom::Err::Error(VerboseError::from_error_kind(
        input,
        ErrorKind::TakeUntil,
    )))
}

/// Capture the content of a balanced parenthesis group
///
/// The input must start with `(`; the matching `)` is consumed and the
/// inner text returned. String literals are skipped when balancing.
pub(crate) fn take_paren_group(input: &str) -> IResult<&str, &str, VerboseError<&str>> {
    let mut chars = input.char_indices().peekable();
    match chars.next() {
        Some((_, '(')) => {}
        _ => {
            return Err(nom::Err::Error(VerboseError::from_error_kind(
                input,
                ErrorKind::Char,
            )))
        }
    }
    let mut depth: usize = 0;
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' => skip_string(&mut chars, c),
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    let end = i + c.len_utf8();
                    return Ok((&input[end..], &input[1..i]));
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    Err(nom::Err::Error(VerboseError::from_error_kind(
        input,
        ErrorKind::TakeUntil,
    )))
}

#[cfg(test)]
mod tests {
    use super::{take_paren_group, take_until_bracket_close};

    #[test]
    fn bracket_capture_stops_at_close() {
        let (rest, body) = take_until_bracket_close("@.price < 10]").unwrap();
        assert_eq!(body, "@.price < 10");
        assert_eq!(rest, "]");
    }

    #[test]
    fn bracket_capture_balances_nesting() {
        let (rest, body) = take_until_bracket_close("(@.a[0] > 1)].b").unwrap();
        assert_eq!(body, "(@.a[0] > 1)");
        assert_eq!(rest, "].b");
    }

    #[test]
    fn bracket_capture_skips_quoted_brackets() {
        let (rest, body) = take_until_bracket_close("@.x == ']']").unwrap();
        assert_eq!(body, "@.x == ']'");
        assert_eq!(rest, "]");
    }

    #[test]
    fn paren_group() {
        let (rest, body) = take_paren_group("(@.length-1)].author").unwrap();
        assert_eq!(body, "@.length-1");
        assert_eq!(rest, "].author");
    }

    #[test]
    fn paren_group_nested_and_quoted() {
        let (rest, body) = take_paren_group("((a) + ')')rest").unwrap();
        assert_eq!(body, "(a) + ')'");
        assert_eq!(rest, "rest");
    }

    #[test]
    fn unbalanced_errors() {
        assert!(take_until_bracket_close("@.a").is_err());
        assert!(take_paren_group("(open").is_err());
    }
}
