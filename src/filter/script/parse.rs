use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1, multispace0, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::fold_many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use crate::error::ParseError;
use crate::parser::primitive::{parse_ident, string::parse_string_literal};
use crate::parser::{Error, PResult};

use super::{BinOp, Expr, UnaryOp};

/// The substitutions shared by every evaluation policy: `@`-prefixed
/// built-ins become bare identifiers, and a bare `@` becomes `value`.
pub(crate) fn normalize_at_refs(raw: &str) -> String {
    const NAMED: [&str; 5] = ["root", "parent", "property", "parentProperty", "path"];
    let mut out = String::with_capacity(raw.len() + 8);
    let mut chars = raw.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                while let Some((_, q)) = chars.next() {
                    out.push(q);
                    if q == '\\' {
                        if let Some((_, escaped)) = chars.next() {
                            out.push(escaped);
                        }
                    } else if q == c {
                        break;
                    }
                }
            }
            '@' => {
                let rest = &raw[i + c.len_utf8()..];
                let word_len = rest
                    .char_indices()
                    .take_while(|(_, wc)| {
                        wc.is_alphanumeric() || *wc == '_' || *wc == '$'
                    })
                    .last()
                    .map(|(j, wc)| j + wc.len_utf8())
                    .unwrap_or(0);
                let word = &rest[..word_len];
                if NAMED.contains(&word) {
                    out.push_str(word);
                    for _ in 0..word.chars().count() {
                        chars.next();
                    }
                } else if word.is_empty() {
                    out.push_str("value");
                } else {
                    out.push(c);
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Parse a legacy expression body after `@`-reference normalization
pub(crate) fn parse_expression(raw: &str) -> Result<Expr, ParseError> {
    let normalized = normalize_at_refs(raw);
    let (_, expr) = all_consuming(terminated(parse_expr, multispace0))(normalized.as_str())
        .map_err(|err| match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                ParseError::from((normalized.as_str(), Error::from_verbose(e)))
            }
            nom::Err::Incomplete(_) => unreachable!("streaming parsers are not used"),
        })?;
    Ok(expr)
}

fn parse_expr(input: &str) -> PResult<Expr> {
    parse_or(input)
}

fn parse_or(input: &str) -> PResult<Expr> {
    let (rest, first) = parse_and(input)?;
    fold_many0(
        preceded(preceded(multispace0, tag("||")), parse_and),
        move || first.clone(),
        |acc, rhs| Expr::binary(BinOp::Or, acc, rhs),
    )(rest)
}

fn parse_and(input: &str) -> PResult<Expr> {
    let (rest, first) = parse_equality(input)?;
    fold_many0(
        preceded(preceded(multispace0, tag("&&")), parse_equality),
        move || first.clone(),
        |acc, rhs| Expr::binary(BinOp::And, acc, rhs),
    )(rest)
}

fn parse_equality_op(input: &str) -> PResult<BinOp> {
    preceded(
        multispace0,
        alt((
            map(tag("==="), |_| BinOp::StrictEq),
            map(tag("!=="), |_| BinOp::StrictNe),
            map(tag("=="), |_| BinOp::Eq),
            map(tag("!="), |_| BinOp::Ne),
        )),
    )(input)
}

fn parse_equality(input: &str) -> PResult<Expr> {
    let (rest, first) = parse_relational(input)?;
    fold_many0(
        pair(parse_equality_op, parse_relational),
        move || first.clone(),
        |acc, (op, rhs)| Expr::binary(op, acc, rhs),
    )(rest)
}

fn parse_relational_op(input: &str) -> PResult<BinOp> {
    preceded(
        multispace0,
        alt((
            map(tag("<="), |_| BinOp::Le),
            map(tag(">="), |_| BinOp::Ge),
            map(char('<'), |_| BinOp::Lt),
            map(char('>'), |_| BinOp::Gt),
        )),
    )(input)
}

fn parse_relational(input: &str) -> PResult<Expr> {
    let (rest, first) = parse_additive(input)?;
    fold_many0(
        pair(parse_relational_op, parse_additive),
        move || first.clone(),
        |acc, (op, rhs)| Expr::binary(op, acc, rhs),
    )(rest)
}

fn parse_additive_op(input: &str) -> PResult<BinOp> {
    preceded(
        multispace0,
        alt((map(char('+'), |_| BinOp::Add), map(char('-'), |_| BinOp::Sub))),
    )(input)
}

fn parse_additive(input: &str) -> PResult<Expr> {
    let (rest, first) = parse_multiplicative(input)?;
    fold_many0(
        pair(parse_additive_op, parse_multiplicative),
        move || first.clone(),
        |acc, (op, rhs)| Expr::binary(op, acc, rhs),
    )(rest)
}

fn parse_multiplicative_op(input: &str) -> PResult<BinOp> {
    preceded(
        multispace0,
        alt((
            map(char('*'), |_| BinOp::Mul),
            map(char('/'), |_| BinOp::Div),
            map(char('%'), |_| BinOp::Rem),
        )),
    )(input)
}

fn parse_multiplicative(input: &str) -> PResult<Expr> {
    let (rest, first) = parse_unary(input)?;
    fold_many0(
        pair(parse_multiplicative_op, parse_unary),
        move || first.clone(),
        |acc, (op, rhs)| Expr::binary(op, acc, rhs),
    )(rest)
}

fn parse_unary(input: &str) -> PResult<Expr> {
    preceded(
        multispace0,
        alt((
            map(preceded(char('!'), parse_unary), |e| {
                Expr::unary(UnaryOp::Not, e)
            }),
            map(preceded(char('-'), parse_unary), |e| {
                Expr::unary(UnaryOp::Neg, e)
            }),
            parse_postfix,
        )),
    )(input)
}

enum Postfix {
    Member(String),
    Index(Expr),
}

fn parse_postfix(input: &str) -> PResult<Expr> {
    let (rest, base) = parse_primary(input)?;
    fold_many0(
        alt((
            map(
                preceded(pair(multispace0, char('.')), parse_ident),
                |name| Postfix::Member(name.to_owned()),
            ),
            map(
                delimited(
                    pair(multispace0, char('[')),
                    parse_expr,
                    pair(multispace0, char(']')),
                ),
                Postfix::Index,
            ),
        )),
        move || base.clone(),
        |acc, post| match post {
            Postfix::Member(name) => Expr::Member(Box::new(acc), name),
            Postfix::Index(index) => Expr::Index(Box::new(acc), Box::new(index)),
        },
    )(rest)
}

// JS-style number literal; the sign is handled as a unary operator.
fn parse_number_literal(input: &str) -> PResult<f64> {
    map_res(
        recognize(tuple((
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

fn parse_primary(input: &str) -> PResult<Expr> {
    preceded(
        multispace0,
        alt((
            map(parse_number_literal, Expr::Num),
            map(parse_string_literal, Expr::Str),
            delimited(
                char('('),
                parse_expr,
                pair(multispace0, char(')')),
            ),
            map(parse_ident, |name| match name {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                "undefined" => Expr::Undefined,
                "NaN" => Expr::Num(f64::NAN),
                "Infinity" => Expr::Num(f64::INFINITY),
                name => Expr::Ident(name.to_owned()),
            }),
        )),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::super::{BinOp, Expr};
    use super::{normalize_at_refs, parse_expression};

    #[test]
    fn normalization() {
        assert_eq!(normalize_at_refs("@.price < 10"), "value.price < 10");
        assert_eq!(normalize_at_refs("@ == 'x'"), "value == 'x'");
        assert_eq!(normalize_at_refs("@['a']"), "value['a']");
        assert_eq!(
            normalize_at_refs("@path == \"$['a']\""),
            "path == \"$['a']\""
        );
        assert_eq!(
            normalize_at_refs("@parentProperty == @property"),
            "parentProperty == property"
        );
        assert_eq!(normalize_at_refs("@parent.x && @root.y"), "parent.x && root.y");
        assert_eq!(normalize_at_refs("'@ stays'"), "'@ stays'");
    }

    #[test]
    fn precedence() {
        let expr = parse_expression("1 + 2 * 3 == 7 && true").unwrap();
        match expr {
            Expr::Binary(BinOp::And, left, _) => match *left {
                Expr::Binary(BinOp::Eq, ..) => {}
                other => panic!("expected equality on the left: {other:?}"),
            },
            other => panic!("expected &&: {other:?}"),
        }
    }

    #[test]
    fn member_chains() {
        let expr = parse_expression("@.a.b[0].c").unwrap();
        assert!(matches!(expr, Expr::Member(..)));
    }

    #[test]
    fn parenthesized_bodies() {
        assert!(parse_expression("(@.price < 10)").is_ok());
        assert!(parse_expression("(@.length-1)").is_ok());
    }

    #[test]
    fn keywords_are_literals() {
        assert!(matches!(parse_expression("undefined").unwrap(), Expr::Undefined));
        let expr = parse_expression("NaN").unwrap();
        assert!(matches!(expr, Expr::Num(n) if n.is_nan()));
    }
}
