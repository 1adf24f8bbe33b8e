use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, map_res, value},
    error::context,
    multi::{fold_many1, many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
};

use crate::ast::Segment;
use crate::error::ParseError;
use crate::parser::primitive::number::parse_number;
use crate::parser::primitive::string::parse_string_literal;
use crate::parser::primitive::{parse_bool, parse_null};
use crate::parser::segment::parse_segment;
use crate::parser::utils::uncut;
use crate::parser::{Error, PResult};

use super::functions::{FuncExprArg, FuncKind, FunctionError, FunctionExpr};
use super::{
    BasicExpr, Comparable, CompareOp, ComparisonExpr, Filter, FilterQuery, Literal, LogicalAnd,
    LogicalOr, QueryKind, SingularQuery,
};

/// Parse an `[?…]` body as an RFC 9535 filter
///
/// Filter bodies nested inside embedded queries are parsed here as well, so
/// later evaluation is infallible; script selectors have no RFC form and
/// are rejected.
pub(crate) fn parse_filter_body(raw: &str) -> Result<Filter, ParseError> {
    let (_, filter) = all_consuming(delimited(
        multispace0,
        map(parse_logical_or, Filter),
        multispace0,
    ))(raw)
    .map_err(|err| match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            ParseError::from((raw, Error::from_verbose(e)))
        }
        nom::Err::Incomplete(_) => unreachable!("streaming parsers are not used"),
    })?;
    validate_or(&filter.0)?;
    Ok(filter)
}

fn validate_or(expr: &LogicalOr) -> Result<(), ParseError> {
    for and in &expr.0 {
        for basic in &and.0 {
            validate_basic(basic)?;
        }
    }
    Ok(())
}

fn validate_basic(expr: &BasicExpr) -> Result<(), ParseError> {
    match expr {
        BasicExpr::Paren(inner) | BasicExpr::NotParen(inner) => validate_or(inner),
        BasicExpr::Relation(rel) => {
            validate_comparable(&rel.left)?;
            validate_comparable(&rel.right)
        }
        BasicExpr::Exist(query) | BasicExpr::NotExist(query) => validate_query(query),
        BasicExpr::Func(func) | BasicExpr::NotFunc(func) => validate_func(func),
    }
}

fn validate_comparable(comparable: &Comparable) -> Result<(), ParseError> {
    match comparable {
        Comparable::Literal(_) | Comparable::Singular(_) => Ok(()),
        Comparable::Func(func) => validate_func(func),
    }
}

fn validate_func(func: &FunctionExpr) -> Result<(), ParseError> {
    for arg in &func.args {
        match arg {
            FuncExprArg::Literal(_) | FuncExprArg::Singular(_) => {}
            FuncExprArg::Query(query) => validate_query(query)?,
            FuncExprArg::Logical(inner) => validate_or(inner)?,
            FuncExprArg::Func(inner) => validate_func(inner)?,
        }
    }
    Ok(())
}

fn validate_query(query: &FilterQuery) -> Result<(), ParseError> {
    for segment in &query.segments {
        match segment {
            Segment::Filter(filter) => filter.force_rfc()?,
            Segment::Script(_) => {
                return Err(ParseError::new(
                    "script selectors are not allowed in filter queries",
                    1,
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_logical_and(input: &str) -> PResult<LogicalAnd> {
    map(
        separated_list1(
            tuple((multispace0, tag("&&"), multispace0)),
            parse_basic_expr,
        ),
        LogicalAnd,
    )(input)
}

pub(crate) fn parse_logical_or(input: &str) -> PResult<LogicalOr> {
    map(
        separated_list1(
            tuple((multispace0, tag("||"), multispace0)),
            parse_logical_and,
        ),
        LogicalOr,
    )(input)
}

#[cfg_attr(feature = "trace", tracing::instrument(level = "trace", parent = None, ret, err))]
pub(crate) fn parse_filter_query(input: &str) -> PResult<FilterQuery> {
    map(
        pair(
            alt((
                value(QueryKind::Absolute, char('$')),
                value(QueryKind::Relative, char('@')),
            )),
            many0(parse_segment),
        ),
        |(kind, steps)| FilterQuery {
            kind,
            segments: steps.into_iter().flatten().collect(),
        },
    )(input)
}

fn parse_exist_expr(input: &str) -> PResult<BasicExpr> {
    map(parse_filter_query, BasicExpr::Exist)(input)
}

fn parse_not_exist_expr(input: &str) -> PResult<BasicExpr> {
    map(
        preceded(pair(char('!'), multispace0), parse_filter_query),
        BasicExpr::NotExist,
    )(input)
}

// Functions in logical position must produce a logical or a nodelist.
fn parse_logical_func(input: &str) -> PResult<FunctionExpr> {
    map_res(parse_function_expr, |fe| {
        match fe.function.result {
            FuncKind::Logical | FuncKind::Nodes => Ok(fe),
            _ => Err(FunctionError::IncorrectFunctionReturnType),
        }
    })(input)
}

fn parse_func_expr(input: &str) -> PResult<BasicExpr> {
    map(parse_logical_func, BasicExpr::Func)(input)
}

fn parse_not_func_expr(input: &str) -> PResult<BasicExpr> {
    map(
        preceded(pair(char('!'), multispace0), parse_logical_func),
        BasicExpr::NotFunc,
    )(input)
}

fn parse_paren_expr_inner(input: &str) -> PResult<LogicalOr> {
    delimited(
        pair(char('('), multispace0),
        parse_logical_or,
        pair(multispace0, char(')')),
    )(input)
}

fn parse_paren_expr(input: &str) -> PResult<BasicExpr> {
    map(parse_paren_expr_inner, BasicExpr::Paren)(input)
}

fn parse_not_paren_expr(input: &str) -> PResult<BasicExpr> {
    map(
        preceded(pair(char('!'), multispace0), parse_paren_expr_inner),
        BasicExpr::NotParen,
    )(input)
}

fn parse_basic_expr(input: &str) -> PResult<BasicExpr> {
    alt((
        parse_not_paren_expr,
        parse_paren_expr,
        map(parse_comp_expr, BasicExpr::Relation),
        parse_not_exist_expr,
        parse_exist_expr,
        parse_not_func_expr,
        parse_func_expr,
    ))(input)
}

fn parse_comp_expr(input: &str) -> PResult<ComparisonExpr> {
    map(
        separated_pair(
            parse_comparable,
            multispace0,
            separated_pair(parse_compare_op, multispace0, parse_comparable),
        ),
        |(left, (op, right))| ComparisonExpr { left, op, right },
    )(input)
}

fn parse_compare_op(input: &str) -> PResult<CompareOp> {
    alt((
        value(CompareOp::Eq, tag("==")),
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Lt, char('<')),
        value(CompareOp::Gt, char('>')),
    ))(input)
}

pub(crate) fn parse_literal(input: &str) -> PResult<Literal> {
    alt((
        map(parse_string_literal, Literal::String),
        map(parse_number, Literal::Number),
        map(parse_bool, Literal::Bool),
        value(Literal::Null, parse_null),
    ))(input)
}

fn parse_singular_query(input: &str) -> PResult<SingularQuery> {
    map_res(parse_filter_query, SingularQuery::try_from)(input)
}

// Functions in comparison position must produce a single value.
fn parse_value_func(input: &str) -> PResult<FunctionExpr> {
    map_res(parse_function_expr, |fe| match fe.function.result {
        FuncKind::Value => Ok(fe),
        _ => Err(FunctionError::IncorrectFunctionReturnType),
    })(input)
}

pub(crate) fn parse_comparable(input: &str) -> PResult<Comparable> {
    uncut(alt((
        map(parse_literal, Comparable::Literal),
        map(parse_singular_query, Comparable::Singular),
        map(parse_value_func, Comparable::Func),
    )))(input)
}

fn parse_function_name_first(input: &str) -> PResult<char> {
    satisfy(|c| c.is_ascii_lowercase())(input)
}

fn parse_function_name_char(input: &str) -> PResult<char> {
    alt((
        parse_function_name_first,
        char('_'),
        satisfy(|c| c.is_ascii_digit()),
    ))(input)
}

fn parse_function_name(input: &str) -> PResult<String> {
    map(
        pair(
            parse_function_name_first,
            fold_many1(
                parse_function_name_char,
                String::new,
                |mut string, fragment| {
                    string.push(fragment);
                    string
                },
            ),
        ),
        |(first, rest)| format!("{first}{rest}"),
    )(input)
}

fn parse_function_argument(input: &str) -> PResult<FuncExprArg> {
    alt((
        map(parse_literal, FuncExprArg::Literal),
        map(parse_singular_query, FuncExprArg::Singular),
        map(parse_filter_query, FuncExprArg::Query),
        map(parse_function_expr, FuncExprArg::Func),
        map(parse_logical_or, FuncExprArg::Logical),
    ))(input)
}

pub(crate) fn parse_function_expr(input: &str) -> PResult<FunctionExpr> {
    context(
        "function expression",
        map_res(
            pair(
                parse_function_name,
                delimited(
                    terminated(char('('), multispace0),
                    separated_list0(
                        delimited(multispace0, char(','), multispace0),
                        parse_function_argument,
                    ),
                    preceded(multispace0, char(')')),
                ),
            ),
            |(name, args)| FunctionExpr::validate(name, args),
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::{parse_comparable, parse_filter_body, parse_function_expr};
    use super::super::{Comparable, CompareOp, Literal, SingularStep};

    #[test]
    fn literals() {
        let (_, cmp) = parse_comparable("null").unwrap();
        assert!(matches!(cmp, Comparable::Literal(Literal::Null)));
        let (_, cmp) = parse_comparable("'test'").unwrap();
        assert!(matches!(cmp, Comparable::Literal(Literal::String(s)) if s == "test"));
        let (_, cmp) = parse_comparable("1.5").unwrap();
        assert!(matches!(cmp, Comparable::Literal(Literal::Number(_))));
    }

    #[test]
    fn singular_query_comparables() {
        let (_, cmp) = parse_comparable("@.name").unwrap();
        let Comparable::Singular(sq) = cmp else {
            panic!("expected singular query");
        };
        assert!(matches!(&sq.steps[0], SingularStep::Name(s) if s == "name"));
        let (_, cmp) = parse_comparable("$.data[0].id").unwrap();
        let Comparable::Singular(sq) = cmp else {
            panic!("expected singular query");
        };
        assert_eq!(sq.steps.len(), 3);
        assert!(matches!(&sq.steps[1], SingularStep::Index(0)));
    }

    #[test]
    fn comparisons_parse() {
        let filter = parse_filter_body("@.price < 10").unwrap();
        let basic = &filter.0 .0[0].0[0];
        let rel = match basic {
            super::BasicExpr::Relation(rel) => rel,
            other => panic!("expected relation: {other:?}"),
        };
        assert_eq!(rel.op, CompareOp::Lt);
    }

    #[test]
    fn logic_and_parens() {
        assert!(parse_filter_body("@.a > 1 && @.b < 2 || !(@.c)").is_ok());
        assert!(parse_filter_body("(@.a && (@.b || @.c))").is_ok());
    }

    #[test]
    fn functions_validate() {
        assert!(parse_function_expr("length(@.authors)").is_ok());
        assert!(parse_function_expr("count(@..x)").is_ok());
        assert!(parse_function_expr("match(@.date, '1974-.*')").is_ok());
        // count takes a nodelist, not a literal
        assert!(parse_function_expr("count('x')").is_err());
        // unknown function
        assert!(parse_function_expr("nope(@.x)").is_err());
    }

    #[test]
    fn function_positions() {
        // logical position requires logical or nodes return
        assert!(parse_filter_body("match(@.a, 'x')").is_ok());
        // value return in comparison position
        assert!(parse_filter_body("length(@.a) >= 2").is_ok());
        assert!(parse_filter_body("value(@..a) == 1").is_ok());
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_filter_body("").is_err());
        assert!(parse_filter_body("@.a ==").is_err());
        assert!(parse_filter_body("&& @.a").is_err());
    }
}
