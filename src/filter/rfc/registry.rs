//! Built-in filter functions: `length`, `count`, `match`, `search`, `value`
//!
//! Regex dialect for `match` and `search`: the Rust `regex` crate with its
//! default Unicode-aware character classes; `.` does not match `\n`.
//! `match` tests the entire string by wrapping the pattern in `^(?:…)$`,
//! `search` is unanchored.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::functions::{expect_args, Evaluator, FuncKind, FuncValue, Function, Validator};

fn value_length(value: &Value) -> FuncValue<'static> {
    match value {
        Value::String(s) => FuncValue::Value(s.chars().count().into()),
        Value::Array(list) => FuncValue::Value(list.len().into()),
        Value::Object(map) => FuncValue::Value(map.len().into()),
        _ => FuncValue::Nothing,
    }
}

static LENGTH_EVALUATOR: Evaluator = Lazy::new(|| {
    Box::new(|mut args| match args.pop_front() {
        Some(FuncValue::Node(v)) => value_length(v),
        Some(FuncValue::Value(ref v)) => value_length(v),
        _ => FuncValue::Nothing,
    })
});

static LENGTH_VALIDATOR: Validator =
    Lazy::new(|| Box::new(|kinds| expect_args(&[FuncKind::Value], kinds)));

inventory::submit! {
    Function::new("length", FuncKind::Value, &LENGTH_EVALUATOR, &LENGTH_VALIDATOR)
}

static COUNT_EVALUATOR: Evaluator = Lazy::new(|| {
    Box::new(|mut args| match args.pop_front() {
        Some(FuncValue::Nodes(nl)) => FuncValue::Value(nl.len().into()),
        Some(FuncValue::Node(_)) => FuncValue::Value(1.into()),
        _ => FuncValue::Value(0.into()),
    })
});

static COUNT_VALIDATOR: Validator =
    Lazy::new(|| Box::new(|kinds| expect_args(&[FuncKind::Nodes], kinds)));

inventory::submit! {
    Function::new("count", FuncKind::Value, &COUNT_EVALUATOR, &COUNT_VALIDATOR)
}

fn regex_test(mut args: std::collections::VecDeque<FuncValue<'_>>, anchor: bool) -> FuncValue<'static> {
    let subject = args.pop_front();
    let pattern = args.pop_front();
    let (Some(subject), Some(pattern)) = (subject, pattern) else {
        return FuncValue::Logical(false);
    };
    let (Some(Value::String(subject)), Some(Value::String(pattern))) =
        (subject.as_value(), pattern.as_value())
    else {
        return FuncValue::Logical(false);
    };
    let pattern = if anchor {
        Cow::Owned(format!("^(?:{pattern})$"))
    } else {
        Cow::Borrowed(pattern.as_str())
    };
    FuncValue::Logical(
        Regex::new(&pattern)
            .map(|re| re.is_match(subject))
            .unwrap_or(false),
    )
}

static MATCH_EVALUATOR: Evaluator = Lazy::new(|| Box::new(|args| regex_test(args, true)));

static MATCH_VALIDATOR: Validator =
    Lazy::new(|| Box::new(|kinds| expect_args(&[FuncKind::Value, FuncKind::Value], kinds)));

inventory::submit! {
    Function::new("match", FuncKind::Logical, &MATCH_EVALUATOR, &MATCH_VALIDATOR)
}

static SEARCH_EVALUATOR: Evaluator = Lazy::new(|| Box::new(|args| regex_test(args, false)));

static SEARCH_VALIDATOR: Validator =
    Lazy::new(|| Box::new(|kinds| expect_args(&[FuncKind::Value, FuncKind::Value], kinds)));

inventory::submit! {
    Function::new("search", FuncKind::Logical, &SEARCH_EVALUATOR, &SEARCH_VALIDATOR)
}

static VALUE_EVALUATOR: Evaluator = Lazy::new(|| {
    Box::new(|mut args| match args.pop_front() {
        Some(FuncValue::Nodes(nl)) if nl.len() == 1 => {
            match nl.into_iter().next() {
                Some(Cow::Borrowed(v)) => FuncValue::Node(v),
                Some(Cow::Owned(v)) => FuncValue::Value(v),
                None => FuncValue::Nothing,
            }
        }
        Some(FuncValue::Node(v)) => FuncValue::Node(v),
        _ => FuncValue::Nothing,
    })
});

static VALUE_VALIDATOR: Validator =
    Lazy::new(|| Box::new(|kinds| expect_args(&[FuncKind::Nodes], kinds)));

inventory::submit! {
    Function::new("value", FuncKind::Value, &VALUE_EVALUATOR, &VALUE_VALIDATOR)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use serde_json::json;

    use super::super::functions::{lookup, FuncValue};

    fn call<'a>(name: &str, args: VecDeque<FuncValue<'a>>) -> FuncValue<'a> {
        (lookup(name).expect("registered").evaluator)(args)
    }

    #[test]
    fn length_of_values() {
        let s = json!("héllo");
        let out = call("length", VecDeque::from([FuncValue::Node(&s)]));
        assert!(matches!(out, FuncValue::Value(v) if v == json!(5)));
        let arr = json!([1, 2, 3]);
        let out = call("length", VecDeque::from([FuncValue::Node(&arr)]));
        assert!(matches!(out, FuncValue::Value(v) if v == json!(3)));
        let n = json!(10);
        let out = call("length", VecDeque::from([FuncValue::Node(&n)]));
        assert!(matches!(out, FuncValue::Nothing));
    }

    #[test]
    fn match_is_anchored_search_is_not() {
        let s = json!("1974-05-11");
        let pat = json!("1974-05-..");
        let out = call(
            "match",
            VecDeque::from([FuncValue::Node(&s), FuncValue::Node(&pat)]),
        );
        assert!(matches!(out, FuncValue::Logical(true)));
        let part = json!("05");
        let out = call(
            "match",
            VecDeque::from([FuncValue::Node(&s), FuncValue::Node(&part)]),
        );
        assert!(matches!(out, FuncValue::Logical(false)));
        let out = call(
            "search",
            VecDeque::from([FuncValue::Node(&s), FuncValue::Node(&part)]),
        );
        assert!(matches!(out, FuncValue::Logical(true)));
    }

    #[test]
    fn invalid_regex_is_false() {
        let s = json!("abc");
        let bad = json!("(unclosed");
        let out = call(
            "search",
            VecDeque::from([FuncValue::Node(&s), FuncValue::Node(&bad)]),
        );
        assert!(matches!(out, FuncValue::Logical(false)));
    }

    #[test]
    fn value_unwraps_single_nodelists() {
        let v = json!(["only"]);
        let nodes: Vec<&serde_json::Value> = v.as_array().unwrap().iter().collect();
        let out = call(
            "value",
            VecDeque::from([FuncValue::Nodes(nodes.into())]),
        );
        assert!(matches!(out, FuncValue::Node(n) if *n == json!("only")));
        let out = call(
            "value",
            VecDeque::from([FuncValue::Nodes(Vec::<&serde_json::Value>::new().into())]),
        );
        assert!(matches!(out, FuncValue::Nothing));
    }
}
