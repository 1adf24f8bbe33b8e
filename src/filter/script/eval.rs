//! Tree-walking evaluation of legacy expressions
//!
//! Coercion follows JavaScript closely enough for the expressions seen in
//! real queries; the deliberate deviations are documented inline (object
//! and array equality is structural, and number-to-string formatting is
//! approximate for very large magnitudes).

use serde_json::Value;

use crate::ast::{Name, Selector};
use crate::error::EvalError;
use crate::eval::context::PathElement;
use crate::options::Sandbox;

use super::{BinOp, Expr, Program, UnaryOp};

/// A runtime value: JSON data (borrowed where possible) extended with the
/// JS `undefined` and full-range doubles
#[derive(Debug, Clone)]
pub(crate) enum SVal<'a> {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Node(&'a Value),
    Owned(Value),
}

type EvalResult<'a> = Result<SVal<'a>, String>;

/// The variables visible to one expression evaluation
#[derive(Debug)]
pub(crate) struct Scope<'a, 'e> {
    pub(crate) value: SVal<'a>,
    pub(crate) parent: Option<&'a Value>,
    pub(crate) property: Option<PathElement<'a>>,
    pub(crate) parent_property: Option<PathElement<'a>>,
    pub(crate) root: &'a Value,
    pub(crate) path: Option<String>,
    pub(crate) sandbox: &'e Sandbox,
}

impl<'a, 'e> Scope<'a, 'e> {
    fn lookup(&self, name: &str) -> Option<SVal<'a>> {
        match name {
            "value" => Some(self.value.clone()),
            "parent" => Some(self.parent.map(SVal::Node).unwrap_or(SVal::Null)),
            "property" => Some(key_val(self.property)),
            "parentProperty" => Some(key_val(self.parent_property)),
            "root" | "$" => Some(SVal::Node(self.root)),
            "path" => Some(
                self.path
                    .as_ref()
                    .map(|p| SVal::Str(p.clone()))
                    .unwrap_or(SVal::Undefined),
            ),
            _ => self.sandbox.get(name).map(|v| SVal::Owned(v.clone())),
        }
    }
}

fn key_val<'a>(key: Option<PathElement<'a>>) -> SVal<'a> {
    match key {
        Some(PathElement::Name(s)) => SVal::Str(s.to_owned()),
        Some(PathElement::Index(i)) => SVal::Num(i as f64),
        None => SVal::Null,
    }
}

/// Verify the safe-eval allow-list against an expression's identifier
/// inventory; this scan is the only defense of the safe policy and runs
/// before any evaluation
pub(crate) fn check_safe(program: &Program, sandbox: &Sandbox) -> Result<(), EvalError> {
    const BUILTINS: [&str; 7] = [
        "value",
        "parent",
        "property",
        "parentProperty",
        "root",
        "path",
        "$",
    ];
    const FORBIDDEN_MEMBERS: [&str; 3] = ["constructor", "__proto__", "prototype"];
    for ident in &program.idents {
        if !BUILTINS.contains(&ident.as_str()) && !sandbox.contains_key(ident) {
            return Err(EvalError::UnsafeIdentifier(ident.clone()));
        }
    }
    for member in &program.members {
        if FORBIDDEN_MEMBERS.contains(&member.as_str()) {
            return Err(EvalError::UnsafeIdentifier(member.clone()));
        }
    }
    Ok(())
}

/// Evaluate an expression within a scope
pub(crate) fn eval<'a>(expr: &Expr, scope: &Scope<'a, '_>) -> EvalResult<'a> {
    match expr {
        Expr::Num(n) => Ok(SVal::Num(*n)),
        Expr::Str(s) => Ok(SVal::Str(s.clone())),
        Expr::Bool(b) => Ok(SVal::Bool(*b)),
        Expr::Null => Ok(SVal::Null),
        Expr::Undefined => Ok(SVal::Undefined),
        Expr::Ident(name) => scope
            .lookup(name)
            .ok_or_else(|| format!("'{name}' is not defined")),
        Expr::Member(base, name) => member(eval(base, scope)?, name),
        Expr::Index(base, index) => {
            let base = eval(base, scope)?;
            let key = eval(index, scope)?;
            match key {
                SVal::Num(n) => element(base, n),
                SVal::Node(Value::Number(n)) => element(base, n.as_f64().unwrap_or(f64::NAN)),
                SVal::Str(s) => member(base, &s),
                SVal::Node(Value::String(s)) => member(base, s),
                other => member(base, &js_string(&other)),
            }
        }
        Expr::Unary(UnaryOp::Not, operand) => Ok(SVal::Bool(!truthy(&eval(operand, scope)?))),
        Expr::Unary(UnaryOp::Neg, operand) => Ok(SVal::Num(-to_number(&eval(operand, scope)?))),
        Expr::Binary(BinOp::And, left, right) => {
            let l = eval(left, scope)?;
            if truthy(&l) {
                eval(right, scope)
            } else {
                Ok(l)
            }
        }
        Expr::Binary(BinOp::Or, left, right) => {
            let l = eval(left, scope)?;
            if truthy(&l) {
                Ok(l)
            } else {
                eval(right, scope)
            }
        }
        Expr::Binary(op, left, right) => {
            let l = eval(left, scope)?;
            let r = eval(right, scope)?;
            binary(*op, l, r)
        }
    }
}

fn member<'a>(base: SVal<'a>, name: &str) -> EvalResult<'a> {
    match base {
        SVal::Undefined => Err(format!("cannot read property '{name}' of undefined")),
        SVal::Null => Err(format!("cannot read property '{name}' of null")),
        SVal::Str(s) if name == "length" => Ok(SVal::Num(s.chars().count() as f64)),
        SVal::Node(v) => Ok(node_member(v, name)
            .map(SVal::Node)
            .or_else(|| value_length(v, name).map(SVal::Num))
            .unwrap_or(SVal::Undefined)),
        SVal::Owned(v) => Ok(node_member(&v, name)
            .cloned()
            .map(SVal::Owned)
            .or_else(|| value_length(&v, name).map(SVal::Num))
            .unwrap_or(SVal::Undefined)),
        _ => Ok(SVal::Undefined),
    }
}

fn node_member<'v>(value: &'v Value, name: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(name),
        Value::Array(list) => name.parse::<usize>().ok().and_then(|i| list.get(i)),
        _ => None,
    }
}

fn value_length(value: &Value, name: &str) -> Option<f64> {
    if name != "length" {
        return None;
    }
    match value {
        Value::Array(list) => Some(list.len() as f64),
        Value::String(s) => Some(s.chars().count() as f64),
        _ => None,
    }
}

fn element<'a>(base: SVal<'a>, index: f64) -> EvalResult<'a> {
    if index < 0.0 || index.fract() != 0.0 {
        return Ok(SVal::Undefined);
    }
    let i = index as usize;
    match &base {
        SVal::Undefined | SVal::Null => Err(format!(
            "cannot read property '{index}' of {kind}",
            kind = type_name(&base)
        )),
        SVal::Str(s) => Ok(s
            .chars()
            .nth(i)
            .map(|c| SVal::Str(c.to_string()))
            .unwrap_or(SVal::Undefined)),
        SVal::Node(Value::Array(list)) => {
            Ok(list.get(i).map(SVal::Node).unwrap_or(SVal::Undefined))
        }
        SVal::Node(Value::Object(map)) => Ok(map
            .get(&index.to_string())
            .or_else(|| map.get(&i.to_string()))
            .map(SVal::Node)
            .unwrap_or(SVal::Undefined)),
        SVal::Owned(Value::Array(list)) => Ok(list
            .get(i)
            .map(|c| SVal::Owned(c.clone()))
            .unwrap_or(SVal::Undefined)),
        _ => Ok(SVal::Undefined),
    }
}

fn binary<'a>(op: BinOp, left: SVal<'a>, right: SVal<'a>) -> EvalResult<'a> {
    Ok(match op {
        BinOp::Add => {
            if is_stringish(&left) || is_stringish(&right) {
                SVal::Str(format!("{}{}", js_string(&left), js_string(&right)))
            } else {
                SVal::Num(to_number(&left) + to_number(&right))
            }
        }
        BinOp::Sub => SVal::Num(to_number(&left) - to_number(&right)),
        BinOp::Mul => SVal::Num(to_number(&left) * to_number(&right)),
        BinOp::Div => SVal::Num(to_number(&left) / to_number(&right)),
        BinOp::Rem => SVal::Num(to_number(&left) % to_number(&right)),
        BinOp::Lt => SVal::Bool(relational(&left, &right, |o| o == std::cmp::Ordering::Less)),
        BinOp::Le => SVal::Bool(relational(&left, &right, |o| o != std::cmp::Ordering::Greater)),
        BinOp::Gt => SVal::Bool(relational(&left, &right, |o| o == std::cmp::Ordering::Greater)),
        BinOp::Ge => SVal::Bool(relational(&left, &right, |o| o != std::cmp::Ordering::Less)),
        BinOp::Eq => SVal::Bool(loose_eq(&left, &right)),
        BinOp::Ne => SVal::Bool(!loose_eq(&left, &right)),
        BinOp::StrictEq => SVal::Bool(strict_eq(&left, &right)),
        BinOp::StrictNe => SVal::Bool(!strict_eq(&left, &right)),
        BinOp::And | BinOp::Or => unreachable!("short-circuit ops handled in eval"),
    })
}

fn relational(left: &SVal<'_>, right: &SVal<'_>, test: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Some(l), Some(r)) = (as_str(left), as_str(right)) {
        return test(l.cmp(r));
    }
    let (l, r) = (to_number(left), to_number(right));
    if l.is_nan() || r.is_nan() {
        return false;
    }
    l.partial_cmp(&r).map(&test).unwrap_or(false)
}

fn as_str<'v>(val: &'v SVal<'_>) -> Option<&'v str> {
    match val {
        SVal::Str(s) => Some(s),
        SVal::Node(Value::String(s)) => Some(s),
        SVal::Owned(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn is_stringish(val: &SVal<'_>) -> bool {
    as_str(val).is_some()
}

fn as_container<'v>(val: &'v SVal<'_>) -> Option<&'v Value> {
    match val {
        SVal::Node(v @ (Value::Array(_) | Value::Object(_))) => Some(v),
        SVal::Owned(v @ (Value::Array(_) | Value::Object(_))) => Some(v),
        _ => None,
    }
}

fn loose_eq(left: &SVal<'_>, right: &SVal<'_>) -> bool {
    let l_nullish = matches!(left, SVal::Undefined | SVal::Null)
        || matches!(left, SVal::Node(Value::Null) | SVal::Owned(Value::Null));
    let r_nullish = matches!(right, SVal::Undefined | SVal::Null)
        || matches!(right, SVal::Node(Value::Null) | SVal::Owned(Value::Null));
    if l_nullish || r_nullish {
        return l_nullish && r_nullish;
    }
    match (as_container(left), as_container(right)) {
        // structural comparison instead of JS reference identity
        (Some(l), Some(r)) => return l == r,
        // a container against a primitive compares via its string form
        (Some(_), None) => return loose_eq(&SVal::Str(js_string(left)), right),
        (None, Some(_)) => return loose_eq(left, &SVal::Str(js_string(right))),
        (None, None) => {}
    }
    if let (Some(l), Some(r)) = (as_str(left), as_str(right)) {
        return l == r;
    }
    let (l, r) = (to_number(left), to_number(right));
    !l.is_nan() && !r.is_nan() && l == r
}

fn strict_eq(left: &SVal<'_>, right: &SVal<'_>) -> bool {
    match (kind(left), kind(right)) {
        (a, b) if a != b => false,
        (Kind::Undefined, _) | (Kind::Null, _) => true,
        (Kind::Bool, _) => to_number(left) == to_number(right),
        (Kind::Number, _) => {
            let (l, r) = (to_number(left), to_number(right));
            !l.is_nan() && !r.is_nan() && l == r
        }
        (Kind::String, _) => as_str(left) == as_str(right),
        (Kind::Container, _) => as_container(left) == as_container(right),
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Kind {
    Undefined,
    Null,
    Bool,
    Number,
    String,
    Container,
}

fn kind(val: &SVal<'_>) -> Kind {
    match val {
        SVal::Undefined => Kind::Undefined,
        SVal::Null => Kind::Null,
        SVal::Bool(_) => Kind::Bool,
        SVal::Num(_) => Kind::Number,
        SVal::Str(_) => Kind::String,
        SVal::Node(v) => match *v {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Array(_) | Value::Object(_) => Kind::Container,
        },
        SVal::Owned(v) => match v {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Array(_) | Value::Object(_) => Kind::Container,
        },
    }
}

fn type_name(val: &SVal<'_>) -> &'static str {
    match val {
        SVal::Undefined => "undefined",
        SVal::Null => "null",
        SVal::Bool(_) => "boolean",
        SVal::Num(_) => "number",
        SVal::Str(_) => "string",
        SVal::Node(_) | SVal::Owned(_) => "object",
    }
}

/// JS truthiness
pub(crate) fn truthy(val: &SVal<'_>) -> bool {
    match val {
        SVal::Undefined | SVal::Null => false,
        SVal::Bool(b) => *b,
        SVal::Num(n) => *n != 0.0 && !n.is_nan(),
        SVal::Str(s) => !s.is_empty(),
        SVal::Node(v) => match *v {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        },
        SVal::Owned(v) => match v {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        },
    }
}

fn to_number(val: &SVal<'_>) -> f64 {
    match val {
        SVal::Undefined => f64::NAN,
        SVal::Null => 0.0,
        SVal::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        SVal::Num(n) => *n,
        SVal::Str(s) => str_to_number(s),
        SVal::Node(v) => match *v {
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => str_to_number(s),
            Value::Array(_) => str_to_number(&js_string(val)),
            Value::Object(_) => f64::NAN,
        },
        SVal::Owned(v) => match v {
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => str_to_number(s),
            Value::Array(_) => str_to_number(&js_string(val)),
            Value::Object(_) => f64::NAN,
        },
    }
}

fn str_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        0.0
    } else {
        trimmed.parse::<f64>().unwrap_or(f64::NAN)
    }
}

fn js_string(val: &SVal<'_>) -> String {
    match val {
        SVal::Undefined => String::from("undefined"),
        SVal::Null => String::from("null"),
        SVal::Bool(b) => b.to_string(),
        SVal::Num(n) => number_string(*n),
        SVal::Str(s) => s.clone(),
        SVal::Node(v) => match *v {
            Value::Null => String::from("null"),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.as_f64().map(number_string).unwrap_or_else(|| n.to_string()),
            Value::String(s) => s.clone(),
            Value::Array(list) => list
                .iter()
                .map(|e| js_string(&SVal::Node(e)))
                .collect::<Vec<String>>()
                .join(","),
            Value::Object(_) => String::from("[object Object]"),
        },
        SVal::Owned(v) => match v {
            Value::Null => String::from("null"),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.as_f64().map(number_string).unwrap_or_else(|| n.to_string()),
            Value::String(s) => s.clone(),
            Value::Array(list) => list
                .iter()
                .map(|e| js_string(&SVal::Node(e)))
                .collect::<Vec<String>>()
                .join(","),
            Value::Object(_) => String::from("[object Object]"),
        },
    }
}

fn number_string(n: f64) -> String {
    if n.is_nan() {
        String::from("NaN")
    } else if n.is_infinite() {
        String::from(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Coerce a script result into a selector: numbers become indices, strings
/// become names, anything else selects nothing
pub(crate) fn to_selector(val: &SVal<'_>) -> Option<Selector> {
    match val {
        SVal::Num(n) if n.is_finite() => Some(Selector::Index(n.trunc() as isize)),
        SVal::Str(s) => Some(Selector::Name(Name::quoted(s.clone()))),
        SVal::Node(Value::Number(n)) | SVal::Owned(Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| Selector::Index(f.trunc() as isize)),
        SVal::Node(Value::String(s)) | SVal::Owned(Value::String(s)) => {
            Some(Selector::Name(Name::quoted(s.clone())))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::ast::Selector;
    use crate::filter::script::parse_program;
    use crate::options::Sandbox;

    use super::{check_safe, eval, to_selector, truthy, SVal, Scope};

    fn scope_for<'a>(value: &'a Value, root: &'a Value, sandbox: &'a Sandbox) -> Scope<'a, 'a> {
        Scope {
            value: SVal::Node(value),
            parent: Some(root),
            property: None,
            parent_property: None,
            root,
            path: None,
            sandbox,
        }
    }

    #[test]
    fn arithmetic_and_length() {
        let root = json!({"list": [1, 2, 3]});
        let sandbox = Sandbox::new();
        let value = &root["list"];
        let scope = scope_for(value, &root, &sandbox);
        let program = parse_program("@.length-1").unwrap();
        match eval(&program.expr, &scope).unwrap() {
            SVal::Num(n) => assert_eq!(n, 2.0),
            other => panic!("expected number: {other:?}"),
        }
    }

    #[test]
    fn comparisons() {
        let root = json!({"price": 8.95, "name": "red"});
        let sandbox = Sandbox::new();
        let scope = scope_for(&root, &root, &sandbox);
        for (src, expected) in [
            ("@.price < 10", true),
            ("@.price >= 10", false),
            ("@.name == 'red'", true),
            ("@.name === 'red'", true),
            ("@.name != 'red'", false),
            ("@.missing == null", true),
            ("@.price == '8.95'", true),
            ("@.price === '8.95'", false),
        ] {
            let program = parse_program(src).unwrap();
            let result = eval(&program.expr, &scope).unwrap();
            assert_eq!(truthy(&result), expected, "{src}");
        }
    }

    #[test]
    fn sandbox_lookup() {
        let root = json!({"price": 12});
        let mut sandbox = Sandbox::new();
        sandbox.insert(String::from("limit"), json!(10));
        let scope = scope_for(&root, &root, &sandbox);
        let program = parse_program("@.price > limit").unwrap();
        assert!(truthy(&eval(&program.expr, &scope).unwrap()));
    }

    #[test]
    fn undefined_member_access_errors() {
        let root = json!({});
        let sandbox = Sandbox::new();
        let scope = scope_for(&root, &root, &sandbox);
        let program = parse_program("@.a.b").unwrap();
        assert!(eval(&program.expr, &scope).is_err());
    }

    #[test]
    fn safe_scan() {
        let sandbox = Sandbox::new();
        let ok = parse_program("@.price < 10 && @path == 'x'").unwrap();
        assert!(check_safe(&ok, &sandbox).is_ok());
        let bad = parse_program("globalThis.x").unwrap();
        assert!(check_safe(&bad, &sandbox).is_err());
        let proto = parse_program("@.constructor").unwrap();
        assert!(check_safe(&proto, &sandbox).is_err());
    }

    #[test]
    fn selector_coercion() {
        assert_eq!(to_selector(&SVal::Num(3.0)), Some(Selector::Index(3)));
        assert!(matches!(
            to_selector(&SVal::Str(String::from("key"))),
            Some(Selector::Name(n)) if n.name == "key"
        ));
        assert_eq!(to_selector(&SVal::Bool(true)), None);
        assert_eq!(to_selector(&SVal::Num(f64::NAN)), None);
    }
}
