use std::str::FromStr;
use std::sync::Arc;

use serde::{de::Visitor, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EvalError, ParseError};
use crate::eval::compile::{compile, CompiledPath};
use crate::node::NodeList;
use crate::options::QueryOptions;
use crate::parser;
use crate::result::QueryResult;

/// A parsed and compiled JSONPath query
///
/// # Usage
///
/// A `JsonPath` is parsed directly from an `&str` with the
/// [`parse`][JsonPath::parse] method:
/// ```rust
/// # use jsonpathx::JsonPath;
/// # fn main() {
/// let path = JsonPath::parse("$.foo.*").expect("valid JSONPath");
/// # }
/// ```
/// It can then be used to query [`serde_json::Value`]s with the
/// [`query`][JsonPath::query] method:
/// ```rust
/// # use serde_json::json;
/// # use jsonpathx::JsonPath;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let path = JsonPath::parse("$.foo.*")?;
/// let value = json!({"foo": [1, 2, 3, 4]});
/// let nodes = path.query(&value)?;
/// assert_eq!(nodes.values(), vec![1, 2, 3, 4]);
/// # Ok(())
/// # }
/// ```
/// For the other result shapes, filter modes, and the remaining options,
/// use [`evaluate`][JsonPath::evaluate] with a [`QueryOptions`].
#[derive(Debug, Clone)]
pub struct JsonPath(Arc<CompiledPath>);

impl JsonPath {
    /// Parse and compile a JSONPath query string
    ///
    /// # Example
    /// ```rust
    /// # use jsonpathx::JsonPath;
    /// # fn main() {
    /// let path = JsonPath::parse("$.foo[1:10:2].baz").expect("valid JSONPath");
    /// # }
    /// ```
    pub fn parse(path_str: &str) -> Result<Self, ParseError> {
        Ok(Self(Arc::new(compile(parser::parse(path_str)?))))
    }

    /// Query a [`serde_json::Value`] with default options, yielding the
    /// matched values
    ///
    /// # Example
    /// ```rust
    /// # use serde_json::json;
    /// # use jsonpathx::JsonPath;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let path = JsonPath::parse("$.foo[::2]")?;
    /// let value = json!({"foo": [1, 2, 3, 4]});
    /// let nodes = path.query(&value)?;
    /// assert_eq!(nodes.values(), vec![1, 3]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn query<'b>(&self, value: &'b Value) -> Result<NodeList<'b>, EvalError> {
        self.0
            .evaluate(value, &QueryOptions::new())
            .map(QueryResult::nodes)
    }

    /// Evaluate against a document with explicit options
    pub fn evaluate<'b>(
        &self,
        value: &'b Value,
        options: &QueryOptions<'b>,
    ) -> Result<QueryResult<'b>, EvalError> {
        self.0.evaluate(value, options)
    }

    /// The compiled form backing this query
    pub fn compiled(&self) -> &CompiledPath {
        &self.0
    }
}

impl FromStr for JsonPath {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JsonPath::parse(s)
    }
}

impl std::fmt::Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{path}", path = self.0.path())
    }
}

impl PartialEq for JsonPath {
    fn eq(&self, other: &Self) -> bool {
        self.0.path() == other.0.path()
    }
}

impl Serialize for JsonPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JsonPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct JsonPathVisitor;

        impl<'de> Visitor<'de> for JsonPathVisitor {
            type Value = JsonPath;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "a string representing a JSONPath query")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                JsonPath::parse(v).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(JsonPathVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{from_value, json, to_value};

    use crate::JsonPath;

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<JsonPath>();
    }

    #[test]
    fn test_sync() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<JsonPath>();
    }

    #[test]
    fn serde_round_trip() {
        let j1 = json!("$.foo['bar'][1:10][?@.baz > 10 && @.foo.bar < 20]");
        let p1 = from_value::<JsonPath>(j1).expect("deserializes");
        let p2 = to_value(&p1)
            .and_then(from_value::<JsonPath>)
            .expect("round trip");
        assert_eq!(p1, p2);
    }

    #[test]
    fn display_round_trip() {
        let p1 = JsonPath::parse("$.store.book[0,1:3]..price~").unwrap();
        let p2 = JsonPath::parse(&p1.to_string()).unwrap();
        assert_eq!(p1, p2);
    }
}
