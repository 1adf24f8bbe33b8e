use serde_json::Value;

use crate::error::EvalError;
use crate::{JsonPath, NodeList};

/// Extension trait for querying [`serde_json::Value`] directly
///
/// ## Usage
/// ```rust
/// use serde_json::json;
/// use jsonpathx::{JsonPath, JsonPathExt};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let value = json!({"foo": ["bar", "baz"]});
/// let query = JsonPath::parse("$.foo[*]")?;
/// let nodes = value.json_path(&query)?;
/// assert_eq!(nodes.values(), vec!["bar", "baz"]);
/// # Ok(())
/// # }
/// ```
pub trait JsonPathExt {
    /// Query with a parsed JSONPath, yielding the matched values
    fn json_path(&self, path: &JsonPath) -> Result<NodeList, EvalError>;
}

impl JsonPathExt for Value {
    fn json_path(&self, path: &JsonPath) -> Result<NodeList, EvalError> {
        path.query(self)
    }
}
