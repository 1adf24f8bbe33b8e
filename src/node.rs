//! Node lists produced by JSONPath queries

use std::borrow::Cow;

use serde::Serialize;
use serde_json::Value;

/// A list of nodes resulting from a JSONPath query
///
/// Nodes are borrowed from the queried [`serde_json::Value`] wherever
/// possible; property-name payloads (from the `~` segment) and
/// callback-substituted values are owned, hence the [`Cow`] items.
#[derive(Debug, Default, PartialEq, Serialize, Clone)]
pub struct NodeList<'a>(pub(crate) Vec<Cow<'a, Value>>);

impl<'a> NodeList<'a> {
    /// Extract _at most_ one node
    ///
    /// Intended for queries expected to optionally yield a single node.
    ///
    /// # Usage
    /// ```rust
    /// # use serde_json::json;
    /// # use jsonpathx::JsonPath;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let value = json!({"foo": ["bar", "baz"]});
    /// let path = JsonPath::parse("$.foo[0]")?;
    /// let result = path.query(&value)?;
    /// let node = result.at_most_one()?;
    /// assert_eq!(node, Some(&json!("bar")));
    /// # Ok(())
    /// # }
    /// ```
    pub fn at_most_one(&self) -> Result<Option<&Value>, AtMostOneError> {
        if self.0.len() > 1 {
            Err(AtMostOneError(self.0.len()))
        } else {
            Ok(self.0.first().map(Cow::as_ref))
        }
    }

    /// Extract _exactly_ one node
    ///
    /// # Usage
    /// ```rust
    /// # use serde_json::json;
    /// # use jsonpathx::JsonPath;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let value = json!({"foo": ["bar", "baz"]});
    /// let path = JsonPath::parse("$.foo[1]")?;
    /// let result = path.query(&value)?;
    /// let node = result.exactly_one()?;
    /// assert_eq!(node, "baz");
    /// # Ok(())
    /// # }
    /// ```
    pub fn exactly_one(&self) -> Result<&Value, ExactlyOneError> {
        if self.0.is_empty() {
            Err(ExactlyOneError::Empty)
        } else if self.0.len() > 1 {
            Err(ExactlyOneError::MoreThanOne(self.0.len()))
        } else {
            Ok(self.0[0].as_ref())
        }
    }

    /// All nodes, borrowed where the query allowed it
    pub fn all(self) -> Vec<Cow<'a, Value>> {
        self.0
    }

    /// All nodes as owned values
    ///
    /// # Usage
    /// ```rust
    /// # use serde_json::json;
    /// # use jsonpathx::JsonPath;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let value = json!({"foo": ["bar", "baz"]});
    /// let path = JsonPath::parse("$.foo.*")?;
    /// let nodes = path.query(&value)?.values();
    /// assert_eq!(nodes, vec!["bar", "baz"]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn values(self) -> Vec<Value> {
        self.0.into_iter().map(Cow::into_owned).collect()
    }

    /// Number of nodes in the list
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check for an empty list
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the nodes
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(Cow::as_ref)
    }

    /// The first node, or `None` if the list is empty
    pub fn first(&self) -> Option<&Value> {
        self.0.first().map(Cow::as_ref)
    }

    /// The last node, or `None` if the list is empty
    pub fn last(&self) -> Option<&Value> {
        self.0.last().map(Cow::as_ref)
    }

    /// The node at `index`, or `None` when out of bounds
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index).map(Cow::as_ref)
    }
}

impl<'a> From<Vec<Cow<'a, Value>>> for NodeList<'a> {
    fn from(nodes: Vec<Cow<'a, Value>>) -> Self {
        Self(nodes)
    }
}

impl<'a> From<Vec<&'a Value>> for NodeList<'a> {
    fn from(nodes: Vec<&'a Value>) -> Self {
        Self(nodes.into_iter().map(Cow::Borrowed).collect())
    }
}

impl<'a> IntoIterator for NodeList<'a> {
    type Item = Cow<'a, Value>;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Error produced when expecting no more than one node from a query
#[derive(Debug, thiserror::Error)]
#[error("nodelist expected to contain at most one entry, but instead contains {0} entries")]
pub struct AtMostOneError(pub usize);

/// Error produced when expecting exactly one node from a query
#[derive(Debug, thiserror::Error)]
pub enum ExactlyOneError {
    /// The query resulted in an empty list
    #[error("nodelist expected to contain one entry, but is empty")]
    Empty,
    /// The query resulted in more than one node
    #[error("nodelist expected to contain one entry, but instead contains {0} entries")]
    MoreThanOne(usize),
}

impl ExactlyOneError {
    /// Check that it is the `Empty` variant
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Extract the number of nodes, if there was more than one
    pub fn as_more_than_one(&self) -> Option<usize> {
        match self {
            ExactlyOneError::Empty => None,
            ExactlyOneError::MoreThanOne(n) => Some(*n),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use serde_json::{json, to_value};

    use super::NodeList;

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<NodeList>();
    }

    #[test]
    fn test_sync() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<NodeList>();
    }

    #[test]
    fn test_serialize() {
        let v = json!([1, 2, 3]);
        let list = NodeList(v.as_array().unwrap().iter().map(Cow::Borrowed).collect());
        assert_eq!(to_value(&list).expect("serialize"), v);
    }

    #[test]
    fn one_node_extractors() {
        let v = json!(["a", "b"]);
        let list = NodeList(vec![Cow::Borrowed(&v[0])]);
        assert_eq!(list.exactly_one().unwrap(), "a");
        assert_eq!(list.at_most_one().unwrap(), Some(&v[0]));
        let both = NodeList(vec![Cow::Borrowed(&v[0]), Cow::Borrowed(&v[1])]);
        assert!(both.exactly_one().is_err());
        assert!(both.at_most_one().is_err());
        assert!(NodeList::default().at_most_one().unwrap().is_none());
    }
}
