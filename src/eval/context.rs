//! Evaluation contexts and normalized node locations

use std::borrow::Cow;
use std::slice::Iter;

use serde::Serialize;
use serde_json::Value;

/// The location of a node within the queried document
///
/// Elements are borrowed from the document's own keys; the path is built by
/// copy-on-append as evaluation descends, so tracked evaluation stays within
/// a small constant factor of untracked.
#[derive(Debug, Default, Eq, PartialEq, Clone)]
pub struct NormalizedPath<'a>(Vec<PathElement<'a>>);

impl<'a> NormalizedPath<'a> {
    pub(crate) fn push<T: Into<PathElement<'a>>>(&mut self, elem: T) {
        self.0.push(elem.into())
    }

    pub(crate) fn clone_and_push<T: Into<PathElement<'a>>>(&self, elem: T) -> Self {
        let mut new_path = self.clone();
        new_path.push(elem.into());
        new_path
    }

    pub(crate) fn parent_path(&self) -> Self {
        let mut p = self.clone();
        p.0.pop();
        p
    }

    /// Render as a [JSON Pointer][rfc6901]: `/` joined, with `~` as `~0` and
    /// `/` as `~1`; the root location is the empty string
    ///
    /// [rfc6901]: https://datatracker.ietf.org/doc/html/rfc6901
    pub fn as_json_pointer(&self) -> String {
        self.0
            .iter()
            .map(PathElement::as_json_pointer)
            .fold(String::new(), |mut acc, s| {
                acc.push('/');
                acc.push_str(&s);
                acc
            })
    }

    /// An empty path is the location of the document root
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of steps from the root
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate the path elements
    pub fn iter(&self) -> Iter<'_, PathElement<'a>> {
        self.0.iter()
    }

    /// The final step, or `None` at the root
    pub fn last(&self) -> Option<&PathElement<'a>> {
        self.0.last()
    }
}

impl<'a> IntoIterator for NormalizedPath<'a> {
    type Item = PathElement<'a>;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> std::fmt::Display for NormalizedPath<'a> {
    /// Normalized bracket notation: names single-quoted with `\` and `'`
    /// escaped, indices bare
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$")?;
        for elem in &self.0 {
            match elem {
                PathElement::Name(name) => {
                    write!(f, "['")?;
                    for c in name.chars() {
                        match c {
                            '\\' => write!(f, "\\\\")?,
                            '\'' => write!(f, "\\'")?,
                            c => write!(f, "{c}")?,
                        }
                    }
                    write!(f, "']")?;
                }
                PathElement::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl<'a> Serialize for NormalizedPath<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// One step in a [`NormalizedPath`]
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum PathElement<'a> {
    /// A key within a JSON object
    Name(&'a str),
    /// An index of a JSON array
    Index(usize),
}

impl<'a> PathElement<'a> {
    fn as_json_pointer(&self) -> String {
        match self {
            PathElement::Name(s) => s.replace('~', "~0").replace('/', "~1"),
            PathElement::Index(i) => i.to_string(),
        }
    }

    /// The step as a JSON value: a string key or a numeric index
    pub fn to_value(&self) -> Value {
        match self {
            PathElement::Name(s) => Value::String((*s).to_owned()),
            PathElement::Index(i) => Value::from(*i),
        }
    }
}

impl<'a> std::fmt::Display for PathElement<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathElement::Name(n) => write!(f, "{n}"),
            PathElement::Index(i) => write!(f, "{i}"),
        }
    }
}

impl<'a> From<&'a str> for PathElement<'a> {
    fn from(s: &'a str) -> Self {
        Self::Name(s)
    }
}

impl<'a> From<&'a String> for PathElement<'a> {
    fn from(s: &'a String) -> Self {
        Self::Name(s.as_str())
    }
}

impl<'a> From<usize> for PathElement<'a> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// What a context's payload represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// A document node
    Value,
    /// A property name emitted by the `~` segment
    Property,
}

/// The node a context refers to: a borrowed document node, or a key payload
/// produced by the property-name segment
#[derive(Debug, Clone, Copy)]
pub(crate) enum CtxValue<'a> {
    Node(&'a Value),
    Key(PathElement<'a>),
}

impl<'a> CtxValue<'a> {
    /// The underlying document node, if this is one
    pub(crate) fn as_node(&self) -> Option<&'a Value> {
        match self {
            CtxValue::Node(v) => Some(v),
            CtxValue::Key(_) => None,
        }
    }

    /// Materialize as a JSON value; key payloads become strings or numbers
    pub(crate) fn to_value(self) -> Cow<'a, Value> {
        match self {
            CtxValue::Node(v) => Cow::Borrowed(v),
            CtxValue::Key(k) => Cow::Owned(k.to_value()),
        }
    }
}

/// A record on the evaluation frontier
///
/// Borrows the node and parent from the document; exclusively owns its
/// location. `loc` is only maintained when the evaluation tracks locations;
/// `parent_key` and `grandparent_key` are carried one level at a time so
/// expressions can read them without location tracking.
#[derive(Debug, Clone)]
pub(crate) struct Context<'a> {
    pub(crate) value: CtxValue<'a>,
    pub(crate) loc: NormalizedPath<'a>,
    pub(crate) parent: Option<&'a Value>,
    pub(crate) parent_key: Option<PathElement<'a>>,
    /// The key of `parent` within its own parent
    pub(crate) grandparent_key: Option<PathElement<'a>>,
    pub(crate) payload: PayloadKind,
}

impl<'a> Context<'a> {
    pub(crate) fn node(&self) -> Option<&'a Value> {
        self.value.as_node()
    }

    /// Child context one step below this one
    pub(crate) fn child(&self, key: PathElement<'a>, value: &'a Value, track: bool) -> Self {
        Context {
            value: CtxValue::Node(value),
            loc: if track {
                self.loc.clone_and_push(key)
            } else {
                NormalizedPath::default()
            },
            parent: self.node(),
            parent_key: Some(key),
            grandparent_key: self.parent_key,
            payload: PayloadKind::Value,
        }
    }
}
