//! Types representing parsed JSONPath expressions
//!
//! The AST produced by [`crate::parse`] covers both the RFC 9535 grammar and
//! the extended legacy syntax: bracket unions, script selectors, parent and
//! property-name steps, and type selectors. Filter and script bodies are
//! carried verbatim and parsed on demand by the filter engine.

use crate::filter::{FilterExpr, ScriptExpr};

/// A parsed JSONPath expression
///
/// A path with a single branch is a plain query. Multiple branches arise
/// from the legacy grouping and filter-union syntax; their results are
/// concatenated in branch order.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Path {
    /// The simple paths making up this query
    pub branches: Vec<PathBranch>,
}

impl Path {
    /// Whether this path expands to more than one simple path
    pub fn is_union(&self) -> bool {
        self.branches.len() > 1
    }
}

impl std::fmt::Display for Path {
    /// Render the path back to query syntax
    ///
    /// Multi-branch paths have no single-source syntax; their branches are
    /// joined with `" | "` for display purposes only.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, branch) in self.branches.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{branch}")?;
        }
        Ok(())
    }
}

/// One simple path: an ordered list of segments
///
/// After parsing, the first segment is always [`Segment::Root`]; the parser
/// inserts it when the source omits the leading `$`.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct PathBranch {
    /// The segments constituting this branch
    pub segments: Vec<Segment>,
}

impl std::fmt::Display for PathBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for s in &self.segments {
            write!(f, "{s}")?;
        }
        Ok(())
    }
}

/// A single step of a JSONPath expression
#[derive(Debug, PartialEq, Clone)]
pub enum Segment {
    /// `$`: reset evaluation to the document root
    Root,
    /// `@`: the current node, an identity step
    Current,
    /// Apply one selector to each node on the frontier
    Child(Selector),
    /// `..`: visit every descendant (inclusive, pre-order), applying the
    /// inner selector when present
    Recursive(Option<Selector>),
    /// `[?…]`: keep children passing a predicate; semantics depend on the
    /// active filter mode
    Filter(FilterExpr),
    /// `[(…)]`: an expression whose number or string result becomes an
    /// index or name selector
    Script(ScriptExpr),
    /// `^`: step up to the parent node
    Parent,
    /// `~`: emit the key or index under which the node hangs in its parent
    PropertyName,
    /// `@type()`: keep only nodes of the named JSON type
    Type(JsonType),
}

impl Segment {
    /// Does this segment resolve to at most one node per input node
    pub fn is_singular(&self) -> bool {
        matches!(
            self,
            Segment::Root
                | Segment::Current
                | Segment::Parent
                | Segment::PropertyName
                | Segment::Child(Selector::Name(_) | Selector::Index(_))
        )
    }

    /// Optionally view this segment as a child selector
    pub fn as_child(&self) -> Option<&Selector> {
        match self {
            Segment::Child(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Root => write!(f, "$"),
            Segment::Current => write!(f, "@"),
            Segment::Child(sel) => write_child(f, sel),
            Segment::Recursive(None) => write!(f, ".."),
            Segment::Recursive(Some(Selector::Wildcard)) => write!(f, "..*"),
            Segment::Recursive(Some(Selector::Name(n))) if n.is_bare() => {
                write!(f, "..{name}", name = n.name)
            }
            Segment::Recursive(Some(sel)) => write!(f, "..[{sel}]"),
            Segment::Filter(expr) => write!(f, "[?{expr}]"),
            Segment::Script(expr) => write!(f, "[({expr})]"),
            Segment::Parent => write!(f, "^"),
            Segment::PropertyName => write!(f, "~"),
            Segment::Type(t) => write!(f, "@{name}()", name = t.as_str()),
        }
    }
}

fn write_child(f: &mut std::fmt::Formatter<'_>, sel: &Selector) -> std::fmt::Result {
    match sel {
        Selector::Name(n) if n.escaped => write!(f, ".`{name}", name = n.name),
        Selector::Name(n) if n.is_bare() => write!(f, ".{name}", name = n.name),
        Selector::Wildcard => write!(f, ".*"),
        other => write!(f, "[{other}]"),
    }
}

/// The selector families applied by child and recursive segments
#[derive(Debug, PartialEq, Clone)]
pub enum Selector {
    /// An object member name
    Name(Name),
    /// A signed array index; negative counts from the end
    Index(isize),
    /// An array slice
    Slice(Slice),
    /// Every element or member value
    Wildcard,
    /// An ordered bracket union of name/index/slice/wildcard selectors;
    /// results are concatenated without de-duplication
    Union(Vec<Selector>),
}

impl std::fmt::Display for Selector {
    /// Bracket-member form, as it appears inside `[…]`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Name(name) => write!(f, "{name}"),
            Selector::Index(index) => write!(f, "{index}"),
            Selector::Slice(slice) => write!(f, "{slice}"),
            Selector::Wildcard => write!(f, "*"),
            Selector::Union(items) => {
                for (i, s) in items.iter().enumerate() {
                    write!(f, "{s}{comma}", comma = if i == items.len() - 1 { "" } else { "," })?;
                }
                Ok(())
            }
        }
    }
}

/// An object member name selector
#[derive(Debug, PartialEq, Clone)]
pub struct Name {
    /// The member name
    pub name: String,
    /// Whether the source used the quoted bracket form
    pub quoted: bool,
    /// Whether the source used the backtick escape
    pub escaped: bool,
}

impl Name {
    pub(crate) fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quoted: false,
            escaped: false,
        }
    }

    pub(crate) fn quoted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quoted: true,
            escaped: false,
        }
    }

    /// Get as a string slice
    pub fn as_str(&self) -> &str {
        &self.name
    }

    fn is_bare(&self) -> bool {
        !self.quoted && !self.escaped
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'")?;
        for c in self.name.chars() {
            match c {
                '\\' => write!(f, "\\\\")?,
                '\'' => write!(f, "\\'")?,
                c => write!(f, "{c}")?,
            }
        }
        write!(f, "'")
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::quoted(s)
    }
}

/// An array slice selector
///
/// Missing bounds default per RFC 9535: with a positive step, start `0` and
/// end `len`; with a negative step, start `len - 1` and end just past the
/// front of the array. A step of zero selects nothing.
#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct Slice {
    /// The start of the slice; negative counts from the end
    pub start: Option<isize>,
    /// The exclusive end of the slice; negative counts from the end
    pub end: Option<isize>,
    /// The step between visited indices; negative reverses traversal
    pub step: Option<isize>,
}

#[doc(hidden)]
impl Slice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(mut self, start: isize) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: isize) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_step(mut self, step: isize) -> Self {
        self.step = Some(step);
        self
    }
}

impl std::fmt::Display for Slice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        write!(f, ":")?;
        if let Some(end) = self.end {
            write!(f, "{end}")?;
        }
        write!(f, ":")?;
        if let Some(step) = self.step {
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// The named JSON types accepted by `@type()` selectors
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum JsonType {
    /// `null`
    Null,
    /// `true` or `false`
    Boolean,
    /// Any finite number
    Number,
    /// A string
    String,
    /// An array
    Array,
    /// An object
    Object,
    /// A number with no fractional part
    Integer,
    /// Null, boolean, number, or string
    Scalar,
    /// Never matched by a JSON tree
    Undefined,
    /// Never matched by a JSON tree
    Function,
    /// Never matched by a JSON tree
    NonFinite,
    /// Matches nothing
    Other,
}

impl JsonType {
    /// Resolve a type selector name
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "number" => Self::Number,
            "string" => Self::String,
            "array" => Self::Array,
            "object" => Self::Object,
            "integer" => Self::Integer,
            "scalar" => Self::Scalar,
            "undefined" => Self::Undefined,
            "function" => Self::Function,
            "nonFinite" => Self::NonFinite,
            "other" => Self::Other,
            _ => return None,
        })
    }

    /// The name used in query syntax
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Integer => "integer",
            Self::Scalar => "scalar",
            Self::Undefined => "undefined",
            Self::Function => "function",
            Self::NonFinite => "nonFinite",
            Self::Other => "other",
        }
    }
}
