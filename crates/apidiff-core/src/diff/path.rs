use std::fmt;

/// Marker that replaces concrete indices in canonical paths.
pub const INDEX_WILDCARD: &str = "[*]";

/// Represents a single element within a traversal path.
///
/// ```
/// # use apidiff_core::diff::PathSegment;
/// let key = PathSegment::key("Items");
/// let index = PathSegment::index(2);
/// assert!(matches!(key, PathSegment::Key(_)));
/// assert!(matches!(index, PathSegment::Index(2)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Record field name.
    Key(String),
    /// Collection position.
    Index(usize),
}

impl PathSegment {
    /// Creates a key segment.
    #[must_use]
    pub fn key<S>(value: S) -> Self
    where
        S: Into<String>,
    {
        Self::Key(value.into())
    }

    /// Creates an index segment.
    #[must_use]
    pub fn index(value: usize) -> Self {
        Self::Index(value)
    }
}

/// Location of a value inside an object graph, built during traversal.
///
/// Renders as `Order.Items[2].Name`; [`Path::canonical`] renders the same
/// location with every index replaced by `[*]`.
///
/// ```
/// # use apidiff_core::diff::{Path, PathSegment};
/// let path = Path::new()
///     .with_segment(PathSegment::key("Items"))
///     .with_segment(PathSegment::index(2))
///     .with_segment(PathSegment::key("Name"));
/// assert_eq!(path.to_string(), "Items[2].Name");
/// assert_eq!(path.canonical(), "Items[*].Name");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Path(Vec<PathSegment>);

impl Path {
    /// Creates an empty path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new segment, returning the extended path.
    #[must_use]
    pub fn with_segment(mut self, segment: PathSegment) -> Self {
        self.0.push(segment);
        self
    }

    /// Returns the underlying segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Indicates whether the path is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pushes a new segment in-place.
    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    /// Pops the last segment off the path.
    ///
    /// ```
    /// # use apidiff_core::diff::{Path, PathSegment};
    /// let mut path = Path::from(PathSegment::index(0));
    /// assert!(path.pop().is_some());
    /// assert!(path.is_empty());
    /// ```
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// Renders the path with every index replaced by `[*]`.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.render(true)
    }

    fn render(&self, wildcard: bool) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(_) if wildcard => out.push_str(INDEX_WILDCARD),
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(value: Vec<PathSegment>) -> Self {
        Self(value)
    }
}

impl From<PathSegment> for Path {
    fn from(value: PathSegment) -> Self {
        Self(vec![value])
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// Canonicalizes a raw traversal path.
///
/// Numeric indices collapse to `[*]`, namespace prefixes (`ns:Name`) are
/// stripped and backing-field wrappers (`<Name>k__BackingField`) are unwrapped.
/// The function is idempotent.
///
/// ```
/// # use apidiff_core::diff::normalize;
/// assert_eq!(normalize("Order.Items[12].Price"), "Order.Items[*].Price");
/// assert_eq!(normalize("soap:Envelope.<Total>k__BackingField"), "Envelope.Total");
/// assert_eq!(normalize(&normalize("a:B[3]")), normalize("a:B[3]"));
/// ```
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (position, segment) in split_segments(raw).into_iter().enumerate() {
        if position > 0 {
            out.push('.');
        }
        let (name, selectors) = split_name(segment);
        out.push_str(normalize_name(name));
        normalize_selectors(selectors, &mut out);
    }
    out
}

/// Returns the last field name of a path with indices and artifacts removed.
///
/// ```
/// # use apidiff_core::diff::leaf_name;
/// assert_eq!(leaf_name("Order.Customer.CustomerId"), "CustomerId");
/// assert_eq!(leaf_name("Order.Items[3]"), "Items");
/// assert_eq!(leaf_name("[0]"), "");
/// ```
#[must_use]
pub fn leaf_name(path: &str) -> &str {
    let segments = split_segments(path);
    let last = segments.last().copied().unwrap_or("");
    normalize_name(split_name(last).0)
}

/// Splits a path on `.` separators that sit outside brackets.
pub(crate) fn split_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (offset, ch) in path.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                segments.push(&path[start..offset]);
                start = offset + 1;
            }
            _ => {}
        }
    }
    segments.push(&path[start..]);
    segments
}

/// Splits a segment into its name and the selector tail starting at the first `[`.
pub(crate) fn split_name(segment: &str) -> (&str, &str) {
    match segment.find('[') {
        Some(offset) => segment.split_at(offset),
        None => (segment, ""),
    }
}

fn normalize_name(name: &str) -> &str {
    let mut current = name;
    loop {
        let next = strip_namespace(unwrap_backing_field(current));
        if next == current {
            return current;
        }
        current = next;
    }
}

fn unwrap_backing_field(name: &str) -> &str {
    match name.strip_prefix('<') {
        Some(rest) => match rest.find('>') {
            Some(end) => &rest[..end],
            None => name,
        },
        None => name,
    }
}

fn strip_namespace(name: &str) -> &str {
    match name.rfind(':') {
        Some(offset) => &name[offset + 1..],
        None => name,
    }
}

fn normalize_selectors(selectors: &str, out: &mut String) {
    let mut rest = selectors;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            out.push_str(&rest[open..]);
            return;
        };
        let selector = &after[..close];
        if !selector.is_empty() && selector.bytes().all(|b| b.is_ascii_digit()) {
            out.push_str(INDEX_WILDCARD);
        } else {
            out.push('[');
            out.push_str(selector);
            out.push(']');
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
}
