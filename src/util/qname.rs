//! Qualified names and namespace bindings.
//!
//! A qualified name is `prefix:localname` or just `localname`. A [`QName`]
//! pairs the local part with the [`Namespace`] (prefix plus URI) it was
//! declared in, so two names are equal only when both the local part and the
//! binding agree.
//!
//! See <https://www.w3.org/TR/xml-names/#NT-QName>

use std::cmp::Ordering;
use std::fmt;

/// The namespace URI permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The XHTML namespace URI.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Splits a `QName` into its prefix and local name parts.
///
/// Returns `(Some(prefix), localname)` if the name contains a colon,
/// or `(None, localname)` if it does not.
///
/// # Examples
///
/// ```
/// use oxfxml::util::qname::split_qname;
///
/// assert_eq!(split_qname("f:url-type"), (Some("f"), "url-type"));
/// assert_eq!(split_qname("a"), (None, "a"));
/// ```
#[must_use]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.find(':') {
        Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
        None => (None, qname),
    }
}

/// A prefix to URI binding.
///
/// The empty prefix is the default namespace and the empty URI means "no
/// namespace". Namespaces order by URI first and prefix second, which gives
/// the deterministic order used when inherited declarations are copied onto
/// a cloned element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Namespace {
    prefix: String,
    uri: String,
}

impl Namespace {
    /// Creates a binding of `prefix` to `uri`.
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }

    /// The empty binding: no prefix, no URI.
    #[must_use]
    pub fn no_namespace() -> Self {
        Self::default()
    }

    /// The implicit `xml` binding.
    #[must_use]
    pub fn xml() -> Self {
        Self::new("xml", XML_NAMESPACE)
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns `true` for the empty binding.
    #[must_use]
    pub fn is_no_namespace(&self) -> bool {
        self.prefix.is_empty() && self.uri.is_empty()
    }

    /// The attribute name that declares this binding (`xmlns` or
    /// `xmlns:prefix`).
    #[must_use]
    pub fn declaration_name(&self) -> String {
        if self.prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", self.prefix)
        }
    }
}

impl Ord for Namespace {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri
            .cmp(&other.uri)
            .then_with(|| self.prefix.cmp(&other.prefix))
    }
}

impl PartialOrd for Namespace {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}\"", self.declaration_name(), self.uri)
    }
}

/// A namespace-qualified name.
///
/// The qualified form (`prefix:local`) is computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    local_name: String,
    namespace: Namespace,
    qualified: String,
}

impl QName {
    /// A name in no namespace.
    pub fn new(local_name: impl Into<String>) -> Self {
        Self::with_namespace(local_name, Namespace::no_namespace())
    }

    /// A name bound to `namespace`; the qualified form uses its prefix.
    pub fn with_namespace(local_name: impl Into<String>, namespace: Namespace) -> Self {
        let local_name = local_name.into();
        let qualified = if namespace.prefix().is_empty() {
            local_name.clone()
        } else {
            format!("{}:{}", namespace.prefix(), local_name)
        };
        Self {
            local_name,
            namespace,
            qualified,
        }
    }

    /// Builds a name from a qualified name as reported by a SAX parser
    /// together with its resolved namespace URI.
    ///
    /// ```
    /// use oxfxml::util::qname::QName;
    ///
    /// let name = QName::from_parts("urn:p", "p:item");
    /// assert_eq!(name.prefix(), "p");
    /// assert_eq!(name.local_name(), "item");
    /// assert_eq!(name.namespace_uri(), "urn:p");
    /// ```
    #[must_use]
    pub fn from_parts(uri: &str, qualified_name: &str) -> Self {
        let (prefix, local) = split_qname(qualified_name);
        Self::with_namespace(local, Namespace::new(prefix.unwrap_or(""), uri))
    }

    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        self.namespace.prefix()
    }

    #[must_use]
    pub fn namespace_uri(&self) -> &str {
        self.namespace.uri()
    }

    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// `prefix:local`, or just `local` when the prefix is empty.
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    /// Returns `true` when the name has this URI and local part.
    #[must_use]
    pub fn matches(&self, uri: &str, local_name: &str) -> bool {
        self.namespace.uri() == uri && self.local_name == local_name
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified)
    }
}
