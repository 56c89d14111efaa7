//! Attribute lists passed with start-element events.

use crate::util::qname::split_qname;

/// One attribute of a start-element event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaxAttribute {
    pub uri: String,
    pub local_name: String,
    pub qname: String,
    pub value: String,
}

/// An ordered, mutable attribute list.
///
/// Rewriting states receive the list by reference and build a modified
/// copy when they need to change it.
///
/// ```
/// use oxfxml::sax::Attributes;
///
/// let mut attributes = Attributes::new();
/// attributes.add("", "href", "href", "/a");
/// attributes.set_value("", "href", "/b");
/// assert_eq!(attributes.value("", "href"), Some("/b"));
/// assert_eq!(attributes.value_by_qname("href"), Some("/b"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    items: Vec<SaxAttribute>,
}

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute. Duplicates are not checked.
    pub fn add(
        &mut self,
        uri: impl Into<String>,
        local_name: impl Into<String>,
        qname: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.items.push(SaxAttribute {
            uri: uri.into(),
            local_name: local_name.into(),
            qname: qname.into(),
            value: value.into(),
        });
    }

    /// Appends an attribute in no namespace.
    pub fn add_plain(&mut self, name: &str, value: impl Into<String>) {
        let (_, local) = split_qname(name);
        self.add("", local, name, value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SaxAttribute> {
        self.items.iter()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SaxAttribute> {
        self.items.get(index)
    }

    #[must_use]
    pub fn index_of(&self, uri: &str, local_name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|a| a.uri == uri && a.local_name == local_name)
    }

    #[must_use]
    pub fn value(&self, uri: &str, local_name: &str) -> Option<&str> {
        self.index_of(uri, local_name)
            .map(|i| self.items[i].value.as_str())
    }

    #[must_use]
    pub fn value_by_qname(&self, qname: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|a| a.qname == qname)
            .map(|a| a.value.as_str())
    }

    /// Updates the value of an existing attribute, or appends an
    /// un-prefixed one.
    pub fn set_value(&mut self, uri: &str, local_name: &str, value: impl Into<String>) {
        match self.index_of(uri, local_name) {
            Some(i) => self.items[i].value = value.into(),
            None => self.add(uri, local_name, local_name, value),
        }
    }

    /// Removes an attribute, returning its value.
    pub fn remove(&mut self, uri: &str, local_name: &str) -> Option<String> {
        self.index_of(uri, local_name)
            .map(|i| self.items.remove(i).value)
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a SaxAttribute;
    type IntoIter = std::slice::Iter<'a, SaxAttribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_by_namespace_and_qname() {
        let mut attributes = Attributes::new();
        attributes.add("urn:f", "url-type", "f:url-type", "action");
        attributes.add_plain("href", "/x");
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes.value("urn:f", "url-type"), Some("action"));
        assert_eq!(attributes.value("", "url-type"), None);
        assert_eq!(attributes.value_by_qname("f:url-type"), Some("action"));
        assert_eq!(attributes.index_of("", "href"), Some(1));
    }

    #[test]
    fn test_set_and_remove() {
        let mut attributes = Attributes::new();
        attributes.set_value("", "method", "post");
        assert_eq!(attributes.get(0).map(|a| a.qname.as_str()), Some("method"));
        attributes.set_value("", "method", "get");
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes.remove("", "method"), Some("get".to_string()));
        assert_eq!(attributes.remove("", "method"), None);
        assert!(attributes.is_empty());
    }
}
