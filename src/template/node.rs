//! Element tree for markup templates.
//!
//! The model mirrors how markup is laid out on the page: each element has an
//! optional `id`, ordered attributes, the text before its first child, its
//! children, and the text that follows it inside the parent (`tail`).

/// One markup element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written (`text`, `svg:tspan`, ...).
    pub name: String,
    /// Value of the `id` attribute, kept out of `attributes`.
    pub id: Option<String>,
    /// Remaining attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Text before the first child.
    pub text: Option<String>,
    pub children: Vec<Element>,
    /// Text after this element's end tag, up to the next sibling.
    pub tail: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        if key == "id" {
            return self.id.as_deref();
        }
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute, keeping its position when it already exists.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if key == "id" {
            self.id = Some(value);
            return;
        }
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        if key == "id" {
            return self.id.take();
        }
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Namespace prefix of the element name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    /// First element (pre-order, self included) whose id equals `id`.
    pub fn find(&self, id: &str) -> Option<&Element> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Mutable variant of [`Element::find`].
    pub fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        for child in self.children.iter_mut() {
            if let Some(found) = child.find_mut(id) {
                return Some(found);
            }
        }
        None
    }

    /// Number of elements in this subtree, self included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Element::count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        let mut root = Element::new("svg");
        let mut group = Element::new("g").with_attr("id", "outer");
        group.children.push(Element::new("text").with_attr("id", "dup"));
        root.children.push(group);
        root.children.push(Element::new("rect").with_attr("id", "dup").with_attr("width", "4"));
        root
    }

    #[test]
    fn test_find_returns_first_in_document_order() {
        let root = sample();
        assert_eq!(root.find("dup").map(|e| e.name.as_str()), Some("text"));
        assert!(root.find("missing").is_none());
        assert_eq!(root.count(), 4);
    }

    #[test]
    fn test_find_mut_edits_in_place() {
        let mut root = sample();
        root.find_mut("outer").unwrap().set_attr("display", "none");
        assert_eq!(root.children[0].attr("display"), Some("none"));
    }

    #[test]
    fn test_attr_roundtrip_keeps_order() {
        let mut el = Element::new("text")
            .with_attr("x", "1")
            .with_attr("y", "2");
        el.set_attr("x", "5");
        assert_eq!(el.attributes, vec![("x".into(), "5".into()), ("y".into(), "2".into())]);
        assert_eq!(el.remove_attr("x"), Some("5".to_string()));
        assert_eq!(el.remove_attr("x"), None);
    }

    #[test]
    fn test_id_is_typed_field() {
        let el = Element::new("g").with_attr("id", "BARCODE_SLOT");
        assert_eq!(el.id.as_deref(), Some("BARCODE_SLOT"));
        assert!(el.attributes.is_empty());
        assert_eq!(el.attr("id"), Some("BARCODE_SLOT"));
    }

    #[test]
    fn test_prefix() {
        assert_eq!(Element::new("svg:svg").prefix(), Some("svg"));
        assert_eq!(Element::new("svg").prefix(), None);
    }
}
