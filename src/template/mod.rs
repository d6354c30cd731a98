//! # Template Slot Engine
//!
//! Fills named slots inside an SVG template.
//!
//! ## Slots
//!
//! A slot is any element whose `id` matches a binding target. Lookups return
//! the first match in document order; every operation is a no-op when the id
//! is missing, so a partial template still produces a (degraded) label.
//!
//! | Operation | Effect on the slot |
//! |-----------|--------------------|
//! | [`TemplateDocument::set_text`] | replaces leading text, or hides the slot when empty |
//! | [`TemplateDocument::set_text_wrapped`] | replaces all content with one `tspan` per wrapped line |
//! | [`TemplateDocument::clear_children`] | removes every child, keeps the slot |
//! | [`TemplateDocument::inject_embedded_image`] | appends a base64 data-URI `image` child |
//!
//! ## Isolation
//!
//! A template is parsed once per batch and cloned for every record. Clones
//! share nothing, so filling one never affects another.
//!
//! ## Example
//!
//! ```
//! use etiquette::template::TemplateDocument;
//!
//! let template = TemplateDocument::parse(
//!     r#"<svg xmlns="http://www.w3.org/2000/svg"><text id="SIZE_VALUE">?</text></svg>"#,
//! ).unwrap();
//!
//! let mut doc = template.clone();
//! doc.set_text("SIZE_VALUE", "XL", true);
//! assert!(doc.serialize().unwrap().contains(">XL</text>"));
//! ```

mod binding;
mod node;
mod wrap;
mod xml;

pub use binding::{
    DEFAULT_BARCODE_SLOT, DEFAULT_LINE_STEP, DEFAULT_MAX_CHARS, FillReport, FillStrategy,
    SlotBinding, default_bindings, fill_record,
};
pub use node::Element;
pub use wrap::wrap_words;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{EtiquetteError, Result};

/// Attribute used to suppress rendering of empty slots.
pub const HIDDEN_ATTR: &str = "display";
const HIDDEN_VALUE: &str = "none";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// A parsed markup template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
    root: Element,
}

impl TemplateDocument {
    /// Parse template markup.
    pub fn parse(markup: &str) -> Result<Self> {
        Ok(Self {
            root: xml::parse(markup)?,
        })
    }

    /// Read and parse a template file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let markup = std::fs::read_to_string(path).map_err(|e| {
            EtiquetteError::Template(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&markup)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Serialize the tree back to markup.
    pub fn serialize(&self) -> Result<String> {
        xml::serialize(&self.root)
    }

    /// First element whose id equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.root.find(id)
    }

    /// Like [`find_by_id`](Self::find_by_id) but a missing id is an error.
    pub fn require(&self, id: &str) -> Result<&Element> {
        self.find_by_id(id)
            .ok_or_else(|| EtiquetteError::MissingSlot { id: id.to_string() })
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.root.find_mut(id)
    }

    /// Qualified name for a new element, using the root's namespace prefix.
    fn child_name(&self, local: &str) -> String {
        match self.root.prefix() {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }

    /// Set the slot's text, or hide it when `value` is blank and `hide_if_empty`.
    ///
    /// Returns false when the slot does not exist.
    pub fn set_text(&mut self, id: &str, value: &str, hide_if_empty: bool) -> bool {
        let Some(node) = self.find_mut(id) else {
            return false;
        };
        if value.trim().is_empty() && hide_if_empty {
            node.set_attr(HIDDEN_ATTR, HIDDEN_VALUE);
            return true;
        }
        node.remove_attr(HIDDEN_ATTR);
        node.text = Some(value.to_string());
        true
    }

    /// Replace the slot's content with word-wrapped lines.
    ///
    /// Each line is a `tspan` anchored at the slot's `x`; the first has
    /// `dy="0"`, the rest `dy=line_step`.
    pub fn set_text_wrapped(
        &mut self,
        id: &str,
        value: &str,
        max_chars: usize,
        line_step: &str,
    ) -> bool {
        let tspan_name = self.child_name("tspan");
        let Some(node) = self.find_mut(id) else {
            return false;
        };
        if value.trim().is_empty() {
            node.set_attr(HIDDEN_ATTR, HIDDEN_VALUE);
            return true;
        }
        node.remove_attr(HIDDEN_ATTR);
        node.children.clear();
        node.text = None;

        let x = node.attr("x").map(str::to_string);
        for (i, line) in wrap_words(value, max_chars).into_iter().enumerate() {
            let mut tspan = Element::new(tspan_name.as_str());
            if let Some(x) = &x {
                tspan.set_attr("x", x.as_str());
            }
            tspan.set_attr("dy", if i == 0 { "0" } else { line_step });
            tspan.text = Some(line);
            node.children.push(tspan);
        }
        true
    }

    /// Remove every child of the slot, keeping the slot itself.
    pub fn clear_children(&mut self, id: &str) -> bool {
        match self.find_mut(id) {
            Some(node) => {
                node.children.clear();
                true
            }
            None => false,
        }
    }

    /// Embed a sub-document (e.g. a barcode SVG) as a data-URI image child of the slot.
    pub fn inject_embedded_image(
        &mut self,
        id: &str,
        sub_document: &str,
        width_mm: f64,
        height_mm: f64,
    ) -> bool {
        let image_name = self.child_name("image");
        if self.find_by_id(id).is_none() {
            return false;
        }
        if self.root.attr("xmlns:xlink").is_none() {
            self.root.set_attr("xmlns:xlink", XLINK_NS);
        }

        let encoded = STANDARD.encode(sub_document.as_bytes());
        let image = Element::new(image_name)
            .with_attr("xlink:href", format!("data:image/svg+xml;base64,{}", encoded))
            .with_attr("width", format!("{}mm", width_mm))
            .with_attr("height", format!("{}mm", height_mm))
            .with_attr("x", "0mm")
            .with_attr("y", "0mm")
            .with_attr("preserveAspectRatio", "xMidYMid meet");

        match self.find_mut(id) {
            Some(node) => {
                node.children.push(image);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEMPLATE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="80mm" height="50mm"><text id="STYLE_NAME" x="4" y="8">Style</text><text id="PRICE_VALUE" x="60" y="8">0,00</text><g id="BARCODE_SLOT"><rect width="1" height="1"/></g></svg>"#;

    fn template() -> TemplateDocument {
        TemplateDocument::parse(TEMPLATE).unwrap()
    }

    #[test]
    fn test_set_text() {
        let mut doc = template();
        assert!(doc.set_text("PRICE_VALUE", "89,00 €", true));
        assert_eq!(doc.find_by_id("PRICE_VALUE").unwrap().text.as_deref(), Some("89,00 €"));
    }

    #[test]
    fn test_set_text_hides_empty_and_keeps_content() {
        let mut doc = template();
        doc.set_text("PRICE_VALUE", "  ", true);
        let node = doc.find_by_id("PRICE_VALUE").unwrap();
        assert_eq!(node.attr("display"), Some("none"));
        assert_eq!(node.text.as_deref(), Some("0,00"));

        // A later non-empty value makes it visible again
        doc.set_text("PRICE_VALUE", "10", true);
        assert_eq!(doc.find_by_id("PRICE_VALUE").unwrap().attr("display"), None);
    }

    #[test]
    fn test_set_text_empty_without_hiding() {
        let mut doc = template();
        doc.set_text("PRICE_VALUE", "", false);
        let node = doc.find_by_id("PRICE_VALUE").unwrap();
        assert_eq!(node.attr("display"), None);
        assert_eq!(node.text.as_deref(), Some(""));
    }

    #[test]
    fn test_missing_slot_is_noop() {
        let mut doc = template();
        let before = doc.clone();
        assert!(!doc.set_text("NOPE", "x", true));
        assert!(!doc.set_text_wrapped("NOPE", "x", 10, "4"));
        assert!(!doc.clear_children("NOPE"));
        assert!(!doc.inject_embedded_image("NOPE", "<svg/>", 22.0, 10.0));
        assert_eq!(doc, before);
        assert!(matches!(doc.require("NOPE"), Err(EtiquetteError::MissingSlot { .. })));
    }

    #[test]
    fn test_set_text_wrapped_builds_tspans() {
        let mut doc = template();
        doc.set_text_wrapped("STYLE_NAME", "Summer Collection T-Shirt", 24, "4");
        let node = doc.find_by_id("STYLE_NAME").unwrap();
        assert_eq!(node.text, None);
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].name, "tspan");
        assert_eq!(node.children[0].attr("x"), Some("4"));
        assert_eq!(node.children[0].attr("dy"), Some("0"));
        assert_eq!(node.children[0].text.as_deref(), Some("Summer Collection"));
        assert_eq!(node.children[1].attr("dy"), Some("4"));
        assert_eq!(node.children[1].text.as_deref(), Some("T-Shirt"));
    }

    #[test]
    fn test_set_text_wrapped_is_repeatable() {
        let mut doc = template();
        doc.set_text_wrapped("STYLE_NAME", "Summer Collection T-Shirt", 24, "4");
        let first = doc.serialize().unwrap();
        doc.set_text_wrapped("STYLE_NAME", "Summer Collection T-Shirt", 24, "4");
        assert_eq!(doc.serialize().unwrap(), first);
    }

    #[test]
    fn test_clear_children_keeps_container() {
        let mut doc = template();
        doc.clear_children("BARCODE_SLOT");
        let slot = doc.find_by_id("BARCODE_SLOT").unwrap();
        assert!(slot.children.is_empty());
        assert_eq!(slot.name, "g");
    }

    #[test]
    fn test_inject_embedded_image() {
        let mut doc = template();
        doc.clear_children("BARCODE_SLOT");
        assert!(doc.inject_embedded_image("BARCODE_SLOT", "<svg/>", 22.0, 10.5));
        let slot = doc.find_by_id("BARCODE_SLOT").unwrap();
        assert_eq!(slot.children.len(), 1);
        let image = &slot.children[0];
        assert_eq!(image.name, "image");
        assert_eq!(image.attr("xlink:href"), Some("data:image/svg+xml;base64,PHN2Zy8+"));
        assert_eq!(image.attr("width"), Some("22mm"));
        assert_eq!(image.attr("height"), Some("10.5mm"));
        assert_eq!(image.attr("preserveAspectRatio"), Some("xMidYMid meet"));
        assert_eq!(doc.root().attr("xmlns:xlink"), Some(XLINK_NS));
    }

    #[test]
    fn test_prefixed_root_uses_prefix_for_new_elements() {
        let mut doc = TemplateDocument::parse(
            r#"<svg:svg xmlns:svg="http://www.w3.org/2000/svg"><svg:text id="T" x="1">a</svg:text></svg:svg>"#,
        )
        .unwrap();
        doc.set_text_wrapped("T", "one two", 3, "4");
        let node = doc.find_by_id("T").unwrap();
        assert!(node.children.iter().all(|c| c.name == "svg:tspan"));
    }

    #[test]
    fn test_clones_are_independent() {
        let template = template();
        let mut a = template.clone();
        let mut b = template.clone();
        a.clear_children("BARCODE_SLOT");
        a.inject_embedded_image("BARCODE_SLOT", "<svg id='a'/>", 22.0, 10.0);
        b.clear_children("BARCODE_SLOT");
        b.inject_embedded_image("BARCODE_SLOT", "<svg id='b'/>", 22.0, 10.0);
        assert_ne!(a.serialize().unwrap(), b.serialize().unwrap());
        assert_eq!(a.find_by_id("BARCODE_SLOT").unwrap().children.len(), 1);
        assert_eq!(template.find_by_id("BARCODE_SLOT").unwrap().children.len(), 1);
        assert_eq!(template.find_by_id("BARCODE_SLOT").unwrap().children[0].name, "rect");
    }
}
