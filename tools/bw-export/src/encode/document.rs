//! Element-tree helpers shared by the document encoders

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::error::ExportError;

/// Fixed six-decimal float text; negative zero prints as zero.
pub fn format_f32(value: f32) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{:.6}", value)
}

/// `"x y z"` with six decimals per component
pub fn format_vec3(v: [f32; 3]) -> String {
    v.map(format_f32).join(" ")
}

pub(crate) fn format_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Element holding a single text node
pub(crate) fn text_element(name: &str, text: impl Into<String>) -> Element {
    let mut element = Element::new(name);
    element.children.push(XMLNode::Text(text.into()));
    element
}

/// Element with no children; written as `<name/>`
pub(crate) fn empty_element(name: &str) -> Element {
    Element::new(name)
}

pub(crate) fn push(parent: &mut Element, child: Element) {
    parent.children.push(XMLNode::Element(child));
}

pub(crate) fn push_text(parent: &mut Element, name: &str, text: impl Into<String>) {
    push(parent, text_element(name, text));
}

/// `<boundingBox><min/><max/></boundingBox>`
pub(crate) fn bounding_box(min: [f32; 3], max: [f32; 3]) -> Element {
    let mut bb = Element::new("boundingBox");
    push_text(&mut bb, "min", format_vec3(min));
    push_text(&mut bb, "max", format_vec3(max));
    bb
}

/// Serialize an indented document tree.
pub(crate) fn write_document(entity: &str, root: &Element) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    let config = EmitterConfig::new()
        .perform_indent(true)
        .indent_string("\t")
        .write_document_declaration(false);
    root.write_with_config(&mut out, config)
        .map_err(|e| ExportError::encoding(entity, e.to_string()))?;
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_text() {
        assert_eq!(format_f32(1.0), "1.000000");
        assert_eq!(format_f32(-0.0), "0.000000");
        assert_eq!(format_f32(-2.5), "-2.500000");
        assert_eq!(format_vec3([0.1, -0.0, 3.0]), "0.100000 0.000000 3.000000");
    }

    #[test]
    fn test_document_is_indented_and_stable() {
        let mut root = Element::new("box.model");
        push_text(&mut root, "nodefullVisual", "models/box");
        push(&mut root, bounding_box([0.0; 3], [1.0; 3]));

        let first = write_document("box", &root).unwrap();
        let second = write_document("box", &root).unwrap();
        assert_eq!(first, second);

        let text = String::from_utf8(first).unwrap();
        assert!(text.starts_with("<box.model>"));
        assert!(text.contains("\t<nodefullVisual>models/box</nodefullVisual>"));
        assert!(text.contains("<max>1.000000 1.000000 1.000000</max>"));
    }
}
