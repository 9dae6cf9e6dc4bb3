//! `.mfm` encoder

use bigworld_shared::BIGWORLD_LAYOUT;
use xmltree::{Element, XMLNode};

use super::document::{format_bool, format_f32, push, push_text, text_element, write_document};
use crate::error::ExportError;
use crate::material::MaterialRef;
use crate::scene::PropertyValue;

/// `<property>` with the property name as text and one typed value child
fn property(name: &str, value: Element) -> Element {
    let mut element = Element::new("property");
    element.children.push(XMLNode::Text(name.to_string()));
    push(&mut element, value);
    element
}

fn property_value(value: &PropertyValue) -> Element {
    match value {
        PropertyValue::Bool(b) => text_element("Bool", format_bool(*b)),
        PropertyValue::Int(i) => text_element("Int", i.to_string()),
        PropertyValue::Float(f) => text_element("Float", format_f32(*f)),
        PropertyValue::Vector4(v) => text_element("Vector4", v.map(format_f32).join(" ")),
    }
}

pub fn encode_material(material: &MaterialRef) -> Result<Vec<u8>, ExportError> {
    let mut root = Element::new(&format!(
        "{}.{}",
        material.file_stem, BIGWORLD_LAYOUT.material_ext
    ));

    push_text(&mut root, "identifier", material.name.as_str());
    push_text(&mut root, "fx", material.shader.as_str());
    push_text(&mut root, "materialKind", material.material_kind.as_str());
    if let Some(flags) = material.collision_flags {
        push_text(&mut root, "collisionFlags", flags.to_string());
    }
    if material.alpha_test {
        push_text(&mut root, "alphaTestEnable", format_bool(true));
    }
    if material.double_sided {
        push_text(&mut root, "doubleSided", format_bool(true));
    }

    for texture in &material.textures {
        push(
            &mut root,
            property(&texture.slot, text_element("Texture", texture.path.as_str())),
        );
    }
    for prop in &material.properties {
        push(&mut root, property(&prop.name, property_value(&prop.value)));
    }

    write_document(&format!("material '{}'", material.name), &root)
}
