//! `.model` encoder

use bigworld_shared::BIGWORLD_LAYOUT;
use xmltree::Element;

use super::document::{bounding_box, format_f32, push, push_text, write_document};
use crate::error::ExportError;
use crate::mesh::BoundingBox;

/// One clip referenced from a model
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationListing {
    pub name: String,
    /// Extension-less resource path, `animations/<group>/<clip>`
    pub nodes: String,
    pub frame_rate: f32,
    pub first_frame: i32,
    pub last_frame: i32,
}

impl AnimationListing {
    pub fn new(group: &str, clip: &str, frame_rate: f32, frames: (i32, i32)) -> Self {
        let file = BIGWORLD_LAYOUT.animation_file(group, clip);
        let nodes = file
            .strip_suffix(&format!(".{}", BIGWORLD_LAYOUT.animation_ext))
            .unwrap_or(&file)
            .to_string();
        Self {
            name: clip.to_string(),
            nodes,
            frame_rate,
            first_frame: frames.0,
            last_frame: frames.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelDocument<'a> {
    /// File stem shared by the model's `.model`, `.visual` and `.primitives`
    pub name: &'a str,
    pub parent: Option<&'a str>,
    pub bounds: BoundingBox,
    pub animations: &'a [AnimationListing],
    pub bsp_models: &'a [String],
}

pub fn encode_model(doc: &ModelDocument) -> Result<Vec<u8>, ExportError> {
    let mut root = Element::new(&format!("{}.{}", doc.name, BIGWORLD_LAYOUT.model_ext));

    push_text(&mut root, "nodefullVisual", BIGWORLD_LAYOUT.visual_resource(doc.name));
    if let Some(parent) = doc.parent.filter(|p| !p.is_empty()) {
        push_text(&mut root, "parent", parent);
    }
    push_text(&mut root, "extent", format_f32(doc.bounds.extent()));
    push(&mut root, bounding_box(doc.bounds.min, doc.bounds.max));

    for listing in doc.animations {
        let mut animation = Element::new("animation");
        push_text(&mut animation, "name", listing.name.as_str());
        push_text(&mut animation, "nodes", listing.nodes.as_str());
        push_text(&mut animation, "frameRate", format_f32(listing.frame_rate));
        push_text(&mut animation, "firstFrame", listing.first_frame.to_string());
        push_text(&mut animation, "lastFrame", listing.last_frame.to_string());
        push(&mut root, animation);
    }

    if !doc.bsp_models.is_empty() {
        let mut bsp = Element::new("bspModels");
        for model in doc.bsp_models {
            push_text(&mut bsp, "model", model.as_str());
        }
        let mut editor = Element::new("editorOnly");
        push(&mut editor, bsp);
        push(&mut root, editor);
    }

    write_document(&format!("model '{}'", doc.name), &root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_document() {
        let listings = [AnimationListing::new("hero", "walk", 30.0, (1, 24))];
        let bsp = vec!["models/hero_bsp".to_string()];
        let doc = ModelDocument {
            name: "hero",
            parent: Some("models/base"),
            bounds: BoundingBox {
                min: [-1.0, 0.0, -1.0],
                max: [1.0, 2.0, 1.0],
            },
            animations: &listings,
            bsp_models: &bsp,
        };
        let text = String::from_utf8(encode_model(&doc).unwrap()).unwrap();

        assert!(text.starts_with("<hero.model>"));
        assert!(text.contains("<nodefullVisual>models/hero</nodefullVisual>"));
        assert!(text.contains("<parent>models/base</parent>"));
        assert!(text.contains("<extent>1.732051</extent>"));
        assert!(text.contains("<min>-1.000000 0.000000 -1.000000</min>"));
        assert!(text.contains("<nodes>animations/hero/walk</nodes>"));
        assert!(text.contains("<lastFrame>24</lastFrame>"));
        assert!(text.contains("<model>models/hero_bsp</model>"));
    }

    #[test]
    fn test_optional_sections_omitted() {
        let doc = ModelDocument {
            name: "crate",
            parent: None,
            bounds: BoundingBox::default(),
            animations: &[],
            bsp_models: &[],
        };
        let text = String::from_utf8(encode_model(&doc).unwrap()).unwrap();
        assert!(!text.contains("<parent>"));
        assert!(!text.contains("<animation>"));
        assert!(!text.contains("editorOnly"));
    }
}
