//! Deck indexing: reduce a loaded deck to one record row per slide.

use crate::doc::{DeckDocument, SlideContent};
use crate::fingerprint::normalize_simple_name;
use crate::layout::LayoutKind;
use crate::locator::ImageLocator;
use crate::record::{join_list_field, SlideRecord};

/// Build one record row per slide of a loaded deck.
///
/// Identity and context columns are filled from the snapshot;
/// `layout_kind` is classified from the slide's layout name and left
/// empty when the name is not recognizably one of the closed kinds, and
/// `style_group` comes from the layout's master where the template
/// exposes it. Both stay hand-editable afterwards.
pub fn index_deck(deck: &DeckDocument) -> Vec<SlideRecord> {
    deck.slides
        .iter()
        .map(|slide| index_slide(deck, slide))
        .collect()
}

fn index_slide(deck: &DeckDocument, slide: &SlideContent) -> SlideRecord {
    let layout_kind = LayoutKind::from_name(&slide.layout_name)
        .map(|kind| kind.as_str().to_string())
        .unwrap_or_default();
    let style_group = deck
        .layouts
        .iter()
        .find(|layout| layout.name == slide.layout_name)
        .map(|layout| normalize_simple_name(&layout.master_name))
        .unwrap_or_default();

    let mut locators = Vec::new();
    let mut hashes = Vec::new();
    for picture in slide.pictures() {
        locators.push(
            ImageLocator::new(deck.name.clone(), slide.index, picture.shape_id).to_string(),
        );
        hashes.push(picture.image_hash.clone());
    }

    SlideRecord {
        source_document: deck.name.clone(),
        source_slide_index: slide.index.to_string(),
        content_hash: slide.fingerprint(),
        style_group,
        layout_kind,
        asset_kinds: join_list_field(&asset_kinds(slide)),
        title_text: slide.title_text(),
        body_text: slide.body_text(),
        notes_text: slide.notes_text.clone(),
        image_locators: join_list_field(&locators),
        image_hashes: join_list_field(&hashes),
    }
}

/// Coarse shape-kind labels in order of first appearance, one per kind.
fn asset_kinds(slide: &SlideContent) -> Vec<String> {
    let mut kinds: Vec<String> = Vec::new();
    for shape in &slide.shapes {
        let label = shape.kind_label().to_string();
        if !kinds.contains(&label) {
            kinds.push(label);
        }
    }
    kinds
}
