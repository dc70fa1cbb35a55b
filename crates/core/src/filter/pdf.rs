//! PDF page subsetting, watermark overlay, page-size probing and metadata
//! stamping, all routed through lopdf.
//!
//! The toolkit may fail during teardown even when the primary write already
//! succeeded, so every save goes through [`save_guarded`]: a save error with
//! a non-empty output file on disk is demoted to a warning.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use crate::error::{Result, RptError};

/// Stamped into the Info dictionary of every produced PDF.
pub const PRODUCER: &str = "ISIS Papyrus";
pub const CREATOR: &str = "Papyrus Content Governance";

/// Fallback page size (US Letter, points) when the MediaBox is absent or
/// degenerate.
const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

const OVERLAY_NAME: &str = "WmOverlay";

fn toolkit_err(path: &Path, e: lopdf::Error) -> RptError {
    RptError::Unknown(format!("PDF toolkit: {}: {e}", path.display()))
}

fn load(path: &Path) -> Result<Document> {
    Document::load(path).map_err(|e| toolkit_err(path, e))
}

/// Save, treating a teardown failure after a successful write as success
/// with a warning.
pub(crate) fn save_guarded(doc: &mut Document, path: &Path) -> Result<()> {
    if let Err(e) = doc.save(path) {
        match fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => {
                eprintln!(
                    "WARNING: PDF toolkit reported '{e}' after writing {}; keeping output",
                    path.display()
                );
            }
            _ => return Err(RptError::Write(format!("{}: {e}", path.display()))),
        }
    }
    Ok(())
}

/// Collapse page numbers into the canonical ascending range expression,
/// e.g. `[1, 3, 4, 5, 8]` becomes `"1,3-5,8"`.
pub fn coalesce_ranges(pages: &[i32]) -> String {
    let mut sorted: Vec<i32> = pages.iter().copied().filter(|&p| p >= 1).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let start = sorted[i];
        let mut end = start;
        while i + 1 < sorted.len() && sorted[i + 1] == end + 1 {
            i += 1;
            end = sorted[i];
        }
        parts.push(if start == end {
            start.to_string()
        } else {
            format!("{start}-{end}")
        });
        i += 1;
    }
    parts.join(",")
}

/// Write a PDF containing only the given 1-based pages, in ascending order.
///
/// An empty list copies the file unchanged. Page numbers outside the
/// document are dropped; if none remain the file is likewise copied
/// unchanged, with a warning.
pub fn subset(input: &Path, pages: &[i32], output: &Path) -> Result<()> {
    if pages.is_empty() {
        fs::copy(input, output).map_err(|e| RptError::write(output, e))?;
        return Ok(());
    }
    let mut doc = load(input)?;
    let total = doc.get_pages().len() as u32;
    let keep: BTreeSet<u32> = pages
        .iter()
        .filter(|&&p| p >= 1 && p as u32 <= total)
        .map(|&p| p as u32)
        .collect();
    if keep.is_empty() {
        eprintln!(
            "WARNING: no selected page exists in the {total}-page PDF; copying unfiltered"
        );
        fs::copy(input, output).map_err(|e| RptError::write(output, e))?;
        return Ok(());
    }

    let delete: Vec<u32> = (1..=total).filter(|n| !keep.contains(n)).collect();
    if !delete.is_empty() {
        doc.delete_pages(&delete);
        doc.prune_objects();
    }
    save_guarded(&mut doc, output)
}

/// Composite the watermark document's single page on top of every page of
/// the input.
///
/// The watermark's objects are renumbered past the input's ids and merged
/// in; its first page becomes a Form XObject drawn after each page's
/// original content (which is fenced in `q`/`Q` so its graphics state
/// cannot leak into the overlay).
pub fn overlay(input: &Path, watermark: &Path, output: &Path) -> Result<()> {
    let mut doc = load(input)?;
    let mut wm = load(watermark)?;

    wm.renumber_objects_with(doc.max_id + 1);
    let wm_pages = wm.get_pages();
    let &wm_page_id = wm_pages
        .values()
        .next()
        .ok_or_else(|| RptError::Unknown("watermark PDF has no pages".into()))?;
    let wm_content = wm
        .get_page_content(wm_page_id)
        .map_err(|e| toolkit_err(watermark, e))?;
    let wm_dict = wm
        .get_dictionary(wm_page_id)
        .map_err(|e| toolkit_err(watermark, e))?
        .clone();

    let bbox = match wm_dict.get(b"MediaBox") {
        Ok(obj) => obj.clone(),
        Err(_) => Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(DEFAULT_PAGE_SIZE.0 as f32),
            Object::Real(DEFAULT_PAGE_SIZE.1 as f32),
        ]),
    };
    // References inside the resources stay valid because every watermark
    // object is merged below under its renumbered id.
    let resources = match wm_dict.get(b"Resources") {
        Ok(obj) => obj.clone(),
        Err(_) => Object::Dictionary(Dictionary::new()),
    };
    doc.max_id = wm.max_id;
    doc.objects.extend(std::mem::take(&mut wm.objects));

    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => bbox,
            "Resources" => resources,
        },
        wm_content,
    ));

    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    for page_id in page_ids {
        attach_page_xobject(&mut doc, page_id, OVERLAY_NAME, form_id)
            .map_err(|e| toolkit_err(input, e))?;
        let existing = doc
            .get_page_content(page_id)
            .map_err(|e| toolkit_err(input, e))?;
        let mut merged = Vec::with_capacity(existing.len() + 32);
        merged.extend_from_slice(b"q\n");
        merged.extend_from_slice(&existing);
        merged.extend_from_slice(format!("\nQ\nq\n/{OVERLAY_NAME} Do\nQ\n").as_bytes());
        doc.change_page_content(page_id, merged)
            .map_err(|e| toolkit_err(input, e))?;
    }
    // The watermark's own page tree came along in the merge; drop whatever
    // the form does not reference.
    doc.prune_objects();
    save_guarded(&mut doc, output)
}

/// Register `name` in the page's Resources /XObject dictionary, following
/// an indirect Resources reference if the page uses one.
fn attach_page_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobject_id: ObjectId,
) -> std::result::Result<(), lopdf::Error> {
    let resources_ref = match doc.get_dictionary(page_id)?.get(b"Resources") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    let resources = match resources_ref {
        Some(id) => doc.get_object_mut(id)?.as_dict_mut()?,
        None => {
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            if page.get(b"Resources").is_err() {
                page.set("Resources", Dictionary::new());
            }
            page.get_mut(b"Resources")?.as_dict_mut()?
        }
    };
    if resources.get(b"XObject").is_err() {
        resources.set("XObject", Dictionary::new());
    }
    resources
        .get_mut(b"XObject")?
        .as_dict_mut()?
        .set(name, Object::Reference(xobject_id));
    Ok(())
}

/// Width and height of the first page in points, honoring /Rotate.
/// Degenerate or missing geometry falls back to US Letter.
pub fn probe_page_size(input: &Path) -> Result<(f64, f64)> {
    let doc = load(input)?;
    let pages = doc.get_pages();
    let Some(&first) = pages.values().next() else {
        return Ok(DEFAULT_PAGE_SIZE);
    };
    let Some(rect) = inherited_attr(&doc, first, b"MediaBox").as_ref().and_then(object_rect)
    else {
        return Ok(DEFAULT_PAGE_SIZE);
    };
    let (mut width, mut height) = (rect.2 - rect.0, rect.3 - rect.1);
    let rotate = inherited_attr(&doc, first, b"Rotate")
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0);
    if matches!(rotate.rem_euclid(360), 90 | 270) {
        std::mem::swap(&mut width, &mut height);
    }
    if width <= 0.0 || height <= 0.0 {
        return Ok(DEFAULT_PAGE_SIZE);
    }
    Ok((width, height))
}

/// Rewrite the Info dictionary with the Papyrus producer/creator pair,
/// preserving any other keys, and atomically replace the file.
pub fn stamp_info(path: &Path) -> Result<()> {
    let mut doc = load(path)?;
    match doc.trailer.get(b"Info").ok().cloned() {
        Some(Object::Reference(info_id)) => {
            let dict = doc
                .get_object_mut(info_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| toolkit_err(path, e))?;
            dict.set("Producer", Object::string_literal(PRODUCER));
            dict.set("Creator", Object::string_literal(CREATOR));
        }
        Some(Object::Dictionary(mut dict)) => {
            dict.set("Producer", Object::string_literal(PRODUCER));
            dict.set("Creator", Object::string_literal(CREATOR));
            doc.trailer.set("Info", Object::Dictionary(dict));
        }
        _ => {
            let info_id = doc.add_object(dictionary! {
                "Producer" => Object::string_literal(PRODUCER),
                "Creator" => Object::string_literal(CREATOR),
            });
            doc.trailer.set("Info", Object::Reference(info_id));
        }
    }

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".info.tmp");
    let tmp = PathBuf::from(tmp);
    save_guarded(&mut doc, &tmp)?;
    fs::rename(&tmp, path).map_err(|e| RptError::write(path, e))
}

fn inherited_attr(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    // Bounded walk up the page tree; a cycle would otherwise hang us.
    for _ in 0..32 {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(obj) = dict.get(key) {
            return match obj {
                Object::Reference(id) => doc.get_object(*id).ok().cloned(),
                other => Some(other.clone()),
            };
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}

fn object_rect(obj: &Object) -> Option<(f64, f64, f64, f64)> {
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut vals = [0.0f64; 4];
    for (slot, item) in vals.iter_mut().zip(arr.iter()) {
        *slot = object_number(item)?;
    }
    Some((vals[0], vals[1], vals[2], vals[3]))
}

fn object_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}
