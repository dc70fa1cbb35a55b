//! Synthesis of the single-page overlay PDF.
//!
//! The page matches the target page's dimensions exactly; the content stream
//! draws the processed watermark image at the anchor point(s) implied by the
//! configured position. Scale and rotation are already baked into the image
//! pixels, so drawing is a plain `cm` + `Do`.

use std::fmt::Write as _;
use std::path::Path;

use lopdf::{Document, Object, Stream, dictionary};

use crate::error::{Result, RptError};
use crate::filter::pdf::save_guarded;
use crate::watermark::Position;

/// Spacing between tile origins, as a multiple of the image size.
const TILE_STEP: f64 = 1.5;

/// Build a one-page PDF of `page_width` x `page_height` points containing
/// only the watermark PNG, and write it to `out_path`.
pub fn build_watermark_pdf(
    png: &[u8],
    page_width: f64,
    page_height: f64,
    position: Position,
    out_path: &Path,
) -> Result<()> {
    let img = image::load_from_memory(png)
        .map_err(|e| RptError::Unknown(format!("watermark PNG decode failed: {e}")))?
        .to_rgba8();
    let (w, h) = img.dimensions();

    // Split into a DeviceRGB plane and a DeviceGray soft mask.
    let mut rgb = Vec::with_capacity((w * h * 3) as usize);
    let mut alpha = Vec::with_capacity((w * h) as usize);
    for pixel in img.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8i64,
        },
        alpha,
    ));
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "SMask" => Object::Reference(smask_id),
        },
        rgb,
    ));

    let mut content = String::new();
    for (x, y) in placements(position, page_width, page_height, f64::from(w), f64::from(h)) {
        let _ = writeln!(
            content,
            "q\n{w} 0 0 {h} {x:.2} {y:.2} cm\n/Wm0 Do\nQ"
        );
    }
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page_width as f32),
            Object::Real(page_height as f32),
        ],
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Wm0" => Object::Reference(image_id) },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.compress();

    save_guarded(&mut doc, out_path)
}

/// Bottom-left coordinates at which the image is drawn.
///
/// Anchors follow the position table: top anchors align the image's top edge
/// with the page's top edge, center anchors center it, and so on. `Repeat`
/// is a single centered draw (the overlay step applies it to every page);
/// `Tiling` fills the page with a regular grid.
fn placements(position: Position, pw: f64, ph: f64, iw: f64, ih: f64) -> Vec<(f64, f64)> {
    let center_x = (pw - iw) / 2.0;
    let center_y = (ph - ih) / 2.0;
    let right_x = pw - iw;
    let top_y = ph - ih;
    match position {
        Position::Center | Position::Repeat => vec![(center_x, center_y)],
        Position::TopLeft => vec![(0.0, top_y)],
        Position::TopCenter => vec![(center_x, top_y)],
        Position::TopRight => vec![(right_x, top_y)],
        Position::MiddleLeft => vec![(0.0, center_y)],
        Position::MiddleRight => vec![(right_x, center_y)],
        Position::BottomLeft => vec![(0.0, 0.0)],
        Position::BottomCenter => vec![(center_x, 0.0)],
        Position::BottomRight => vec![(right_x, 0.0)],
        Position::Tiling => {
            let step_x = (iw * TILE_STEP).max(1.0);
            let step_y = (ih * TILE_STEP).max(1.0);
            let mut tiles = Vec::new();
            let mut y = 0.0;
            while y < ph {
                let mut x = 0.0;
                while x < pw {
                    tiles.push((x, y));
                    x += step_x;
                }
                y += step_y;
            }
            tiles
        }
    }
}
