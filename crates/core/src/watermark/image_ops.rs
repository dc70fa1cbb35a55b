//! Raster preparation of the watermark image.
//!
//! Scale, rotation and opacity are baked into the pixel data here; the PDF
//! content stream later only positions the result. Nearest-neighbor is used
//! throughout, watermarks do not warrant resampling quality.

use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, ImageEncoder, RgbaImage};

use crate::error::{Result, RptError};
use crate::watermark::WatermarkConfig;

/// The watermark's longest side relative to the page's shorter side at
/// scale factor 1.0.
const PAGE_FRACTION: f64 = 0.3;

/// Load the configured image and produce the processed watermark as PNG
/// bytes sized for a `page_width` x `page_height` page (PDF points).
pub fn prepare_watermark_png(
    config: &WatermarkConfig,
    page_width: f64,
    page_height: f64,
) -> Result<Vec<u8>> {
    let path = config
        .image_path()
        .ok_or_else(|| RptError::InvalidArgs("no watermark image configured".into()))?;
    let img = image::open(path)
        .map_err(|e| RptError::Read(format!("watermark image {}: {e}", path.display())))?
        .to_rgba8();

    let mut img = scale_to_page(&img, page_width, page_height, config.scale_factor());
    if config.rotation_degrees() != 0 {
        img = rotate_about_center(&img, config.rotation_degrees());
    }
    if config.opacity_percent() < 100 {
        apply_opacity(&mut img, config.opacity_percent());
    }
    encode_png(&img)
}

/// Resize so the longest side is `min(page_w, page_h) * 0.3 * scale`,
/// preserving aspect ratio.
fn scale_to_page(img: &RgbaImage, page_w: f64, page_h: f64, scale: f64) -> RgbaImage {
    let target = page_w.min(page_h) * PAGE_FRACTION * scale;
    let longest = img.width().max(img.height()) as f64;
    if longest <= 0.0 || target <= 0.0 {
        return img.clone();
    }
    let ratio = target / longest;
    let new_w = ((img.width() as f64 * ratio).round() as u32).max(1);
    let new_h = ((img.height() as f64 * ratio).round() as u32).max(1);
    imageops::resize(img, new_w, new_h, FilterType::Nearest)
}

/// Rotate about the image center onto an expanded canvas; pixels with no
/// source fall out transparent.
fn rotate_about_center(src: &RgbaImage, degrees: i32) -> RgbaImage {
    let theta = f64::from(degrees).to_radians();
    let (sin, cos) = theta.sin_cos();
    let w = src.width() as f64;
    let h = src.height() as f64;
    // The epsilon keeps right-angle rotations from gaining a row of slack
    // to floating-point noise.
    let new_w = ((w * cos.abs() + h * sin.abs() - 1e-9).ceil() as u32).max(1);
    let new_h = ((w * sin.abs() + h * cos.abs() - 1e-9).ceil() as u32).max(1);

    let cx = w / 2.0;
    let cy = h / 2.0;
    let ncx = new_w as f64 / 2.0;
    let ncy = new_h as f64 / 2.0;

    let mut out = RgbaImage::new(new_w, new_h);
    for y in 0..new_h {
        for x in 0..new_w {
            let dx = x as f64 + 0.5 - ncx;
            let dy = y as f64 + 0.5 - ncy;
            // Inverse mapping: where did this destination pixel come from?
            let sx = (dx * cos + dy * sin + cx).floor();
            let sy = (-dx * sin + dy * cos + cy).floor();
            if sx >= 0.0 && sx < w && sy >= 0.0 && sy < h {
                out.put_pixel(x, y, *src.get_pixel(sx as u32, sy as u32));
            }
        }
    }
    out
}

/// Multiply the alpha channel by `percent / 100`.
fn apply_opacity(img: &mut RgbaImage, percent: i32) {
    let percent = percent.clamp(0, 100) as u32;
    for pixel in img.pixels_mut() {
        pixel.0[3] = (u32::from(pixel.0[3]) * percent / 100) as u8;
    }
}

/// Re-encode an RGBA buffer as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgba8)
        .map_err(|e| RptError::Unknown(format!("PNG encoding failed: {e}")))?;
    Ok(out)
}
