//! Overlay drawing: face boxes, landmark polylines and text labels.

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use camface_core::{FaceRegion, LandmarkSet};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use line_drawing::Bresenham;
use std::path::{Path, PathBuf};

pub const BOX_THICKNESS: i32 = 2;
pub const LABEL_PX: f32 = 14.0;

/// Fonts tried when no font path is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Load the label font: the configured path first, then common system fonts.
pub fn load_font(configured: Option<&Path>) -> Option<FontVec> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

    for path in candidates {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                tracing::debug!(path = %path.display(), "loaded label font");
                return Some(font);
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "unusable font file"),
        }
    }

    tracing::warn!("no TrueType font found; text labels disabled (set CAMFACE_FONT_PATH)");
    None
}

/// "left_eye" → "Left eye".
pub fn feature_label(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Plot a `thickness`×`thickness` square at every point of a segment.
fn draw_segment(
    image: &mut RgbImage,
    from: (i32, i32),
    to: (i32, i32),
    color: Rgb<u8>,
    thickness: i32,
) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let lo = -(thickness - 1) / 2;
    let hi = lo + thickness.max(1);
    for (x, y) in Bresenham::new(from, to) {
        for dy in lo..hi {
            for dx in lo..hi {
                let (px, py) = (x + dx, y + dy);
                if px >= 0 && py >= 0 && px < w && py < h {
                    image.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }
}

/// Open polyline through `points`. A single point draws a dot.
pub fn draw_polyline(image: &mut RgbImage, points: &[(i32, i32)], color: Rgb<u8>, thickness: i32) {
    match points {
        [] => {}
        [only] => draw_segment(image, *only, *only, color, thickness),
        _ => {
            for pair in points.windows(2) {
                draw_segment(image, pair[0], pair[1], color, thickness);
            }
        }
    }
}

pub fn draw_region(image: &mut RgbImage, region: &FaceRegion, color: Rgb<u8>) {
    let (l, t, r, b) = (region.left, region.top, region.right, region.bottom);
    draw_polyline(image, &[(l, t), (r, t), (r, b), (l, b), (l, t)], color, BOX_THICKNESS);
}

/// Aspect-preserving resize so the longer side is `max_side`.
pub fn thumbnail(image: &RgbImage, max_side: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }
    let scale = (max_side as f32 / w as f32).min(max_side as f32 / h as f32);
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    imageops::resize(image, nw, nh, FilterType::Triangle)
}

/// Draws overlays; holds the optional label font.
pub struct Painter {
    font: Option<FontVec>,
}

impl Painter {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    /// Rasterize `text` with its baseline starting at (`x`, `y`), handing
    /// every covered pixel and its coverage to `plot`.
    pub fn rasterize(
        &self,
        x: f32,
        y: f32,
        px: f32,
        text: &str,
        mut plot: impl FnMut(i32, i32, f32),
    ) {
        let Some(font) = &self.font else {
            return;
        };
        let scaled = font.as_scaled(PxScale::from(px));
        let mut caret = point(x, y);
        for c in text.chars() {
            let mut glyph = scaled.scaled_glyph(c);
            glyph.position = caret;
            caret.x += scaled.h_advance(glyph.id);
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    plot(
                        bounds.min.x as i32 + gx as i32,
                        bounds.min.y as i32 + gy as i32,
                        coverage,
                    );
                });
            }
        }
    }

    /// Horizontal advance of `text`; zero without a font.
    pub fn text_width(&self, px: f32, text: &str) -> f32 {
        let Some(font) = &self.font else {
            return 0.0;
        };
        let scaled = font.as_scaled(PxScale::from(px));
        text.chars().map(|c| scaled.h_advance(scaled.glyph_id(c))).sum()
    }

    pub fn draw_text(
        &self,
        image: &mut RgbImage,
        x: i32,
        y: i32,
        px: f32,
        color: Rgb<u8>,
        text: &str,
    ) {
        let (w, h) = (image.width() as i32, image.height() as i32);
        self.rasterize(x as f32, y as f32, px, text, |cx, cy, coverage| {
            if cx < 0 || cy < 0 || cx >= w || cy >= h {
                return;
            }
            let dst = image.get_pixel_mut(cx as u32, cy as u32);
            for c in 0..3 {
                let blended = dst[c] as f32 * (1.0 - coverage) + color[c] as f32 * coverage;
                dst[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        });
    }

    /// One polyline per feature plus its label just above the first point.
    pub fn draw_landmarks(
        &self,
        image: &mut RgbImage,
        set: &LandmarkSet,
        line: Rgb<u8>,
        label: Rgb<u8>,
    ) {
        for (name, points) in set.iter() {
            draw_polyline(image, points, line, BOX_THICKNESS);
            if let Some(&(x, y)) = points.first() {
                self.draw_text(image, x, y - 5, LABEL_PX, label, &feature_label(name));
            }
        }
    }
}
