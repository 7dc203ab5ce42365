//! The face-lock indicator: a two-colour circular badge with a padlock.

use crate::match_engine::LockState;
use crate::render::Painter;
use image::{Rgba, RgbaImage};

pub const BADGE_SIZE: u32 = 300;

const LOCKED_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const UNLOCKED_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const FACE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const STROKE: f32 = 5.0;
const LABEL_PX: f32 = 32.0;

pub fn badge_color(state: LockState) -> Rgba<u8> {
    match state {
        LockState::Authorized => UNLOCKED_COLOR,
        LockState::Unauthorized => LOCKED_COLOR,
    }
}

/// Render the badge for `state`.
pub fn render_badge(state: LockState, painter: &Painter) -> RgbaImage {
    let mut img = RgbaImage::new(BADGE_SIZE, BADGE_SIZE);
    let center = (150.0, 150.0);

    fill_circle(&mut img, center, 140.0, badge_color(state));
    fill_circle(&mut img, center, 100.0, FACE_COLOR);

    // Padlock body.
    stroke_rect(&mut img, (120.0, 130.0), (180.0, 200.0), INK);

    // Shackle: full ring when locked, upper half only when open.
    let shackle = (150.0, 125.0);
    match state {
        LockState::Unauthorized => stroke_arc(&mut img, shackle, 15.0, |_| true, INK),
        LockState::Authorized => stroke_arc(&mut img, shackle, 15.0, |dy| dy <= 0.0, INK),
    }

    let label = match state {
        LockState::Authorized => "UNLOCKED",
        LockState::Unauthorized => "LOCKED",
    };
    let x = (BADGE_SIZE as f32 - painter.text_width(LABEL_PX, label)) / 2.0;
    painter.rasterize(x, 257.0, LABEL_PX, label, |cx, cy, coverage| {
        if cx >= 0 && cy >= 0 && (cx as u32) < BADGE_SIZE && (cy as u32) < BADGE_SIZE {
            let dst = img.get_pixel_mut(cx as u32, cy as u32);
            for c in 0..3 {
                dst[c] = (dst[c] as f32 * (1.0 - coverage)).round() as u8;
            }
            dst[3] = dst[3].max((coverage * 255.0) as u8);
        }
    });

    img
}

fn fill_circle(img: &mut RgbaImage, (cx, cy): (f32, f32), r: f32, color: Rgba<u8>) {
    for (x, y, px) in img.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        if dx * dx + dy * dy <= r * r {
            *px = color;
        }
    }
}

/// Ring of width `STROKE` around radius `r`, limited to pixels whose
/// vertical offset from the centre passes `keep`.
fn stroke_arc(
    img: &mut RgbaImage,
    (cx, cy): (f32, f32),
    r: f32,
    keep: impl Fn(f32) -> bool,
    color: Rgba<u8>,
) {
    let (inner, outer) = (r - STROKE / 2.0, r + STROKE / 2.0);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let d = (dx * dx + dy * dy).sqrt();
        if d >= inner && d <= outer && keep(dy) {
            *px = color;
        }
    }
}

fn stroke_rect(img: &mut RgbaImage, (x0, y0): (f32, f32), (x1, y1): (f32, f32), color: Rgba<u8>) {
    let half = STROKE / 2.0;
    for (x, y, px) in img.enumerate_pixels_mut() {
        let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
        let in_outer = fx >= x0 - half && fx <= x1 + half && fy >= y0 - half && fy <= y1 + half;
        let in_inner = fx > x0 + half && fx < x1 - half && fy > y0 + half && fy < y1 - half;
        if in_outer && !in_inner {
            *px = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_colors_by_state() {
        let painter = Painter::new(None);
        let locked = render_badge(LockState::Unauthorized, &painter);
        let open = render_badge(LockState::Authorized, &painter);
        // A point on the outer ring.
        assert_eq!(locked.get_pixel(150, 20), &LOCKED_COLOR);
        assert_eq!(open.get_pixel(150, 20), &UNLOCKED_COLOR);
        // Centre is white face, corners transparent.
        assert_eq!(locked.get_pixel(100, 150), &FACE_COLOR);
        assert_eq!(locked.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_shackle_closed_only_when_locked() {
        let painter = Painter::new(None);
        // Left side of the ring just below its centre, above the body.
        let below_left = (134, 126);
        let locked = render_badge(LockState::Unauthorized, &painter);
        let open = render_badge(LockState::Authorized, &painter);
        assert_eq!(locked.get_pixel(below_left.0, below_left.1), &INK);
        assert_eq!(open.get_pixel(below_left.0, below_left.1), &FACE_COLOR);
        // Top of the shackle is drawn in both states.
        assert_eq!(locked.get_pixel(150, 110), &INK);
        assert_eq!(open.get_pixel(150, 110), &INK);
    }

    #[test]
    fn test_body_outline() {
        let img = render_badge(LockState::Unauthorized, &Painter::new(None));
        assert_eq!(img.get_pixel(120, 165), &INK);
        assert_eq!(img.get_pixel(150, 165), &FACE_COLOR);
    }
}
