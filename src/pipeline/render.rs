//! Rendering: lay a [`MenuDocument`] out onto an RGBA surface.
//!
//! The layout mirrors the interactive editor: a centred header (title in
//! orange, restaurant name below), each section as an orange pill heading
//! over a grid of item cards, and a contact footer. Text is drawn with the
//! 8×8 `font8x8` glyphs scaled by integer factors; characters the font
//! lacks render as a blank cell.
//!
//! ## Surface budget
//!
//! The surface height grows with the number of items, and documents arrive
//! from untrusted clients. [`render_menu`] computes the full size first and
//! refuses with [`MenuError::SurfaceTooLarge`] before allocating anything
//! larger than [`RenderOptions::max_pixels`]. Width is clamped to
//! [`MIN_WIDTH`]`..=`[`MAX_WIDTH`].
//!
//! ## Blocking work
//!
//! Decoding and resizing embedded dish photos is CPU-bound. Async callers go
//! through [`render_menu_async`], which runs the render on the blocking
//! pool.

use crate::error::MenuError;
use crate::model::{MenuDocument, MenuItem};
use crate::pipeline::encode::decode_data_uri;
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ── Palette ──────────────────────────────────────────────────────────────────

const BACKGROUND: Rgba<u8> = Rgba([0x11, 0x18, 0x27, 0xff]);
const CARD: Rgba<u8> = Rgba([0x1f, 0x29, 0x37, 0xff]);
const ACCENT: Rgba<u8> = Rgba([0xf9, 0x73, 0x16, 0xff]);
const TEXT: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const TILE: Rgba<u8> = Rgba([0x37, 0x41, 0x51, 0xff]);
const TILE_MARK: Rgba<u8> = Rgba([0x4b, 0x55, 0x63, 0xff]);
const PLACEHOLDER: Rgba<u8> = Rgba([0xd1, 0xd5, 0xdb, 0xff]);

// ── Metrics (px) ─────────────────────────────────────────────────────────────

const GLYPH: u32 = 8;
const PADDING: u32 = 48;
const GAP: u32 = 32;

const TITLE_SCALE: u32 = 7;
const RESTAURANT_SCALE: u32 = 3;
const HEADER_GAP: u32 = 16;
const HEADER_HEIGHT: u32 =
    PADDING + GLYPH * TITLE_SCALE + HEADER_GAP + GLYPH * RESTAURANT_SCALE + 48;

const PILL_SCALE: u32 = 3;
const PILL_PAD_X: u32 = 24;
const PILL_PAD_Y: u32 = 12;
const PILL_HEIGHT: u32 = GLYPH * PILL_SCALE + 2 * PILL_PAD_Y;
const PILL_MARGIN: u32 = 32;

const TILE_HEIGHT: u32 = 160;
const TILE_MARK_SIZE: u32 = 48;
const CARD_PAD: u32 = 16;
const CARD_RADIUS: u32 = 8;
const NAME_SCALE: u32 = 3;
const PRICE_SCALE: u32 = 2;
const CARD_HEIGHT: u32 =
    TILE_HEIGHT + CARD_PAD + GLYPH * NAME_SCALE + 8 + GLYPH * PRICE_SCALE + CARD_PAD;

const SECTION_MARGIN: u32 = 64;

const PHONE_SCALE: u32 = 3;
const ADDRESS_SCALE: u32 = 2;
const FOOTER_PAD: u32 = 32;
const FOOTER_HEIGHT: u32 = FOOTER_PAD + GLYPH * PHONE_SCALE + 12 + GLYPH * ADDRESS_SCALE + FOOTER_PAD;

/// Narrowest surface that still fits three readable cards per row.
pub const MIN_WIDTH: u32 = 600;

/// Widest surface that will be rendered.
pub const MAX_WIDTH: u32 = 4000;

/// Default pixel budget: 32 Mpx, 128 MiB of RGBA.
pub const MAX_SURFACE_PIXELS: u64 = 32 * 1024 * 1024;

/// Options for [`render_menu`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Surface width in pixels; clamped to [`MIN_WIDTH`]`..=`[`MAX_WIDTH`].
    pub width: u32,
    /// Item cards per grid row.
    pub columns: u32,
    /// Largest surface, in pixels, that will be allocated.
    pub max_pixels: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            columns: 3,
            max_pixels: MAX_SURFACE_PIXELS,
        }
    }
}

/// A rendered menu surface, ready for export.
#[derive(Debug, Clone)]
pub struct RenderedMenu {
    image: RgbaImage,
}

impl RenderedMenu {
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// A zero-sized surface has nothing to export.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

/// Render a document onto a fresh surface.
///
/// Fails with [`MenuError::SurfaceTooLarge`] when the document needs more
/// than `options.max_pixels`.
pub fn render_menu(doc: &MenuDocument, options: &RenderOptions) -> Result<RenderedMenu, MenuError> {
    let layout = Layout::new(options);
    let height = checked_height(&layout, doc, options.max_pixels)?;
    let mut img = RgbaImage::from_pixel(layout.width, height, BACKGROUND);

    // Header
    let inner = layout.content_width();
    let (title, scale) = fit_text(&doc.title, inner, TITLE_SCALE, 3);
    draw_text_centered(&mut img, PADDING, inner, PADDING, &title, scale, ACCENT);
    let (restaurant, scale) = fit_text(&doc.restaurant_name, inner, RESTAURANT_SCALE, 2);
    let y = PADDING + GLYPH * TITLE_SCALE + HEADER_GAP;
    draw_text_centered(&mut img, PADDING, inner, y, &restaurant, scale, TEXT);

    // Sections
    let mut top = HEADER_HEIGHT;
    for section in &doc.sections {
        let (name, scale) = fit_text(&section.name, inner - 2 * PILL_PAD_X, PILL_SCALE, 2);
        let pill_width = text_width(&name, scale) + 2 * PILL_PAD_X;
        fill_rounded_rect(
            &mut img,
            PADDING,
            top,
            pill_width,
            PILL_HEIGHT,
            PILL_HEIGHT / 2,
            ACCENT,
        );
        draw_text(&mut img, PADDING + PILL_PAD_X, top + PILL_PAD_Y, &name, scale, TEXT);

        for (i, item) in section.items.iter().enumerate() {
            let (x, y) = layout.card_origin(top, i);
            draw_card(&mut img, &layout, x, y, item);
        }
        // Bounded by the checked surface height.
        top += layout.section_height(section.items.len()) as u32 + SECTION_MARGIN;
    }

    // Footer
    fill_rounded_rect(&mut img, PADDING, top, inner, FOOTER_HEIGHT, CARD_RADIUS, CARD);
    let (phone, scale) = fit_text(&doc.contact.phone, inner - 2 * CARD_PAD, PHONE_SCALE, 2);
    draw_text_centered(&mut img, PADDING, inner, top + FOOTER_PAD, &phone, scale, ACCENT);
    let (address, scale) = fit_text(&doc.contact.address, inner - 2 * CARD_PAD, ADDRESS_SCALE, 1);
    let y = top + FOOTER_PAD + GLYPH * PHONE_SCALE + 12;
    draw_text_centered(&mut img, PADDING, inner, y, &address, scale, TEXT);

    info!(
        "Rendered menu: {}x{} px, {} sections",
        img.width(),
        img.height(),
        doc.sections.len()
    );
    Ok(RenderedMenu { image: img })
}

fn checked_height(layout: &Layout, doc: &MenuDocument, max_pixels: u64) -> Result<u32, MenuError> {
    let height = layout.total_height(doc);
    let too_large = || MenuError::SurfaceTooLarge {
        width: layout.width,
        height,
        max_pixels,
    };
    if u64::from(layout.width).saturating_mul(height) > max_pixels {
        warn!(
            "Refusing {}x{} px surface ({} items)",
            layout.width,
            height,
            doc.item_count()
        );
        return Err(too_large());
    }
    u32::try_from(height).map_err(|_| too_large())
}

/// Render on the blocking pool.
pub async fn render_menu_async(
    doc: Arc<MenuDocument>,
    options: RenderOptions,
) -> Result<RenderedMenu, MenuError> {
    tokio::task::spawn_blocking(move || render_menu(&doc, &options))
        .await
        .map_err(|e| MenuError::Internal(format!("Render task panicked: {}", e)))?
}

/// Flat grey image served for the placeholder URI.
pub fn placeholder_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, PLACEHOLDER)
}

// ── Layout ───────────────────────────────────────────────────────────────────

struct Layout {
    width: u32,
    columns: u32,
}

impl Layout {
    fn new(options: &RenderOptions) -> Self {
        Self {
            width: options.width.clamp(MIN_WIDTH, MAX_WIDTH),
            columns: options.columns.clamp(1, 6),
        }
    }

    fn content_width(&self) -> u32 {
        self.width - 2 * PADDING
    }

    fn card_width(&self) -> u32 {
        (self.content_width() - (self.columns - 1) * GAP) / self.columns
    }

    // Heights are u64 so oversized documents are measured, not wrapped.
    fn grid_height(&self, items: usize) -> u64 {
        let rows = (items as u64).div_ceil(u64::from(self.columns));
        match rows {
            0 => 0,
            n => n * u64::from(CARD_HEIGHT) + (n - 1) * u64::from(GAP),
        }
    }

    fn section_height(&self, items: usize) -> u64 {
        u64::from(PILL_HEIGHT + PILL_MARGIN) + self.grid_height(items)
    }

    fn total_height(&self, doc: &MenuDocument) -> u64 {
        let sections: u64 = doc
            .sections
            .iter()
            .map(|s| self.section_height(s.items.len()) + u64::from(SECTION_MARGIN))
            .sum();
        u64::from(HEADER_HEIGHT + FOOTER_HEIGHT + PADDING) + sections
    }

    fn card_origin(&self, section_top: u32, index: usize) -> (u32, u32) {
        let col = index as u32 % self.columns;
        let row = index as u32 / self.columns;
        (
            PADDING + col * (self.card_width() + GAP),
            section_top + PILL_HEIGHT + PILL_MARGIN + row * (CARD_HEIGHT + GAP),
        )
    }
}

fn draw_card(img: &mut RgbaImage, layout: &Layout, x: u32, y: u32, item: &MenuItem) {
    let w = layout.card_width();
    fill_rounded_rect(img, x, y, w, CARD_HEIGHT, CARD_RADIUS, CARD);

    match load_tile(&item.image, w) {
        Some(tile) => imageops::overlay(img, &tile, x as i64, y as i64),
        None => {
            fill_rect(img, x, y, w, TILE_HEIGHT, TILE);
            fill_rect(
                img,
                x + (w - TILE_MARK_SIZE) / 2,
                y + (TILE_HEIGHT - TILE_MARK_SIZE) / 2,
                TILE_MARK_SIZE,
                TILE_MARK_SIZE,
                TILE_MARK,
            );
        }
    }

    let text_x = x + CARD_PAD;
    let max = w - 2 * CARD_PAD;
    let (name, scale) = fit_text(&item.name, max, NAME_SCALE, 2);
    draw_text(img, text_x, y + TILE_HEIGHT + CARD_PAD, &name, scale, TEXT);
    let (price, scale) = fit_text(&item.price, max, PRICE_SCALE, 1);
    let price_y = y + TILE_HEIGHT + CARD_PAD + GLYPH * NAME_SCALE + 8;
    draw_text(img, text_x, price_y, &price, scale, ACCENT);
}

/// Decode a `data:` URI photo and crop-scale it to the tile. Anything else
/// (placeholder path, remote URL, undecodable bytes) yields `None`.
fn load_tile(uri: &str, width: u32) -> Option<RgbaImage> {
    let (_, bytes) = decode_data_uri(uri)?;
    match image::load_from_memory(&bytes) {
        Ok(photo) => Some(
            photo
                .resize_to_fill(width, TILE_HEIGHT, FilterType::Triangle)
                .to_rgba8(),
        ),
        Err(e) => {
            debug!("Embedded item image not decodable: {}", e);
            None
        }
    }
}

// ── Primitives ───────────────────────────────────────────────────────────────

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .unwrap_or([0; 8])
}

fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH * scale
}

/// Shrink the scale down to `min_scale` until `text` fits `max_width`, then
/// truncate with "..." if it still does not.
fn fit_text(text: &str, max_width: u32, scale: u32, min_scale: u32) -> (String, u32) {
    let chars = text.chars().count() as u32;
    let mut scale = scale;
    while scale > min_scale && chars * GLYPH * scale > max_width {
        scale -= 1;
    }
    let max_chars = (max_width / (GLYPH * scale)) as usize;
    if chars as usize <= max_chars {
        return (text.to_string(), scale);
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    (kept + "...", scale)
}

fn draw_text(img: &mut RgbaImage, x: u32, y: u32, text: &str, scale: u32, color: Rgba<u8>) {
    let mut cx = x;
    for c in text.chars() {
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH {
                if bits & (1 << col) != 0 {
                    fill_rect(
                        img,
                        cx + col * scale,
                        y + row as u32 * scale,
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
        cx += GLYPH * scale;
    }
}

fn draw_text_centered(
    img: &mut RgbaImage,
    left: u32,
    width: u32,
    y: u32,
    text: &str,
    scale: u32,
    color: Rgba<u8>,
) {
    let x = left + width.saturating_sub(text_width(text, scale)) / 2;
    draw_text(img, x, y, text, scale, color);
}

/// Fill a rectangle, clipped to the surface.
fn fill_rect(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    let x_end = x.saturating_add(w).min(img.width());
    let y_end = y.saturating_add(h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

fn fill_rounded_rect(
    img: &mut RgbaImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    radius: u32,
    color: Rgba<u8>,
) {
    let r = radius.min(w / 2).min(h / 2) as f32;
    let (left, top) = (x as f32, y as f32);
    let (right, bottom) = ((x + w) as f32, (y + h) as f32);
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            let (fx, fy) = (px as f32 + 0.5, py as f32 + 0.5);
            let cx = fx.clamp(left + r, right - r);
            let cy = fy.clamp(top + r, bottom - r);
            if (fx - cx).powi(2) + (fy - cy).powi(2) <= r * r {
                img.put_pixel(px, py, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{item, lunch_menu};
    use crate::model::{ItemId, MenuSection, SectionId};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::io::Cursor;

    fn red_png_data_uri() -> String {
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(buf.into_inner()))
    }

    fn single_item_menu(image: &str) -> MenuDocument {
        let mut doc = lunch_menu();
        doc.sections = vec![Arc::new(MenuSection {
            id: SectionId(0),
            name: "Mains".into(),
            items: vec![Arc::new(MenuItem {
                id: ItemId(0),
                name: "Burger".into(),
                price: "$10".into(),
                image: image.into(),
            })],
        })];
        doc
    }

    fn tile_centre(options: &RenderOptions) -> (u32, u32) {
        let layout = Layout::new(options);
        let (x, y) = layout.card_origin(HEADER_HEIGHT, 0);
        (x + layout.card_width() / 2, y + TILE_HEIGHT / 2)
    }

    #[test]
    fn surface_has_requested_width_and_background() {
        let out = render_menu(&lunch_menu(), &RenderOptions::default()).unwrap();
        assert_eq!(out.width(), 1200);
        assert!(!out.is_empty());
        assert_eq!(*out.image().get_pixel(0, 0), BACKGROUND);
    }

    #[test]
    fn height_grows_with_rows() {
        let options = RenderOptions::default();
        let small = render_menu(&lunch_menu(), &options).unwrap();
        let mut doc = lunch_menu();
        Arc::make_mut(&mut doc.sections[1])
            .items
            .extend((10..14).map(|i| item(i, "Tea", "$2")));
        let large = render_menu(&doc, &options).unwrap();
        assert_eq!(large.height(), small.height() + CARD_HEIGHT + GAP);
    }

    fn crowded_menu(items: u32) -> MenuDocument {
        let mut doc = lunch_menu();
        Arc::make_mut(&mut doc.sections[0])
            .items
            .extend((100..100 + items).map(|i| item(i, "Tea", "$2")));
        doc
    }

    #[test]
    fn oversized_surface_is_refused_before_allocation() {
        let err = render_menu(&crowded_menu(10_000), &RenderOptions::default()).unwrap_err();
        match err {
            MenuError::SurfaceTooLarge {
                width,
                height,
                max_pixels,
            } => {
                assert_eq!(width, 1200);
                assert_eq!(max_pixels, MAX_SURFACE_PIXELS);
                assert!(u64::from(width) * height > max_pixels);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pixel_budget_is_configurable() {
        let tight = RenderOptions {
            max_pixels: 1200 * 100,
            ..RenderOptions::default()
        };
        assert!(matches!(
            render_menu(&lunch_menu(), &tight),
            Err(MenuError::SurfaceTooLarge { .. })
        ));
        let exact = render_menu(&lunch_menu(), &RenderOptions::default()).unwrap();
        let fits = RenderOptions {
            max_pixels: u64::from(exact.width()) * u64::from(exact.height()),
            ..RenderOptions::default()
        };
        assert!(render_menu(&lunch_menu(), &fits).is_ok());
    }

    #[test]
    fn wide_width_is_clamped() {
        let out = render_menu(
            &lunch_menu(),
            &RenderOptions {
                width: u32::MAX,
                ..RenderOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out.width(), MAX_WIDTH);
    }

    #[test]
    fn narrow_width_is_clamped() {
        let out = render_menu(
            &lunch_menu(),
            &RenderOptions {
                width: 100,
                ..RenderOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out.width(), MIN_WIDTH);
    }

    #[test]
    fn section_heading_is_an_orange_pill() {
        let out = render_menu(&lunch_menu(), &RenderOptions::default()).unwrap();
        let px = out
            .image()
            .get_pixel(PADDING + PILL_PAD_X - 4, HEADER_HEIGHT + PILL_HEIGHT / 2);
        assert_eq!(*px, ACCENT);
    }

    #[test]
    fn data_uri_image_fills_tile() {
        let options = RenderOptions::default();
        let out = render_menu(&single_item_menu(&red_png_data_uri()), &options).unwrap();
        let (x, y) = tile_centre(&options);
        assert_eq!(*out.image().get_pixel(x, y), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn other_uris_draw_placeholder_tile() {
        let options = RenderOptions::default();
        for uri in ["/api/placeholder/200/200", "https://example.com/a.png"] {
            let out = render_menu(&single_item_menu(uri), &options).unwrap();
            let (x, y) = tile_centre(&options);
            assert_eq!(*out.image().get_pixel(x, y), TILE_MARK, "uri {uri}");
        }
    }

    #[test]
    fn long_text_is_shrunk_then_truncated() {
        let (text, scale) = fit_text("Burger", 200, 3, 2);
        assert_eq!((text.as_str(), scale), ("Burger", 3));

        let (text, scale) = fit_text("Double Cheeseburger", 128, 3, 2);
        assert_eq!(scale, 2);
        assert_eq!(text, "Doubl...");
    }

    #[test]
    fn unknown_glyph_is_blank() {
        assert_eq!(glyph('\u{4e2d}'), [0; 8]);
        assert_ne!(glyph('A'), [0; 8]);
    }

    #[test]
    fn placeholder_image_is_flat() {
        let img = placeholder_image(3, 2);
        assert_eq!(img.dimensions(), (3, 2));
        assert!(img.pixels().all(|p| *p == PLACEHOLDER));
    }

    #[tokio::test]
    async fn async_render_matches_sync() {
        let doc = Arc::new(lunch_menu());
        let options = RenderOptions::default();
        let a = render_menu_async(doc.clone(), options).await.unwrap();
        let b = render_menu(&doc, &options).unwrap();
        assert_eq!(a.image().as_raw(), b.image().as_raw());
    }
}
