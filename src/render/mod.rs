//! Cairo drawing helpers shared by the preview editor and the compositor.

use gtk4::cairo;
use image::RgbaImage;
use thiserror::Error;

use crate::caption::{
    CaptionLayout, CaptionStyle, FontFace, TextMeasure, BUBBLE_FILL, TEXT_SHADOW,
};
use crate::geometry::{cover_fit, Affine, Rect, RgbaColor};

const TEXT_SHADOW_OFFSET_DP: f64 = 1.5;
const FALLBACK_ADVANCE_RATIO: f64 = 0.62;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cairo error: {0}")]
    Cairo(#[from] cairo::Error),
    #[error("surface data unavailable: {0}")]
    SurfaceData(#[from] cairo::BorrowError),
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("pixel buffer does not match surface layout")]
    PixelLayout,
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;

pub fn create_surface(width: u32, height: u32) -> RenderResult<cairo::ImageSurface> {
    let invalid = || RenderError::InvalidSize { width, height };
    let surface_width = i32::try_from(width).map_err(|_| invalid())?;
    let surface_height = i32::try_from(height).map_err(|_| invalid())?;
    if surface_width == 0 || surface_height == 0 {
        return Err(invalid());
    }
    Ok(cairo::ImageSurface::create(
        cairo::Format::ARgb32,
        surface_width,
        surface_height,
    )?)
}

/// Measures text with cairo's toy font API on a scratch context.
pub struct CairoTextMeasure {
    context: cairo::Context,
}

impl CairoTextMeasure {
    pub fn new() -> RenderResult<Self> {
        let surface = create_surface(1, 1)?;
        let context = cairo::Context::new(&surface)?;
        Ok(Self { context })
    }
}

impl std::fmt::Debug for CairoTextMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CairoTextMeasure").finish_non_exhaustive()
    }
}

impl TextMeasure for CairoTextMeasure {
    fn advance(&self, face: &FontFace, text: &str, font_px: f64) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        select_face(&self.context, face, font_px);
        self.context
            .text_extents(text)
            .map(|extents| extents.x_advance())
            .unwrap_or_else(|_| text.chars().count() as f64 * font_px * FALLBACK_ADVANCE_RATIO)
    }
}

pub(crate) fn select_face(context: &cairo::Context, face: &FontFace, font_px: f64) {
    let weight = if face.bold {
        cairo::FontWeight::Bold
    } else {
        cairo::FontWeight::Normal
    };
    context.select_font_face(&face.family, cairo::FontSlant::Normal, weight);
    context.set_font_size(font_px.max(1.0));
}

pub fn set_source_color(context: &cairo::Context, color: RgbaColor) {
    let (red, green, blue, alpha) = color.to_cairo_rgba();
    context.set_source_rgba(red, green, blue, alpha);
}

pub fn affine_matrix(transform: Affine) -> cairo::Matrix {
    cairo::Matrix::new(
        transform.xx,
        transform.yx,
        transform.xy,
        transform.yy,
        transform.x0,
        transform.y0,
    )
}

pub fn append_rounded_rect(context: &cairo::Context, rect: Rect, radius: f64) {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return;
    }
    let radius = radius.clamp(0.0, rect.width.min(rect.height) / 2.0);
    if radius <= 0.0 {
        context.rectangle(rect.x, rect.y, rect.width, rect.height);
        return;
    }

    let (left, top, right, bottom) = (rect.left(), rect.top(), rect.right(), rect.bottom());
    context.new_sub_path();
    context.arc(
        right - radius,
        top + radius,
        radius,
        -std::f64::consts::FRAC_PI_2,
        0.0,
    );
    context.arc(
        right - radius,
        bottom - radius,
        radius,
        0.0,
        std::f64::consts::FRAC_PI_2,
    );
    context.arc(
        left + radius,
        bottom - radius,
        radius,
        std::f64::consts::FRAC_PI_2,
        std::f64::consts::PI,
    );
    context.arc(
        left + radius,
        top + radius,
        radius,
        std::f64::consts::PI,
        std::f64::consts::PI * 1.5,
    );
    context.close_path();
}

/// Premultiplied BGRA copy of an RGBA image.
pub fn rgba_image_to_surface(image: &RgbaImage) -> RenderResult<cairo::ImageSurface> {
    let mut surface = create_surface(image.width(), image.height())?;
    let stride = usize::try_from(surface.stride()).map_err(|_| RenderError::PixelLayout)?;
    let row_len = usize::try_from(image.width())
        .ok()
        .and_then(|width| width.checked_mul(4))
        .ok_or(RenderError::PixelLayout)?;

    {
        let mut data = surface.data()?;
        for (row, src_row) in image.as_raw().chunks_exact(row_len).enumerate() {
            let offset = row.checked_mul(stride).ok_or(RenderError::PixelLayout)?;
            let dst_row = data
                .get_mut(offset..offset + row_len)
                .ok_or(RenderError::PixelLayout)?;
            for (src, dst) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                let [r, g, b, a] = [src[0], src[1], src[2], src[3]];
                let premultiply =
                    |channel: u8| ((u16::from(channel) * u16::from(a) + 127) / 255) as u8;
                match a {
                    0 => dst.copy_from_slice(&[0, 0, 0, 0]),
                    255 => dst.copy_from_slice(&[b, g, r, 255]),
                    _ => dst.copy_from_slice(&[premultiply(b), premultiply(g), premultiply(r), a]),
                }
            }
        }
    }

    surface.mark_dirty();
    Ok(surface)
}

/// Straight-alpha RGBA copy of a cairo surface.
pub fn surface_to_rgba_image(surface: &cairo::ImageSurface) -> RenderResult<RgbaImage> {
    surface.flush();
    let width = u32::try_from(surface.width()).map_err(|_| RenderError::PixelLayout)?;
    let height = u32::try_from(surface.height()).map_err(|_| RenderError::PixelLayout)?;
    let stride = usize::try_from(surface.stride()).map_err(|_| RenderError::PixelLayout)?;
    let row_len = usize::try_from(width).map_err(|_| RenderError::PixelLayout)? * 4;

    let mut rgba = Vec::with_capacity(row_len * height as usize);
    let mut layout_ok = true;
    surface.with_data(|data| {
        for row in 0..height as usize {
            let offset = row * stride;
            let Some(src_row) = data.get(offset..offset + row_len) else {
                layout_ok = false;
                return;
            };
            for pixel in src_row.chunks_exact(4) {
                let [b, g, r, a] = [pixel[0], pixel[1], pixel[2], pixel[3]];
                let unpremultiply = |channel: u8| {
                    if a == 0 {
                        0
                    } else {
                        ((u16::from(channel) * 255 + u16::from(a) / 2) / u16::from(a)).min(255)
                            as u8
                    }
                };
                rgba.extend_from_slice(&[unpremultiply(r), unpremultiply(g), unpremultiply(b), a]);
            }
        }
    })?;

    if !layout_ok {
        return Err(RenderError::PixelLayout);
    }
    RgbaImage::from_raw(width, height, rgba).ok_or(RenderError::PixelLayout)
}

fn surface_size(surface: &cairo::ImageSurface) -> (f64, f64) {
    (
        f64::from(surface.width().max(1)),
        f64::from(surface.height().max(1)),
    )
}

/// Stretches the whole surface onto `dest`.
pub fn paint_stretched(
    context: &cairo::Context,
    surface: &cairo::ImageSurface,
    dest: Rect,
) -> RenderResult<()> {
    let (width, height) = surface_size(surface);
    context.save()?;
    context.translate(dest.x, dest.y);
    context.scale(dest.width / width, dest.height / height);
    context.set_source_surface(surface, 0.0, 0.0)?;
    context.paint()?;
    context.restore()?;
    Ok(())
}

/// Covers `target` with the surface without distortion, clipped to `target`.
pub fn paint_cover(
    context: &cairo::Context,
    surface: &cairo::ImageSurface,
    target: Rect,
) -> RenderResult<()> {
    let (width, height) = surface_size(surface);
    let dest = cover_fit(target, width / height);
    context.save()?;
    context.rectangle(target.x, target.y, target.width, target.height);
    context.clip();
    paint_stretched(context, surface, dest)?;
    context.restore()?;
    Ok(())
}

/// Draws the surface through `transform` (source pixels to device), clipped to `clip`.
pub fn paint_transformed(
    context: &cairo::Context,
    surface: &cairo::ImageSurface,
    transform: Affine,
    clip: Rect,
) -> RenderResult<()> {
    context.save()?;
    context.rectangle(clip.x, clip.y, clip.width, clip.height);
    context.clip();
    context.transform(affine_matrix(transform));
    context.set_source_surface(surface, 0.0, 0.0)?;
    context.source().set_filter(cairo::Filter::Good);
    context.paint()?;
    context.restore()?;
    Ok(())
}

/// Dims `outer` outside `window`, then outlines `window`.
pub fn draw_crop_overlay(
    context: &cairo::Context,
    outer: Rect,
    window: Rect,
    dim: RgbaColor,
    stroke_width: f64,
) -> RenderResult<()> {
    context.save()?;
    context.set_fill_rule(cairo::FillRule::EvenOdd);
    context.rectangle(outer.x, outer.y, outer.width, outer.height);
    context.rectangle(window.x, window.y, window.width, window.height);
    set_source_color(context, dim);
    context.fill()?;

    let half = stroke_width / 2.0;
    context.rectangle(
        window.x + half,
        window.y + half,
        (window.width - stroke_width).max(0.0),
        (window.height - stroke_width).max(0.0),
    );
    context.set_line_width(stroke_width);
    set_source_color(context, RgbaColor::opaque(0xFF, 0xFF, 0xFF));
    context.stroke()?;
    context.restore()?;
    Ok(())
}

/// Draws a laid-out caption: optional bubble, then centered lines.
pub fn draw_caption(
    context: &cairo::Context,
    layout: &CaptionLayout,
    density: f64,
) -> RenderResult<()> {
    context.save()?;
    if layout.style == CaptionStyle::Bubble {
        append_rounded_rect(context, layout.box_rect, layout.corner_radius);
        set_source_color(context, BUBBLE_FILL);
        context.fill()?;
    }

    context.rectangle(
        layout.box_rect.x,
        layout.box_rect.y,
        layout.box_rect.width,
        layout.box_rect.height,
    );
    context.clip();
    select_face(context, &layout.face, layout.font_px);
    let font = context.font_extents()?;
    let glyph_height = font.ascent() + font.descent();
    let baseline_offset = (layout.line_height - glyph_height) / 2.0 + font.ascent();
    let shadow_offset = TEXT_SHADOW_OFFSET_DP * density;

    for (index, line) in layout.lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let advance = context.text_extents(line)?.x_advance();
        let x = layout.text_rect.x + (layout.text_rect.width - advance) / 2.0;
        let y = layout.text_rect.y + index as f64 * layout.line_height + baseline_offset;
        if layout.style == CaptionStyle::Bubble {
            set_source_color(context, TEXT_SHADOW);
            context.move_to(x, y + shadow_offset);
            context.show_text(line)?;
        }
        set_source_color(context, layout.style.text_color());
        context.move_to(x, y);
        context.show_text(line)?;
    }
    context.restore()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn rgba_surface_round_trip_preserves_opaque_and_transparent_pixels() {
        let mut image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        image.put_pixel(1, 1, Rgba([0, 0, 0, 0]));
        let surface = rgba_image_to_surface(&image).expect("surface");
        let back = surface_to_rgba_image(&surface).expect("image");
        assert_eq!(back.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
        assert_eq!(back.get_pixel(1, 1), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn create_surface_rejects_empty_dimensions() {
        assert!(matches!(
            create_surface(0, 10),
            Err(RenderError::InvalidSize {
                width: 0,
                height: 10
            })
        ));
    }

    #[test]
    fn cairo_measure_grows_with_text_and_font_size() {
        let measure = CairoTextMeasure::new().expect("measure");
        let face = FontFace::default();
        let short = measure.advance(&face, "ab", 20.0);
        let long = measure.advance(&face, "abcd", 20.0);
        let large = measure.advance(&face, "ab", 40.0);
        assert!(long > short);
        assert!(large > short);
        assert_eq!(measure.advance(&face, "", 20.0), 0.0);
    }

    #[test]
    fn crop_overlay_dims_outside_and_keeps_window_clear() {
        let surface = create_surface(20, 20).expect("surface");
        let context = cairo::Context::new(&surface).expect("context");
        draw_crop_overlay(
            &context,
            Rect::new(0.0, 0.0, 20.0, 20.0),
            Rect::new(5.0, 5.0, 10.0, 10.0),
            RgbaColor::new(0, 0, 0, 0x99),
            1.0,
        )
        .expect("overlay");
        drop(context);
        let image = surface_to_rgba_image(&surface).expect("image");
        assert_eq!(image.get_pixel(1, 1)[3], 0x99);
        assert_eq!(image.get_pixel(10, 10)[3], 0);
        assert_eq!(image.get_pixel(5, 10), &Rgba([255, 255, 255, 255]));
    }
}
