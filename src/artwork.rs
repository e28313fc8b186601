//! Decorative frame assets: the note background layer, the clip drawn on top,
//! and the artwork behind note text. Each falls back to a procedural drawing.

use std::path::Path;

use gtk4::cairo;
use image::RgbaImage;

use crate::config::AppConfig;
use crate::geometry::{Insets, Rect, RgbaColor};
use crate::render::{
    append_rounded_rect, paint_cover, paint_stretched, rgba_image_to_surface, set_source_color,
    RenderResult,
};

/// Content padding of the note layer when nothing else is configured.
pub const DEFAULT_FRAME_INSET_DP: f64 = 12.0;

const PAPER: RgbaColor = RgbaColor::opaque(0xFF, 0xF4, 0xB3);
const PAPER_EDGE: RgbaColor = RgbaColor::new(0, 0, 0, 0x22);
const RULE_LINE: RgbaColor = RgbaColor::new(0x6A, 0x8C, 0xC8, 0x40);
const CLIP_FILL: RgbaColor = RgbaColor::new(0x9A, 0x9A, 0xA0, 0xE6);
const CLIP_HIGHLIGHT: RgbaColor = RgbaColor::new(0xFF, 0xFF, 0xFF, 0x66);
const FRAME_RADIUS_DP: f64 = 8.0;
const RULE_SPACING_DP: f64 = 18.0;
const CLIP_HEIGHT_DP: f64 = 14.0;

#[derive(Debug, Clone)]
pub struct FrameArtwork {
    note_layer: Option<RgbaImage>,
    clip_layer: Option<RgbaImage>,
    note_art: Option<RgbaImage>,
    insets_dp: Insets,
}

impl Default for FrameArtwork {
    fn default() -> Self {
        Self::procedural()
    }
}

impl FrameArtwork {
    pub fn procedural() -> Self {
        Self {
            note_layer: None,
            clip_layer: None,
            note_art: None,
            insets_dp: Insets::uniform(DEFAULT_FRAME_INSET_DP),
        }
    }

    /// Loads the configured images; unreadable files fall back to procedural drawing.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            note_layer: config.note_layer_path.as_deref().and_then(load_layer),
            clip_layer: config.clip_layer_path.as_deref().and_then(load_layer),
            note_art: config.note_art_path.as_deref().and_then(load_layer),
            insets_dp: config
                .frame_insets_dp
                .unwrap_or(Insets::uniform(DEFAULT_FRAME_INSET_DP)),
        }
    }

    pub fn with_layers(
        note_layer: Option<RgbaImage>,
        clip_layer: Option<RgbaImage>,
        note_art: Option<RgbaImage>,
        insets_dp: Insets,
    ) -> Self {
        Self {
            note_layer,
            clip_layer,
            note_art,
            insets_dp,
        }
    }

    /// Note layer content padding in pixels.
    pub fn insets(&self, density: f64) -> Insets {
        self.insets_dp.scaled(density)
    }

    pub fn draw_note_layer(
        &self,
        context: &cairo::Context,
        bounds: Rect,
        density: f64,
    ) -> RenderResult<()> {
        if let Some(layer) = &self.note_layer {
            return paint_stretched(context, &rgba_image_to_surface(layer)?, bounds);
        }
        context.save()?;
        append_rounded_rect(context, bounds.translate(0.0, density), FRAME_RADIUS_DP * density);
        set_source_color(context, PAPER_EDGE);
        context.fill()?;
        append_rounded_rect(context, bounds, FRAME_RADIUS_DP * density);
        set_source_color(context, PAPER);
        context.fill()?;
        context.restore()?;
        Ok(())
    }

    /// Cover-fits the note artwork into `target`.
    pub fn draw_note_art(
        &self,
        context: &cairo::Context,
        target: Rect,
        density: f64,
    ) -> RenderResult<()> {
        if let Some(art) = &self.note_art {
            return paint_cover(context, &rgba_image_to_surface(art)?, target);
        }
        context.save()?;
        context.rectangle(target.x, target.y, target.width, target.height);
        context.clip();
        set_source_color(context, PAPER);
        context.paint()?;
        let spacing = (RULE_SPACING_DP * density).max(1.0);
        let mut y = target.top() + spacing;
        set_source_color(context, RULE_LINE);
        context.set_line_width(density.max(0.5));
        while y < target.bottom() {
            context.move_to(target.left(), y);
            context.line_to(target.right(), y);
            y += spacing;
        }
        context.stroke()?;
        context.restore()?;
        Ok(())
    }

    /// Draws the clip anchored to the top edge of `frame`.
    pub fn draw_clip_layer(
        &self,
        context: &cairo::Context,
        frame: Rect,
        density: f64,
    ) -> RenderResult<()> {
        let clip = clip_rect(frame, density);
        if let Some(layer) = &self.clip_layer {
            return paint_stretched(context, &rgba_image_to_surface(layer)?, clip);
        }
        context.save()?;
        append_rounded_rect(context, clip, clip.height / 3.0);
        set_source_color(context, CLIP_FILL);
        context.fill()?;
        let highlight = Rect::new(
            clip.x + clip.width * 0.1,
            clip.y + clip.height * 0.2,
            clip.width * 0.8,
            clip.height * 0.2,
        );
        append_rounded_rect(context, highlight, highlight.height / 2.0);
        set_source_color(context, CLIP_HIGHLIGHT);
        context.fill()?;
        context.restore()?;
        Ok(())
    }
}

/// The clip straddles the frame's top edge, centered horizontally.
pub fn clip_rect(frame: Rect, density: f64) -> Rect {
    let width = frame.width * 0.28;
    let height = (CLIP_HEIGHT_DP * density).min(frame.height / 4.0);
    Rect::new(
        frame.center().x - width / 2.0,
        frame.top() - height / 2.0,
        width,
        height,
    )
}

fn load_layer(path: &Path) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(image) => Some(image.to_rgba8()),
        Err(err) => {
            tracing::warn!(
                ?err,
                path = %path.display(),
                "failed to load frame artwork; drawing fallback"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{create_surface, surface_to_rgba_image};

    #[test]
    fn procedural_insets_scale_with_density() {
        let artwork = FrameArtwork::procedural();
        assert_eq!(artwork.insets(2.0), Insets::uniform(24.0));
    }

    #[test]
    fn configured_insets_override_default() {
        let config = AppConfig {
            frame_insets_dp: Some(Insets::new(4.0, 8.0, 4.0, 16.0)),
            ..AppConfig::default()
        };
        let artwork = FrameArtwork::from_config(&config);
        assert_eq!(artwork.insets(1.0), Insets::new(4.0, 8.0, 4.0, 16.0));
    }

    #[test]
    fn missing_artwork_files_fall_back_to_procedural_layers() {
        let config = AppConfig {
            note_layer_path: Some("/nonexistent/note.png".into()),
            ..AppConfig::default()
        };
        let artwork = FrameArtwork::from_config(&config);
        assert!(artwork.note_layer.is_none());
    }

    #[test]
    fn procedural_note_art_covers_target() {
        let surface = create_surface(40, 50).expect("surface");
        let context = cairo::Context::new(&surface).expect("context");
        FrameArtwork::procedural()
            .draw_note_art(&context, Rect::new(0.0, 0.0, 40.0, 50.0), 1.0)
            .expect("draw");
        drop(context);
        let image = surface_to_rgba_image(&surface).expect("image");
        assert!(image.pixels().all(|pixel| pixel[3] == 255));
    }

    #[test]
    fn clip_rect_sits_on_frame_top_edge() {
        let clip = clip_rect(Rect::new(10.0, 20.0, 100.0, 200.0), 1.0);
        assert!((clip.center().x - 60.0).abs() < 1e-9);
        assert!((clip.center().y - 20.0).abs() < 1e-9);
    }
}
