//! Offline rasterization of a persisted note into the widget bitmap.
//!
//! Layout goes through [`StageGeometry::compute`] exactly like the preview
//! editor, so stage, crop window and caption box match what the user saw.

use gtk4::cairo;
use image::RgbaImage;

use crate::artwork::FrameArtwork;
use crate::caption::{CaptionRequest, TextMeasure};
use crate::config::AppConfig;
use crate::geometry::{
    fit_aspect_inside, shrink_to_fit_rotation, Affine, Insets, Rect, RgbaColor, Size,
    TARGET_ASPECT,
};
use crate::note::{Mode, PersistedNoteState};
use crate::render::{
    affine_matrix, append_rounded_rect, create_surface, draw_caption, paint_transformed,
    rgba_image_to_surface, set_source_color, surface_to_rgba_image, RenderResult,
};
use crate::stage::{
    photo_transform, CropSelection, PhotoFraming, StageGeometry, StageInputs, StageStyle,
};

const NOTE_INSET_DP: f64 = 6.0;

const CARD_OFFSET_Y_DP: f64 = 10.0;
const CARD_RADIUS_DP: f64 = 10.0;
const CARD_PADDING_DP: f64 = 10.0;
const CARD_BOTTOM_STRIP_DP: f64 = 50.0;
const CARD_STROKE_DP: f64 = 1.25;
const CARD_FILL: RgbaColor = RgbaColor::opaque(0xFF, 0xFF, 0xFF);
const CARD_STROKE: RgbaColor = RgbaColor::new(0, 0, 0, 40);
const PHOTO_RADIUS_DP: f64 = 8.0;
const PHOTO_STROKE_DP: f64 = 1.0;
const PHOTO_STROKE: RgbaColor = RgbaColor::opaque(0xFF, 0xFF, 0xFF);

const OVERLAY_GAP_DP: f64 = 8.0;
const MIN_TOUCH_TARGET_DP: f64 = 44.0;

/// Pixel size of the bitmap the host asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// Placement of the host's button overlay relative to the drawn frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayLayout {
    /// Padding from each target edge to the overlay area.
    pub padding: Insets,
    pub area: Rect,
    pub toggle_visible: bool,
}

impl OverlayLayout {
    pub fn for_frame(target: Rect, frame: Rect, density: f64) -> Self {
        let gap = OVERLAY_GAP_DP * density;
        let area = frame.inset_uniform(gap);
        let padding = Insets::new(
            (area.left() - target.left()).max(0.0),
            (area.top() - target.top()).max(0.0),
            (target.right() - area.right()).max(0.0),
            (target.bottom() - area.bottom()).max(0.0),
        );
        let toggle_visible =
            frame.width.min(frame.height) >= (MIN_TOUCH_TARGET_DP + OVERLAY_GAP_DP) * density;
        Self {
            padding,
            area,
            toggle_visible,
        }
    }
}

/// Geometry of one composition, computed before any drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionLayout {
    /// Mode actually rendered; photo falls back to note without a decodable image.
    pub mode: Mode,
    pub geometry: StageGeometry,
    /// Bounds of the note frame layer, clamped to the target.
    pub frame: Rect,
    pub overlay: OverlayLayout,
}

#[derive(Debug, Clone)]
pub struct RenderedNote {
    pub image: RgbaImage,
    pub layout: CompositionLayout,
}

pub struct Compositor {
    style: StageStyle,
    artwork: FrameArtwork,
    card_tilt_degrees: f64,
    measure: Box<dyn TextMeasure>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("style", &self.style)
            .field("card_tilt_degrees", &self.card_tilt_degrees)
            .finish_non_exhaustive()
    }
}

impl Compositor {
    pub fn new(
        style: StageStyle,
        artwork: FrameArtwork,
        card_tilt_degrees: f64,
        measure: Box<dyn TextMeasure>,
    ) -> Self {
        Self {
            style,
            artwork,
            card_tilt_degrees,
            measure,
        }
    }

    pub fn from_config(config: &AppConfig, measure: Box<dyn TextMeasure>) -> Self {
        Self::new(
            StageStyle::from_config(config),
            FrameArtwork::from_config(config),
            config.card_tilt_degrees,
            measure,
        )
    }

    pub fn style(&self) -> &StageStyle {
        &self.style
    }

    /// Computes where everything goes without rasterizing.
    pub fn layout(
        &self,
        state: &PersistedNoteState,
        photo_size: Option<Size>,
        target: RenderTarget,
    ) -> CompositionLayout {
        let mode = match (state.effective_mode(), photo_size) {
            (Mode::Photo, Some(_)) => Mode::Photo,
            (Mode::Photo, None) => {
                tracing::warn!("photo unavailable; rendering note instead");
                Mode::Note
            }
            (Mode::Note, _) => Mode::Note,
        };

        let caption_style = StageStyle::caption_style(mode);
        let (text, position) = match mode {
            Mode::Photo => (state.caption_text.as_str(), state.caption_position),
            Mode::Note => (state.note_text.as_str(), state.note_position),
        };
        let inputs = StageInputs {
            mode,
            caption: Some(CaptionRequest {
                text,
                size_sp: state.caption_size_sp,
                position,
                style: caption_style,
                face: self.style.face(caption_style),
            }),
            photo: photo_size.map(|source| PhotoFraming {
                source,
                crop: CropSelection::from_persisted(state.crop, state.zoom),
                rotation_degrees: state.rotation_degrees,
            }),
        };

        let bounds = target.bounds();
        let insets = self.artwork.insets(self.style.density);
        let geometry = StageGeometry::compute(
            bounds,
            insets,
            &inputs,
            &self.style.metrics(),
            self.measure.as_ref(),
        );
        // Same frame in both modes: the inset stage plus frame insets.
        let frame = self
            .note_stage(&geometry)
            .outset(insets)
            .intersect(&bounds);
        let overlay = OverlayLayout::for_frame(bounds, frame, self.style.density);

        CompositionLayout {
            mode,
            geometry,
            frame,
            overlay,
        }
    }

    fn note_stage(&self, geometry: &StageGeometry) -> Rect {
        geometry.stage.inset_uniform(self.style.dp(NOTE_INSET_DP))
    }

    /// Renders `state` into a fresh bitmap of `target` size.
    pub fn render(
        &self,
        state: &PersistedNoteState,
        photo: Option<&RgbaImage>,
        target: RenderTarget,
    ) -> RenderResult<RenderedNote> {
        let photo = photo.filter(|image| image.width() > 0 && image.height() > 0);
        let photo_size =
            photo.map(|image| Size::new(f64::from(image.width()), f64::from(image.height())));
        let layout = self.layout(state, photo_size, target);
        tracing::debug!(
            mode = layout.mode.as_str(),
            width = target.width,
            height = target.height,
            "compositing note"
        );

        let surface = create_surface(target.width, target.height)?;
        {
            let context = cairo::Context::new(&surface)?;
            let density = self.style.density;
            self.artwork
                .draw_note_layer(&context, layout.frame, density)?;

            match (layout.mode, photo, layout.geometry.crop_window) {
                (Mode::Photo, Some(photo), Some(window)) => {
                    self.draw_photo_card(&context, &layout.geometry, photo, window, state)?;
                }
                _ => {
                    let inner = self.note_stage(&layout.geometry);
                    self.artwork.draw_note_art(&context, inner, density)?;
                }
            }

            if let Some(caption) = layout.geometry.caption.as_ref() {
                draw_caption(&context, caption, density)?;
            }
            self.artwork
                .draw_clip_layer(&context, layout.frame, density)?;
        }

        let image = surface_to_rgba_image(&surface)?;
        Ok(RenderedNote { image, layout })
    }

    /// Card transform: shift down, tilt around the stage center and shrink so
    /// the tilted card stays inside the stage.
    pub fn card_transform(&self, stage: Rect) -> Affine {
        let center = stage.center();
        let shrink = shrink_to_fit_rotation(stage.width, stage.height, self.card_tilt_degrees);
        Affine::translation(-center.x, -center.y)
            .then_scale(shrink)
            .then_rotate_degrees(self.card_tilt_degrees)
            .then_translate(center.x, center.y + self.style.dp(CARD_OFFSET_Y_DP))
    }

    /// Photo window inside the untilted card.
    pub fn photo_window(&self, card: Rect) -> Rect {
        let pad = self.style.dp(CARD_PADDING_DP);
        let strip = self.style.dp(CARD_BOTTOM_STRIP_DP);
        fit_aspect_inside(card.inset(Insets::new(pad, pad, pad, pad + strip)), TARGET_ASPECT)
    }

    fn draw_photo_card(
        &self,
        context: &cairo::Context,
        geometry: &StageGeometry,
        photo: &RgbaImage,
        crop_window: Rect,
        state: &PersistedNoteState,
    ) -> RenderResult<()> {
        let card = geometry.stage;
        let window = self.photo_window(card);
        let surface = rgba_image_to_surface(photo)?;

        context.save()?;
        context.transform(affine_matrix(self.card_transform(card)));

        append_rounded_rect(context, card, self.style.dp(CARD_RADIUS_DP));
        set_source_color(context, CARD_FILL);
        context.fill_preserve()?;
        set_source_color(context, CARD_STROKE);
        context.set_line_width(self.style.dp(CARD_STROKE_DP));
        context.stroke()?;

        context.save()?;
        append_rounded_rect(context, window, self.style.dp(PHOTO_RADIUS_DP));
        context.clip();
        paint_transformed(
            context,
            &surface,
            photo_transform(window, crop_window, state.rotation_degrees),
            window,
        )?;
        context.restore()?;

        append_rounded_rect(context, window, self.style.dp(PHOTO_RADIUS_DP));
        set_source_color(context, PHOTO_STROKE);
        context.set_line_width(self.style.dp(PHOTO_STROKE_DP));
        context.stroke()?;

        context.restore()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::FixedAdvanceMeasure;
    use crate::note::NormalizedCrop;
    use image::Rgba;

    fn compositor() -> Compositor {
        Compositor::new(
            StageStyle {
                density: 1.0,
                ..StageStyle::default()
            },
            FrameArtwork::procedural(),
            -6.0,
            Box::new(FixedAdvanceMeasure::default()),
        )
    }

    fn photo_state() -> PersistedNoteState {
        PersistedNoteState {
            mode: Mode::Photo,
            photo_uri: Some("file:///tmp/a.png".to_string()),
            caption_text: "Beach day".to_string(),
            ..PersistedNoteState::default()
        }
    }

    #[test]
    fn photo_mode_without_decoded_image_falls_back_to_note() {
        let state = photo_state();
        let layout = compositor().layout(&state, None, RenderTarget::new(360, 360));
        assert_eq!(layout.mode, Mode::Note);
        assert!(layout.geometry.crop_window.is_none());
    }

    #[test]
    fn photo_mode_uses_persisted_crop_trimmed_to_aspect() {
        let state = PersistedNoteState {
            crop: NormalizedCrop::parse("0,0,1,1"),
            ..photo_state()
        };
        let layout = compositor().layout(
            &state,
            Some(Size::new(1000.0, 1000.0)),
            RenderTarget::new(360, 360),
        );
        let window = layout.geometry.crop_window.expect("crop window");
        assert!((window.aspect() - TARGET_ASPECT).abs() < 1e-9);
        assert!((window.center().x - 500.0).abs() < 1e-9);
    }

    #[test]
    fn note_frame_is_inset_stage_expanded_by_frame_insets() {
        let compositor = compositor();
        let layout =
            compositor.layout(&PersistedNoteState::default(), None, RenderTarget::new(400, 400));
        let inner = layout.geometry.stage.inset_uniform(NOTE_INSET_DP);
        let expected = inner.outset(Insets::uniform(12.0));
        assert!((layout.frame.x - expected.x).abs() < 1e-9);
        assert!((layout.frame.width - expected.width).abs() < 1e-9);
        assert!(layout.frame.top() >= 0.0);
    }

    #[test]
    fn photo_and_note_frames_match() {
        let compositor = compositor();
        let target = RenderTarget::new(360, 420);
        let photo = compositor.layout(&photo_state(), Some(Size::new(800.0, 600.0)), target);
        let note = compositor.layout(
            &PersistedNoteState {
                mode: Mode::Note,
                ..photo_state()
            },
            None,
            target,
        );
        assert_eq!(photo.mode, Mode::Photo);
        assert_eq!(note.mode, Mode::Note);
        assert_eq!(photo.geometry.stage, note.geometry.stage);
        assert_eq!(photo.frame, note.frame);
        assert_eq!(photo.overlay, note.overlay);
    }

    #[test]
    fn overlay_hides_toggle_on_small_frames() {
        let target = Rect::new(0.0, 0.0, 100.0, 100.0);
        let roomy = OverlayLayout::for_frame(target, Rect::new(0.0, 0.0, 60.0, 80.0), 1.0);
        assert!(roomy.toggle_visible);
        assert_eq!(roomy.padding.left, 8.0);
        assert_eq!(roomy.padding.right, 48.0);
        let cramped = OverlayLayout::for_frame(target, Rect::new(0.0, 0.0, 51.0, 80.0), 1.0);
        assert!(!cramped.toggle_visible);
    }

    #[test]
    fn rendered_photo_shows_photo_at_stage_center() {
        let compositor = compositor();
        let photo = RgbaImage::from_pixel(800, 600, Rgba([0, 0, 255, 255]));
        let rendered = compositor
            .render(&photo_state(), Some(&photo), RenderTarget::new(300, 300))
            .expect("render");
        assert_eq!(rendered.image.dimensions(), (300, 300));
        let window = compositor.photo_window(rendered.layout.geometry.stage);
        let center = compositor
            .card_transform(rendered.layout.geometry.stage)
            .apply(window.center());
        let pixel = rendered.image.get_pixel(center.x as u32, center.y as u32);
        assert_eq!(pixel, &Rgba([0, 0, 255, 255]));
        assert_eq!(rendered.image.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn render_rejects_empty_target() {
        assert!(compositor()
            .render(&PersistedNoteState::default(), None, RenderTarget::new(0, 100))
            .is_err());
    }
}
