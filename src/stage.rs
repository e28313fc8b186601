//! Stage geometry shared by the live preview and the offline compositor.
//!
//! Both paths call [`StageGeometry::compute`] with the same inputs, so the
//! stage, crop window and caption box they see are the same numbers.

use crate::caption::{
    layout_caption, sanitize_density, CaptionLayout, CaptionMetrics, CaptionRequest, CaptionStyle,
    FontFace, TextMeasure,
};
use crate::config::AppConfig;
use crate::geometry::{
    cover_scale, fit_stage, Affine, Insets, Point, Rect, Size, SCALE_EPSILON, TARGET_ASPECT,
};
use crate::note::{
    center_crop_with_zoom, crop_rect_in_source, source_window_from_normalized, Mode,
    NormalizedCrop, NormalizedPoint,
};

/// Density and typefaces both rendering paths must agree on.
#[derive(Debug, Clone, PartialEq)]
pub struct StageStyle {
    pub density: f64,
    pub note_face: FontFace,
    pub caption_face: FontFace,
}

impl Default for StageStyle {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl StageStyle {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            density: sanitize_density(config.density),
            note_face: FontFace::new(config.note_font_family.clone(), false),
            caption_face: FontFace::new(config.caption_font_family.clone(), true),
        }
    }

    pub fn dp(&self, value: f64) -> f64 {
        value * self.density
    }

    pub fn metrics(&self) -> CaptionMetrics {
        CaptionMetrics::for_density(self.density)
    }

    /// Bubble captions over photos, plain ink on notes.
    pub const fn caption_style(mode: Mode) -> CaptionStyle {
        match mode {
            Mode::Photo => CaptionStyle::Bubble,
            Mode::Note => CaptionStyle::Plain,
        }
    }

    pub fn face(&self, style: CaptionStyle) -> &FontFace {
        match style {
            CaptionStyle::Bubble => &self.caption_face,
            CaptionStyle::Plain => &self.note_face,
        }
    }
}

/// Where the visible source window comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropSelection {
    /// Live editing state: zoom around a normalized center.
    Centered { center: NormalizedPoint, zoom: f64 },
    /// A stored window, trimmed to 4:5 if it drifted.
    Persisted(NormalizedCrop),
    /// Nothing stored: center crop tightened by zoom.
    Fallback { zoom: f64 },
}

impl CropSelection {
    pub fn from_persisted(crop: Option<NormalizedCrop>, zoom: f64) -> Self {
        match crop {
            Some(crop) => Self::Persisted(crop),
            None => Self::Fallback { zoom },
        }
    }

    /// Crop window in source pixels.
    pub fn resolve(self, source: Size) -> Rect {
        match self {
            Self::Centered { center, zoom } => crop_rect_in_source(source, zoom, center),
            Self::Persisted(crop) => source_window_from_normalized(source, crop, TARGET_ASPECT),
            Self::Fallback { zoom } => center_crop_with_zoom(source, TARGET_ASPECT, zoom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotoFraming {
    pub source: Size,
    pub crop: CropSelection,
    pub rotation_degrees: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct StageInputs<'a> {
    pub mode: Mode,
    pub caption: Option<CaptionRequest<'a>>,
    /// Ignored in note mode.
    pub photo: Option<PhotoFraming>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageGeometry {
    /// Drawing area minus frame insets.
    pub content: Rect,
    /// The 4:5 stage centered in `content`.
    pub stage: Rect,
    pub crop_window: Option<Rect>,
    /// Maps source pixels onto the stage, rotation and cover scale included.
    pub photo_transform: Option<Affine>,
    pub caption: Option<CaptionLayout>,
}

impl StageGeometry {
    pub fn compute(
        area: Rect,
        frame_insets: Insets,
        inputs: &StageInputs<'_>,
        metrics: &CaptionMetrics,
        measure: &dyn TextMeasure,
    ) -> Self {
        let content = area.inset(frame_insets);
        let stage = fit_stage(content);

        let photo = match inputs.mode {
            Mode::Photo => inputs.photo,
            Mode::Note => None,
        };
        let crop_window = photo.map(|framing| framing.crop.resolve(framing.source));
        let transform = photo
            .zip(crop_window)
            .map(|(framing, window)| photo_transform(stage, window, framing.rotation_degrees));
        let caption = inputs
            .caption
            .as_ref()
            .and_then(|request| layout_caption(request, stage, metrics, measure));

        Self {
            content,
            stage,
            crop_window,
            photo_transform: transform,
            caption,
        }
    }

    /// Maps a view point to normalized stage coordinates, clamped.
    pub fn stage_uv(&self, point: Point) -> NormalizedPoint {
        let (u, v) = self.stage.normalize_point(point);
        NormalizedPoint::new(u, v)
    }

    /// Maps a view point through the inverse photo transform into normalized
    /// source coordinates. `None` outside photo mode.
    pub fn source_uv(&self, point: Point, source: Size) -> Option<NormalizedPoint> {
        let inverse = self.photo_transform?.invert()?;
        let mapped = inverse.apply(point);
        Some(NormalizedPoint::new(
            mapped.x / source.width.max(SCALE_EPSILON),
            mapped.y / source.height.max(SCALE_EPSILON),
        ))
    }
}

/// Translate the window center to the origin, scale it onto `dest` with the
/// rotation cover factor, rotate, then move to the center of `dest`.
pub fn photo_transform(dest: Rect, window: Rect, rotation_degrees: f64) -> Affine {
    let base = dest.width / window.width.max(SCALE_EPSILON);
    let cover = cover_scale(dest.width, dest.height, rotation_degrees);
    let window_center = window.center();
    let dest_center = dest.center();
    Affine::translation(-window_center.x, -window_center.y)
        .then_scale(base * cover)
        .then_rotate_degrees(rotation_degrees)
        .then_translate(dest_center.x, dest_center.y)
}
