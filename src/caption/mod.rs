//! Caption text layout: measurement, wrapping, shrink-to-fit and placement on a stage.

mod wrap;

pub(crate) use wrap::ELLIPSIS;

use crate::geometry::{Rect, RgbaColor};
use crate::note::{clamp_caption_size, NormalizedPoint, CAPTION_MIN_SP};

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.3;

const CAPTION_MARGIN_DP: f64 = 6.0;
const BUBBLE_PAD_H_DP: f64 = 10.0;
const BUBBLE_PAD_V_DP: f64 = 6.0;
const BUBBLE_RADIUS_DP: f64 = 12.0;
const MAX_LINE_STEPS: [usize; 3] = [4, 2, 1];

pub const BUBBLE_FILL: RgbaColor = RgbaColor::new(0, 0, 0, 0x66);
pub const BUBBLE_TEXT: RgbaColor = RgbaColor::opaque(0xFF, 0xFF, 0xFF);
pub const PLAIN_TEXT: RgbaColor = RgbaColor::opaque(40, 40, 40);
pub const TEXT_SHADOW: RgbaColor = RgbaColor::new(0, 0, 0, 0x80);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFace {
    pub family: String,
    pub bold: bool,
}

impl Default for FontFace {
    fn default() -> Self {
        Self {
            family: "Sans".to_string(),
            bold: false,
        }
    }
}

impl FontFace {
    pub fn new(family: impl Into<String>, bold: bool) -> Self {
        Self {
            family: family.into(),
            bold,
        }
    }
}

/// Horizontal advance of a run of text at a pixel font size.
pub trait TextMeasure {
    fn advance(&self, face: &FontFace, text: &str, font_px: f64) -> f64;

    fn line_height(&self, font_px: f64) -> f64 {
        font_px * LINE_HEIGHT_FACTOR
    }
}

/// Every character advances by `ratio * font_px`. Deterministic, used by layout tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedAdvanceMeasure {
    ratio: f64,
}

impl FixedAdvanceMeasure {
    pub const fn new(ratio: f64) -> Self {
        Self { ratio }
    }
}

impl Default for FixedAdvanceMeasure {
    fn default() -> Self {
        Self::new(0.62)
    }
}

impl TextMeasure for FixedAdvanceMeasure {
    fn advance(&self, _face: &FontFace, text: &str, font_px: f64) -> f64 {
        text.chars().count() as f64 * font_px * self.ratio
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionStyle {
    /// Rounded translucent backdrop with white text, used over photos.
    Bubble,
    /// Ink-colored text drawn straight onto the note artwork.
    Plain,
}

impl CaptionStyle {
    pub const fn text_color(self) -> RgbaColor {
        match self {
            Self::Bubble => BUBBLE_TEXT,
            Self::Plain => PLAIN_TEXT,
        }
    }
}

/// Density-scaled spacing used by caption layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptionMetrics {
    pub density: f64,
    pub margin: f64,
    pub pad_h: f64,
    pub pad_v: f64,
    pub corner_radius: f64,
}

impl CaptionMetrics {
    pub fn for_density(density: f64) -> Self {
        let density = sanitize_density(density);
        Self {
            density,
            margin: CAPTION_MARGIN_DP * density,
            pad_h: BUBBLE_PAD_H_DP * density,
            pad_v: BUBBLE_PAD_V_DP * density,
            corner_radius: BUBBLE_RADIUS_DP * density,
        }
    }
}

pub(crate) fn sanitize_density(density: f64) -> f64 {
    if density.is_finite() && density > 0.0 {
        density
    } else {
        1.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CaptionRequest<'a> {
    pub text: &'a str,
    pub size_sp: f64,
    pub position: NormalizedPoint,
    pub style: CaptionStyle,
    pub face: &'a FontFace,
}

/// Result of laying out a caption on a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub lines: Vec<String>,
    pub style: CaptionStyle,
    pub face: FontFace,
    pub font_px: f64,
    pub line_height: f64,
    /// Hit-test and backdrop bounds. Equals `text_rect` for plain captions.
    pub box_rect: Rect,
    pub text_rect: Rect,
    pub corner_radius: f64,
}

impl CaptionLayout {
    /// Effective font size in sp after shrinking.
    pub fn font_size_sp(&self, density: f64) -> f64 {
        self.font_px / sanitize_density(density)
    }

    pub fn contains(&self, point: crate::geometry::Point) -> bool {
        self.box_rect.contains(point)
    }
}

/// Lays out a caption inside `stage`, or `None` for blank text.
///
/// Font size shrinks by 1dp steps (floored at 9sp) while the block is too
/// big, then the line limit drops 4 -> 2 -> 1. The block is centered on the
/// normalized position and kept inside the stage margin.
pub fn layout_caption(
    request: &CaptionRequest<'_>,
    stage: Rect,
    metrics: &CaptionMetrics,
    measure: &dyn TextMeasure,
) -> Option<CaptionLayout> {
    if request.text.trim().is_empty() {
        return None;
    }

    let density = metrics.density;
    let max_box_w = (stage.width - 2.0 * metrics.margin).max(1.0);
    let max_box_h = (stage.height - 2.0 * metrics.margin).max(1.0);
    let max_inner_w = (max_box_w - 2.0 * metrics.pad_h).max(1.0);
    let max_inner_h = (max_box_h - 2.0 * metrics.pad_v).max(1.0);
    let min_px = CAPTION_MIN_SP * density;

    let block = |font_px: f64, max_lines: usize| {
        let lines = wrap::wrap_lines(
            request.text,
            measure,
            request.face,
            font_px,
            max_inner_w,
            max_lines,
        );
        let width = lines
            .iter()
            .map(|line| measure.advance(request.face, line, font_px))
            .fold(0.0_f64, f64::max)
            .max(1.0);
        let height = (lines.len() as f64 * measure.line_height(font_px)).max(1.0);
        (lines, width, height)
    };

    let mut font_px = clamp_caption_size(request.size_sp) * density;
    let mut line_steps = MAX_LINE_STEPS.iter().copied();
    let mut max_lines = line_steps.next().unwrap_or(1);
    let (mut lines, mut inner_w, mut inner_h) = block(font_px, max_lines);

    while (inner_w > max_inner_w || inner_h > max_inner_h) && font_px > min_px {
        font_px = (font_px - density).max(min_px);
        (lines, inner_w, inner_h) = block(font_px, max_lines);
    }
    while inner_h > max_inner_h {
        let Some(next) = line_steps.next() else {
            break;
        };
        max_lines = next;
        (lines, inner_w, inner_h) = block(font_px, max_lines);
    }

    let inner_w = inner_w.min(max_inner_w);
    let inner_h = inner_h.min(max_inner_h);
    let (pad_h, pad_v) = match request.style {
        CaptionStyle::Bubble => (metrics.pad_h, metrics.pad_v),
        CaptionStyle::Plain => (0.0, 0.0),
    };
    let box_w = inner_w + 2.0 * pad_h;
    let box_h = inner_h + 2.0 * pad_v;

    let position = request.position.clamped();
    let target = stage.denormalize(position.u, position.v);
    let left = place_on_axis(
        target.x - box_w / 2.0,
        box_w,
        stage.left(),
        stage.width,
        metrics.margin,
    );
    let top = place_on_axis(
        target.y - box_h / 2.0,
        box_h,
        stage.top(),
        stage.height,
        metrics.margin,
    );

    let box_rect = Rect::new(left, top, box_w, box_h);
    let text_rect = Rect::new(left + pad_h, top + pad_v, inner_w, inner_h);
    Some(CaptionLayout {
        lines,
        style: request.style,
        face: request.face.clone(),
        font_px,
        line_height: measure.line_height(font_px),
        box_rect,
        text_rect,
        corner_radius: metrics.corner_radius.min(box_w.min(box_h) / 2.0),
    })
}

/// Clamps a leading edge into the margin-inset range, or centers when the extent does not fit.
fn place_on_axis(desired: f64, extent: f64, origin: f64, length: f64, margin: f64) -> f64 {
    let low = origin + margin;
    let high = origin + length - margin - extent;
    if high >= low {
        desired.clamp(low, high)
    } else {
        origin + (length - extent) / 2.0
    }
}
