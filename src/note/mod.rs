//! Note/photo widget state: display mode, normalized placement and the persisted record.

mod crop;

pub use crop::{
    center_crop_with_zoom, clamp_crop_center, crop_rect_in_source, export_normalized_crop,
    max_crop_size, pan_crop_center, source_window_from_normalized, NormalizedCrop,
};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{clamp_unit, normalize_degrees};

pub const CAPTION_MIN_SP: f64 = 9.0;
pub const CAPTION_MAX_SP: f64 = 48.0;
pub const CAPTION_DEFAULT_SP: f64 = 14.0;
pub const ZOOM_MIN: f64 = 1.0;
pub const ZOOM_MAX: f64 = 3.0;
pub const DEFAULT_POSITION: NormalizedPoint = NormalizedPoint { u: 0.5, v: 0.80 };
/// Stored in place of a blank note on save.
pub const EMPTY_NOTE_PLACEHOLDER: &str = "(empty)";

/// Host-assigned identifier of one placed widget instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WidgetId(pub u32);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    #[default]
    Note,
    Photo,
}

impl Mode {
    pub const fn toggled(self) -> Self {
        match self {
            Self::Note => Self::Photo,
            Self::Photo => Self::Note,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Note => "NOTE",
            Self::Photo => "PHOTO",
        }
    }

    /// Unknown or missing values fall back to `Note`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("PHOTO") => Self::Photo,
            Some("NOTE") | None => Self::Note,
            Some(other) => {
                tracing::warn!(value = other, "unknown persisted mode; using NOTE");
                Self::Note
            }
        }
    }

    pub const fn allows_crop_gestures(self) -> bool {
        matches!(self, Self::Photo)
    }
}

/// A point in `[0,1]²`, relative to a stage or to a source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub u: f64,
    pub v: f64,
}

impl Default for NormalizedPoint {
    fn default() -> Self {
        DEFAULT_POSITION
    }
}

impl NormalizedPoint {
    pub const CENTER: NormalizedPoint = NormalizedPoint { u: 0.5, v: 0.5 };

    /// Builds a point, clamping both coordinates into `[0,1]`.
    pub fn new(u: f64, v: f64) -> Self {
        Self {
            u: clamp_unit(u),
            v: clamp_unit(v),
        }
    }

    pub fn clamped(self) -> Self {
        Self::new(self.u, self.v)
    }
}

pub fn clamp_caption_size(size_sp: f64) -> f64 {
    if size_sp.is_nan() {
        return CAPTION_DEFAULT_SP;
    }
    size_sp.clamp(CAPTION_MIN_SP, CAPTION_MAX_SP)
}

pub fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_nan() {
        return ZOOM_MIN;
    }
    zoom.clamp(ZOOM_MIN, ZOOM_MAX)
}

/// Everything the key-value store keeps for one widget instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedNoteState {
    pub note_text: String,
    pub caption_text: String,
    pub caption_size_sp: f64,
    pub caption_position: NormalizedPoint,
    pub note_position: NormalizedPoint,
    pub photo_uri: Option<String>,
    pub crop: Option<NormalizedCrop>,
    pub zoom: f64,
    pub rotation_degrees: f64,
    pub mode: Mode,
}

impl Default for PersistedNoteState {
    fn default() -> Self {
        Self {
            note_text: String::new(),
            caption_text: String::new(),
            caption_size_sp: CAPTION_DEFAULT_SP,
            caption_position: DEFAULT_POSITION,
            note_position: DEFAULT_POSITION,
            photo_uri: None,
            crop: None,
            zoom: ZOOM_MIN,
            rotation_degrees: 0.0,
            mode: Mode::Note,
        }
    }
}

impl PersistedNoteState {
    /// Clamps every range-limited field; out-of-range values are never rejected.
    pub fn sanitized(mut self) -> Self {
        self.caption_size_sp = clamp_caption_size(self.caption_size_sp);
        self.caption_position = self.caption_position.clamped();
        self.note_position = self.note_position.clamped();
        self.zoom = clamp_zoom(self.zoom);
        self.rotation_degrees = normalize_degrees(self.rotation_degrees);
        self.photo_uri = self
            .photo_uri
            .filter(|uri| !uri.trim().is_empty());
        self.crop = self.crop.and_then(NormalizedCrop::validated);
        self
    }

    /// Photo mode only renders as photo when a reference exists.
    pub fn effective_mode(&self) -> Mode {
        match (self.mode, self.photo_uri.as_deref()) {
            (Mode::Photo, Some(uri)) if !uri.trim().is_empty() => Mode::Photo,
            _ => Mode::Note,
        }
    }

    pub fn toggle_mode(&mut self) -> Mode {
        self.mode = self.mode.toggled();
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_falls_back_to_note() {
        assert_eq!(Mode::parse_or_default(Some("PHOTO")), Mode::Photo);
        assert_eq!(Mode::parse_or_default(Some("NOTE")), Mode::Note);
        assert_eq!(Mode::parse_or_default(Some("garbage")), Mode::Note);
        assert_eq!(Mode::parse_or_default(None), Mode::Note);
    }

    #[test]
    fn clamps_are_idempotent_for_out_of_range_and_nan() {
        for raw in [-5.0, 0.0, 9.0, 14.0, 48.0, 300.0, f64::NAN, f64::INFINITY] {
            let once = clamp_caption_size(raw);
            assert_eq!(clamp_caption_size(once), once);
            assert!((CAPTION_MIN_SP..=CAPTION_MAX_SP).contains(&once));

            let zoom = clamp_zoom(raw);
            assert_eq!(clamp_zoom(zoom), zoom);

            let point = NormalizedPoint::new(raw, -raw);
            assert_eq!(point.clamped(), point);
            assert!((0.0..=1.0).contains(&point.u));
            assert!((0.0..=1.0).contains(&point.v));
        }
    }

    #[test]
    fn effective_mode_requires_photo_reference() {
        let mut state = PersistedNoteState {
            mode: Mode::Photo,
            ..PersistedNoteState::default()
        };
        assert_eq!(state.effective_mode(), Mode::Note);
        state.photo_uri = Some("file:///tmp/cat.jpg".to_string());
        assert_eq!(state.effective_mode(), Mode::Photo);
    }

    #[test]
    fn sanitized_clamps_instead_of_rejecting() {
        let state = PersistedNoteState {
            caption_size_sp: 100.0,
            caption_position: NormalizedPoint { u: 1.7, v: -0.2 },
            zoom: 9.0,
            rotation_degrees: -90.0,
            photo_uri: Some("   ".to_string()),
            ..PersistedNoteState::default()
        }
        .sanitized();
        assert_eq!(state.caption_size_sp, CAPTION_MAX_SP);
        assert_eq!(state.caption_position, NormalizedPoint { u: 1.0, v: 0.0 });
        assert_eq!(state.zoom, ZOOM_MAX);
        assert_eq!(state.rotation_degrees, 270.0);
        assert_eq!(state.photo_uri, None);
    }
}
