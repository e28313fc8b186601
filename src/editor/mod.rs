//! Interactive preview: the transient edit session, gesture application and change notifications.

pub mod gesture;
mod render;

use gtk4::cairo;

use crate::artwork::FrameArtwork;
use crate::caption::{CaptionRequest, CaptionStyle, TextMeasure};
use crate::geometry::{normalize_degrees, Point, Rect, Size};
use crate::note::{
    clamp_caption_size, clamp_crop_center, clamp_zoom, export_normalized_crop, Mode,
    NormalizedPoint, PersistedNoteState, EMPTY_NOTE_PLACEHOLDER, ZOOM_MIN,
};
use crate::source::SourceImage;
use crate::stage::{CropSelection, PhotoFraming, StageGeometry, StageInputs, StageStyle};

pub use gesture::{
    GestureContext, GestureEffect, GestureState, GestureTracker, GestureTransition, PointerId,
    TouchEvent, TAP_TIMEOUT_MS,
};

/// In-memory state mutated by gestures and committed on save.
#[derive(Debug, Clone)]
pub struct EditSession {
    pub mode: Mode,
    pub photo_uri: Option<String>,
    pub photo: Option<SourceImage>,
    pub note_text: String,
    pub caption_text: String,
    pub caption_size_sp: f64,
    pub photo_caption_position: NormalizedPoint,
    pub note_position: NormalizedPoint,
    /// Crop center in normalized source coordinates.
    pub crop_center: NormalizedPoint,
    pub zoom: f64,
    pub rotation_degrees: f64,
    pub caption_style: CaptionStyle,
    base: PersistedNoteState,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::from_persisted(PersistedNoteState::default(), None)
    }
}

impl EditSession {
    /// Starts a session from stored state; `photo` is the already decoded image, if any.
    pub fn from_persisted(state: PersistedNoteState, photo: Option<SourceImage>) -> Self {
        let state = state.sanitized();
        let crop_center = state
            .crop
            .map(|crop| {
                NormalizedPoint::new(
                    (crop.left + crop.right) / 2.0,
                    (crop.top + crop.bottom) / 2.0,
                )
            })
            .unwrap_or(NormalizedPoint::CENTER);
        Self {
            mode: state.mode,
            photo_uri: state.photo_uri.clone(),
            photo,
            note_text: state.note_text.clone(),
            caption_text: state.caption_text.clone(),
            caption_size_sp: state.caption_size_sp,
            photo_caption_position: state.caption_position,
            note_position: state.note_position,
            crop_center,
            zoom: state.zoom,
            rotation_degrees: state.rotation_degrees,
            caption_style: StageStyle::caption_style(state.mode),
            base: state,
        }
    }

    pub fn source_size(&self) -> Option<Size> {
        self.photo.as_ref().map(SourceImage::size)
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.caption_style = StageStyle::caption_style(mode);
    }

    /// Replaces the photo and resets the framing.
    pub fn set_photo(&mut self, photo: SourceImage) {
        self.photo_uri = Some(photo.reference.clone());
        self.photo = Some(photo);
        self.crop_center = NormalizedPoint::CENTER;
        self.zoom = ZOOM_MIN;
        self.rotation_degrees = 0.0;
    }

    /// Text shown as the caption in the current mode.
    pub fn active_text(&self) -> &str {
        match self.mode {
            Mode::Photo => &self.caption_text,
            Mode::Note => &self.note_text,
        }
    }

    pub fn active_position(&self) -> NormalizedPoint {
        match self.mode {
            Mode::Photo => self.photo_caption_position,
            Mode::Note => self.note_position,
        }
    }

    pub fn set_active_position(&mut self, position: NormalizedPoint) {
        let position = position.clamped();
        match self.mode {
            Mode::Photo => self.photo_caption_position = position,
            Mode::Note => self.note_position = position,
        }
    }

    pub fn crop_gestures_enabled(&self) -> bool {
        self.mode.allows_crop_gestures() && self.photo.is_some()
    }

    /// Applies the save rules and returns the state to persist.
    pub fn commit(&self) -> PersistedNoteState {
        let mut state = self.base.clone();
        state.note_text = if self.note_text.trim().is_empty() {
            EMPTY_NOTE_PLACEHOLDER.to_string()
        } else {
            self.note_text.clone()
        };
        state.caption_text = self.caption_text.clone();
        state.caption_size_sp = clamp_caption_size(self.caption_size_sp);
        state.note_position = self.note_position.clamped();
        if self.mode == Mode::Photo {
            state.caption_position = self.photo_caption_position.clamped();
        }
        state.photo_uri = self.photo_uri.clone();
        state.zoom = clamp_zoom(self.zoom);
        state.rotation_degrees = normalize_degrees(self.rotation_degrees);
        if let Some(source) = self.source_size() {
            state.crop = Some(export_normalized_crop(source, state.zoom, self.crop_center));
        }
        state.mode = self.mode;
        state.sanitized()
    }
}

/// Change notifications for observers such as a size slider or an inline text overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditorEvent {
    CaptionMoved(NormalizedPoint),
    CaptionResized(f64),
    /// Normalized source coordinates in photo mode, stage coordinates in note mode.
    CaptionTapped(NormalizedPoint),
}

type Observer = Box<dyn FnMut(&EditorEvent)>;

pub struct PreviewEditor {
    session: EditSession,
    style: StageStyle,
    artwork: FrameArtwork,
    touch_slop_px: f64,
    measure: Box<dyn TextMeasure>,
    tracker: GestureTracker,
    view: Rect,
    geometry: Option<StageGeometry>,
    caption_visible: bool,
    photo_surface: Option<cairo::ImageSurface>,
    observers: Vec<Observer>,
}

impl std::fmt::Debug for PreviewEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewEditor")
            .field("session", &self.session)
            .field("view", &self.view)
            .field("gesture", &self.tracker.state())
            .field("caption_visible", &self.caption_visible)
            .finish_non_exhaustive()
    }
}

impl PreviewEditor {
    pub fn new(
        session: EditSession,
        style: StageStyle,
        artwork: FrameArtwork,
        touch_slop_px: f64,
        measure: Box<dyn TextMeasure>,
    ) -> Self {
        Self {
            session,
            style,
            artwork,
            touch_slop_px,
            measure,
            tracker: GestureTracker::new(),
            view: Rect::default(),
            geometry: None,
            caption_visible: true,
            photo_surface: None,
            observers: Vec::new(),
        }
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn gesture_state(&self) -> GestureState {
        self.tracker.state()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&EditorEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self, event: EditorEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    fn invalidate(&mut self) {
        self.geometry = None;
    }

    pub fn set_view_size(&mut self, width: f64, height: f64) {
        let view = Rect::new(0.0, 0.0, width.max(0.0), height.max(0.0));
        if view != self.view {
            self.view = view;
            self.invalidate();
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.session.set_mode(mode);
        self.tracker.reset();
        self.invalidate();
    }

    pub fn toggle_mode(&mut self) -> Mode {
        let mode = self.session.mode.toggled();
        self.set_mode(mode);
        mode
    }

    pub fn set_photo(&mut self, photo: SourceImage) {
        self.session.set_photo(photo);
        self.photo_surface = None;
        self.tracker.reset();
        self.invalidate();
    }

    pub fn set_caption_text(&mut self, text: impl Into<String>) {
        match self.session.mode {
            Mode::Photo => self.session.caption_text = text.into(),
            Mode::Note => self.session.note_text = text.into(),
        }
        self.invalidate();
    }

    pub fn set_caption_size(&mut self, size_sp: f64) {
        self.session.caption_size_sp = clamp_caption_size(size_sp);
        self.invalidate();
    }

    /// Hides the live caption while an inline editor covers it.
    pub fn set_caption_visible(&mut self, visible: bool) {
        if self.caption_visible != visible {
            self.caption_visible = visible;
            self.invalidate();
        }
    }

    pub fn caption_visible(&self) -> bool {
        self.caption_visible
    }

    fn stage_inputs(&self) -> StageInputs<'_> {
        let style = self.session.caption_style;
        let caption = self.caption_visible.then(|| CaptionRequest {
            text: self.session.active_text(),
            size_sp: self.session.caption_size_sp,
            position: self.session.active_position(),
            style,
            face: self.style.face(style),
        });
        let photo = self.session.source_size().map(|source| PhotoFraming {
            source,
            crop: CropSelection::Centered {
                center: self.session.crop_center,
                zoom: self.session.zoom,
            },
            rotation_degrees: self.session.rotation_degrees,
        });
        StageInputs {
            mode: self.session.mode,
            caption,
            photo,
        }
    }

    fn compute_geometry(&self) -> StageGeometry {
        StageGeometry::compute(
            self.view,
            self.artwork.insets(self.style.density),
            &self.stage_inputs(),
            &self.style.metrics(),
            self.measure.as_ref(),
        )
    }

    /// Layout for the current view; recomputed after any change.
    pub fn geometry(&mut self) -> &StageGeometry {
        let geometry = match self.geometry.take() {
            Some(geometry) => geometry,
            None => self.compute_geometry(),
        };
        self.geometry.insert(geometry)
    }

    /// Maps a normalized point back to view coordinates. The point is in source
    /// space in photo mode and in stage space otherwise.
    pub fn map_uv_to_view(&mut self, uv: NormalizedPoint) -> Point {
        let source = self.session.source_size();
        let geometry = self.geometry();
        match (geometry.photo_transform, source) {
            (Some(transform), Some(source)) => transform.apply(Point::new(
                uv.u * source.width,
                uv.v * source.height,
            )),
            _ => geometry.stage.denormalize(uv.u, uv.v),
        }
    }

    /// Feeds one touch event. Returns `true` when the view needs a redraw.
    /// Touches are ignored until a photo is loaded, in either mode.
    pub fn handle_touch(&mut self, event: TouchEvent) -> bool {
        if self.session.photo.is_none() {
            return false;
        }

        let geometry = self.geometry().clone();
        let ctx = GestureContext {
            crop_gestures: self.session.crop_gestures_enabled(),
            caption_box: geometry.caption.as_ref().map(|layout| layout.box_rect),
            caption_non_empty: !self.session.active_text().trim().is_empty(),
            stage: geometry.stage,
            source: self.session.source_size(),
            crop_center: self.session.crop_center,
            zoom: self.session.zoom,
            rotation_degrees: self.session.rotation_degrees,
            caption_size_sp: self.session.caption_size_sp,
            touch_slop_px: self.touch_slop_px,
        };

        let effects = self.tracker.handle(event, &ctx);
        let changed = !effects.is_empty();
        for effect in effects {
            self.apply(effect, &geometry);
        }
        if changed {
            self.invalidate();
        }
        changed
    }

    fn apply(&mut self, effect: GestureEffect, geometry: &StageGeometry) {
        match effect {
            GestureEffect::SetCaptionPosition(position) => {
                self.session.set_active_position(position);
                self.notify(EditorEvent::CaptionMoved(self.session.active_position()));
            }
            GestureEffect::SetCrop { center, zoom } => {
                self.session.zoom = clamp_zoom(zoom);
                self.session.crop_center = match self.session.source_size() {
                    Some(source) => clamp_crop_center(source, self.session.zoom, center),
                    None => center.clamped(),
                };
            }
            GestureEffect::SetRotation(degrees) => {
                self.session.rotation_degrees = normalize_degrees(degrees);
            }
            GestureEffect::SetCaptionSize(size_sp) => {
                self.session.caption_size_sp = clamp_caption_size(size_sp);
                self.notify(EditorEvent::CaptionResized(self.session.caption_size_sp));
            }
            GestureEffect::Tap(point) => {
                let uv = match (self.session.mode, self.session.source_size()) {
                    (Mode::Photo, Some(source)) => geometry
                        .source_uv(point, source)
                        .unwrap_or_else(|| geometry.stage_uv(point)),
                    _ => geometry.stage_uv(point),
                };
                tracing::debug!(u = uv.u, v = uv.v, "caption tap");
                self.notify(EditorEvent::CaptionTapped(uv));
            }
        }
    }

    /// Session state with save rules applied, ready for the store.
    pub fn commit(&self) -> PersistedNoteState {
        self.session.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::FixedAdvanceMeasure;
    use crate::geometry::Insets;
    use image::{Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn photo(width: u32, height: u32) -> SourceImage {
        SourceImage {
            reference: "file:///tmp/photo.png".to_string(),
            image: RgbaImage::from_pixel(width, height, Rgba([90, 120, 200, 255])),
        }
    }

    fn editor(session: EditSession) -> PreviewEditor {
        let artwork = FrameArtwork::with_layers(None, None, None, Insets::default());
        let mut editor = PreviewEditor::new(
            session,
            StageStyle {
                density: 1.0,
                ..StageStyle::default()
            },
            artwork,
            8.0,
            Box::new(FixedAdvanceMeasure::default()),
        );
        editor.set_view_size(400.0, 500.0);
        editor
    }

    fn touch(kind: fn(PointerId, Point, u32) -> TouchEvent, x: f64, y: f64, t: u32) -> TouchEvent {
        kind(1, Point::new(x, y), t)
    }

    fn down(id: PointerId, point: Point, time_ms: u32) -> TouchEvent {
        TouchEvent::Down { id, point, time_ms }
    }

    fn moved(id: PointerId, point: Point, time_ms: u32) -> TouchEvent {
        TouchEvent::Move { id, point, time_ms }
    }

    fn up(id: PointerId, point: Point, time_ms: u32) -> TouchEvent {
        TouchEvent::Up { id, point, time_ms }
    }

    #[test]
    fn photo_mode_without_image_ignores_touches() {
        let mut session = EditSession::default();
        session.set_mode(Mode::Photo);
        let mut editor = editor(session);
        assert!(!editor.handle_touch(touch(down, 10.0, 10.0, 0)));
        assert_eq!(editor.gesture_state(), GestureState::None);
    }

    #[test]
    fn note_mode_without_image_ignores_caption_drag() {
        let mut session = EditSession::default();
        session.note_text = "buy milk".to_string();
        let mut editor = editor(session);
        let start = editor
            .geometry()
            .caption
            .as_ref()
            .expect("caption layout")
            .box_rect
            .center();

        assert!(!editor.handle_touch(touch(down, start.x, start.y, 0)));
        assert_eq!(editor.gesture_state(), GestureState::None);
        assert!(!editor.handle_touch(touch(moved, 200.0, 100.0, 30)));
        assert_eq!(
            editor.session().note_position,
            PersistedNoteState::default().note_position
        );
    }

    #[test]
    fn dragging_note_caption_moves_note_position_and_notifies() {
        let mut session = EditSession::default();
        session.set_photo(photo(800, 600));
        session.note_text = "buy milk".to_string();
        let mut editor = editor(session);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        editor.subscribe(move |event| sink.borrow_mut().push(*event));

        let caption = editor
            .geometry()
            .caption
            .clone()
            .expect("caption layout")
            .box_rect;
        let start = caption.center();
        editor.handle_touch(touch(down, start.x, start.y, 0));
        assert_eq!(editor.gesture_state(), GestureState::DraggingCaption);
        assert!(editor.handle_touch(touch(moved, 200.0, 100.0, 30)));

        let expected = NormalizedPoint::new(0.5, 0.2);
        assert_eq!(editor.session().note_position, expected);
        assert_eq!(events.borrow().as_slice(), &[EditorEvent::CaptionMoved(expected)]);
    }

    #[test]
    fn tap_in_photo_mode_reports_source_coordinates() {
        let mut session = EditSession::default();
        session.set_mode(Mode::Photo);
        session.set_photo(photo(800, 600));
        let mut editor = editor(session);
        let taps = Rc::new(RefCell::new(Vec::new()));
        let sink = taps.clone();
        editor.subscribe(move |event| {
            if let EditorEvent::CaptionTapped(uv) = event {
                sink.borrow_mut().push(*uv);
            }
        });

        let center = editor.geometry().stage.center();
        editor.handle_touch(touch(down, center.x, center.y, 0));
        editor.handle_touch(touch(up, center.x, center.y, 80));

        let taps = taps.borrow();
        assert_eq!(taps.len(), 1);
        assert!((taps[0].u - 0.5).abs() < 1e-9);
        assert!((taps[0].v - 0.5).abs() < 1e-9);
        let back = editor.map_uv_to_view(taps[0]);
        assert!((back.x - center.x).abs() < 1e-6);
        assert!((back.y - center.y).abs() < 1e-6);
    }

    #[test]
    fn hidden_caption_cannot_be_grabbed() {
        let mut session = EditSession::default();
        session.set_photo(photo(800, 600));
        session.note_text = "hello".to_string();
        let mut editor = editor(session);
        let start = editor
            .geometry()
            .caption
            .as_ref()
            .expect("caption")
            .box_rect
            .center();
        editor.set_caption_visible(false);
        assert!(editor.geometry().caption.is_none());
        editor.handle_touch(touch(down, start.x, start.y, 0));
        assert_eq!(editor.gesture_state(), GestureState::None);
    }

    #[test]
    fn commit_applies_save_rules() {
        let mut session = EditSession::default();
        session.note_position = NormalizedPoint::new(0.2, 0.3);
        session.photo_caption_position = NormalizedPoint::new(0.9, 0.9);
        let note_commit = session.commit();
        assert_eq!(note_commit.note_text, EMPTY_NOTE_PLACEHOLDER);
        assert_eq!(note_commit.note_position, NormalizedPoint::new(0.2, 0.3));
        assert_eq!(note_commit.caption_position, PersistedNoteState::default().caption_position);
        assert_eq!(note_commit.crop, None);

        session.set_mode(Mode::Photo);
        session.set_photo(photo(4000, 3000));
        session.zoom = 7.0;
        session.rotation_degrees = -45.0;
        let photo_commit = session.commit();
        assert_eq!(photo_commit.caption_position, NormalizedPoint::new(0.9, 0.9));
        assert_eq!(photo_commit.zoom, 3.0);
        assert_eq!(photo_commit.rotation_degrees, 315.0);
        assert_eq!(photo_commit.mode, Mode::Photo);
        let crop = photo_commit.crop.expect("crop exported with image");
        assert!((crop.width() * 4000.0 / (crop.height() * 3000.0) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn session_resumes_crop_center_from_persisted_window() {
        let state = PersistedNoteState {
            crop: crate::note::NormalizedCrop::parse("0.1,0.2,0.5,0.6"),
            ..PersistedNoteState::default()
        };
        let session = EditSession::from_persisted(state, None);
        assert!((session.crop_center.u - 0.3).abs() < 1e-12);
        assert!((session.crop_center.v - 0.4).abs() < 1e-12);
    }
}
