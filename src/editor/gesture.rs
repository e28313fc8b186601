use crate::geometry::{normalize_degrees, Point, Rect, Size, SCALE_EPSILON};
use crate::note::{
    clamp_caption_size, clamp_crop_center, clamp_zoom, pan_crop_center, NormalizedPoint,
};

/// A tap must lift within this many milliseconds.
pub const TAP_TIMEOUT_MS: u32 = 250;
const HISTORY_LIMIT: usize = 64;

pub type PointerId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchEvent {
    Down {
        id: PointerId,
        point: Point,
        time_ms: u32,
    },
    Move {
        id: PointerId,
        point: Point,
        time_ms: u32,
    },
    Up {
        id: PointerId,
        point: Point,
        time_ms: u32,
    },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    #[default]
    None,
    DraggingCaption,
    MovingCrop,
    ResizingCrop,
    ResizingCaption,
}

/// Snapshot of the editor state a gesture step reads.
#[derive(Debug, Clone, Copy)]
pub struct GestureContext {
    pub crop_gestures: bool,
    /// Caption box from the last layout; `None` always misses.
    pub caption_box: Option<Rect>,
    pub caption_non_empty: bool,
    pub stage: Rect,
    pub source: Option<Size>,
    pub crop_center: NormalizedPoint,
    pub zoom: f64,
    pub rotation_degrees: f64,
    pub caption_size_sp: f64,
    pub touch_slop_px: f64,
}

impl GestureContext {
    fn caption_hit(&self, point: Point) -> bool {
        self.caption_non_empty && self.caption_box.is_some_and(|rect| rect.contains(point))
    }

    /// View pixels per source pixel used to turn finger deltas into crop motion.
    pub fn fit_scale(&self) -> f64 {
        self.source
            .map(|source| self.stage.width / source.width.max(SCALE_EPSILON))
            .unwrap_or(1.0)
            .max(SCALE_EPSILON)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEffect {
    SetCaptionPosition(NormalizedPoint),
    SetCrop { center: NormalizedPoint, zoom: f64 },
    SetRotation(f64),
    SetCaptionSize(f64),
    /// A short single-finger touch, in view coordinates.
    Tap(Point),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTransition {
    pub from: GestureState,
    pub to: GestureState,
    pub pointers: usize,
}

#[derive(Debug, Clone, Copy)]
struct PinchStart {
    distance: f64,
    angle_degrees: f64,
    zoom: f64,
    rotation_degrees: f64,
    caption_size_sp: f64,
}

#[derive(Debug, Clone, Copy)]
struct TapCandidate {
    start: Point,
    start_ms: u32,
    travel: f64,
    max_pointers: usize,
}

/// Five-state touch tracker. Pure: every step returns the effects to apply.
#[derive(Debug, Default)]
pub struct GestureTracker {
    state: GestureState,
    pointers: Vec<(PointerId, Point)>,
    anchor: Option<Point>,
    pinch: Option<PinchStart>,
    tap: Option<TapCandidate>,
    transition_history: Vec<GestureTransition>,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn pointer_count(&self) -> usize {
        self.pointers.len()
    }

    pub fn history(&self) -> &[GestureTransition] {
        &self.transition_history
    }

    pub fn reset(&mut self) {
        self.pointers.clear();
        self.anchor = None;
        self.pinch = None;
        self.tap = None;
        self.enter(GestureState::None);
    }

    pub fn handle(&mut self, event: TouchEvent, ctx: &GestureContext) -> Vec<GestureEffect> {
        match event {
            TouchEvent::Down { id, point, time_ms } => {
                self.pointer_down(id, point, time_ms, ctx);
                Vec::new()
            }
            TouchEvent::Move { id, point, .. } => self.pointer_move(id, point, ctx),
            TouchEvent::Up { id, point, time_ms } => self.pointer_up(id, point, time_ms, ctx),
            TouchEvent::Cancel => {
                self.reset();
                Vec::new()
            }
        }
    }

    fn pointer_down(&mut self, id: PointerId, point: Point, time_ms: u32, ctx: &GestureContext) {
        if self.pointers.iter().any(|(known, _)| *known == id) {
            return;
        }
        self.pointers.push((id, point));

        match self.pointers.len() {
            1 => {
                self.tap = Some(TapCandidate {
                    start: point,
                    start_ms: time_ms,
                    travel: 0.0,
                    max_pointers: 1,
                });
                self.anchor = Some(point);
                self.pinch = None;
                let next = if ctx.caption_hit(point) {
                    GestureState::DraggingCaption
                } else if ctx.crop_gestures {
                    GestureState::MovingCrop
                } else {
                    GestureState::None
                };
                self.enter(next);
            }
            2 => {
                if let Some(tap) = self.tap.as_mut() {
                    tap.max_pointers = 2;
                }
                let (first, second) = (self.pointers[0].1, self.pointers[1].1);
                self.pinch = Some(PinchStart {
                    distance: first.distance_to(second),
                    angle_degrees: first.angle_to_degrees(second),
                    zoom: clamp_zoom(ctx.zoom),
                    rotation_degrees: ctx.rotation_degrees,
                    caption_size_sp: clamp_caption_size(ctx.caption_size_sp),
                });
                let next = if !ctx.crop_gestures || ctx.caption_hit(first.midpoint(second)) {
                    GestureState::ResizingCaption
                } else {
                    GestureState::ResizingCrop
                };
                self.enter(next);
            }
            count => {
                if let Some(tap) = self.tap.as_mut() {
                    tap.max_pointers = tap.max_pointers.max(count);
                }
            }
        }
    }

    fn pointer_move(
        &mut self,
        id: PointerId,
        point: Point,
        ctx: &GestureContext,
    ) -> Vec<GestureEffect> {
        let Some(index) = self.pointers.iter().position(|(known, _)| *known == id) else {
            return Vec::new();
        };
        self.pointers[index].1 = point;
        if index == 0 {
            self.track_travel(point);
        }

        match self.state {
            GestureState::None => Vec::new(),
            GestureState::DraggingCaption if index == 0 => {
                let (u, v) = ctx.stage.normalize_point(point);
                vec![GestureEffect::SetCaptionPosition(NormalizedPoint::new(u, v))]
            }
            GestureState::MovingCrop if index == 0 => {
                let Some(source) = ctx.source else {
                    return Vec::new();
                };
                let anchor = self.anchor.replace(point).unwrap_or(point);
                let delta = Point::new(point.x - anchor.x, point.y - anchor.y);
                let center =
                    pan_crop_center(source, ctx.zoom, ctx.crop_center, delta, ctx.fit_scale());
                vec![GestureEffect::SetCrop {
                    center,
                    zoom: clamp_zoom(ctx.zoom),
                }]
            }
            GestureState::ResizingCrop => self.resize_crop(ctx),
            GestureState::ResizingCaption => self.resize_caption(),
            _ => Vec::new(),
        }
    }

    fn resize_crop(&self, ctx: &GestureContext) -> Vec<GestureEffect> {
        let (Some(pinch), Some(source)) = (self.pinch, ctx.source) else {
            return Vec::new();
        };
        let Some((first, second)) = self.pinch_points() else {
            return Vec::new();
        };
        let ratio = first.distance_to(second) / pinch.distance.max(SCALE_EPSILON);
        let zoom = clamp_zoom(pinch.zoom * ratio);
        let center = clamp_crop_center(source, zoom, ctx.crop_center);
        let rotation = normalize_degrees(
            pinch.rotation_degrees + (first.angle_to_degrees(second) - pinch.angle_degrees),
        );
        vec![
            GestureEffect::SetCrop { center, zoom },
            GestureEffect::SetRotation(rotation),
        ]
    }

    fn resize_caption(&self) -> Vec<GestureEffect> {
        let (Some(pinch), Some((first, second))) = (self.pinch, self.pinch_points()) else {
            return Vec::new();
        };
        let ratio = first.distance_to(second) / pinch.distance.max(SCALE_EPSILON);
        vec![GestureEffect::SetCaptionSize(clamp_caption_size(
            pinch.caption_size_sp * ratio,
        ))]
    }

    fn pointer_up(
        &mut self,
        id: PointerId,
        point: Point,
        time_ms: u32,
        ctx: &GestureContext,
    ) -> Vec<GestureEffect> {
        let Some(index) = self.pointers.iter().position(|(known, _)| *known == id) else {
            return Vec::new();
        };
        if index == 0 {
            self.track_travel(point);
        }
        self.pointers.remove(index);

        match self.pointers.len() {
            0 => {
                let tap = self.tap.take().filter(|tap| {
                    tap.max_pointers == 1
                        && time_ms.wrapping_sub(tap.start_ms) < TAP_TIMEOUT_MS
                        && tap.travel < ctx.touch_slop_px
                });
                self.anchor = None;
                self.pinch = None;
                self.enter(GestureState::None);
                tap.map(|_| vec![GestureEffect::Tap(point)])
                    .unwrap_or_default()
            }
            1 => {
                let remaining = self.pointers[0].1;
                self.anchor = Some(remaining);
                self.pinch = None;
                let next = match self.state {
                    GestureState::ResizingCrop if ctx.crop_gestures => GestureState::MovingCrop,
                    GestureState::ResizingCrop => GestureState::None,
                    GestureState::ResizingCaption => GestureState::DraggingCaption,
                    other => other,
                };
                self.enter(next);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn pinch_points(&self) -> Option<(Point, Point)> {
        match self.pointers.as_slice() {
            [(_, first), (_, second), ..] => Some((*first, *second)),
            _ => None,
        }
    }

    fn track_travel(&mut self, point: Point) {
        if let Some(tap) = self.tap.as_mut() {
            tap.travel = tap.travel.max(tap.start.distance_to(point));
        }
    }

    fn enter(&mut self, next: GestureState) {
        if next == self.state {
            return;
        }
        tracing::debug!(
            from = ?self.state,
            to = ?next,
            pointers = self.pointers.len(),
            "gesture transition"
        );
        if self.transition_history.len() >= HISTORY_LIMIT {
            self.transition_history.remove(0);
        }
        self.transition_history.push(GestureTransition {
            from: self.state,
            to: next,
            pointers: self.pointers.len(),
        });
        self.state = next;
    }
}
