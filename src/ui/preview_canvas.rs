use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use anyhow::Context as _;
use gtk4::prelude::*;
use gtk4::{gdk, glib, graphene, DrawingArea, EventControllerLegacy};

use crate::editor::{EditorEvent, PointerId, PreviewEditor, TouchEvent};
use crate::geometry::Point;
use crate::note::{Mode, PersistedNoteState};
use crate::source::{load_source_image, FileImageSource, SourceImage};

const MOUSE_POINTER: PointerId = 0;

/// A `DrawingArea` that renders a [`PreviewEditor`] and feeds it touch and mouse input.
#[derive(Clone)]
pub struct PreviewCanvas {
    area: DrawingArea,
    editor: Rc<RefCell<PreviewEditor>>,
}

impl PreviewCanvas {
    pub fn new(editor: PreviewEditor) -> Self {
        let area = DrawingArea::new();
        area.set_hexpand(true);
        area.set_vexpand(true);
        let editor = Rc::new(RefCell::new(editor));

        let draw_editor = editor.clone();
        area.set_draw_func(move |_, context, width, height| {
            if width <= 0 || height <= 0 {
                return;
            }
            if let Err(err) =
                draw_editor
                    .borrow_mut()
                    .draw(context, f64::from(width), f64::from(height))
            {
                tracing::warn!(?err, "preview draw failed");
            }
        });

        let canvas = Self { area, editor };
        canvas.connect_input();
        canvas
    }

    pub fn widget(&self) -> &DrawingArea {
        &self.area
    }

    fn connect_input(&self) {
        let controller = EventControllerLegacy::new();
        let area = self.area.clone();
        let editor = self.editor.clone();
        let mouse_down = Rc::new(Cell::new(false));
        controller.connect_event(move |_, event| {
            let Some(touch) = translate_event(&area, event, &mouse_down) else {
                return glib::Propagation::Proceed;
            };
            if editor.borrow_mut().handle_touch(touch) {
                area.queue_draw();
            }
            glib::Propagation::Stop
        });
        self.area.add_controller(controller);
    }

    /// Registers an observer for caption moves, resizes and taps.
    pub fn connect_editor_event(&self, observer: impl FnMut(&EditorEvent) + 'static) {
        self.editor.borrow_mut().subscribe(observer);
    }

    pub fn toggle_mode(&self) -> Mode {
        let mode = self.editor.borrow_mut().toggle_mode();
        self.area.queue_draw();
        mode
    }

    pub fn set_caption_text(&self, text: &str) {
        self.editor.borrow_mut().set_caption_text(text);
        self.area.queue_draw();
    }

    pub fn set_caption_size(&self, size_sp: f64) {
        self.editor.borrow_mut().set_caption_size(size_sp);
        self.area.queue_draw();
    }

    pub fn set_caption_visible(&self, visible: bool) {
        self.editor.borrow_mut().set_caption_visible(visible);
        self.area.queue_draw();
    }

    pub fn set_photo(&self, photo: SourceImage) {
        self.editor.borrow_mut().set_photo(photo);
        self.area.queue_draw();
    }

    /// Loads `path` as the new photo. Failures are logged and leave the preview unchanged.
    pub fn set_photo_from_file(&self, path: &Path) {
        match load_photo_file(path) {
            Ok(photo) => self.set_photo(photo),
            Err(err) => tracing::warn!(?err, path = %path.display(), "failed to load photo"),
        }
    }

    pub fn commit(&self) -> PersistedNoteState {
        self.editor.borrow().commit()
    }
}

/// Decodes a photo file at full resolution for editing.
pub fn load_photo_file(path: &Path) -> anyhow::Result<SourceImage> {
    let reference = path
        .to_str()
        .with_context(|| format!("non UTF-8 photo path {}", path.display()))?;
    load_source_image(&FileImageSource::new(), reference, None)
        .with_context(|| format!("failed to open photo {reference}"))
}

fn translate_event(
    area: &DrawingArea,
    event: &gdk::Event,
    mouse_down: &Cell<bool>,
) -> Option<TouchEvent> {
    let time_ms = event.time();
    match event.event_type() {
        gdk::EventType::TouchCancel => return Some(TouchEvent::Cancel),
        gdk::EventType::TouchBegin | gdk::EventType::TouchUpdate | gdk::EventType::TouchEnd => {
            let id = sequence_id(event)?;
            let point = widget_point(area, event)?;
            return Some(match event.event_type() {
                gdk::EventType::TouchBegin => TouchEvent::Down { id, point, time_ms },
                gdk::EventType::TouchUpdate => TouchEvent::Move { id, point, time_ms },
                _ => TouchEvent::Up { id, point, time_ms },
            });
        }
        _ => {}
    }

    // Emulated touches are already delivered as touch events.
    if event.is_pointer_emulated() {
        return None;
    }
    let point = widget_point(area, event)?;
    let id = MOUSE_POINTER;
    match event.event_type() {
        gdk::EventType::ButtonPress if is_primary(event) => {
            mouse_down.set(true);
            Some(TouchEvent::Down { id, point, time_ms })
        }
        gdk::EventType::MotionNotify if mouse_down.get() => {
            Some(TouchEvent::Move { id, point, time_ms })
        }
        gdk::EventType::ButtonRelease if is_primary(event) && mouse_down.get() => {
            mouse_down.set(false);
            Some(TouchEvent::Up { id, point, time_ms })
        }
        _ => None,
    }
}

fn is_primary(event: &gdk::Event) -> bool {
    event
        .downcast_ref::<gdk::ButtonEvent>()
        .is_some_and(|button| button.button() == gdk::BUTTON_PRIMARY)
}

fn sequence_id(event: &gdk::Event) -> Option<PointerId> {
    let sequence = event.event_sequence();
    Some(sequence.as_ptr() as usize as PointerId)
}

/// Legacy events carry surface coordinates; map them into the drawing area.
fn widget_point(area: &DrawingArea, event: &gdk::Event) -> Option<Point> {
    let (x, y) = event.position()?;
    let native = area.native()?;
    let (offset_x, offset_y) = native.surface_transform();
    let surface_point = graphene::Point::new((x - offset_x) as f32, (y - offset_y) as f32);
    let local = native.compute_point(area, &surface_point)?;
    Some(Point::new(f64::from(local.x()), f64::from(local.y())))
}
