use gtk4::cairo;

use super::PreviewEditor;
use crate::geometry::{Rect, RgbaColor};
use crate::note::Mode;
use crate::render::{
    draw_caption, draw_crop_overlay, paint_transformed, rgba_image_to_surface, RenderResult,
};
use crate::stage::photo_transform;

const CROP_DIM: RgbaColor = RgbaColor::new(0, 0, 0, 0x99);
const CROP_STROKE_DP: f64 = 1.0;

impl PreviewEditor {
    /// Draws one preview frame into a `width`×`height` view.
    pub fn draw(&mut self, context: &cairo::Context, width: f64, height: f64) -> RenderResult<()> {
        self.set_view_size(width, height);
        let geometry = self.geometry().clone();
        let density = self.style.density;

        match (self.session.mode, geometry.photo_transform) {
            (Mode::Photo, Some(transform)) => {
                let surface = match self.photo_surface.take() {
                    Some(surface) => surface,
                    None => match self.session.photo.as_ref() {
                        Some(photo) => rgba_image_to_surface(&photo.image)?,
                        None => return Ok(()),
                    },
                };
                let surface = self.photo_surface.insert(surface);
                paint_transformed(context, surface, transform, geometry.stage)?;
                let crop_dest = geometry
                    .crop_window
                    .map(|window| crop_destination(geometry.stage, window))
                    .unwrap_or(geometry.stage);
                draw_crop_overlay(
                    context,
                    geometry.stage,
                    crop_dest,
                    CROP_DIM,
                    self.style.dp(CROP_STROKE_DP),
                )?;
            }
            _ => self
                .artwork
                .draw_note_art(context, geometry.stage, density)?,
        }

        if let Some(caption) = geometry.caption.as_ref() {
            draw_caption(context, caption, density)?;
        }
        Ok(())
    }
}

/// Unrotated crop window mapped into the view, limited to the stage.
fn crop_destination(stage: Rect, window: Rect) -> Rect {
    let transform = photo_transform(stage, window, 0.0);
    let corners = window.corners().map(|corner| transform.apply(corner));
    let (mut left, mut top) = (f64::INFINITY, f64::INFINITY);
    let (mut right, mut bottom) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for corner in corners {
        left = left.min(corner.x);
        top = top.min(corner.y);
        right = right.max(corner.x);
        bottom = bottom.max(corner.y);
    }
    Rect::from_ltrb(left, top, right, bottom).intersect(&stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::FrameArtwork;
    use crate::caption::FixedAdvanceMeasure;
    use crate::editor::EditSession;
    use crate::geometry::Insets;
    use crate::render::{create_surface, surface_to_rgba_image};
    use crate::source::SourceImage;
    use crate::stage::StageStyle;
    use image::{Rgba, RgbaImage};

    fn editor(session: EditSession) -> PreviewEditor {
        PreviewEditor::new(
            session,
            StageStyle {
                density: 1.0,
                ..StageStyle::default()
            },
            FrameArtwork::with_layers(None, None, None, Insets::uniform(10.0)),
            8.0,
            Box::new(FixedAdvanceMeasure::default()),
        )
    }

    #[test]
    fn photo_preview_is_clipped_to_the_stage() {
        let mut session = EditSession::default();
        session.set_mode(Mode::Photo);
        session.set_photo(SourceImage {
            reference: "memory://red".to_string(),
            image: RgbaImage::from_pixel(400, 200, Rgba([255, 0, 0, 255])),
        });
        let mut editor = editor(session);

        let surface = create_surface(120, 100).expect("surface");
        let context = cairo::Context::new(&surface).expect("context");
        editor.draw(&context, 120.0, 100.0).expect("draw");
        drop(context);
        let image = surface_to_rgba_image(&surface).expect("image");

        let stage = editor.geometry().stage;
        let inside = image.get_pixel(stage.center().x as u32, stage.center().y as u32);
        assert_eq!(inside, &Rgba([255, 0, 0, 255]));
        // The photo extends past the stage on both sides but is not drawn there.
        let just_left = image.get_pixel(stage.left() as u32 - 2, 50);
        assert_eq!(just_left[3], 0, "photo leaked left of the stage: {just_left:?}");
        let just_right = image.get_pixel(stage.right() as u32 + 2, 50);
        assert_eq!(just_right[3], 0, "photo leaked right of the stage: {just_right:?}");
        assert_eq!(image.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn note_preview_fills_stage_with_note_art() {
        let mut editor = editor(EditSession::default());
        let surface = create_surface(100, 100).expect("surface");
        let context = cairo::Context::new(&surface).expect("context");
        editor.draw(&context, 100.0, 100.0).expect("draw");
        drop(context);
        let image = surface_to_rgba_image(&surface).expect("image");
        let stage = editor.geometry().stage;
        assert_eq!(image.get_pixel(stage.x as u32 + 2, stage.y as u32 + 2)[3], 255);
        assert_eq!(image.get_pixel(2, 50)[3], 0);
    }
}
