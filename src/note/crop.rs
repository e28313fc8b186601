use crate::geometry::{clamp_unit, Point, Rect, Size, SCALE_EPSILON, TARGET_ASPECT};

use super::{clamp_zoom, NormalizedPoint};

/// Visible window inside the source image, each edge in `[0,1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedCrop {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl NormalizedCrop {
    /// Clamps edges into `[0,1]` with `right >= left` and `bottom >= top`.
    pub fn clamped(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        let left = clamp_unit(left);
        let top = clamp_unit(top);
        let right = if right.is_nan() { left } else { right.clamp(left, 1.0) };
        let bottom = if bottom.is_nan() { top } else { bottom.clamp(top, 1.0) };
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Re-clamps and drops crops that collapse to zero area.
    pub fn validated(self) -> Option<Self> {
        let crop = Self::clamped(self.left, self.top, self.right, self.bottom);
        (crop.right > crop.left && crop.bottom > crop.top).then_some(crop)
    }

    /// Parses `"l,t,r,b"`. Wrong field counts or non-numeric parts yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts = raw.split(',').map(str::trim).collect::<Vec<_>>();
        if parts.len() != 4 {
            return None;
        }
        let mut values = [0.0_f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse::<f64>().ok().filter(|value| value.is_finite())?;
        }
        Self::clamped(values[0], values[1], values[2], values[3]).validated()
    }

    pub fn format(&self) -> String {
        format!(
            "{:.6},{:.6},{:.6},{:.6}",
            self.left, self.top, self.right, self.bottom
        )
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn to_source_rect(&self, source: Size) -> Rect {
        Rect::from_ltrb(
            self.left * source.width,
            self.top * source.height,
            self.right * source.width,
            self.bottom * source.height,
        )
    }
}

/// Largest 4:5 window inscribed in the full source (zoom 1).
pub fn max_crop_size(source: Size) -> Size {
    let width = source.width.max(1.0);
    let height = source.height.max(1.0);
    if width / height >= TARGET_ASPECT {
        Size::new(height * TARGET_ASPECT, height)
    } else {
        Size::new(width, width / TARGET_ASPECT)
    }
}

fn zoomed_crop_size(source: Size, zoom: f64) -> Size {
    let base = max_crop_size(source);
    let zoom = clamp_zoom(zoom);
    Size::new(base.width / zoom, base.height / zoom)
}

fn clamp_center_px(source: Size, crop: Size, center: Point) -> Point {
    let half_width = crop.width / 2.0;
    let half_height = crop.height / 2.0;
    let x = center.x.clamp(half_width, (source.width - half_width).max(half_width));
    let y = center.y.clamp(half_height, (source.height - half_height).max(half_height));
    Point::new(x, y)
}

/// Crop window in source pixels for `zoom` around `center`.
///
/// The center is pulled inward so the window never leaves the source bounds.
pub fn crop_rect_in_source(source: Size, zoom: f64, center: NormalizedPoint) -> Rect {
    let crop = zoomed_crop_size(source, zoom);
    let desired = Point::new(
        clamp_unit(center.u) * source.width,
        clamp_unit(center.v) * source.height,
    );
    let center = clamp_center_px(source, crop, desired);
    Rect::from_center(center, crop.width, crop.height)
}

/// Re-clamps a normalized crop center for a (possibly new) zoom.
pub fn clamp_crop_center(source: Size, zoom: f64, center: NormalizedPoint) -> NormalizedPoint {
    let rect = crop_rect_in_source(source, zoom, center);
    let center = rect.center();
    NormalizedPoint::new(
        center.x / source.width.max(SCALE_EPSILON),
        center.y / source.height.max(SCALE_EPSILON),
    )
}

/// Moves the crop center opposite to a finger drag of `delta` view pixels,
/// so the image appears to follow the finger. `fit_scale` is view px per source px.
pub fn pan_crop_center(
    source: Size,
    zoom: f64,
    center: NormalizedPoint,
    delta: Point,
    fit_scale: f64,
) -> NormalizedPoint {
    let scale = fit_scale.max(SCALE_EPSILON);
    let desired = NormalizedPoint {
        u: center.u - (delta.x / scale) / source.width.max(SCALE_EPSILON),
        v: center.v - (delta.y / scale) / source.height.max(SCALE_EPSILON),
    };
    let crop = zoomed_crop_size(source, zoom);
    let center_px = clamp_center_px(
        source,
        crop,
        Point::new(desired.u * source.width, desired.v * source.height),
    );
    NormalizedPoint::new(
        center_px.x / source.width.max(SCALE_EPSILON),
        center_px.y / source.height.max(SCALE_EPSILON),
    )
}

/// Normalized bounds of the window the editor is currently showing.
pub fn export_normalized_crop(source: Size, zoom: f64, center: NormalizedPoint) -> NormalizedCrop {
    let rect = crop_rect_in_source(source, zoom, center);
    let width = source.width.max(SCALE_EPSILON);
    let height = source.height.max(SCALE_EPSILON);
    NormalizedCrop::clamped(
        rect.left() / width,
        rect.top() / height,
        rect.right() / width,
        rect.bottom() / height,
    )
}

/// Source window for a persisted crop, trimmed around its center to
/// `dest_aspect` when the stored window drifted from it. Never stretched.
pub fn source_window_from_normalized(
    source: Size,
    crop: NormalizedCrop,
    dest_aspect: f64,
) -> Rect {
    let raw = crop.to_source_rect(source);
    let left = raw.left().clamp(0.0, (source.width - 1.0).max(0.0));
    let top = raw.top().clamp(0.0, (source.height - 1.0).max(0.0));
    let right = raw.right().clamp(left + 1.0, source.width.max(left + 1.0));
    let bottom = raw.bottom().clamp(top + 1.0, source.height.max(top + 1.0));
    let window = Rect::from_ltrb(left, top, right, bottom);

    let aspect = window.aspect();
    if (aspect - dest_aspect).abs() <= 1e-3 {
        return window;
    }
    let center = window.center();
    if aspect > dest_aspect {
        Rect::from_center(center, window.height * dest_aspect, window.height)
    } else {
        Rect::from_center(center, window.width, window.width / dest_aspect)
    }
}

/// Fallback window when nothing was persisted: center-crop to `dest_aspect`,
/// then tighten by `zoom` around the same center.
pub fn center_crop_with_zoom(source: Size, dest_aspect: f64, zoom: f64) -> Rect {
    let width = source.width.max(1.0);
    let height = source.height.max(1.0);
    let base = if width / height > dest_aspect {
        let new_width = height * dest_aspect;
        Rect::new((width - new_width) / 2.0, 0.0, new_width, height)
    } else {
        let new_height = width / dest_aspect;
        Rect::new(0.0, (height - new_height) / 2.0, width, new_height)
    };
    let zoom = clamp_zoom(zoom);
    if zoom <= 1.0 {
        return base;
    }
    Rect::from_center(base.center(), base.width / zoom, base.height / zoom)
}
