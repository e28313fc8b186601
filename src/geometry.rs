/// Shared geometric and color primitives used across editor and compositor modules.

/// Width:height ratio of every stage and crop window.
pub const TARGET_ASPECT: f64 = 4.0 / 5.0;

/// Smallest divisor accepted by scale computations.
pub const SCALE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Angle of the vector `self -> other` in degrees, y axis pointing down.
    pub fn angle_to_degrees(self, other: Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x).to_degrees()
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn aspect(self) -> f64 {
        self.width / self.height.max(SCALE_EPSILON)
    }
}

/// Axis-aligned rectangle in floating point pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_ltrb(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn from_center(center: Point, width: f64, height: f64) -> Self {
        Self::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            width,
            height,
        )
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn aspect(&self) -> f64 {
        self.size().aspect()
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    /// True when `other` lies inside `self`, allowing `tolerance` of slack on every edge.
    pub fn contains_rect(&self, other: &Rect, tolerance: f64) -> bool {
        other.left() >= self.left() - tolerance
            && other.top() >= self.top() - tolerance
            && other.right() <= self.right() + tolerance
            && other.bottom() <= self.bottom() + tolerance
    }

    pub fn inset(&self, insets: Insets) -> Rect {
        Rect::from_ltrb(
            self.left() + insets.left,
            self.top() + insets.top,
            (self.right() - insets.right).max(self.left() + insets.left),
            (self.bottom() - insets.bottom).max(self.top() + insets.top),
        )
    }

    pub fn inset_uniform(&self, amount: f64) -> Rect {
        self.inset(Insets::uniform(amount))
    }

    pub fn outset(&self, insets: Insets) -> Rect {
        Rect::from_ltrb(
            self.left() - insets.left,
            self.top() - insets.top,
            self.right() + insets.right,
            self.bottom() + insets.bottom,
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right()).max(left);
        let bottom = self.bottom().min(other.bottom()).max(top);
        Rect::from_ltrb(left, top, right, bottom)
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left(), self.top()),
            Point::new(self.right(), self.top()),
            Point::new(self.right(), self.bottom()),
            Point::new(self.left(), self.bottom()),
        ]
    }

    /// Maps a point inside the rect to `[0,1]²`, clamped.
    pub fn normalize_point(&self, point: Point) -> (f64, f64) {
        let u = (point.x - self.x) / self.width.max(SCALE_EPSILON);
        let v = (point.y - self.y) / self.height.max(SCALE_EPSILON);
        (clamp_unit(u), clamp_unit(v))
    }

    pub fn denormalize(&self, u: f64, v: f64) -> Point {
        Point::new(
            self.x + self.width * clamp_unit(u),
            self.y + self.height * clamp_unit(v),
        )
    }
}

/// Per-edge padding, such as the content padding of a frame layer.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Deserialize, serde::Serialize)]
pub struct Insets {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Insets {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn uniform(amount: f64) -> Self {
        Self::new(amount, amount, amount, amount)
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self::new(
            self.left * factor,
            self.top * factor,
            self.right * factor,
            self.bottom * factor,
        )
    }
}

/// 2D affine transform laid out like cairo's matrix:
/// `x' = xx*x + xy*y + x0`, `y' = yx*x + yy*y + y0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub xx: f64,
    pub yx: f64,
    pub xy: f64,
    pub yy: f64,
    pub x0: f64,
    pub y0: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        xx: 1.0,
        yx: 0.0,
        xy: 0.0,
        yy: 1.0,
        x0: 0.0,
        y0: 0.0,
    };

    pub const fn translation(dx: f64, dy: f64) -> Self {
        Affine {
            x0: dx,
            y0: dy,
            ..Self::IDENTITY
        }
    }

    pub const fn scaling(factor: f64) -> Self {
        Affine {
            xx: factor,
            yy: factor,
            ..Self::IDENTITY
        }
    }

    pub fn rotation_degrees(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Affine {
            xx: cos,
            yx: sin,
            xy: -sin,
            yy: cos,
            x0: 0.0,
            y0: 0.0,
        }
    }

    /// Applies `next` after `self`.
    pub fn then(self, next: Affine) -> Affine {
        Affine {
            xx: next.xx * self.xx + next.xy * self.yx,
            yx: next.yx * self.xx + next.yy * self.yx,
            xy: next.xx * self.xy + next.xy * self.yy,
            yy: next.yx * self.xy + next.yy * self.yy,
            x0: next.xx * self.x0 + next.xy * self.y0 + next.x0,
            y0: next.yx * self.x0 + next.yy * self.y0 + next.y0,
        }
    }

    pub fn then_translate(self, dx: f64, dy: f64) -> Affine {
        self.then(Affine::translation(dx, dy))
    }

    pub fn then_scale(self, factor: f64) -> Affine {
        self.then(Affine::scaling(factor))
    }

    pub fn then_rotate_degrees(self, degrees: f64) -> Affine {
        self.then(Affine::rotation_degrees(degrees))
    }

    pub fn apply(&self, point: Point) -> Point {
        Point::new(
            self.xx * point.x + self.xy * point.y + self.x0,
            self.yx * point.x + self.yy * point.y + self.y0,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.xx * self.yy - self.xy * self.yx
    }

    pub fn invert(&self) -> Option<Affine> {
        let det = self.determinant();
        if det.abs() < f64::EPSILON {
            return None;
        }
        let xx = self.yy / det;
        let xy = -self.xy / det;
        let yx = -self.yx / det;
        let yy = self.xx / det;
        Some(Affine {
            xx,
            yx,
            xy,
            yy,
            x0: -(xx * self.x0 + xy * self.y0),
            y0: -(yx * self.x0 + yy * self.y0),
        })
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Largest rectangle with `aspect` (width / height) centered inside `container`.
pub fn fit_aspect_inside(container: Rect, aspect: f64) -> Rect {
    let available_width = container.width.max(1.0);
    let available_height = container.height.max(1.0);
    if available_width / available_height > aspect {
        let width = available_height * aspect;
        let left = container.x + (available_width - width) / 2.0;
        Rect::new(left, container.y, width, available_height)
    } else {
        let height = available_width / aspect;
        let top = container.y + (available_height - height) / 2.0;
        Rect::new(container.x, top, available_width, height)
    }
}

/// The 4:5 stage centered inside `container`.
pub fn fit_stage(container: Rect) -> Rect {
    fit_aspect_inside(container, TARGET_ASPECT)
}

/// Destination rectangle that covers `target` with content of `content_aspect`
/// without distortion: the matching axis fills and the other overflows evenly.
pub fn cover_fit(target: Rect, content_aspect: f64) -> Rect {
    let target_aspect = target.aspect();
    let center = target.center();
    if content_aspect > target_aspect {
        let height = target.height;
        Rect::from_center(center, height * content_aspect, height)
    } else {
        let width = target.width;
        Rect::from_center(center, width, width / content_aspect.max(SCALE_EPSILON))
    }
}

fn rotated_extent(width: f64, height: f64, degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (sin, cos) = (sin.abs(), cos.abs());
    (width * cos + height * sin, width * sin + height * cos)
}

/// Scale applied before rotating a `width`×`height` image so that, once rotated,
/// it still covers its unrotated footprint. Never below 1.
pub fn cover_scale(width: f64, height: f64, degrees: f64) -> f64 {
    if degrees.abs() < 0.01 {
        return 1.0;
    }
    let width = width.max(SCALE_EPSILON);
    let height = height.max(SCALE_EPSILON);
    let (rotated_width, rotated_height) = rotated_extent(width, height, degrees);
    (rotated_width / width).max(rotated_height / height).max(1.0)
}

/// Scale that makes a rotated `width`×`height` card fit back inside `width`×`height`.
pub fn shrink_to_fit_rotation(width: f64, height: f64, degrees: f64) -> f64 {
    let width = width.max(SCALE_EPSILON);
    let height = height.max(SCALE_EPSILON);
    let (rotated_width, rotated_height) = rotated_extent(width, height, degrees);
    (width / rotated_width).min(height / rotated_height)
}

/// Wraps any angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbaColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl RgbaColor {
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub const fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self::new(red, green, blue, 0xFF)
    }

    pub fn to_cairo_rgba(self) -> (f64, f64, f64, f64) {
        (
            f64::from(self.red) / 255.0,
            f64::from(self.green) / 255.0,
            f64::from(self.blue) / 255.0,
            f64::from(self.alpha) / 255.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn fit_stage_letterboxes_wide_containers() {
        let stage = fit_stage(Rect::new(0.0, 0.0, 1000.0, 500.0));
        assert_close(stage.height, 500.0);
        assert_close(stage.width, 400.0);
        assert_close(stage.x, 300.0);
    }

    #[test]
    fn fit_stage_letterboxes_tall_containers() {
        let stage = fit_stage(Rect::new(10.0, 20.0, 400.0, 1000.0));
        assert_close(stage.width, 400.0);
        assert_close(stage.height, 500.0);
        assert_close(stage.y, 20.0 + 250.0);
    }

    #[test]
    fn cover_fit_never_distorts() {
        let target = Rect::new(0.0, 0.0, 400.0, 500.0);
        let wide = cover_fit(target, 2.0);
        assert_close(wide.height, 500.0);
        assert_close(wide.width, 1000.0);
        assert_close(wide.center().x, 200.0);
        let tall = cover_fit(target, 0.5);
        assert_close(tall.width, 400.0);
        assert_close(tall.height, 800.0);
    }

    #[test]
    fn cover_scale_matches_rotated_bounding_box() {
        assert_close(cover_scale(400.0, 500.0, 0.0), 1.0);
        assert_close(cover_scale(400.0, 500.0, 180.0), 1.0);
        // 90 deg: the 500 side must cover the 400 side and vice versa.
        assert_close(cover_scale(400.0, 500.0, 90.0), 500.0 / 400.0);
        assert!(cover_scale(400.0, 500.0, 15.0) > 1.0);
    }

    #[test]
    fn shrink_to_fit_rotation_is_inverse_of_worst_axis() {
        assert_close(shrink_to_fit_rotation(400.0, 500.0, 0.0), 1.0);
        let shrink = shrink_to_fit_rotation(400.0, 500.0, -6.0);
        assert!(shrink < 1.0 && shrink > 0.8);
    }

    #[test]
    fn normalize_degrees_wraps_into_half_open_range() {
        assert_close(normalize_degrees(-30.0), 330.0);
        assert_close(normalize_degrees(720.0), 0.0);
        assert_close(normalize_degrees(359.5), 359.5);
        assert_close(normalize_degrees(f64::NAN), 0.0);
    }

    #[test]
    fn affine_invert_round_trips() {
        let transform = Affine::translation(-50.0, -60.0)
            .then_scale(2.5)
            .then_rotate_degrees(33.0)
            .then_translate(100.0, 120.0);
        let inverse = transform.invert().expect("invertible");
        let point = Point::new(17.0, -4.0);
        let back = inverse.apply(transform.apply(point));
        assert_close(back.x, point.x);
        assert_close(back.y, point.y);
    }

    #[test]
    fn rect_normalize_point_clamps_outside_points() {
        let rect = Rect::new(10.0, 10.0, 100.0, 200.0);
        assert_eq!(rect.normalize_point(Point::new(-5.0, 400.0)), (0.0, 1.0));
        assert_eq!(rect.normalize_point(Point::new(60.0, 110.0)), (0.5, 0.5));
    }
}
