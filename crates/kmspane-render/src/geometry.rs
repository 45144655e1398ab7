#![forbid(unsafe_code)]

//! Geometric primitives accepted by the rasterizer.
//!
//! All coordinates are canvas pixels with the origin at the top-left. Shapes
//! carry no color; the color is passed alongside at draw time.

/// Axis-aligned box covering `[x, x + w) × [y, y + h)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    #[inline]
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    /// Right edge (exclusive), saturating at `u16::MAX`.
    #[inline]
    pub const fn right(&self) -> u16 {
        self.x.saturating_add(self.w)
    }

    /// Bottom edge (exclusive), saturating at `u16::MAX`.
    #[inline]
    pub const fn bottom(&self) -> u16 {
        self.y.saturating_add(self.h)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Circle centred on `(x, y)` with radius `r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Circle {
    pub x: u16,
    pub y: u16,
    pub r: u16,
}

impl Circle {
    #[inline]
    pub const fn new(x: u16, y: u16, r: u16) -> Self {
        Self { x, y, r }
    }
}

/// Segment from `(x0, y0)` to `(x1, y1)`, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Line {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

/// Quadratic bezier curve.
///
/// Control points are wider than canvas coordinates so a curve can bend
/// through points outside the canvas; only on-canvas samples are plotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bezier2 {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Filled triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Triangle {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
    pub x2: u16,
    pub y2: u16,
}

/// Copy of a `w × h` block from `(src_x, src_y)` to `(dst_x, dst_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectCopy {
    pub dst_x: u16,
    pub dst_y: u16,
    pub src_x: u16,
    pub src_y: u16,
    pub w: u16,
    pub h: u16,
}

/// Any primitive that paints with a single color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Rect(Rect),
    Circle(Circle),
    Line(Line),
    Bezier2(Bezier2),
    Triangle(Triangle),
}

impl Shape {
    /// Short lowercase name, used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Rect(_) => "rect",
            Self::Circle(_) => "circle",
            Self::Line(_) => "line",
            Self::Bezier2(_) => "bezier2",
            Self::Triangle(_) => "triangle",
        }
    }
}

impl From<Rect> for Shape {
    fn from(r: Rect) -> Self {
        Self::Rect(r)
    }
}

impl From<Circle> for Shape {
    fn from(c: Circle) -> Self {
        Self::Circle(c)
    }
}

impl From<Line> for Shape {
    fn from(l: Line) -> Self {
        Self::Line(l)
    }
}

impl From<Bezier2> for Shape {
    fn from(b: Bezier2) -> Self {
        Self::Bezier2(b)
    }
}

impl From<Triangle> for Shape {
    fn from(t: Triangle) -> Self {
        Self::Triangle(t)
    }
}
