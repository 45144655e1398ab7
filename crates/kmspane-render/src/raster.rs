#![forbid(unsafe_code)]

//! CPU rasterizer.
//!
//! Every primitive lowers to [`draw_point`] (or, for copies, to row-sized
//! byte moves). `draw_point` does no clipping of its own; each primitive
//! clips against the canvas before plotting, so a shape that hangs off an
//! edge draws only its on-canvas part.
//!
//! [`draw_circle`] fills horizontal spans between its symmetric points, so
//! the result is a filled disc rather than a one-pixel ring.

use crate::canvas::{BYTES_PER_PIXEL, Canvas};
use crate::color::Color;
use crate::geometry::{Bezier2, Circle, Line, Rect, RectCopy, Shape, Triangle};

/// Upper bound on bezier samples; keeps far-flung control points cheap.
const MAX_BEZIER_STEPS: i64 = 1 << 17;

/// Write one pixel. The caller guarantees `x < width` and `y < height`.
#[inline]
pub fn draw_point(canvas: &mut Canvas, x: u16, y: u16, color: Color) {
    let at = canvas.offset(x, y);
    canvas.as_bytes_mut()[at..at + BYTES_PER_PIXEL as usize].copy_from_slice(&color.to_bgra());
}

/// Plot a signed coordinate if it lands on the canvas.
#[inline]
fn plot(canvas: &mut Canvas, x: i64, y: i64, color: Color) {
    if x < 0 || y < 0 || x >= i64::from(canvas.width()) || y >= i64::from(canvas.height()) {
        return;
    }
    draw_point(canvas, x as u16, y as u16, color);
}

/// Fill the inclusive span `[x0, x1]` on row `y`, clipped to the canvas.
fn hspan(canvas: &mut Canvas, x0: i32, x1: i32, y: i32, color: Color) {
    if y < 0 || y >= i32::from(canvas.height()) || canvas.width() == 0 {
        return;
    }
    let lo = x0.max(0);
    let hi = x1.min(i32::from(canvas.width()) - 1);
    for x in lo..=hi {
        draw_point(canvas, x as u16, y as u16, color);
    }
}

/// Set every pixel to `color`.
pub fn fill(canvas: &mut Canvas, color: Color) {
    #[cfg(feature = "tracing")]
    let _span = tracing::trace_span!("raster.fill", width = canvas.width(), height = canvas.height()).entered();

    let px = color.to_bgra();
    let stride = canvas.stride() as usize;
    let row_bytes = canvas.width() as usize * BYTES_PER_PIXEL as usize;
    let height = canvas.height() as usize;
    let bytes = canvas.as_bytes_mut();
    for row in 0..height {
        let start = row * stride;
        for chunk in bytes[start..start + row_bytes].chunks_exact_mut(BYTES_PER_PIXEL as usize) {
            chunk.copy_from_slice(&px);
        }
    }
}

/// Fill `[x, x + w) × [y, y + h)`, clipped to the canvas.
pub fn draw_rect(canvas: &mut Canvas, rect: &Rect, color: Color) {
    let right = rect.right().min(canvas.width());
    let bottom = rect.bottom().min(canvas.height());
    for y in rect.y..bottom {
        for x in rect.x..right {
            draw_point(canvas, x, y, color);
        }
    }
}

/// Span-filled midpoint circle.
pub fn draw_circle(canvas: &mut Canvas, circle: &Circle, color: Color) {
    let cx = i32::from(circle.x);
    let cy = i32::from(circle.y);
    let mut x = i32::from(circle.r);
    let mut y = 0i32;
    let mut t1 = x / 16;

    while x >= y {
        hspan(canvas, cx - x, cx + x, cy + y, color);
        hspan(canvas, cx - x, cx + x, cy - y, color);
        hspan(canvas, cx - y, cx + y, cy + x, color);
        hspan(canvas, cx - y, cx + y, cy - x, color);

        y += 1;
        t1 += y;
        let t2 = t1 - x;
        if t2 >= 0 {
            t1 = t2;
            x -= 1;
        }
    }
}

/// Bresenham segment, both endpoints inclusive.
pub fn draw_line(canvas: &mut Canvas, line: &Line, color: Color) {
    let (mut x, mut y) = (i64::from(line.x0), i64::from(line.y0));
    let (x1, y1) = (i64::from(line.x1), i64::from(line.y1));
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        plot(canvas, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = err * 2;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Quadratic bezier, sampled densely enough that consecutive samples touch.
pub fn draw_bezier2(canvas: &mut Canvas, curve: &Bezier2, color: Color) {
    let span = |a: i32, b: i32| (i64::from(a) - i64::from(b)).abs();
    let reach_x = span(curve.x0, curve.x1) + span(curve.x1, curve.x2);
    let reach_y = span(curve.y0, curve.y1) + span(curve.y1, curve.y2);
    let steps = reach_x.max(reach_y).clamp(1, MAX_BEZIER_STEPS);

    let n = i128::from(steps);
    let n2 = n * n;
    let eval = |p0: i32, p1: i32, p2: i32, i: i128| -> i64 {
        let a = n - i;
        let num = a * a * i128::from(p0) + 2 * a * i * i128::from(p1) + i * i * i128::from(p2);
        ((num * 2 + n2).div_euclid(n2 * 2)) as i64
    };

    for i in 0..=n {
        let x = eval(curve.x0, curve.x1, curve.x2, i);
        let y = eval(curve.y0, curve.y1, curve.y2, i);
        plot(canvas, x, y, color);
    }
}

/// Filled triangle; either winding order is accepted.
pub fn draw_triangle(canvas: &mut Canvas, tri: &Triangle, color: Color) {
    if canvas.width() == 0 || canvas.height() == 0 {
        return;
    }
    let v = [
        (i64::from(tri.x0), i64::from(tri.y0)),
        (i64::from(tri.x1), i64::from(tri.y1)),
        (i64::from(tri.x2), i64::from(tri.y2)),
    ];
    let edge = |a: (i64, i64), b: (i64, i64), p: (i64, i64)| {
        (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
    };

    let min_x = v.iter().map(|p| p.0).min().unwrap_or(0);
    let max_x = v
        .iter()
        .map(|p| p.0)
        .max()
        .unwrap_or(0)
        .min(i64::from(canvas.width()) - 1);
    let min_y = v.iter().map(|p| p.1).min().unwrap_or(0);
    let max_y = v
        .iter()
        .map(|p| p.1)
        .max()
        .unwrap_or(0)
        .min(i64::from(canvas.height()) - 1);

    for py in min_y..=max_y {
        for px in min_x..=max_x {
            let p = (px, py);
            let w0 = edge(v[1], v[2], p);
            let w1 = edge(v[2], v[0], p);
            let w2 = edge(v[0], v[1], p);
            let inside = (w0 >= 0 && w1 >= 0 && w2 >= 0) || (w0 <= 0 && w1 <= 0 && w2 <= 0);
            if inside {
                draw_point(canvas, px as u16, py as u16, color);
            }
        }
    }
}

/// Clip a copy so both the source and destination blocks fit their canvases.
///
/// Returns `(w, h)` in pixels, either of which may be zero.
fn clip_copy(copy: &RectCopy, src: (u16, u16), dst: (u16, u16)) -> (usize, usize) {
    let w = copy
        .w
        .min(src.0.saturating_sub(copy.src_x))
        .min(dst.0.saturating_sub(copy.dst_x));
    let h = copy
        .h
        .min(src.1.saturating_sub(copy.src_y))
        .min(dst.1.saturating_sub(copy.dst_y));
    (w as usize, h as usize)
}

/// Copy a block within one canvas. Overlapping blocks copy correctly.
pub fn copy_rect(canvas: &mut Canvas, copy: &RectCopy) {
    let size = (canvas.width(), canvas.height());
    let (w, h) = clip_copy(copy, size, size);
    if w == 0 || h == 0 {
        return;
    }
    let row_bytes = w * BYTES_PER_PIXEL as usize;
    let rows: Box<dyn Iterator<Item = usize>> = if copy.dst_y > copy.src_y {
        Box::new((0..h).rev())
    } else {
        Box::new(0..h)
    };
    for row in rows {
        let src = canvas.offset(copy.src_x, copy.src_y + row as u16);
        let dst = canvas.offset(copy.dst_x, copy.dst_y + row as u16);
        canvas.as_bytes_mut().copy_within(src..src + row_bytes, dst);
    }
}

/// Copy a block from `src` into `dst`.
pub fn copy_rect_between(dst: &mut Canvas, src: &Canvas, copy: &RectCopy) {
    let (w, h) = clip_copy(
        copy,
        (src.width(), src.height()),
        (dst.width(), dst.height()),
    );
    let row_bytes = w * BYTES_PER_PIXEL as usize;
    for row in 0..h {
        let from = src.offset(copy.src_x, copy.src_y + row as u16);
        let to = dst.offset(copy.dst_x, copy.dst_y + row as u16);
        dst.as_bytes_mut()[to..to + row_bytes].copy_from_slice(&src.as_bytes()[from..from + row_bytes]);
    }
}

/// Draw any single-color [`Shape`].
pub fn draw_shape(canvas: &mut Canvas, shape: &Shape, color: Color) {
    match shape {
        Shape::Rect(r) => draw_rect(canvas, r, color),
        Shape::Circle(c) => draw_circle(canvas, c, color),
        Shape::Line(l) => draw_line(canvas, l, color),
        Shape::Bezier2(b) => draw_bezier2(canvas, b, color),
        Shape::Triangle(t) => draw_triangle(canvas, t, color),
    }
}
