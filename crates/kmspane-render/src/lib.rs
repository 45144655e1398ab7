#![forbid(unsafe_code)]

//! Render kernel: BGRA canvases, raster primitives, and RGBA dumps.
//!
//! # Role in kmspane
//! `kmspane-render` is the pixel layer. It owns the [`Canvas`] type that
//! panes draw into and that display backends copy into scanout memory, and
//! the CPU rasterizer that mutates it.
//!
//! # Primary responsibilities
//! - **Canvas**: owned byte buffer with width, height and row stride.
//! - **Raster**: fill, point, rect, circle, line, bezier, triangle, copy.
//! - **Dump**: byte-exact BGRA → RGBA serialization for headless checks.
//!
//! # How it fits in the system
//! The runtime keeps one canvas per pane and draws into it through
//! [`raster`]. The rotation loop hands canvases to a
//! `kmspane_backend::DisplayBackend`, which never needs to know how the
//! pixels were produced. Nothing here touches hardware, so every primitive
//! can be exercised without a display.

pub mod canvas;
pub mod color;
pub mod dump;
pub mod geometry;
pub mod raster;

pub use canvas::{BYTES_PER_PIXEL, Canvas, CanvasLayout};
pub use color::{Color, ParseColorError};
pub use dump::{DumpError, dump_rgba_file, write_rgba};
pub use geometry::{Bezier2, Circle, Line, Rect, RectCopy, Shape, Triangle};
