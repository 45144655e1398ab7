//! Rotation against the in-memory backend, end to end on real threads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kmspane_backend::{FrameLog, HeadlessBackend, ModeInfo};
use kmspane_render::{CanvasLayout, Color};
use kmspane_runtime::{CancellationSource, PaneStore, RotationThread};

const RED: Color = Color::rgb(0xFF, 0, 0);
const GREEN: Color = Color::rgb(0, 0xFF, 0);
const WAIT: Duration = Duration::from_secs(10);

/// Route trace output through the test harness so failures show the loop's
/// view of events.
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn backend(log: &FrameLog) -> HeadlessBackend {
    HeadlessBackend::with_log(ModeInfo::new(8, 8, 60), log.clone())
}

fn color_of(log: &FrameLog, seq: usize) -> [u8; 4] {
    log.frames()[seq].canvas.pixel(0, 0).unwrap()
}

#[test]
fn root_and_one_pane_alternate() {
    init_logs();
    let store = Arc::new(PaneStore::with_root(CanvasLayout::packed(8, 8), 16, Color::ROOT_BACKGROUND).unwrap());
    store.create("red", RED).unwrap();
    let log = FrameLog::new();
    let source = CancellationSource::new().unwrap();
    let thread = RotationThread::spawn(backend(&log), Arc::clone(&store), source.clone(), Duration::from_millis(1)).unwrap();

    assert!(log.wait_for(4, WAIT));
    source.cancel();
    let outcome = thread.join().unwrap();
    assert!(outcome.result.is_ok());

    assert_eq!(color_of(&log, 0), Color::ROOT_BACKGROUND.to_bgra());
    assert_eq!(color_of(&log, 1), RED.to_bgra());
    assert_eq!(color_of(&log, 2), Color::ROOT_BACKGROUND.to_bgra());
    assert_eq!(color_of(&log, 3), RED.to_bgra());
}

#[test]
fn consecutive_frames_use_alternating_buffers() {
    init_logs();
    let store = Arc::new(PaneStore::with_root(CanvasLayout::packed(4, 4), 4, Color::BLACK).unwrap());
    let log = FrameLog::new();
    let source = CancellationSource::new().unwrap();
    let thread = RotationThread::spawn(backend(&log), store, source.clone(), Duration::from_millis(1)).unwrap();
    assert!(log.wait_for(3, WAIT));
    source.cancel();
    thread.join().unwrap();

    let frames = log.frames();
    assert_ne!(frames[0].buffer, frames[1].buffer);
    assert_eq!(frames[0].buffer, frames[2].buffer);
}

#[test]
fn removed_pane_stops_appearing() {
    init_logs();
    let store = Arc::new(PaneStore::with_root(CanvasLayout::packed(4, 4), 16, Color::BLACK).unwrap());
    store.create("red", RED).unwrap();
    store.create("green", GREEN).unwrap();
    let log = FrameLog::new();
    let source = CancellationSource::new().unwrap();
    let thread = RotationThread::spawn(backend(&log), Arc::clone(&store), source.clone(), Duration::from_millis(1)).unwrap();

    assert!(log.wait_for(3, WAIT));
    store.remove("red").unwrap();
    let after_removal = log.total();
    assert!(log.wait_for(after_removal + 6, WAIT));
    source.cancel();
    thread.join().unwrap();

    // At most one frame may have been in flight while the pane was removed.
    let tail: Vec<_> = log
        .frames()
        .into_iter()
        .skip(after_removal as usize + 1)
        .map(|f| f.canvas.pixel(0, 0).unwrap())
        .collect();
    assert!(!tail.is_empty());
    assert!(tail.iter().all(|px| *px != RED.to_bgra()));
    assert!(tail.contains(&GREEN.to_bgra()));
    assert!(tail.contains(&Color::BLACK.to_bgra()));
}

#[test]
fn cancellation_interrupts_long_interval() {
    init_logs();
    let store = Arc::new(PaneStore::with_root(CanvasLayout::packed(2, 2), 4, Color::BLACK).unwrap());
    let log = FrameLog::new();
    let source = CancellationSource::new().unwrap();
    let thread = RotationThread::spawn(backend(&log), store, source.clone(), Duration::from_secs(3600)).unwrap();
    assert!(log.wait_for(1, WAIT));

    let start = Instant::now();
    source.cancel();
    let outcome = thread.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.stats.shown, 1);
}

#[test]
fn empty_store_shows_nothing_until_a_pane_appears() {
    init_logs();
    let store = Arc::new(PaneStore::new(CanvasLayout::packed(2, 2), 4));
    let log = FrameLog::new();
    let source = CancellationSource::new().unwrap();
    let thread = RotationThread::spawn(backend(&log), Arc::clone(&store), source.clone(), Duration::from_millis(1)).unwrap();

    assert!(!log.wait_for(1, Duration::from_millis(30)));
    store.create("late", GREEN).unwrap();
    assert!(log.wait_for(1, WAIT));
    source.cancel();
    let outcome = thread.join().unwrap();
    assert!(outcome.stats.ticks > outcome.stats.shown);
    assert_eq!(log.frames()[0].canvas.pixel(1, 1).unwrap(), GREEN.to_bgra());
}
