//! Command reader fed through a real pipe.

use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kmspane_render::{CanvasLayout, Color};
use kmspane_runtime::{CancellationSource, CommandReader, PaneStore};

/// Reply sink shared with the test.
#[derive(Clone, Default)]
struct Replies(Arc<Mutex<Vec<u8>>>);

impl Replies {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).lines().map(str::to_owned).collect()
    }
}

impl Write for Replies {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn pipe() -> (File, File) {
    let (read, write) = nix::unistd::pipe().unwrap();
    (File::from(read), File::from(write))
}

fn store() -> Arc<PaneStore> {
    Arc::new(PaneStore::with_root(CanvasLayout::packed(16, 16), 8, Color::BLACK).unwrap())
}

#[test]
fn script_is_answered_line_by_line() {
    let (read, mut write) = pipe();
    let replies = Replies::default();
    let store = store();
    let source = CancellationSource::new().unwrap();

    write
        .write_all(
            b"red: CREATE #FF0000\n\
              red: RECT #00FF00 0 0 4 4\n\
              \n\
              red: CREATE #FF0000\n\
              ghost: FILL #000000\n\
              red: SPIN\n\
              red:\n\
              red: REMOVE\n",
        )
        .unwrap();
    drop(write);

    let answered = CommandReader::new(read, replies.clone())
        .serve(&store, &source.token())
        .unwrap();

    assert_eq!(answered, 7);
    assert_eq!(
        replies.lines(),
        [
            "ok",
            "ok",
            "failure: duplicate pane: red",
            "failure: targeted pane doesn't exist: ghost",
            "failure: no such action found: SPIN",
            "failure: action required",
            "ok",
        ]
    );
    assert_eq!(store.names(), ["root"]);
}

#[test]
fn drawing_lands_in_the_pane() {
    let (read, mut write) = pipe();
    let store = store();
    let source = CancellationSource::new().unwrap();
    write.write_all(b"root: FILL #102030\nroot: RECT #FFFFFF 2 2 3 3").unwrap();
    drop(write);

    let answered = CommandReader::new(read, Replies::default())
        .serve(&store, &source.token())
        .unwrap();
    assert_eq!(answered, 2, "unterminated last line is still answered");

    store
        .with_canvas("root", |canvas| {
            assert!(canvas.pixel_is(0, 0, Color::rgb(0x10, 0x20, 0x30)));
            assert!(canvas.pixel_is(3, 3, Color::WHITE));
            assert_eq!(canvas.count_color(Color::WHITE), 9);
        })
        .unwrap();
}

#[test]
fn overlong_line_is_rejected_once() {
    let (read, mut write) = pipe();
    let replies = Replies::default();
    let store = store();
    let source = CancellationSource::new().unwrap();

    let writer = std::thread::spawn(move || {
        let mut line = vec![b'x'; 4096];
        line.push(b'\n');
        write.write_all(&line).unwrap();
        write.write_all(b"root: FILL #FFFFFF\n").unwrap();
    });

    let answered = CommandReader::new(read, replies.clone())
        .serve(&store, &source.token())
        .unwrap();
    writer.join().unwrap();

    assert_eq!(answered, 2);
    assert_eq!(replies.lines(), ["failure: line exceeds 1024 bytes", "ok"]);
}

#[test]
fn cancellation_stops_an_idle_reader() {
    let (read, write) = pipe();
    let store = store();
    let source = CancellationSource::new().unwrap();
    let thread = CommandReader::new(read, Replies::default())
        .spawn(store, source.token())
        .unwrap();

    std::thread::sleep(Duration::from_millis(20));
    let start = Instant::now();
    source.cancel();
    assert_eq!(thread.join().unwrap(), 0);
    assert!(start.elapsed() < Duration::from_secs(5));
    drop(write);
}
