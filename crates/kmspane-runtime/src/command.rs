#![forbid(unsafe_code)]

//! Line-oriented drawing commands.
//!
//! # Grammar
//!
//! ```text
//! <target>: <ACTION> <arg>...
//! ```
//!
//! Fields are separated by ASCII whitespace. Numbers are decimal or `0x`
//! hex and must fit the field they set. Colors are `#RRGGBB`.
//!
//! | Action     | Arguments                          |
//! |------------|------------------------------------|
//! | `CREATE`   | `#color`                           |
//! | `REMOVE`   |                                    |
//! | `FILL`     | `#color`                           |
//! | `RECT`     | `#color x y w h`                   |
//! | `CIRCLE`   | `#color x y r`                     |
//! | `LINE`     | `#color x0 y0 x1 y1`               |
//! | `TRIANGLE` | `#color x0 y0 x1 y1 x2 y2`         |
//! | `BEZIER`   | `#color x0 y0 x1 y1 x2 y2` (signed) |
//! | `COPY`     | `dst_x dst_y src_x src_y w h`      |
//!
//! Every line gets exactly one reply: `ok` or `failure: <reason>`.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use kmspane_render::{
    Bezier2, Circle, Color, Line, ParseColorError, Rect, RectCopy, Shape, Triangle,
};

use crate::cancellation::{CancellationToken, wait_readable};
use crate::lifecycle::LifecycleError;
use crate::pane_store::{PaneError, PaneStore};

pub const COMMAND_THREAD_NAME: &str = "kmspane-commands";

/// Longest accepted line, newline excluded.
pub const MAX_LINE_LEN: usize = 1024;

const READ_CHUNK: usize = 8192;

/// One parsed command line, borrowing from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    pub target: &'a str,
    pub action: &'a str,
    pub args: Vec<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("target name must be provided")]
    MissingTarget,

    #[error("action required")]
    MissingAction,

    #[error("no such action found: {0}")]
    UnknownAction(String),

    #[error("{action} requires {usage}")]
    Usage {
        action: &'static str,
        usage: &'static str,
    },

    #[error("argument {position} is not a color: {source}")]
    Color {
        position: usize,
        source: ParseColorError,
    },

    #[error("argument {position} ({name}) is not a valid number: {value:?}")]
    Number {
        position: usize,
        name: &'static str,
        value: String,
    },

    #[error("line exceeds 1024 bytes")]
    LineTooLong,

    #[error(transparent)]
    Pane(#[from] PaneError),
}

/// Split a line into target, action and arguments.
pub fn parse_line(line: &str) -> Result<Command<'_>, CommandError> {
    let (target, rest) = line.split_once(':').ok_or(CommandError::MissingTarget)?;
    let target = target.trim_ascii();
    if target.is_empty() {
        return Err(CommandError::MissingTarget);
    }
    let mut words = rest.split_ascii_whitespace();
    let action = words.next().ok_or(CommandError::MissingAction)?;
    Ok(Command {
        target,
        action,
        args: words.collect(),
    })
}

/// Parse a decimal or `0x`-prefixed hex integer, optionally negative, that
/// fits in `T`.
pub fn parse_number<T: TryFrom<i64>>(text: &str) -> Option<T> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    let value = if negative { magnitude.checked_neg()? } else { magnitude };
    T::try_from(value).ok()
}

/// Argument accessor that names the failing position in errors.
struct Args<'a> {
    args: &'a [&'a str],
}

impl<'a> Args<'a> {
    fn expect(
        args: &'a [&'a str],
        count: usize,
        action: &'static str,
        usage: &'static str,
    ) -> Result<Self, CommandError> {
        if args.len() != count {
            return Err(CommandError::Usage { action, usage });
        }
        Ok(Self { args })
    }

    fn color(&self, idx: usize) -> Result<Color, CommandError> {
        self.args[idx].parse().map_err(|source| CommandError::Color {
            position: idx + 1,
            source,
        })
    }

    fn numbers<T, const N: usize>(&self, first: usize, names: [&'static str; N]) -> Result<[T; N], CommandError>
    where
        T: TryFrom<i64> + Copy + Default,
    {
        let mut out = [T::default(); N];
        for (i, name) in names.into_iter().enumerate() {
            let idx = first + i;
            out[i] = parse_number(self.args[idx]).ok_or_else(|| CommandError::Number {
                position: idx + 1,
                name,
                value: self.args[idx].to_owned(),
            })?;
        }
        Ok(out)
    }
}

/// A command implementation: `(store, target, args)`.
pub type Handler = fn(&PaneStore, &str, &[&str]) -> Result<(), CommandError>;

/// Action name → handler.
#[derive(Clone)]
pub struct CommandTable {
    handlers: HashMap<&'static str, Handler>,
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTable")
            .field("actions", &self.actions())
            .finish()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl CommandTable {
    /// A table with no actions.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Every built-in action.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register("CREATE", act_create);
        table.register("REMOVE", act_remove);
        table.register("FILL", act_fill);
        table.register("RECT", act_rect);
        table.register("CIRCLE", act_circle);
        table.register("LINE", act_line);
        table.register("TRIANGLE", act_triangle);
        table.register("BEZIER", act_bezier);
        table.register("COPY", act_copy);
        table
    }

    /// Add or replace an action.
    pub fn register(&mut self, action: &'static str, handler: Handler) {
        self.handlers.insert(action, handler);
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn execute(&self, store: &PaneStore, line: &str) -> Result<(), CommandError> {
        let cmd = parse_line(line)?;
        let handler = self
            .handlers
            .get(cmd.action)
            .ok_or_else(|| CommandError::UnknownAction(cmd.action.to_owned()))?;
        handler(store, cmd.target, &cmd.args)
    }

    /// Execute `line` and format the reply.
    pub fn respond(&self, store: &PaneStore, line: &str) -> String {
        match self.execute(store, line) {
            Ok(()) => "ok".to_owned(),
            Err(err) => {
                tracing::debug!(line, error = %err, "command failed");
                format!("failure: {err}")
            }
        }
    }
}

// ── Actions ──────────────────────────────────────────────────────────────

fn act_create(store: &PaneStore, target: &str, args: &[&str]) -> Result<(), CommandError> {
    let args = Args::expect(args, 1, "CREATE", "exactly one argument (color)")?;
    let color = args.color(0)?;
    store.try_create(target, color)?;
    Ok(())
}

fn act_remove(store: &PaneStore, target: &str, args: &[&str]) -> Result<(), CommandError> {
    Args::expect(args, 0, "REMOVE", "no arguments")?;
    store.remove(target)?;
    Ok(())
}

fn act_fill(store: &PaneStore, target: &str, args: &[&str]) -> Result<(), CommandError> {
    let args = Args::expect(args, 1, "FILL", "exactly one argument (color)")?;
    store.fill(target, args.color(0)?)?;
    Ok(())
}

fn act_rect(store: &PaneStore, target: &str, args: &[&str]) -> Result<(), CommandError> {
    let args = Args::expect(args, 5, "RECT", "args color x y w h")?;
    let color = args.color(0)?;
    let [x, y, w, h] = args.numbers::<u16, 4>(1, ["x", "y", "w", "h"])?;
    store.draw_rect(target, &Rect::new(x, y, w, h), color)?;
    Ok(())
}

fn act_circle(store: &PaneStore, target: &str, args: &[&str]) -> Result<(), CommandError> {
    let args = Args::expect(args, 4, "CIRCLE", "args color x y r")?;
    let color = args.color(0)?;
    let [x, y, r] = args.numbers::<u16, 3>(1, ["x", "y", "r"])?;
    store.draw_circle(target, &Circle::new(x, y, r), color)?;
    Ok(())
}

fn act_line(store: &PaneStore, target: &str, args: &[&str]) -> Result<(), CommandError> {
    let args = Args::expect(args, 5, "LINE", "args color x0 y0 x1 y1")?;
    let color = args.color(0)?;
    let [x0, y0, x1, y1] = args.numbers::<u16, 4>(1, ["x0", "y0", "x1", "y1"])?;
    store.draw(target, &Shape::Line(Line { x0, y0, x1, y1 }), color)?;
    Ok(())
}

fn act_triangle(store: &PaneStore, target: &str, args: &[&str]) -> Result<(), CommandError> {
    let args = Args::expect(args, 7, "TRIANGLE", "args color x0 y0 x1 y1 x2 y2")?;
    let color = args.color(0)?;
    let [x0, y0, x1, y1, x2, y2] = args.numbers::<u16, 6>(1, ["x0", "y0", "x1", "y1", "x2", "y2"])?;
    let tri = Triangle {
        x0,
        y0,
        x1,
        y1,
        x2,
        y2,
    };
    store.draw(target, &Shape::Triangle(tri), color)?;
    Ok(())
}

fn act_bezier(store: &PaneStore, target: &str, args: &[&str]) -> Result<(), CommandError> {
    let args = Args::expect(args, 7, "BEZIER", "args color x0 y0 x1 y1 x2 y2")?;
    let color = args.color(0)?;
    let [x0, y0, x1, y1, x2, y2] = args.numbers::<i32, 6>(1, ["x0", "y0", "x1", "y1", "x2", "y2"])?;
    let curve = Bezier2 {
        x0,
        y0,
        x1,
        y1,
        x2,
        y2,
    };
    store.draw(target, &Shape::Bezier2(curve), color)?;
    Ok(())
}

fn act_copy(store: &PaneStore, target: &str, args: &[&str]) -> Result<(), CommandError> {
    let args = Args::expect(args, 6, "COPY", "args dst_x dst_y src_x src_y w h")?;
    let [dst_x, dst_y, src_x, src_y, w, h] =
        args.numbers::<u16, 6>(0, ["dst_x", "dst_y", "src_x", "src_y", "w", "h"])?;
    let copy = RectCopy {
        dst_x,
        dst_y,
        src_x,
        src_y,
        w,
        h,
    };
    store.copy_rect(target, &copy)?;
    Ok(())
}

// ── Reader ───────────────────────────────────────────────────────────────

/// Readable input that can also be polled.
pub trait CommandInput: Read + AsFd + Send {}

impl<T: Read + AsFd + Send> CommandInput for T {}

/// Reads command lines from a pollable input and writes one reply per line.
pub struct CommandReader {
    input: Box<dyn CommandInput>,
    output: Box<dyn Write + Send>,
    table: CommandTable,
}

impl std::fmt::Debug for CommandReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandReader")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl CommandReader {
    pub fn new<R, W>(input: R, output: W) -> Self
    where
        R: CommandInput + 'static,
        W: Write + Send + 'static,
    {
        Self {
            input: Box::new(input),
            output: Box::new(output),
            table: CommandTable::standard(),
        }
    }

    /// Commands from stdin, replies to stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin(), io::stdout())
    }

    pub fn with_table(mut self, table: CommandTable) -> Self {
        self.table = table;
        self
    }

    /// Serve on a dedicated thread until `token` is cancelled or the input
    /// reaches end of file.
    pub fn spawn(self, store: Arc<PaneStore>, token: CancellationToken) -> io::Result<CommandThread> {
        let handle = thread::Builder::new()
            .name(COMMAND_THREAD_NAME.into())
            .spawn(move || self.serve(&store, &token))?;
        Ok(CommandThread { handle })
    }

    /// Serve on the current thread. Returns the number of lines answered.
    pub fn serve(mut self, store: &PaneStore, token: &CancellationToken) -> io::Result<u64> {
        let _span = tracing::debug_span!("commands").entered();
        let mut pending: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut answered = 0u64;
        let mut overflowed = false;

        loop {
            let ready = wait_readable(&[token.as_fd(), self.input.as_fd()], None)?;
            if ready[0] || token.is_cancelled() {
                break;
            }
            if !ready[1] {
                continue;
            }

            let n = match self.input.read(&mut chunk) {
                Ok(0) => {
                    if !pending.is_empty() && !overflowed {
                        answered += self.answer(store, &pending)?;
                    }
                    tracing::debug!("command input closed");
                    break;
                }
                Ok(n) => n,
                Err(err) if matches!(err.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => continue,
                Err(err) => return Err(err),
            };

            pending.extend_from_slice(&chunk[..n]);
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if overflowed {
                    overflowed = false;
                    continue;
                }
                answered += self.answer(store, &line[..pos])?;
            }
            if pending.len() > MAX_LINE_LEN && !overflowed {
                self.reply(&format!("failure: {}", CommandError::LineTooLong))?;
                answered += 1;
                overflowed = true;
            }
            if overflowed {
                pending.clear();
            }
        }
        Ok(answered)
    }

    /// Answer one raw line. Blank lines get no reply.
    fn answer(&mut self, store: &PaneStore, raw: &[u8]) -> io::Result<u64> {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_ascii();
        if line.is_empty() {
            return Ok(0);
        }
        let reply = if line.len() > MAX_LINE_LEN {
            format!("failure: {}", CommandError::LineTooLong)
        } else {
            self.table.respond(store, line)
        };
        self.reply(&reply)?;
        Ok(1)
    }

    fn reply(&mut self, reply: &str) -> io::Result<()> {
        writeln!(self.output, "{reply}")?;
        self.output.flush()
    }
}

/// Handle to the command reader thread.
#[derive(Debug)]
pub struct CommandThread {
    handle: JoinHandle<io::Result<u64>>,
}

impl CommandThread {
    /// Wait for the reader to stop. Returns the number of lines answered.
    pub fn join(self) -> Result<u64, LifecycleError> {
        match self.handle.join() {
            Ok(Ok(answered)) => Ok(answered),
            Ok(Err(err)) => Err(LifecycleError::Input(err)),
            Err(_) => Err(LifecycleError::ThreadPanicked {
                thread: COMMAND_THREAD_NAME,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmspane_render::CanvasLayout;

    const RED: Color = Color::rgb(0xFF, 0, 0);

    fn store() -> PaneStore {
        PaneStore::with_root(CanvasLayout::packed(16, 16), 8, Color::BLACK).unwrap()
    }

    #[test]
    fn parse_basic_line() {
        let cmd = parse_line("root: RECT #ff0000 1 2 3 4").unwrap();
        assert_eq!(cmd.target, "root");
        assert_eq!(cmd.action, "RECT");
        assert_eq!(cmd.args, vec!["#ff0000", "1", "2", "3", "4"]);
    }

    #[test]
    fn parse_tolerates_extra_whitespace() {
        let cmd = parse_line("  a :\t CREATE   #000000 \r").unwrap();
        assert_eq!(cmd.target, "a");
        assert_eq!(cmd.action, "CREATE");
        assert_eq!(cmd.args, vec!["#000000"]);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_line("no colon"), Err(CommandError::MissingTarget));
        assert_eq!(parse_line(": CREATE #000000"), Err(CommandError::MissingTarget));
        assert_eq!(parse_line("root:   "), Err(CommandError::MissingAction));
    }

    #[test]
    fn numbers_decimal_and_hex() {
        assert_eq!(parse_number::<u16>("42"), Some(42));
        assert_eq!(parse_number::<u16>("0x2A"), Some(42));
        assert_eq!(parse_number::<u16>("0X2a"), Some(42));
        assert_eq!(parse_number::<u16>("007"), Some(7));
        assert_eq!(parse_number::<i32>("-5"), Some(-5));
        assert_eq!(parse_number::<u16>("-5"), None);
        assert_eq!(parse_number::<u16>("65536"), None);
        assert_eq!(parse_number::<u16>("12px"), None);
        assert_eq!(parse_number::<u16>(""), None);
        assert_eq!(parse_number::<u16>("0x"), None);
    }

    #[test]
    fn create_and_draw_round() {
        let s = store();
        let table = CommandTable::standard();
        assert_eq!(table.respond(&s, "pic: CREATE #000000"), "ok");
        assert_eq!(table.respond(&s, "pic: RECT #ff0000 0 0 2 2"), "ok");
        assert_eq!(s.with_canvas("pic", |c| c.count_color(RED)).unwrap(), 4);
        assert_eq!(table.respond(&s, "pic: REMOVE"), "ok");
        assert_eq!(s.names(), vec!["root"]);
    }

    #[test]
    fn failures_are_reported() {
        let s = store();
        let table = CommandTable::standard();
        assert_eq!(
            table.respond(&s, "root: CREATE #000000"),
            "failure: duplicate pane: root"
        );
        assert_eq!(
            table.respond(&s, "ghost: REMOVE"),
            "failure: targeted pane doesn't exist: ghost"
        );
        assert_eq!(
            table.respond(&s, "root: EXPLODE"),
            "failure: no such action found: EXPLODE"
        );
        assert_eq!(
            table.respond(&s, "root: REMOVE now"),
            "failure: REMOVE requires no arguments"
        );
        assert!(table.respond(&s, "root: RECT red 0 0 1 1").starts_with("failure: argument 1 is not a color"));
        assert!(table.respond(&s, "root: CIRCLE #ffffff 1 two 3").contains("(y)"));
    }

    #[test]
    fn create_past_capacity_is_refused() {
        let store = PaneStore::with_root(CanvasLayout::packed(2, 2), 2, Color::BLACK).unwrap();
        let table = CommandTable::standard();
        assert_eq!(table.respond(&store, "a: CREATE #000000"), "ok");
        assert_eq!(
            table.respond(&store, "b: CREATE #000000"),
            "failure: pane capacity of 2 reached"
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn duplicate_on_full_store_names_the_duplicate() {
        let store = PaneStore::with_root(CanvasLayout::packed(2, 2), 1, Color::BLACK).unwrap();
        assert_eq!(
            CommandTable::standard().respond(&store, "root: CREATE #000000"),
            "failure: duplicate pane: root"
        );
    }

    #[test]
    fn concurrent_creates_never_exceed_capacity() {
        let store = PaneStore::with_root(CanvasLayout::packed(2, 2), 8, Color::BLACK).unwrap();
        let table = CommandTable::standard();
        let replies: Vec<String> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|t| {
                    let (store, table) = (&store, &table);
                    scope.spawn(move || {
                        (0..8)
                            .map(|i| table.respond(store, &format!("p{t}_{i}: CREATE #000000")))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
        });
        assert_eq!(replies.iter().filter(|r| *r == "ok").count(), 7);
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn every_action_is_registered() {
        assert_eq!(
            CommandTable::standard().actions(),
            vec!["BEZIER", "CIRCLE", "COPY", "CREATE", "FILL", "LINE", "RECT", "REMOVE", "TRIANGLE"]
        );
    }

    #[test]
    fn extended_actions_draw() {
        let s = store();
        let table = CommandTable::standard();
        for line in [
            "root: FILL #ff0000",
            "root: LINE #ffffff 0 0 15 15",
            "root: TRIANGLE #ffffff 0 0 4 0 0 4",
            "root: BEZIER #ffffff -10 0 8 40 20 0",
            "root: COPY 8 8 0 0 4 4",
        ] {
            assert_eq!(table.respond(&s, line), "ok", "{line}");
        }
        assert!(s.with_canvas("root", |c| c.pixel_is(15, 15, Color::WHITE)).unwrap());
    }

    #[test]
    fn custom_table_registration() {
        fn act_ping(_: &PaneStore, _: &str, _: &[&str]) -> Result<(), CommandError> {
            Ok(())
        }
        let mut table = CommandTable::empty();
        table.register("PING", act_ping);
        let s = store();
        assert_eq!(table.respond(&s, "x: PING"), "ok");
        assert_eq!(table.respond(&s, "x: CREATE #000000"), "failure: no such action found: CREATE");
    }
}
