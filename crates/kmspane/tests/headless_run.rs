//! `kmspane run --headless` end to end, stopped by SIGTERM.
//!
//! Own test binary: the signal is delivered to the whole process.

use std::thread;
use std::time::Duration;

use kmspane::cli::{RunArgs, run_display};
use signal_hook::consts::signal::SIGTERM;

#[test]
fn headless_run_rotates_until_sigterm() {
    let args = RunArgs {
        interval_ms: Some(5),
        headless: Some((16, 8)),
        no_stdin: true,
        ..RunArgs::default()
    };

    let raiser = thread::spawn(|| {
        thread::sleep(Duration::from_millis(300));
        signal_hook::low_level::raise(SIGTERM).unwrap();
    });

    let report = run_display(&args).unwrap();
    raiser.join().unwrap();

    assert!(report.rotation.shown >= 1, "{report:?}");
    assert_eq!(report.commands, 0);
}
