//! Console logging for the demos and for anything embedding the GPU
//! context.

mod pretty_list;

use std::fmt::Write as FmtWrite;

use anyhow::Result;
use flexi_logger::{DeferredNow, Logger, LoggerHandle, Record};
use textwrap::{termwidth, Options};

pub use self::pretty_list::PrettyList;

/// Start logging to stderr, filtered by `RUST_LOG` and defaulting to `info`.
///
/// Logging stops when the returned handle is dropped.
pub fn setup() -> Result<LoggerHandle, anyhow::Error> {
    let handle = Logger::try_with_env_or_str("info")?
        .format(multiline_format)
        .start()?;

    log::info!(
        "Logging at RUST_LOG or info. Set RUST_LOG=debug to see per-frame \
         transfer summaries, or RUST_LOG=trace for every destroyed resource."
    );

    Ok(handle)
}

/// Format a record as a header line with the level, time, and source
/// location, followed by the message. Everything is wrapped to the
/// terminal width so multi-line memory and transfer summaries stay
/// readable.
pub fn multiline_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    let width = termwidth().min(74);
    let wrap_options = Options::new(width)
        .initial_indent("┏ ")
        .subsequent_indent("┃ ");

    let mut entry = String::new();
    writeln!(
        entry,
        "{} [{}] [{}:{}]",
        record.level(),
        now.now().format("%H:%M:%S%.6f"),
        record.file().unwrap_or("<unnamed>"),
        record.line().unwrap_or(0),
    )
    .expect("unable to format the log header");

    write!(&mut entry, "{}", &record.args())
        .expect("unable to format the log message");

    writeln!(w, "{}", textwrap::fill(&entry, wrap_options))
}
