use ansi_term::Colour::{Red, Yellow};
use ansi_term::Style;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Writes log records to stderr, errors in bold red and warnings in
/// yellow.
struct Logger;

static LOGGER: Logger = Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let text = format!("{}", record.args());
        match record.level() {
            Level::Error => eprintln!("{}", Red.bold().paint(text)),
            Level::Warn => eprintln!("{}", Yellow.paint(text)),
            Level::Info => eprintln!("{}", text),
            Level::Debug | Level::Trace => eprintln!("{}", Style::new().dimmed().paint(text)),
        }
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
