use console::{style, Term};
use std::sync::atomic::{AtomicBool, Ordering};

/// Width reserved for the message prefix column
const PREFIX_LEN: usize = 10;

pub struct Writer {
    term: Term,
    verbose: AtomicBool,
}

impl Writer {
    pub fn new() -> Self {
        Writer {
            term: Term::stderr(),
            verbose: AtomicBool::new(false),
        }
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub fn writeln(&self, prefix: &str, msg: &str) -> std::io::Result<()> {
        self.term.write_line(&format!("{}{}", gen_prefix(prefix), msg))
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// Right-align a (possibly styled) prefix into the prefix column
pub fn gen_prefix(prefix: &str) -> String {
    let width = console::measure_text_width(prefix);
    let padding = PREFIX_LEN.saturating_sub(width + 1);
    format!("{}{} ", " ".repeat(padding), prefix)
}

pub fn done_prefix() -> String {
    style("DONE").dim().to_string()
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {{
        let _ = $crate::WRITER.writeln(
            &console::style("INFO").blue().bold().to_string(),
            &format!($($arg)+),
        );
    }};
}

#[macro_export]
macro_rules! success {
    ($($arg:tt)+) => {{
        let _ = $crate::WRITER.writeln(
            &console::style("SUCCESS").green().bold().to_string(),
            &format!($($arg)+),
        );
    }};
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {{
        let _ = $crate::WRITER.writeln(
            &console::style("WARNING").yellow().bold().to_string(),
            &format!($($arg)+),
        );
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {{
        let _ = $crate::WRITER.writeln(
            &console::style("ERROR").red().bold().to_string(),
            &format!($($arg)+),
        );
    }};
}

#[macro_export]
macro_rules! due_to {
    ($($arg:tt)+) => {{
        let _ = $crate::WRITER.writeln(
            &console::style("DUE TO").yellow().bold().to_string(),
            &format!($($arg)+),
        );
    }};
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {{
        if $crate::WRITER.is_verbose() {
            let _ = $crate::WRITER.writeln(
                &console::style("DEBUG").dim().to_string(),
                &format!($($arg)+),
            );
        }
    }};
}

#[macro_export]
macro_rules! msg {
    ($prefix:expr, $($arg:tt)+) => {{
        let _ = $crate::WRITER.writeln($prefix, &format!($($arg)+));
    }};
}
