use std::fmt::Display;

use chrono::Local;

#[derive(Clone, Copy)]
enum Level {
    Info,
    Debug,
    Error,
    Success,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Error => "ERROR",
            Level::Success => "SUCCESS",
        }
    }

    fn short(self) -> &'static str {
        match self {
            Level::Info => "",
            Level::Debug => "d",
            Level::Error => "e",
            Level::Success => "+",
        }
    }
}

/// Line-oriented logger tagged with a service name. `println!` serializes
/// whole lines through the stdout lock, so concurrent tasks never interleave.
pub struct Logger {
    service: &'static str,
    compact: bool,
}

impl Logger {
    pub const fn verbose(service: &'static str) -> Self {
        Self {
            service,
            compact: false,
        }
    }

    pub const fn compact(service: &'static str) -> Self {
        Self {
            service,
            compact: true,
        }
    }

    fn emit(&self, level: Level, msg: impl Display) {
        if self.compact {
            println!("{}[{}] {}", level.short(), self.service, msg);
        } else {
            println!(
                "[{}] {} {}: {}",
                self.service,
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                level.tag(),
                msg
            );
        }
    }

    pub fn info(&self, msg: impl Display) {
        self.emit(Level::Info, msg);
    }

    pub fn debug(&self, msg: impl Display) {
        self.emit(Level::Debug, msg);
    }

    pub fn error(&self, msg: impl Display) {
        self.emit(Level::Error, msg);
    }

    pub fn success(&self, msg: impl Display) {
        self.emit(Level::Success, msg);
    }
}
