use crate::files::FileType;
use log::{info, warn};
use std::cell::RefCell;
use std::path::PathBuf;

/// Progress reported by the file handlers while they check and rewrite files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A plaintext search matched, `line` is 1-based and points at the first matched line.
    Found {
        file: PathBuf,
        search: String,
        line: usize,
        content: String,
    },
    /// A selector reached values that all equal the expected version.
    Selected {
        file: PathBuf,
        file_type: FileType,
        selector: String,
        values: Vec<String>,
    },
    Changing {
        file: PathBuf,
        file_type: FileType,
        dry_run: bool,
        diff: String,
    },
    NotChanging {
        file: PathBuf,
        file_type: FileType,
        dry_run: bool,
    },
    /// The file uses more than one line ending and will not be written.
    MixedNewlines { file: PathBuf, newlines: Vec<String> },
}

pub trait Observer {
    fn notify(&self, event: &Event);
}

/// Forwards every event to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn notify(&self, event: &Event) {
        match event {
            Event::Found {
                file,
                search,
                line,
                content,
            } => {
                info!(
                    "Found '{}' in {} at line {}: {}",
                    search,
                    file.display(),
                    line,
                    content
                );
            }
            Event::Selected {
                file,
                file_type,
                selector,
                values,
            } => {
                info!(
                    "Found {:?} at '{}' in {} file {}",
                    values,
                    selector,
                    file_type,
                    file.display()
                );
            }
            Event::Changing {
                file,
                file_type,
                dry_run,
                diff,
            } => {
                let verb = if *dry_run { "Would change" } else { "Changing" };
                info!("{} {} file {}:", verb, file_type, file.display());
                info!("{}", diff);
            }
            Event::NotChanging {
                file,
                file_type,
                dry_run,
            } => {
                let verb = if *dry_run {
                    "Would not change"
                } else {
                    "Not changing"
                };
                info!("{} {} file {}", verb, file_type, file.display());
            }
            Event::MixedNewlines { file, newlines } => {
                warn!(
                    "File {} has mixed newline characters: ({})",
                    file.display(),
                    newlines.join(", ")
                );
            }
        }
    }
}

/// Keeps every event in memory so callers can inspect what happened.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }
}

impl Observer for RecordingObserver {
    fn notify(&self, event: &Event) {
        self.events.borrow_mut().push(event.clone());
    }
}
