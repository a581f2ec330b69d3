use super::FileType;
use crate::errors::{BumpError, Result};
use crate::events::{Event, Observer};
use log::debug;
use similar::TextDiff;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Newline {
    Cr,
    Lf,
    CrLf,
}

impl Newline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Newline::Cr => "\r",
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }

    /// Quoted escape form used in diagnostics, e.g. `'\r\n'`.
    pub fn escaped(&self) -> &'static str {
        match self {
            Newline::Cr => r"'\r'",
            Newline::Lf => r"'\n'",
            Newline::CrLf => r"'\r\n'",
        }
    }
}

/// Distinct line endings used in `content`, in the order `\r`, `\n`, `\r\n`.
pub fn detect_newlines(content: &str) -> Vec<Newline> {
    let bytes = content.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let newline = match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                i += 1;
                Some(Newline::CrLf)
            }
            b'\r' => Some(Newline::Cr),
            b'\n' => Some(Newline::Lf),
            _ => None,
        };
        if let Some(newline) = newline
            && !found.contains(&newline)
        {
            found.push(newline);
        }
        i += 1;
    }
    found.sort();
    found
}

/// Converts every line ending to `\n`.
pub fn normalize_newlines(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Reads a file with its line endings normalized to `\n`.
pub fn read_text(path: &Path) -> Result<String> {
    Ok(normalize_newlines(&fs::read_to_string(path)?))
}

/// Unified diff between two `\n` separated texts, labelled `a/<file>` and `b/<file>`.
pub fn unified_diff(before: &str, after: &str, file: &Path) -> String {
    let name = file.display();
    let diff = TextDiff::from_lines(before, after);
    let mut lines = vec![format!("--- a/{name}"), format!("+++ b/{name}")];

    for group in diff.grouped_ops(3) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old = first.old_range().start..last.old_range().end;
        let new = first.new_range().start..last.new_range().end;
        lines.push(format!(
            "@@ -{} +{} @@",
            hunk_range(old.start, old.len()),
            hunk_range(new.start, new.len())
        ));

        for op in &group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    similar::ChangeTag::Delete => '-',
                    similar::ChangeTag::Insert => '+',
                    similar::ChangeTag::Equal => ' ',
                };
                let text = change.value().trim_end_matches(['\r', '\n']);
                lines.push(format!("{sign}{text}"));
            }
        }
    }

    lines.join("\n")
}

fn hunk_range(start: usize, len: usize) -> String {
    match len {
        1 => format!("{}", start + 1),
        0 => format!("{start},0"),
        _ => format!("{},{}", start + 1, len),
    }
}

/// Writes `after` over `path` unless it equals `before`.
///
/// The file keeps its original line ending. A file mixing several line endings is
/// rejected after the diff is reported and before anything is written, dry run or not.
pub fn update_file(
    path: &Path,
    file_type: FileType,
    observer: &dyn Observer,
    before: &str,
    after: &str,
    dry_run: bool,
) -> Result<()> {
    let raw = fs::read_to_string(path)?;
    let newlines = detect_newlines(&raw);

    if before == after {
        observer.notify(&Event::NotChanging {
            file: path.to_path_buf(),
            file_type,
            dry_run,
        });
        return Ok(());
    }

    observer.notify(&Event::Changing {
        file: path.to_path_buf(),
        file_type,
        dry_run,
        diff: unified_diff(before, after, path),
    });

    if newlines.len() > 1 {
        let newlines: Vec<String> = newlines.iter().map(|n| n.escaped().to_string()).collect();
        observer.notify(&Event::MixedNewlines {
            file: path.to_path_buf(),
            newlines: newlines.clone(),
        });
        return Err(BumpError::MixedNewLine {
            file: path.to_path_buf(),
            newlines,
        });
    }

    if dry_run {
        return Ok(());
    }

    let content = match newlines.first() {
        Some(newline) if *newline != Newline::Lf => after.replace('\n', newline.as_str()),
        _ => after.to_string(),
    };
    write_atomic(path, &content)
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp: PathBuf = path.with_file_name(format!(".{file_name}.bumpsemver"));
    debug!("Writing '{}' through '{}'", path.display(), temp.display());

    let permissions = fs::metadata(path)?.permissions();
    fs::write(&temp, content)?;
    fs::set_permissions(&temp, permissions)?;
    if let Err(err) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingObserver;
    use tempfile::TempDir;

    #[test]
    fn test_detect_newlines() {
        assert_eq!(detect_newlines("no newline"), vec![]);
        assert_eq!(detect_newlines("a\nb\n"), vec![Newline::Lf]);
        assert_eq!(detect_newlines("a\r\nb\r\n"), vec![Newline::CrLf]);
        assert_eq!(
            detect_newlines("a\r\nb\nc\rd"),
            vec![Newline::Cr, Newline::Lf, Newline::CrLf]
        );
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_unified_diff() {
        let diff = unified_diff("1.0.0\n", "1.0.1\n", Path::new("VERSION"));
        assert_eq!(diff, "--- a/VERSION\n+++ b/VERSION\n@@ -1 +1 @@\n-1.0.0\n+1.0.1");
    }

    #[test]
    fn test_update_file_keeps_crlf() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("VERSION");
        fs::write(&path, "0.10.2\r\nsecond\r\n").unwrap();
        let observer = RecordingObserver::default();

        update_file(
            &path,
            FileType::PlainText,
            &observer,
            "0.10.2\nsecond\n",
            "0.10.3\nsecond\n",
            false,
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "0.10.3\r\nsecond\r\n");
        assert!(matches!(observer.events()[0], Event::Changing { dry_run: false, .. }));
    }

    #[test]
    fn test_update_file_dry_run_does_not_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("VERSION");
        fs::write(&path, "1.0.0\n").unwrap();
        let observer = RecordingObserver::default();

        update_file(&path, FileType::PlainText, &observer, "1.0.0\n", "1.0.1\n", true).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "1.0.0\n");
    }

    #[test]
    fn test_update_file_unchanged_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("VERSION");
        fs::write(&path, "1.0.0\r\n1.0.0\n").unwrap();
        let observer = RecordingObserver::default();

        update_file(&path, FileType::PlainText, &observer, "1.0.0\n", "1.0.0\n", false).unwrap();

        assert_eq!(
            observer.events(),
            vec![Event::NotChanging {
                file: path.clone(),
                file_type: FileType::PlainText,
                dry_run: false,
            }]
        );
    }

    #[test]
    fn test_update_file_mixed_newlines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mixed.txt");
        fs::write(&path, "0.10.2\r\nline\nother\r").unwrap();
        let observer = RecordingObserver::default();

        let err = update_file(
            &path,
            FileType::PlainText,
            &observer,
            "0.10.2\nline\nother\n",
            "0.10.3\nline\nother\n",
            true,
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!(
                r"File {} has mixed newline characters: ('\r', '\n', '\r\n')",
                path.display()
            )
        );
        assert_eq!(err.exit_code(), 3);
        assert_eq!(fs::read_to_string(&path).unwrap(), "0.10.2\r\nline\nother\r");
        assert_eq!(observer.events().len(), 2);
        assert!(matches!(observer.events()[1], Event::MixedNewlines { .. }));
    }
}
