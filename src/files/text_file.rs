use super::{FileType, VersionFile, base, context_with};
use crate::errors::{BumpError, Result};
use crate::events::{Event, LogObserver, Observer};
use crate::version::{Context, Version, VersionConfig};
use log::debug;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A file where the version is located by a (possibly multi-line) search text.
pub struct PlainTextFile {
    path: PathBuf,
    version_config: VersionConfig,
    observer: Rc<dyn Observer>,
}

impl PlainTextFile {
    pub fn new(path: impl Into<PathBuf>, version_config: VersionConfig) -> Self {
        Self {
            path: path.into(),
            version_config,
            observer: Rc::new(LogObserver),
        }
    }

    pub fn with_observer(mut self, observer: Rc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Looks for `search` in the file.
    ///
    /// The first and last lines of `search` may sit inside longer lines of the
    /// file, every line between them has to match exactly.
    pub fn contains(&self, search: &str) -> Result<bool> {
        if search.is_empty() {
            return Ok(false);
        }

        let content = base::read_text(&self.path)?;
        let search_lines: Vec<&str> = search.lines().collect();
        let window_size = search_lines.len();
        let mut window: VecDeque<&str> = VecDeque::with_capacity(window_size);

        for (index, line) in content.lines().enumerate() {
            if window.len() == window_size {
                window.pop_front();
            }
            window.push_back(line);
            if window.len() < window_size {
                continue;
            }

            if Self::window_matches(&window, &search_lines) {
                let first_line = index + 2 - window_size;
                self.observer.notify(&Event::Found {
                    file: self.path.clone(),
                    search: search.to_string(),
                    line: first_line,
                    content: window[0].to_string(),
                });
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn window_matches(window: &VecDeque<&str>, search_lines: &[&str]) -> bool {
        let last = search_lines.len() - 1;
        search_lines.iter().enumerate().all(|(i, expected)| {
            if i == 0 || i == last {
                window[i].contains(expected)
            } else {
                window[i] == *expected
            }
        })
    }

    fn render_search(&self, version: &Version, context: &Context) -> Result<String> {
        let serialized = self.version_config.serialize(version)?;
        let context = context_with(context, "current_version", serialized);
        self.version_config.search().render(&context)
    }
}

impl VersionFile for PlainTextFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file_type(&self) -> FileType {
        FileType::PlainText
    }

    fn observer(&self) -> &dyn Observer {
        self.observer.as_ref()
    }

    fn should_contain_version(&self, version: &Version, context: &Context) -> Result<()> {
        let search = self.render_search(version, context)?;
        if self.contains(&search)? {
            return Ok(());
        }

        // a raw version the parse regex only partly covered still counts with the default search
        if self.version_config.uses_default_search()
            && let Some(original) = version.original()
            && self.contains(original)?
        {
            return Ok(());
        }

        Err(BumpError::VersionNotFound {
            search,
            file: self.path.clone(),
        })
    }

    fn replace(
        &self,
        current: &Version,
        new: &Version,
        context: &Context,
        dry_run: bool,
    ) -> Result<()> {
        let before = base::read_text(&self.path)?;

        let context = context_with(
            context,
            "current_version",
            self.version_config.serialize(current)?,
        );
        let context = context_with(
            &context,
            "new_version",
            self.version_config.serialize(new)?,
        );

        let search_for = self.version_config.search().render(&context)?;
        let replace_with = self.version_config.replace().render(&context)?;

        let mut after = before.replace(&search_for, &replace_with);
        if after == before
            && self.version_config.uses_default_search()
            && let Some(original) = current.original()
        {
            debug!(
                "'{}' not found in {}, replacing '{}' instead",
                search_for,
                self.path.display(),
                original
            );
            after = before.replace(original, &replace_with);
        }

        self.update_file(&before, &after, dry_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingObserver;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_contains_single_line_substring() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "requirements.txt", "Django==3.2\nMyProject==1.5.6 ; python\n");
        let observer = Rc::new(RecordingObserver::default());
        let file = PlainTextFile::new(&path, VersionConfig::new(None, None).unwrap())
            .with_observer(observer.clone());

        assert!(file.contains("MyProject==1.5.6").unwrap());
        assert!(!file.contains("MyProject==1.5.7").unwrap());
        assert!(!file.contains("").unwrap());
        assert_eq!(
            observer.events(),
            vec![Event::Found {
                file: path.clone(),
                search: "MyProject==1.5.6".to_string(),
                line: 2,
                content: "MyProject==1.5.6 ; python".to_string(),
            }]
        );
    }

    #[test]
    fn test_contains_multi_line_edges_and_interior() {
        let temp_dir = TempDir::new().unwrap();
        let content = "# changelog\n## [Unreleased]\n\n## [1.2.3] - today\n";
        let path = write(&temp_dir, "CHANGELOG.md", content);
        let file = PlainTextFile::new(&path, VersionConfig::new(None, None).unwrap());

        assert!(file.contains("[Unreleased]\n\n## [1.2.3]").unwrap());
        // interior lines must match exactly
        assert!(!file.contains("# changelog\n[Unreleased]\n\n").unwrap());
    }

    #[test]
    fn test_contains_search_longer_than_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "VERSION", "1.0.0\n");
        let file = PlainTextFile::new(&path, VersionConfig::new(None, None).unwrap());

        assert!(!file.contains("1.0.0\nsecond line").unwrap());
    }

    #[test]
    fn test_should_contain_version_missing() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "VERSION", "1.0.0\n");
        let config = VersionConfig::new(None, None).unwrap();
        let version = config.parse("1.0.1").unwrap();
        let file = PlainTextFile::new(&path, config);

        let err = file
            .should_contain_version(&version, &Context::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Did not find '1.0.1' in plaintext file: '{}'", path.display())
        );
    }

    #[test]
    fn test_should_contain_falls_back_to_original() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "VERSION", "1.2.3\n");
        let config = VersionConfig::new(None, None)
            .unwrap()
            .with_serialize("{major}-{minor}-{patch}")
            .unwrap();
        let version = config.parse("1.2.3").unwrap();
        let file = PlainTextFile::new(&path, config);

        file.should_contain_version(&version, &Context::new()).unwrap();
    }

    #[test]
    fn test_replace_with_custom_search() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            &temp_dir,
            "requirements.txt",
            "Django==1.5.6\nMyProject==1.5.6\n",
        );
        let config = VersionConfig::new(
            Some("MyProject=={current_version}"),
            Some("MyProject=={new_version}"),
        )
        .unwrap();
        let current = config.parse("1.5.6").unwrap();
        let new = config.parse("1.6.0").unwrap();
        let file = PlainTextFile::new(&path, config);

        file.should_contain_version(&current, &Context::new()).unwrap();
        file.replace(&current, &new, &Context::new(), false).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Django==1.5.6\nMyProject==1.6.0\n"
        );
    }

    #[test]
    fn test_replace_dry_run_reports_diff() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "VERSION", "1.0.0\n");
        let config = VersionConfig::new(None, None).unwrap();
        let current = config.parse("1.0.0").unwrap();
        let new = config.parse("1.0.1").unwrap();
        let observer = Rc::new(RecordingObserver::default());
        let file = PlainTextFile::new(&path, config).with_observer(observer.clone());

        file.replace(&current, &new, &Context::new(), true).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "1.0.0\n");
        let events = observer.events();
        let Event::Changing { diff, dry_run, .. } = &events[0] else {
            panic!("expected a change event");
        };
        assert!(*dry_run);
        assert!(diff.ends_with("-1.0.0\n+1.0.1"));
    }
}
