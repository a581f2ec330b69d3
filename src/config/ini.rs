use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IniError {
    #[error("File contains no section headers. line {line}: '{text}'")]
    MissingSectionHeader { line: usize, text: String },
    #[error("Source contains parsing errors. line {line}: '{text}'")]
    Parse { line: usize, text: String },
    #[error("Section '{0}' already exists")]
    DuplicateSection(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniOption {
    pub key: String,
    pub value: String,
    first_line: usize,
    last_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    header_line: usize,
    options: Vec<IniOption>,
}

impl Section {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.key == key)
            .map(|option| option.value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|option| option.key.as_str())
    }

    pub fn options(&self) -> &[IniOption] {
        &self.options
    }

    fn last_line(&self) -> usize {
        self.options
            .last()
            .map_or(self.header_line, |option| option.last_line)
    }
}

/// An INI document that can be edited without disturbing the lines it does not touch.
///
/// Keys keep their case, values may use `=` or `:` and continue on indented lines,
/// and whole-line `#` / `;` comments are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniDocument {
    lines: Vec<String>,
    sections: Vec<Section>,
}

impl IniDocument {
    pub fn parse(content: &str) -> Result<Self, IniError> {
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let mut sections: Vec<Section> = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indented = line.starts_with(char::is_whitespace);
            if indented
                && let Some(option) = sections
                    .last_mut()
                    .and_then(|section| section.options.last_mut())
                && lines[option.last_line + 1..index]
                    .iter()
                    .all(|blank| blank.trim().is_empty())
            {
                // blank lines inside a continued value are kept
                let blanks = index - option.last_line - 1;
                if !option.value.is_empty() {
                    option.value.push('\n');
                }
                option.value.push_str(&"\n".repeat(blanks));
                option.value.push_str(trimmed);
                option.last_line = index;
                continue;
            }

            if let Some(name) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                if sections.iter().any(|section| section.name == name) {
                    return Err(IniError::DuplicateSection(name.to_string()));
                }
                sections.push(Section {
                    name: name.to_string(),
                    header_line: index,
                    options: Vec::new(),
                });
                continue;
            }

            let Some(section) = sections.last_mut() else {
                return Err(IniError::MissingSectionHeader {
                    line: index + 1,
                    text: line.clone(),
                });
            };
            let Some(split) = trimmed.find(['=', ':']) else {
                return Err(IniError::Parse {
                    line: index + 1,
                    text: line.clone(),
                });
            };
            let key = trimmed[..split].trim();
            if key.is_empty() {
                return Err(IniError::Parse {
                    line: index + 1,
                    text: line.clone(),
                });
            }
            section.options.push(IniOption {
                key: key.to_string(),
                value: trimmed[split + 1..].trim().to_string(),
                first_line: index,
                last_line: index,
            });
        }

        Ok(Self { lines, sections })
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?.get(key)
    }

    /// Sets `key` in `section`, rewriting the existing option in place or
    /// appending it to the section. A missing section is added at the top.
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> Result<(), IniError> {
        let line = format!("{key} = {value}");
        let mut lines = self.lines.clone();
        match self.section(section) {
            Some(found) => match found.options.iter().find(|option| option.key == key) {
                Some(option) => {
                    lines.drain(option.first_line..=option.last_line);
                    lines.insert(option.first_line, line);
                }
                None => lines.insert(found.last_line() + 1, line),
            },
            None => {
                let header = vec![format!("[{section}]"), line, String::new()];
                lines = header.into_iter().chain(lines).collect();
            }
        }
        self.reload(lines)
    }

    pub fn remove(&mut self, section: &str, key: &str) -> Result<(), IniError> {
        let Some(option) = self
            .section(section)
            .and_then(|found| found.options.iter().find(|option| option.key == key))
        else {
            return Ok(());
        };
        let mut lines = self.lines.clone();
        lines.drain(option.first_line..=option.last_line);
        self.reload(lines)
    }

    /// Re-reads the edited lines; the document is left untouched when they no longer parse.
    fn reload(&mut self, lines: Vec<String>) -> Result<(), IniError> {
        *self = Self::parse(&lines.join("\n"))?;
        Ok(())
    }
}

impl fmt::Display for IniDocument {
    /// Renders the document with `\n` line endings and exactly one trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self
            .lines
            .iter()
            .rposition(|line| !line.trim().is_empty())
            .map_or(0, |last| last + 1);
        for line in &self.lines[..end] {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
