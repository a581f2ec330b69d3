use crate::files::{FileType, Selected};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = BumpError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BumpError {
    #[error(
        "The specific version could not be parsed with semver scheme. Please double check the config file"
    )]
    CannotParseVersion,

    #[error("Version part '{part}' is not present in the version or its serialization format")]
    UnknownPart { part: String },

    #[error("The given first value {value} does not contain any digit")]
    InvalidFirstValue { value: String },

    #[error("Value '{value}' does not contain a number that can be bumped")]
    NothingToBump { value: String },

    #[error("Did not find key '{key}' when rendering '{template}'")]
    MissingValue { key: String, template: String },

    #[error("Invalid template '{template}': {reason}")]
    Template { template: String, reason: String },

    #[error("Did not find '{search}' in plaintext file: '{}'", file.display())]
    VersionNotFound { search: String, file: PathBuf },

    #[error(
        "Selector '{selector}' does not lead to a valid property in {file_type} file {}",
        file.display()
    )]
    PathNotFound {
        selector: String,
        file_type: FileType,
        file: PathBuf,
    },

    #[error(
        "Selector '{selector}' finds value '{actual}' mismatches with the expectation '{expected}' in {file_type} file {}",
        file.display()
    )]
    SingleValueMismatch {
        selector: String,
        actual: String,
        expected: String,
        file_type: FileType,
        file: PathBuf,
    },

    #[error(
        "Selector '{selector}' finds list of values {} with one or more elements mismatch with the expectation '{expected}' in {file_type} file {}",
        Selected::render_list(.actual),
        file.display()
    )]
    MultiValuesMismatch {
        selector: String,
        actual: Vec<Selected>,
        expected: String,
        file_type: FileType,
        file: PathBuf,
    },

    #[error("File {} cannot be parsed as a valid {file_type} file", file.display())]
    InvalidFile { file_type: FileType, file: PathBuf },

    #[error("File {} has mixed newline characters: ({})", file.display(), .newlines.join(", "))]
    MixedNewLine { file: PathBuf, newlines: Vec<String> },

    #[error("Wrong file type '{declared}' specified for file {file}, please use '{expected}' instead")]
    FileTypeMismatch {
        declared: String,
        expected: FileType,
        file: String,
    },

    #[error("Invalid config file. {0}")]
    InvalidConfigSection(String),

    #[error("Could not read config file at {}", .0.display())]
    ConfigFileNotFound(PathBuf),

    #[error("the following arguments are required: {0}")]
    MissingArgument(String),

    #[error("Git working directory is not clean:\n{}", .lines.join("\n"))]
    WorkingDirectoryIsDirty { lines: Vec<String> },

    #[error(
        "Discovered unmanaged files. Please add them to the config file for versioning or to ignore:\n{}",
        .issues.iter().map(|issue| format!("  - {issue}")).collect::<Vec<_>>().join("\n")
    )]
    Discovery { issues: Vec<String> },

    #[error("Failed to run {command}: {reason}")]
    Command { command: String, reason: String },

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BumpError {
    /// Process exit code reported by the command line for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            BumpError::ConfigFileNotFound(_)
            | BumpError::MissingArgument(_)
            | BumpError::Regex(_)
            | BumpError::Template { .. } => 1,
            BumpError::Io(err) if err.kind() == std::io::ErrorKind::NotFound => 2,
            BumpError::MixedNewLine { .. } => 3,
            BumpError::CannotParseVersion
            | BumpError::UnknownPart { .. }
            | BumpError::InvalidFirstValue { .. }
            | BumpError::NothingToBump { .. }
            | BumpError::MissingValue { .. }
            | BumpError::VersionNotFound { .. }
            | BumpError::PathNotFound { .. }
            | BumpError::SingleValueMismatch { .. }
            | BumpError::MultiValuesMismatch { .. }
            | BumpError::InvalidFile { .. }
            | BumpError::FileTypeMismatch { .. }
            | BumpError::InvalidConfigSection(_) => 4,
            BumpError::WorkingDirectoryIsDirty { .. } => 5,
            BumpError::Git(_) | BumpError::Command { .. } => 10,
            BumpError::Discovery { .. } => 32,
            BumpError::Io(_) => 128,
        }
    }
}
