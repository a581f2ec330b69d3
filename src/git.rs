use crate::errors::{BumpError, Result};
use git2::{
    DescribeFormatOptions, DescribeOptions, ObjectType, Repository, Signature, Status,
    StatusOptions,
};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

pub struct GitTracker {
    pub repository: Repository,
}

impl GitTracker {
    /// Opens the repository containing `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let repository = Repository::discover(path)?;

        debug!("Opened repository at {:?}", repository.path());

        Ok(GitTracker { repository })
    }

    /// Opens the repository containing `path`, or `None` when there is none
    pub fn usable(path: impl AsRef<Path>) -> Option<Self> {
        match Self::open(path) {
            Ok(tracker) => Some(tracker),
            Err(err) => {
                debug!("No usable git repository: {}", err);
                None
            }
        }
    }

    fn workdir(&self) -> Result<&Path> {
        self.repository
            .workdir()
            .ok_or_else(|| git2::Error::from_str("repository has no working directory").into())
    }

    /// Gets the repository signature from local git config
    fn get_signature(&self) -> Result<Signature<'_>> {
        Ok(self.repository.signature()?)
    }

    /// Describes HEAD against the latest `r*` tag.
    ///
    /// Yields `commit_sha`, `distance_to_latest_tag`, `current_version` and, for a
    /// modified working tree, `dirty`. Any failure gives an empty map.
    pub fn latest_tag_info(&self) -> BTreeMap<String, String> {
        match self.describe() {
            Ok(described) => parse_describe(&described),
            Err(err) => {
                debug!("Error when running git describe: {}", err);
                BTreeMap::new()
            }
        }
    }

    fn describe(&self) -> Result<String> {
        let mut options = DescribeOptions::new();
        options.describe_tags().pattern("r*");
        let describe = self.repository.describe(&options)?;

        let mut format = DescribeFormatOptions::new();
        format
            .abbreviated_size(40)
            .always_use_long_format(true)
            .dirty_suffix("-dirty");
        Ok(describe.format(Some(&format))?)
    }

    /// Fails when tracked files have uncommitted changes. Untracked files are ignored.
    pub fn assert_non_dirty(&self) -> Result<()> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self.repository.statuses(Some(&mut options))?;

        let lines: Vec<String> = statuses
            .iter()
            .filter(|entry| !entry.status().is_ignored() && !entry.status().is_wt_new())
            .map(|entry| {
                format!(
                    "{} {}",
                    status_code(entry.status()),
                    entry.path().unwrap_or_default()
                )
            })
            .collect();

        if lines.is_empty() {
            Ok(())
        } else {
            Err(BumpError::WorkingDirectoryIsDirty { lines })
        }
    }

    /// Stages the changes of a tracked file
    pub fn add_path(&self, path: &Path) -> Result<()> {
        let relative = self.relative(path)?;
        debug!("Staging {}", relative);

        let mut index = self.repository.index()?;
        index.update_all([relative.as_str()], None)?;
        index.write()?;
        Ok(())
    }

    fn relative(&self, path: &Path) -> Result<String> {
        let workdir = fs::canonicalize(self.workdir()?)?;
        let absolute = fs::canonicalize(path)?;
        let relative = absolute
            .strip_prefix(&workdir)
            .map(Path::to_path_buf)
            .unwrap_or(absolute);
        Ok(relative.to_string_lossy().replace('\\', "/"))
    }

    /// Creates a commit on HEAD with the staged index
    pub fn commit(&self, message: &str) -> Result<git2::Oid> {
        info!("Creating commit: {}", message);

        let mut index = self.repository.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repository.find_tree(tree_id)?;

        let sig = self.get_signature()?;

        let parent_commit = match self.repository.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => {
                warn!("No parent commit found - this will be the initial commit");
                None
            }
        };

        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();

        let commit_id =
            self.repository
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;

        info!("Created commit: {}", commit_id);
        Ok(commit_id)
    }

    /// Tags HEAD.
    ///
    /// Without a message the tag is lightweight, with one it is annotated. Signed tags
    /// are created by the `git` executable.
    pub fn tag(&self, name: &str, sign: bool, message: Option<&str>) -> Result<()> {
        info!("Creating tag: {}", name);

        if sign {
            return self.signed_tag(name, message);
        }

        let head = self.repository.head()?.peel(ObjectType::Commit)?;
        match message {
            Some(message) => {
                let sig = self.get_signature()?;
                self.repository.tag(name, &head, &sig, message, false)?;
            }
            None => {
                self.repository.tag_lightweight(name, &head, false)?;
            }
        }

        info!("Created tag: {}", name);
        Ok(())
    }

    fn signed_tag(&self, name: &str, message: Option<&str>) -> Result<()> {
        let mut args = vec!["tag", name, "--sign"];
        if let Some(message) = message {
            args.extend(["--message", message]);
        }
        let command = format!("git {}", args.join(" "));

        let output = Command::new("git")
            .args(&args)
            .current_dir(self.workdir()?)
            .output()
            .map_err(|err| BumpError::Command {
                command: command.clone(),
                reason: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(BumpError::Command {
                command,
                reason: format!(
                    "{}, output: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }

    /// Paths recorded in the index, relative to `root`
    pub fn index_files(&self, root: &Path) -> Result<Vec<String>> {
        let workdir = fs::canonicalize(self.workdir()?)?;
        let root = fs::canonicalize(root)?;
        let index = self.repository.index()?;

        Ok(index
            .iter()
            .filter_map(|entry| {
                let path = workdir.join(String::from_utf8_lossy(&entry.path).as_ref());
                path.strip_prefix(&root)
                    .ok()
                    .map(|relative| relative.to_string_lossy().replace('\\', "/"))
            })
            .collect())
    }
}

/// Lists the files under `root`: the git index when `root` is inside a repository,
/// otherwise every file found on disk.
pub fn list_files(root: &Path) -> Result<Vec<String>> {
    if let Some(tracker) = GitTracker::usable(root)
        && let Ok(files) = tracker.index_files(root)
    {
        return Ok(files);
    }

    warn!("Listing git files failed. Listing files without respecting '.gitignore'");
    let mut files = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative: PathBuf = entry
            .path()
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| entry.path().to_path_buf());
        files.push(relative.to_string_lossy().replace('\\', "/"));
    }
    files.sort();
    Ok(files)
}

/// Splits `r1.2.3-4-g<sha>[-dirty]` into context entries.
fn parse_describe(described: &str) -> BTreeMap<String, String> {
    let mut parts: Vec<&str> = described.trim().split('-').collect();
    let mut info = BTreeMap::new();

    if parts.last() == Some(&"dirty") {
        info.insert("dirty".to_string(), "True".to_string());
        parts.pop();
    }

    let (Some(sha), Some(distance)) = (parts.pop(), parts.pop()) else {
        return BTreeMap::new();
    };
    if parts.is_empty() || distance.parse::<u64>().is_err() {
        return BTreeMap::new();
    }

    info.insert(
        "commit_sha".to_string(),
        sha.strip_prefix('g').unwrap_or(sha).to_string(),
    );
    info.insert("distance_to_latest_tag".to_string(), distance.to_string());
    info.insert(
        "current_version".to_string(),
        parts.join("-").trim_start_matches('r').to_string(),
    );
    info
}

/// Two letter status in the style of `git status --porcelain`.
fn status_code(status: Status) -> String {
    let index = if status.is_index_new() {
        'A'
    } else if status.is_index_modified() {
        'M'
    } else if status.is_index_deleted() {
        'D'
    } else if status.is_index_renamed() {
        'R'
    } else if status.is_index_typechange() {
        'T'
    } else {
        ' '
    };
    let worktree = if status.is_wt_modified() {
        'M'
    } else if status.is_wt_deleted() {
        'D'
    } else if status.is_wt_renamed() {
        'R'
    } else if status.is_wt_typechange() {
        'T'
    } else {
        ' '
    };
    format!("{index}{worktree}").trim().to_string()
}
