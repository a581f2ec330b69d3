use clap::Parser;

pub const DEFAULT_TAG_NAME: &str = "r{new_version}";
pub const DEFAULT_MESSAGE: &str = "build(repo): bumped version {current_version} → {new_version}";

#[derive(Debug, Parser)]
#[command(author, version, about, bin_name = "bumpsemver")]
pub struct Arguments {
    /// Part of the version to be bumped
    pub part: String,
    /// Files to change, in addition to the ones in the config file
    pub files: Vec<String>,
    /// Config file to read most of the variables from [default: .bumpsemver.cfg]
    #[arg(long)]
    pub config_file: Option<String>,
    /// Print verbose logging, repeat for more detail
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Don't abort if working directory is dirty
    #[arg(long)]
    pub allow_dirty: bool,
    /// Version that needs to be updated
    #[arg(long)]
    pub current_version: Option<String>,
    /// New version that should be in the files
    #[arg(long)]
    pub new_version: Option<String>,
    /// Template for complete string to search
    #[arg(long)]
    pub search: Option<String>,
    /// Template for complete string to replace
    #[arg(long)]
    pub replace: Option<String>,
    /// Don't write any files, just pretend
    #[arg(long, short = 'n')]
    pub dry_run: bool,
    /// Commit to version control
    #[arg(long, conflicts_with = "no_commit")]
    pub commit: bool,
    /// Do not commit to version control
    #[arg(long)]
    pub no_commit: bool,
    /// Create a tag in version control
    #[arg(long, conflicts_with = "no_tag")]
    pub tag: bool,
    /// Do not create a tag in version control
    #[arg(long)]
    pub no_tag: bool,
    /// Sign tags if created
    #[arg(long, conflicts_with = "no_sign_tags")]
    pub sign_tags: bool,
    /// Do not sign tags if created
    #[arg(long)]
    pub no_sign_tags: bool,
    /// Tag name (only works with --tag)
    #[arg(long)]
    pub tag_name: Option<String>,
    /// Tag message
    #[arg(long)]
    pub tag_message: Option<String>,
    /// Commit message
    #[arg(long, short)]
    pub message: Option<String>,
    /// Working directory of the project
    #[arg(long, short, default_value = "./")]
    pub path: String,
}

fn flag(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl Arguments {
    /// `Some` when `--commit` or `--no-commit` was given
    pub fn commit_flag(&self) -> Option<bool> {
        flag(self.commit, self.no_commit)
    }

    pub fn tag_flag(&self) -> Option<bool> {
        flag(self.tag, self.no_tag)
    }

    pub fn sign_tags_flag(&self) -> Option<bool> {
        flag(self.sign_tags, self.no_sign_tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let args = Arguments::parse_from(["bumpsemver", "patch"]);
        assert_eq!(args.part, "patch");
        assert!(args.files.is_empty());
        assert!(args.config_file.is_none());
        assert_eq!(args.path, "./");
        assert_eq!(args.verbose, 0);
        assert!(!args.dry_run);
        assert!(!args.allow_dirty);
        assert_eq!(args.commit_flag(), None);
        assert_eq!(args.tag_flag(), None);
        assert_eq!(args.sign_tags_flag(), None);
        assert!(args.new_version.is_none());
    }

    #[test]
    fn test_part_is_required() {
        assert!(Arguments::try_parse_from(["bumpsemver"]).is_err());
    }

    #[test]
    fn test_parse_files() {
        let args = Arguments::parse_from(["bumpsemver", "minor", "VERSION", "package.json"]);
        assert_eq!(args.part, "minor");
        assert_eq!(args.files, vec!["VERSION", "package.json"]);
    }

    #[test]
    fn test_parse_verbose_count() {
        let args = Arguments::parse_from(["bumpsemver", "-vv", "patch"]);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_parse_negated_flags() {
        let args = Arguments::parse_from([
            "bumpsemver",
            "--no-commit",
            "--tag",
            "--no-sign-tags",
            "major",
        ]);
        assert_eq!(args.commit_flag(), Some(false));
        assert_eq!(args.tag_flag(), Some(true));
        assert_eq!(args.sign_tags_flag(), Some(false));
    }

    #[test]
    fn test_conflicting_flags() {
        assert!(
            Arguments::try_parse_from(["bumpsemver", "--commit", "--no-commit", "patch"]).is_err()
        );
        assert!(Arguments::try_parse_from(["bumpsemver", "--tag", "--no-tag", "patch"]).is_err());
    }

    #[test]
    fn test_parse_long_flags() {
        let args = Arguments::parse_from([
            "bumpsemver",
            "--config-file",
            "custom.cfg",
            "--current-version",
            "1.2.3",
            "--new-version",
            "2.0.0",
            "--search",
            "v{current_version}",
            "--replace",
            "v{new_version}",
            "--dry-run",
            "--allow-dirty",
            "--tag-name",
            "v{new_version}",
            "--message",
            "release {new_version}",
            "--path",
            "/test",
            "major",
        ]);
        assert_eq!(args.config_file.as_deref(), Some("custom.cfg"));
        assert_eq!(args.current_version.as_deref(), Some("1.2.3"));
        assert_eq!(args.new_version.as_deref(), Some("2.0.0"));
        assert_eq!(args.search.as_deref(), Some("v{current_version}"));
        assert_eq!(args.replace.as_deref(), Some("v{new_version}"));
        assert!(args.dry_run);
        assert!(args.allow_dirty);
        assert_eq!(args.tag_name.as_deref(), Some("v{new_version}"));
        assert_eq!(args.message.as_deref(), Some("release {new_version}"));
        assert_eq!(args.path, "/test");
        assert_eq!(args.part, "major");
    }
}
