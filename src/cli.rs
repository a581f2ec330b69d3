use crate::arguments::{Arguments, DEFAULT_MESSAGE, DEFAULT_TAG_NAME};
use crate::config::{self, Config, DEFAULT_CONFIG_FILE};
use crate::discovery;
use crate::errors::{BumpError, Result};
use crate::events::{LogObserver, Observer};
use crate::files::{ConfiguredFile, FileType, VersionFile};
use crate::git::GitTracker;
use crate::version::{Context, ContextValue, Template, Version, VersionConfig};
use chrono::{Local, Utc};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Bumps the version in every configured file, then updates the config file and
/// commits and tags when asked to.
pub fn run(args: &Arguments) -> Result<()> {
    run_with_observer(args, Rc::new(LogObserver))
}

pub fn run_with_observer(args: &Arguments, observer: Rc<dyn Observer>) -> Result<()> {
    debug!("Starting bumpsemver v{}", env!("CARGO_PKG_VERSION"));
    let root = PathBuf::from(&args.path);

    let mut vcs = GitTracker::usable(&root);
    let vcs_info = vcs
        .as_ref()
        .map(GitTracker::latest_tag_info)
        .unwrap_or_default();

    let (config_path, explicit) = match &args.config_file {
        Some(file) => (config::resolve(&root, file), true),
        None => (config::resolve(&root, DEFAULT_CONFIG_FILE), false),
    };
    let mut config = Config::load(&config_path, explicit)?;
    let options = config.options.clone();

    let version_config = VersionConfig::new(
        args.search.as_deref().or(options.search.as_deref()),
        args.replace.as_deref().or(options.replace.as_deref()),
    )?;

    let current_raw = args
        .current_version
        .clone()
        .or_else(|| options.current_version.clone())
        .or_else(|| vcs_info.get("current_version").cloned())
        .ok_or_else(|| BumpError::MissingArgument("--current-version".to_string()))?;
    let current_version = version_config
        .parse(&current_raw)
        .ok_or(BumpError::CannotParseVersion)?;

    let new_version = match args.new_version.as_ref().or(options.new_version.as_ref()) {
        Some(raw) => version_config
            .parse(raw)
            .ok_or(BumpError::CannotParseVersion)?,
        None => {
            info!("Attempting to increment part '{}'", args.part);
            let bumped = current_version.bump(&args.part, &version_config.order())?;
            info!("Values are now: {}", bumped);
            bumped
        }
    };
    let new_raw = version_config.serialize(&new_version)?;
    info!("New version will be '{}'", new_raw);

    let dry_run = args.dry_run || options.dry_run.unwrap_or(false);
    if dry_run {
        info!("Dry run active, won't touch any files.");
    }

    let allow_dirty = args.allow_dirty || options.allow_dirty.unwrap_or(false);
    let dirty = vcs.as_ref().map(GitTracker::assert_non_dirty).transpose();
    if let Err(err) = dirty {
        if !allow_dirty {
            return Err(err);
        }
        debug!("Ignoring dirty working directory: {}", err);
        vcs = None;
    }

    let mut files = config
        .files
        .iter()
        .map(|section| section.build(&root, observer.clone()))
        .collect::<Result<Vec<ConfiguredFile>>>()?;
    let extra_files = if args.files.is_empty() {
        &options.files
    } else {
        &args.files
    };
    files.extend(extra_files.iter().map(|file| {
        ConfiguredFile::new(
            config::resolve(&root, file),
            FileType::PlainText,
            None,
            version_config.clone(),
            observer.clone(),
        )
    }));

    if config.exists() {
        let managed: Vec<String> = config
            .files
            .iter()
            .map(|section| section.file.clone())
            .chain(extra_files.iter().cloned())
            .collect();
        discovery::discover_unmanaged_files(&root, &managed, &config.discovery_ignore)?;
    }

    let mut context = Context::new();
    context.insert("now".to_string(), Local::now().naive_local().into());
    context.insert("utcnow".to_string(), Utc::now().naive_utc().into());
    for (key, value) in &vcs_info {
        context.insert(key.clone(), value.clone().into());
    }

    let names: Vec<String> = files.iter().map(ToString::to_string).collect();
    info!(
        "Asserting files {} contain the version string...",
        names.join(", ")
    );
    for file in &files {
        file.should_contain_version(&current_version, &context)?;
    }
    for file in &files {
        file.replace(&current_version, &new_version, &context, dry_run)?;
    }

    config.write_current_version(&new_raw, dry_run)?;

    if let Some(tracker) = &vcs {
        let mut commit_files: Vec<&Path> = files.iter().map(|file| file.path()).collect();
        if config.exists() {
            commit_files.push(&config.path);
        }
        let context = commit_context(&current_raw, &current_version, &new_raw, &new_version);
        let settings = VcsSettings::resolve(args, &config, dry_run);
        commit_to_vcs(tracker, &commit_files, &context, &settings)?;
        tag_in_vcs(tracker, &context, &settings)?;
    }

    Ok(())
}

/// Commit and tag options after applying the command line over the config file.
struct VcsSettings {
    commit: bool,
    tag: bool,
    sign_tags: bool,
    dry_run: bool,
    message: String,
    tag_name: String,
    tag_message: String,
}

impl VcsSettings {
    fn resolve(args: &Arguments, config: &Config, dry_run: bool) -> Self {
        let options = &config.options;
        let pick = |arg: &Option<String>, option: &Option<String>, default: &str| {
            arg.clone()
                .or_else(|| option.clone())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            commit: args.commit_flag().or(options.commit).unwrap_or(false),
            tag: args.tag_flag().or(options.tag).unwrap_or(false),
            sign_tags: args.sign_tags_flag().or(options.sign_tags).unwrap_or(false),
            dry_run,
            message: pick(&args.message, &options.message, DEFAULT_MESSAGE),
            tag_name: pick(&args.tag_name, &options.tag_name, DEFAULT_TAG_NAME),
            tag_message: pick(&args.tag_message, &options.tag_message, DEFAULT_MESSAGE),
        }
    }
}

fn commit_context(
    current_raw: &str,
    current_version: &Version,
    new_raw: &str,
    new_version: &Version,
) -> Context {
    let mut context = Context::new();
    context.insert("current_version".to_string(), current_raw.into());
    context.insert("new_version".to_string(), new_raw.into());
    context.insert("now".to_string(), Local::now().naive_local().into());
    context.insert("utcnow".to_string(), Utc::now().naive_utc().into());
    for (name, part) in current_version.parts() {
        context.insert(format!("current_{name}"), ContextValue::from(part.value()));
    }
    for (name, part) in new_version.parts() {
        context.insert(format!("new_{name}"), ContextValue::from(part.value()));
    }
    context
}

fn commit_to_vcs(
    tracker: &GitTracker,
    files: &[&Path],
    context: &Context,
    settings: &VcsSettings,
) -> Result<()> {
    let do_commit = settings.commit && !settings.dry_run;
    info!(
        "{} Git commit",
        if do_commit { "Preparing" } else { "Would prepare" }
    );
    for path in files {
        info!(
            "{} changes in file '{}' to Git",
            if do_commit { "Adding" } else { "Would add" },
            path.display()
        );
        if do_commit {
            tracker.add_path(path)?;
        }
    }

    let message = Template::parse(&settings.message)?.render(context)?;
    info!(
        "{} to Git with message '{}'",
        if do_commit { "Committing" } else { "Would commit" },
        message
    );
    if do_commit {
        tracker.commit(&message)?;
    }
    Ok(())
}

fn tag_in_vcs(tracker: &GitTracker, context: &Context, settings: &VcsSettings) -> Result<()> {
    let tag_name = Template::parse(&settings.tag_name)?.render(context)?;
    let tag_message = Template::parse(&settings.tag_message)?.render(context)?;
    let do_tag = settings.tag && !settings.dry_run;

    let described = if tag_message.is_empty() {
        "without message".to_string()
    } else {
        format!("with message `{tag_message}`")
    };
    info!(
        "{} `{}` {} in Git and {}",
        if do_tag { "Tagging" } else { "Would tag" },
        tag_name,
        described,
        if settings.sign_tags { "signing" } else { "not signing" }
    );

    if do_tag {
        let message = (!tag_message.is_empty()).then_some(tag_message.as_str());
        tracker.tag(&tag_name, settings.sign_tags, message)?;
    }
    Ok(())
}
