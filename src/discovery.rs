use crate::errors::{BumpError, Result};
use crate::git;
use crate::paths::YamlDocument;
use crate::paths::yaml_path::YamlNode;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Files that carry a version wherever they live in the repository.
const TO_BE_MANAGED: [&str; 4] = [
    "package.json",
    "package-lock.json",
    "pyproject.toml",
    "dbt_project.yml",
];

/// Fails with every versioned-looking file under `root` that the config does not manage.
pub fn discover_unmanaged_files(
    root: &Path,
    managed_files: &[String],
    ignore_files: &[String],
) -> Result<()> {
    let all_files = git::list_files(root)?;
    let issues = find_issues(root, all_files, managed_files, ignore_files);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(BumpError::Discovery { issues })
    }
}

/// Sorted list of discovery issues for the given repository listing.
pub fn find_issues(
    root: &Path,
    all_files: impl IntoIterator<Item = String>,
    managed_files: &[String],
    ignore_files: &[String],
) -> Vec<String> {
    let mut issues = check_package_lock_json(managed_files);

    let mut files: BTreeSet<String> = all_files.into_iter().collect();
    for file in ignore_files.iter().chain(managed_files) {
        files.remove(file);
    }

    for file in files {
        if file == "README.md" || is_always_managed(&file) || is_versioned_yaml(root, &file) {
            issues.push(format!(
                "File {file} is not managed. Please add it to the config file"
            ));
        }
    }

    issues.sort();
    issues
}

/// `package-lock.json` holds the version twice, so it needs two sections.
fn check_package_lock_json(managed_files: &[String]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for file in managed_files {
        if file == "package-lock.json" || file.ends_with("/package-lock.json") {
            *counts.entry(file.as_str()).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count < 2)
        .map(|(file, _)| {
            format!(
                "File {file} has only one version position managed. Please add another one into the config file"
            )
        })
        .collect()
}

fn is_always_managed(file: &str) -> bool {
    TO_BE_MANAGED
        .iter()
        .any(|name| file == *name || file.ends_with(&format!("/{name}")))
}

fn is_versioned_yaml(root: &Path, file: &str) -> bool {
    let path = Path::new(file);
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml" | "yaml")
    );
    if !is_yaml {
        return false;
    }

    let Ok(content) = fs::read_to_string(root.join(path)) else {
        return false;
    };
    let document = match YamlDocument::parse(&content) {
        Ok(document) => document,
        Err(err) => {
            debug!("Skipping {}: {}", file, err);
            return false;
        }
    };

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    (name.contains("play") && is_ansible_playbook(document.root()))
        || is_dbt_sources(document.root())
}

fn is_ansible_playbook(root: &YamlNode) -> bool {
    let Some(play) = root.as_sequence().and_then(|plays| plays.first()) else {
        return false;
    };
    play.get("roles").is_some()
        && play
            .get("vars")
            .and_then(YamlNode::as_mapping)
            .is_some_and(|vars| vars.keys().any(|key| key.contains("version")))
}

fn is_dbt_sources(root: &YamlNode) -> bool {
    let Some(source) = root
        .get("sources")
        .and_then(YamlNode::as_sequence)
        .and_then(|sources| sources.first())
    else {
        return false;
    };
    source.get("schema").is_some()
        && source
            .get("tables")
            .and_then(YamlNode::as_sequence)
            .is_some_and(|tables| !tables.is_empty())
}
