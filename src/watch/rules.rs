use crate::config::{WatchConfiguration, WatcherRule};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Missing,
    IgnoredDir(String),
    Hidden,
    NoMatch,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Missing => write!(f, "no longer exists"),
            SkipReason::IgnoredDir(dir) => write!(f, "inside ignored dir {dir}"),
            SkipReason::Hidden => write!(f, "hidden file"),
            SkipReason::NoMatch => write!(f, "no matching pattern"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Decision<'a> {
    Skip(SkipReason),
    /// Every rule with a pattern matching the file, in configuration order.
    Trigger(Vec<&'a WatcherRule>),
}

/// The root is stripped as a plain string prefix, so a root of `/proj` also
/// treats `/project/x` as contained (relative path `ject/x`).
pub fn evaluate<'a>(path: &Path, root: &Path, config: &'a WatchConfiguration) -> Decision<'a> {
    if !path.exists() {
        return Decision::Skip(SkipReason::Missing);
    }

    let full = path.to_string_lossy();
    let root = root.to_string_lossy();
    let relative = full.strip_prefix(&*root).unwrap_or(&full);
    if let Some(dir) = config
        .ignore_dirs
        .iter()
        .find(|dir| !dir.is_empty() && relative.contains(dir.as_str()))
    {
        return Decision::Skip(SkipReason::IgnoredDir(dir.clone()));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    if name.starts_with('.') {
        return Decision::Skip(SkipReason::Hidden);
    }

    let rules: Vec<_> = config
        .watchers
        .iter()
        .filter(|rule| rule.patterns.iter().any(|p| name.ends_with(p.as_str())))
        .collect();
    if rules.is_empty() {
        Decision::Skip(SkipReason::NoMatch)
    } else {
        Decision::Trigger(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    fn rule(name: &str, patterns: &[&str]) -> WatcherRule {
        WatcherRule {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            command: format!("echo {name} $FILE"),
        }
    }

    fn config(ignore_dirs: &[&str], watchers: Vec<WatcherRule>) -> WatchConfiguration {
        WatchConfiguration {
            debounce_delay: Duration::from_secs(1),
            ignore_dirs: ignore_dirs.iter().map(|d| d.to_string()).collect(),
            shell: None,
            explicit_path: None,
            watchers,
        }
    }

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "x").unwrap();
        path
    }

    fn names<'a>(decision: &Decision<'a>) -> Vec<&'a str> {
        match decision {
            Decision::Trigger(rules) => rules.iter().map(|r| r.name.as_str()).collect(),
            Decision::Skip(_) => Vec::new(),
        }
    }

    #[test]
    fn matches_suffix_of_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "docs/a.md");
        let cfg = config(&[], vec![rule("md", &[".md"]), rule("rs", &[".rs"])]);

        assert_eq!(names(&evaluate(&file, dir.path(), &cfg)), vec!["md"]);
    }

    #[test]
    fn every_matching_rule_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "a.md");
        let cfg = config(
            &[],
            vec![
                rule("lint", &[".md"]),
                rule("rs", &[".rs"]),
                rule("render", &[".txt", "a.md"]),
            ],
        );

        assert_eq!(names(&evaluate(&file, dir.path(), &cfg)), vec!["lint", "render"]);
    }

    #[test]
    fn rule_with_several_matching_patterns_triggers_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "a.md");
        let cfg = config(&[], vec![rule("md", &[".md", "md", "a.md"])]);

        assert_eq!(names(&evaluate(&file, dir.path(), &cfg)), vec!["md"]);
    }

    #[test]
    fn hidden_files_are_skipped_before_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), ".tmp123");
        let cfg = config(&[], vec![rule("all", &["", "123"])]);

        assert_eq!(
            evaluate(&file, dir.path(), &cfg),
            Decision::Skip(SkipReason::Hidden)
        );
    }

    #[test]
    fn ignored_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "node_modules/pkg/readme.md");
        let cfg = config(&["node_modules"], vec![rule("md", &[".md"])]);

        assert_eq!(
            evaluate(&file, dir.path(), &cfg),
            Decision::Skip(SkipReason::IgnoredDir("node_modules".into()))
        );
    }

    #[test]
    fn ignore_applies_to_path_below_root_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("build");
        let file = touch(&root, "a.md");
        let cfg = config(&["build"], vec![rule("md", &[".md"])]);

        assert_eq!(names(&evaluate(&file, &root, &cfg)), vec!["md"]);
    }

    #[test]
    fn root_is_stripped_as_a_string_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "project/a.md");
        // "/x/proj" is a textual prefix of "/x/project/a.md", leaving "ect/a.md"
        let root = dir.path().join("proj");
        let cfg = config(&["project"], vec![rule("md", &[".md"])]);

        assert_eq!(names(&evaluate(&file, &root, &cfg)), vec!["md"]);
    }

    #[test]
    fn missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&[], vec![rule("md", &[".md"])]);

        assert_eq!(
            evaluate(&dir.path().join("gone.md"), dir.path(), &cfg),
            Decision::Skip(SkipReason::Missing)
        );
    }

    #[test]
    fn rule_without_patterns_never_matches() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "a.md");
        let cfg = config(&[], vec![rule("empty", &[])]);

        assert_eq!(
            evaluate(&file, dir.path(), &cfg),
            Decision::Skip(SkipReason::NoMatch)
        );
    }
}
