//! Which paths under the watched root count as relevant source files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Extensions watched when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["py"];

/// Directory names never worth a recompute
const IGNORED_DIRS: &[&str] = &["target", ".git", "node_modules", "__pycache__"];

/// Matches `**/*.<ext>` below a root, skipping build and VCS directories.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    globs: GlobSet,
}

impl WatchFilter {
    pub fn new<S: AsRef<str>>(root: impl Into<PathBuf>, extensions: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for ext in extensions {
            let ext = ext.as_ref().trim_start_matches('.');
            let pattern = format!("**/*.{}", ext);
            let glob = Glob::new(&pattern).with_context(|| format!("invalid watch pattern {}", pattern))?;
            builder.add(glob);
        }

        Ok(WatchFilter {
            root: root.into(),
            globs: builder.build().context("failed to build watch filter")?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn matches(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        !should_ignore_path(relative) && self.globs.is_match(relative)
    }
}

/// Check if a path should be ignored (e.g., target/, .git/, etc.)
fn should_ignore_path(path: &Path) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(exts: &[&str]) -> WatchFilter {
        WatchFilter::new("/repo", exts).unwrap()
    }

    #[test]
    fn test_matches_extension_at_any_depth() {
        let f = filter(DEFAULT_EXTENSIONS);
        assert!(f.matches(Path::new("/repo/main.py")));
        assert!(f.matches(Path::new("/repo/pkg/sub/workflow.py")));
        assert!(!f.matches(Path::new("/repo/readme.md")));
        assert!(!f.matches(Path::new("/repo/main.pyc")));
    }

    #[test]
    fn test_ignores_build_and_vcs_dirs() {
        let f = filter(DEFAULT_EXTENSIONS);
        assert!(!f.matches(Path::new("/repo/.git/hooks/pre-commit.py")));
        assert!(!f.matches(Path::new("/repo/node_modules/x/y.py")));
        assert!(!f.matches(Path::new("/repo/pkg/__pycache__/m.py")));
    }

    #[test]
    fn test_ignored_names_above_root_do_not_matter() {
        let f = WatchFilter::new("/home/me/target/project", DEFAULT_EXTENSIONS).unwrap();
        assert!(f.matches(Path::new("/home/me/target/project/app.py")));
    }

    #[test]
    fn test_multiple_extensions_with_leading_dot() {
        let f = filter(&[".rs", "toml"]);
        assert!(f.matches(Path::new("/repo/src/lib.rs")));
        assert!(f.matches(Path::new("/repo/Cargo.toml")));
        assert!(!f.matches(Path::new("/repo/app.py")));
    }
}
