// src/watch/tree.rs

//! Registers every non-excluded directory under the watch root.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::errors::{Result, WatchStepError};
use crate::fs::FileSystem;
use crate::watch::exclude::ExclusionFilter;
use crate::watch::source::NotificationSource;

/// Walk `root` depth-first (lexical order), registering each directory that
/// the filter does not exclude. Excluded directories are pruned together with
/// their subtree.
///
/// Returns the registered directories in registration order. An excluded
/// root, or any listing or registration failure, aborts the whole setup.
pub fn build_watch_tree(
    fs: &dyn FileSystem,
    root: &Path,
    filter: &ExclusionFilter,
    source: &mut dyn NotificationSource,
) -> Result<Vec<PathBuf>> {
    // An excluded root would leave nothing to watch.
    if let Some(pattern) = filter.matching_pattern(root) {
        let err = WatchStepError::WatchSetup(format!(
            "watch root {} is excluded by pattern {pattern}",
            root.display()
        ));
        error!(error = %err, "refusing to watch");
        return Err(err);
    }

    let mut watched = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        debug!(path = ?dir, "check path");

        if let Some(pattern) = filter.matching_pattern(&dir) {
            debug!(%pattern, path = ?dir, "exclude");
            continue;
        }

        source.add_dir(&dir)?;
        debug!(path = ?dir, "watching");

        let children = fs
            .subdirs(&dir)
            .map_err(|e| WatchStepError::WatchSetup(format!("{e:#}")))?;

        // Reversed onto the stack so children pop in lexical order.
        stack.extend(children.into_iter().rev());
        watched.push(dir);
    }

    debug!(count = watched.len(), "watching directories");
    Ok(watched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::watch::exclude::{builtin_patterns, StepDirs};

    #[derive(Default)]
    struct Recorder {
        dirs: Vec<PathBuf>,
        fail_on: Option<PathBuf>,
    }

    impl NotificationSource for Recorder {
        fn add_dir(&mut self, dir: &Path) -> Result<()> {
            if self.fail_on.as_deref() == Some(dir) {
                return Err(WatchStepError::WatchSetup("no more watches".into()));
            }
            self.dirs.push(dir.to_path_buf());
            Ok(())
        }
    }

    fn project() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("/p/main.py", "print()");
        fs.add_file("/p/src/b/lib.py", "");
        fs.add_file("/p/src/a/mod.py", "");
        fs.add_file("/p/.git/config", "");
        fs.add_file("/p/src/_gen/x.py", "");
        fs
    }

    #[test]
    fn registers_in_depth_first_lexical_order() {
        let fs = project();
        let filter = ExclusionFilter::new(builtin_patterns(&StepDirs::default()));
        let mut rec = Recorder::default();

        let watched = build_watch_tree(&fs, Path::new("/p"), &filter, &mut rec).unwrap();

        let expected: Vec<PathBuf> = ["/p", "/p/src", "/p/src/a", "/p/src/b"]
            .iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(watched, expected);
        assert_eq!(rec.dirs, expected);
    }

    #[test]
    fn excluded_root_is_refused() {
        let fs = MockFileSystem::new();
        fs.add_file("/tmp/.proj/src/app.py", "");
        let filter = ExclusionFilter::new(builtin_patterns(&StepDirs::default()));
        let mut rec = Recorder::default();

        let err = build_watch_tree(&fs, Path::new("/tmp/.proj"), &filter, &mut rec).unwrap_err();
        assert!(matches!(err, WatchStepError::WatchSetup(ref msg) if msg.contains(".*")));
        assert!(rec.dirs.is_empty());
    }

    #[test]
    fn root_under_a_step_dir_is_refused() {
        let fs = project();
        let dirs = StepDirs {
            step_dir: Some(PathBuf::from("/p")),
            ..Default::default()
        };
        let filter = ExclusionFilter::new(builtin_patterns(&dirs));
        let mut rec = Recorder::default();

        let err = build_watch_tree(&fs, Path::new("/p"), &filter, &mut rec).unwrap_err();
        assert!(matches!(err, WatchStepError::WatchSetup(_)));
        assert!(rec.dirs.is_empty());
    }

    #[test]
    fn registration_failure_aborts_setup() {
        let fs = project();
        let filter = ExclusionFilter::new(Vec::new());
        let mut rec = Recorder {
            fail_on: Some(PathBuf::from("/p/src")),
            ..Default::default()
        };

        let err = build_watch_tree(&fs, Path::new("/p"), &filter, &mut rec).unwrap_err();
        assert!(matches!(err, WatchStepError::WatchSetup(_)));
    }

    #[test]
    fn unreadable_directory_aborts_setup() {
        let fs = project();
        fs.deny_read("/p/src/a");
        let filter = ExclusionFilter::new(Vec::new());
        let mut rec = Recorder::default();

        let err = build_watch_tree(&fs, Path::new("/p"), &filter, &mut rec).unwrap_err();
        assert!(matches!(err, WatchStepError::WatchSetup(_)));
    }
}
