// src/watch/exclude.rs

//! Exclusion patterns for the watch tree.
//!
//! Patterns come from three places, in this order:
//! - the step's own scratch/working directories (`<dir>*`, full path),
//! - the dotfile / underscore conventions (`.*`, `_*`, base name),
//! - the project's ignore-file, one pattern per line joined with the root.
//!
//! Everything here is pure apart from [`ExclusionFilter::load`], which reads
//! the ignore-file through a [`FileSystem`].

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, warn};

use crate::fs::FileSystem;

/// Default ignore-file name looked up at the watch root.
pub const DEFAULT_IGNORE_FILE: &str = ".gitignore";

/// Which part of a candidate path a pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternScope {
    FullPath,
    BaseName,
}

/// A single exclusion pattern as written (before compilation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub text: String,
    pub scope: PatternScope,
}

impl Pattern {
    pub fn full_path(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scope: PatternScope::FullPath,
        }
    }

    pub fn base_name(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scope: PatternScope::BaseName,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Directories owned by the step itself, excluded as prefix wildcards.
#[derive(Debug, Clone, Default)]
pub struct StepDirs {
    pub step_dir: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
}

/// Built-in patterns that are always present.
pub fn builtin_patterns(dirs: &StepDirs) -> Vec<Pattern> {
    let mut patterns: Vec<Pattern> = [&dirs.step_dir, &dirs.project_dir, &dirs.build_dir]
        .into_iter()
        .flatten()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| Pattern::full_path(format!("{}*", p.display())))
        .collect();

    patterns.push(Pattern::base_name(".*"));
    patterns.push(Pattern::base_name("_*"));
    patterns
}

/// Parse ignore-file contents into full-path patterns anchored at `root`.
///
/// Lines are trimmed of surrounding spaces; blank lines and `#` comments are
/// skipped.
pub fn parse_ignore_file(root: &Path, contents: &str) -> Vec<Pattern> {
    contents
        .lines()
        .map(|line| line.trim_matches(' '))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| Pattern::full_path(join_clean(root, line).to_string_lossy()))
        .collect()
}

/// Join `rel` onto `root` the way a path join cleans its result: leading `/`
/// and `./` and trailing `/` on the pattern are dropped.
fn join_clean(root: &Path, rel: &str) -> PathBuf {
    let mut rel = rel.trim_end_matches('/');
    loop {
        if let Some(rest) = rel.strip_prefix("./") {
            rel = rest;
        } else if let Some(rest) = rel.strip_prefix('/') {
            rel = rest;
        } else {
            break;
        }
    }
    if rel.is_empty() || rel == "." {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

struct CompiledPattern {
    pattern: Pattern,
    /// `None` when the pattern failed to compile; such patterns never match.
    matcher: Option<GlobMatcher>,
}

/// Immutable, compiled list of exclusion patterns.
pub struct ExclusionFilter {
    patterns: Vec<CompiledPattern>,
}

impl fmt::Debug for ExclusionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionFilter")
            .field("patterns", &self.patterns.len())
            .finish_non_exhaustive()
    }
}

impl ExclusionFilter {
    /// Compile the given patterns.
    ///
    /// Malformed patterns are logged and kept as non-matching entries.
    pub fn new(patterns: Vec<Pattern>) -> Self {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let matcher = match compile(&pattern.text) {
                    Ok(m) => Some(m),
                    Err(err) => {
                        warn!(pattern = %pattern, error = %err, "bad exclusion pattern");
                        None
                    }
                };
                CompiledPattern { pattern, matcher }
            })
            .collect();
        Self { patterns }
    }

    /// Build the filter for `root`: built-ins plus the ignore-file, if any.
    pub fn load(
        fs: &dyn FileSystem,
        root: &Path,
        dirs: &StepDirs,
        ignore_file: &str,
    ) -> Self {
        let mut patterns = builtin_patterns(dirs);

        let ignore_path = root.join(ignore_file);
        if fs.exists(&ignore_path) {
            match fs.read_to_string(&ignore_path) {
                Ok(contents) => {
                    debug!(path = ?ignore_path, "excluding file patterns in ignore-file");
                    patterns.extend(parse_ignore_file(root, &contents));
                }
                Err(err) => {
                    warn!(path = ?ignore_path, error = %err, "could not read ignore-file");
                }
            }
        }

        Self::new(patterns)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter().map(|p| &p.pattern)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Return the first pattern that excludes `path`, if any.
    pub fn matching_pattern(&self, path: &Path) -> Option<&Pattern> {
        let base = path.file_name().map(Path::new);

        self.patterns.iter().find_map(|p| {
            let matcher = p.matcher.as_ref()?;
            let hit = match p.pattern.scope {
                PatternScope::FullPath => matcher.is_match(path),
                PatternScope::BaseName => base.is_some_and(|b| matcher.is_match(b)),
            };
            hit.then_some(&p.pattern)
        })
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.matching_pattern(path).is_some()
    }

    /// Whether a changed file is excluded. Only full-path patterns apply;
    /// the base-name conventions are for directories.
    pub fn excludes_file(&self, path: &Path) -> bool {
        self.patterns.iter().any(|p| {
            p.pattern.scope == PatternScope::FullPath
                && p.matcher.as_ref().is_some_and(|m| m.is_match(path))
        })
    }
}

/// Shell-style glob: `*` and `?` do not cross `/`.
fn compile(text: &str) -> Result<GlobMatcher, globset::Error> {
    GlobBuilder::new(text)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|g| g.compile_matcher())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs() -> StepDirs {
        StepDirs {
            step_dir: Some(PathBuf::from("/work/.step")),
            project_dir: None,
            build_dir: Some(PathBuf::from("/work/out")),
        }
    }

    #[test]
    fn builtins_are_ordered_and_scoped() {
        let patterns = builtin_patterns(&dirs());
        assert_eq!(
            patterns,
            vec![
                Pattern::full_path("/work/.step*"),
                Pattern::full_path("/work/out*"),
                Pattern::base_name(".*"),
                Pattern::base_name("_*"),
            ]
        );
    }

    #[test]
    fn ignore_file_lines_are_trimmed_and_anchored() {
        let contents = "  build/  \n\n# comment\n*.log\n   \n/dist\n";
        let patterns = parse_ignore_file(Path::new("/proj"), contents);
        let texts: Vec<_> = patterns.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["/proj/build", "/proj/*.log", "/proj/dist"]);
        assert!(patterns.iter().all(|p| p.scope == PatternScope::FullPath));
    }

    #[test]
    fn dot_and_underscore_dirs_excluded_anywhere() {
        let filter = ExclusionFilter::new(builtin_patterns(&StepDirs::default()));
        assert!(filter.is_excluded(Path::new("/proj/.git")));
        assert!(filter.is_excluded(Path::new("/proj/src/_scratch")));
        assert!(!filter.is_excluded(Path::new("/proj/src")));
        assert!(!filter.is_excluded(Path::new("/proj/src/my_mod")));
    }

    #[test]
    fn prefix_wildcard_matches_step_dirs() {
        let filter = ExclusionFilter::new(builtin_patterns(&dirs()));
        assert!(filter.is_excluded(Path::new("/work/out")));
        assert!(filter.is_excluded(Path::new("/work/output-2")));
        assert!(!filter.is_excluded(Path::new("/work/src")));
    }

    #[test]
    fn star_does_not_cross_separators() {
        let filter = ExclusionFilter::new(vec![Pattern::full_path("/proj/*.log")]);
        assert!(filter.is_excluded(Path::new("/proj/app.log")));
        assert!(!filter.is_excluded(Path::new("/proj/sub/app.log")));
    }

    #[test]
    fn file_exclusion_ignores_base_name_rules() {
        let filter = ExclusionFilter::new(vec![
            Pattern::base_name("_*"),
            Pattern::full_path("/proj/*.log"),
        ]);
        assert!(filter.excludes_file(Path::new("/proj/debug.log")));
        assert!(!filter.excludes_file(Path::new("/proj/_version.py")));
    }

    #[test]
    fn malformed_pattern_never_matches() {
        let filter = ExclusionFilter::new(vec![
            Pattern::full_path("/proj/[unclosed"),
            Pattern::base_name("vendor"),
        ]);
        assert_eq!(filter.len(), 2);
        assert!(!filter.is_excluded(Path::new("/proj/[unclosed")));
        assert!(filter.is_excluded(Path::new("/proj/vendor")));
    }

    #[test]
    fn matching_pattern_reports_first_hit() {
        let filter = ExclusionFilter::new(vec![
            Pattern::base_name("_*"),
            Pattern::full_path("/proj/_gen"),
        ]);
        let hit = filter.matching_pattern(Path::new("/proj/_gen"));
        assert_eq!(hit, Some(&Pattern::base_name("_*")));
    }
}
