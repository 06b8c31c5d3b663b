// tests/watch_tree.rs

use std::fs;
use std::path::PathBuf;

use watchstep::errors::WatchStepError;
use watchstep::fs::RealFileSystem;
use watchstep::watch::{build_watch_tree, ExclusionFilter, StepDirs, WatcherFactory};
use watchstep_test_utils::fake_watcher::FakeWatcherFactory;
use watchstep_test_utils::init_tracing;

fn project() -> tempfile::TempDir {
    let dir = tempfile::Builder::new().prefix("proj").tempdir().unwrap();
    let root = dir.path();
    for d in [".git/objects", "_scratch", "build/lib", "src/pkg", "docs"] {
        fs::create_dir_all(root.join(d)).unwrap();
    }
    fs::write(root.join("main.py"), "print('hi')").unwrap();
    fs::write(root.join("server.log"), "").unwrap();
    fs::write(root.join(".gitignore"), "# generated\nbuild/\n\n  *.log  \n/docs\n").unwrap();
    dir
}

#[test]
fn skips_hidden_underscore_and_ignored_directories() {
    init_tracing();
    let dir = project();
    let root = fs::canonicalize(dir.path()).unwrap();

    let filter = ExclusionFilter::load(&RealFileSystem, &root, &StepDirs::default(), ".gitignore");
    let factory = FakeWatcherFactory::new();
    let (mut source, _rx) = factory.create().unwrap();

    let watched = build_watch_tree(&RealFileSystem, &root, &filter, source.as_mut()).unwrap();

    assert_eq!(watched, vec![root.clone(), root.join("src"), root.join("src/pkg")]);
    assert_eq!(factory.registered(), watched);
}

#[test]
fn ignore_file_patterns_are_anchored_at_the_root() {
    let dir = project();
    let root = fs::canonicalize(dir.path()).unwrap();
    let filter = ExclusionFilter::load(&RealFileSystem, &root, &StepDirs::default(), ".gitignore");

    assert!(filter.excludes_file(&root.join("server.log")));
    assert!(!filter.excludes_file(&root.join("src/server.log")));
    assert!(filter.is_excluded(&root.join("build")));
    assert!(filter.is_excluded(&root.join("docs")));
    assert!(!filter.is_excluded(&root.join("src")));
}

#[test]
fn step_directories_are_excluded() {
    let dir = project();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::create_dir_all(root.join("out/run-1")).unwrap();

    let dirs = StepDirs {
        step_dir: None,
        project_dir: None,
        build_dir: Some(root.join("out")),
    };
    let filter = ExclusionFilter::load(&RealFileSystem, &root, &dirs, "missing-ignore");
    let factory = FakeWatcherFactory::new();
    let (mut source, _rx) = factory.create().unwrap();

    let watched = build_watch_tree(&RealFileSystem, &root, &filter, source.as_mut()).unwrap();

    assert!(!watched.iter().any(|p| p.starts_with(root.join("out"))));
    // No ignore-file: build/ and docs/ are watched again.
    let expected: Vec<PathBuf> = ["", "build", "build/lib", "docs", "src", "src/pkg"]
        .iter()
        .map(|p| if p.is_empty() { root.clone() } else { root.join(p) })
        .collect();
    assert_eq!(watched, expected);
}

#[test]
fn hidden_project_root_is_a_setup_error() {
    let dir = tempfile::Builder::new().prefix(".hidden").tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();

    let filter = ExclusionFilter::load(&RealFileSystem, &root, &StepDirs::default(), ".gitignore");
    let factory = FakeWatcherFactory::new();
    let (mut source, _rx) = factory.create().unwrap();

    let err = build_watch_tree(&RealFileSystem, &root, &filter, source.as_mut()).unwrap_err();
    assert!(matches!(err, WatchStepError::WatchSetup(_)));
    assert!(factory.registered().is_empty());
}
