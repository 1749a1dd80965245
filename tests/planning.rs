// tests/planning.rs

use std::path::{Path, PathBuf};

use inotify_watcher::config::{JobSpec, ServiceConfig};
use inotify_watcher::describe_plan;
use inotify_watcher::fs::mock::MockFileSystem;
use inotify_watcher::fs::scan_dirs;
use inotify_watcher::service::plan_watches;
use inotify_watcher::watch::{EventKind, EventMask};

fn tree() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/data/a.txt", "hello");
    fs.add_dir("/data/x/y/z");
    fs.add_dir("/data/b");
    fs.add_symlink("/data/link", "/data/x");
    fs
}

#[test]
fn file_with_default_mask_is_watched_through_parent() {
    let fs = tree();
    let planned = plan_watches(&fs, &JobSpec::new("/data/a.txt"));

    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].path, PathBuf::from("/data"));
    assert_eq!(planned[0].name.as_deref(), Some("a.txt"));
    assert_eq!(planned[0].events, EventMask::DEFAULT);
}

#[test]
fn file_with_custom_mask_is_watched_directly() {
    let fs = tree();
    let spec = JobSpec {
        events: EventMask::of(EventKind::Modify),
        recursive: true,
        ..JobSpec::new("/data/a.txt")
    };
    let planned = plan_watches(&fs, &spec);

    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].path, PathBuf::from("/data/a.txt"));
    assert_eq!(planned[0].name, None);
    assert!(!planned[0].recursive, "recursive is meaningless for files");
}

#[test]
fn plain_directory_is_one_watch() {
    let fs = tree();
    let spec = JobSpec::new("/data");

    assert_eq!(plan_watches(&fs, &spec), vec![spec]);
}

#[test]
fn recursive_directory_expands_to_every_subdirectory() {
    let fs = tree();
    let spec = JobSpec {
        recursive: true,
        ..JobSpec::new("/data")
    };
    let paths: Vec<PathBuf> = plan_watches(&fs, &spec).into_iter().map(|s| s.path).collect();

    assert_eq!(
        paths,
        vec![
            PathBuf::from("/data"),
            PathBuf::from("/data/b"),
            PathBuf::from("/data/x"),
            PathBuf::from("/data/x/y"),
            PathBuf::from("/data/x/y/z"),
        ]
    );
}

#[test]
fn missing_target_is_skipped() {
    let fs = tree();
    assert!(plan_watches(&fs, &JobSpec::new("/nowhere")).is_empty());
}

#[test]
fn scan_does_not_follow_symlinks() {
    let fs = tree();
    let dirs = scan_dirs(&fs, Path::new("/data"));

    assert!(!dirs.contains(&PathBuf::from("/data/link")));
    assert_eq!(dirs.first(), Some(&PathBuf::from("/data")));
    assert!(scan_dirs(&fs, Path::new("/data/a.txt")).is_empty());
}

#[test]
fn dry_run_report_lists_planned_watches() {
    let fs = tree();
    fs.add_file(
        "/etc/jobs.d/web.job",
        r#"{"path":"/data/x","recursive":true,"command":"/bin/echo"}"#,
    );
    fs.add_file("/etc/jobs.d/broken.job", "{");

    let config = ServiceConfig {
        debug: true,
        jobs: vec![
            JobSpec {
                command: Some("/bin/true".into()),
                ..JobSpec::new("/data/a.txt")
            },
            JobSpec::new("/nowhere"),
        ],
        skipped: 1,
    };
    let report = describe_plan(&fs, &config, Some(Path::new("/etc/jobs.d")));

    assert!(report.contains("debug = true"));
    assert!(report.contains("skipped malformed jobs = 1"));
    assert!(report.contains("watch: /data (name = a.txt)"));
    assert!(report.contains("command: /bin/true"));
    assert!(report.contains("(target missing, skipped)"));
    assert!(report.contains("watch: /data/x/y/z"));
    assert!(report.contains("broken.job (skipped:"));
}
