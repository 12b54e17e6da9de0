use dupe_quarantine::relocate::Collision;
use dupe_quarantine::{
    CollisionPolicy, DedupError, FixedRoot, PromptRoot, Settings, resolve_root, run,
};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use tempfile::tempdir;

fn settings() -> Settings {
    Settings {
        threads: Some(2),
        progress: false,
        ..Settings::default()
    }
}

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn quarantine_names(root: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(root.join("duplicates"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[test]
fn test_keepers_stay_and_duplicates_are_quarantined() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    let keep_a = write(&root, "a/one.txt", "alpha");
    let dup_a = write(&root, "b/one-copy.txt", "alpha");
    let keep_b = write(&root, "a/two.txt", "beta");
    let dup_b1 = write(&root, "c/deeper/two.txt", "beta");
    let dup_b2 = write(&root, "z.txt", "beta");
    let unique = write(&root, "unique.txt", "gamma");

    let shutdown = AtomicBool::new(false);
    let report = run(&FixedRoot(root.clone()), &settings(), &shutdown).unwrap();

    assert_eq!(report.files_scanned, 6);
    assert_eq!(report.groups.len(), 2);
    assert_eq!(report.relocated.len(), 3);
    assert!(report.relocation_failures.is_empty());
    assert!(report.hash_failures.is_empty());
    assert_eq!(report.exit_code(), 0);

    for keeper in [&keep_a, &keep_b, &unique] {
        assert!(keeper.exists(), "keeper moved: {}", keeper.display());
    }
    for dup in [&dup_a, &dup_b1, &dup_b2] {
        assert!(!dup.exists(), "duplicate left behind: {}", dup.display());
    }
    assert_eq!(
        quarantine_names(&root),
        vec!["one-copy.txt", "two.txt", "z.txt"]
    );
}

#[test]
fn test_keeper_is_first_in_discovery_order() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    write(&root, "b/file.txt", "same");
    write(&root, "a/file.txt", "same");

    let shutdown = AtomicBool::new(false);
    let report = run(&FixedRoot(root.clone()), &settings(), &shutdown).unwrap();

    assert_eq!(report.groups[0].keeper(), root.join("a/file.txt"));
    assert!(root.join("a/file.txt").exists());
    assert!(!root.join("b/file.txt").exists());
}

#[test]
fn test_no_duplicates_moves_nothing() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    write(&root, "a.txt", "1");
    write(&root, "sub/b.txt", "2");
    write(&root, "sub/c.txt", "3");

    let shutdown = AtomicBool::new(false);
    let report = run(&FixedRoot(root.clone()), &settings(), &shutdown).unwrap();

    assert_eq!(report.files_scanned, 3);
    assert!(report.groups.is_empty());
    assert!(report.relocated.is_empty());
    assert!(!root.join("duplicates").exists());
}

#[test]
fn test_collision_with_rename_policy() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    write(&root, "a/report.txt", "quarterly");
    write(&root, "b/report.txt", "quarterly");
    write(&root, "c/report.txt", "quarterly");

    let shutdown = AtomicBool::new(false);
    let report = run(&FixedRoot(root.clone()), &settings(), &shutdown).unwrap();

    assert_eq!(report.relocated.len(), 2);
    assert_eq!(report.collisions(), 1);
    assert_eq!(quarantine_names(&root), vec!["report (1).txt", "report.txt"]);
    assert!(root.join("a/report.txt").exists());
}

#[test]
fn test_collision_with_overwrite_policy_is_reported() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    write(&root, "a/report.txt", "quarterly");
    write(&root, "b/report.txt", "quarterly");
    write(&root, "c/report.txt", "quarterly");

    let settings = Settings {
        on_collision: CollisionPolicy::Overwrite,
        ..settings()
    };
    let shutdown = AtomicBool::new(false);
    let report = run(&FixedRoot(root.clone()), &settings, &shutdown).unwrap();

    assert_eq!(quarantine_names(&root), vec!["report.txt"]);
    let replaced: Vec<_> = report
        .relocated
        .iter()
        .filter(|r| r.collision == Some(Collision::Replaced))
        .map(|r| r.source.clone())
        .collect();
    assert_eq!(replaced, vec![root.join("c/report.txt")]);
}

#[test]
fn test_rerun_ignores_quarantine() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    write(&root, "a.txt", "same");
    write(&root, "b.txt", "same");

    let shutdown = AtomicBool::new(false);
    let first = run(&FixedRoot(root.clone()), &settings(), &shutdown).unwrap();
    assert_eq!(first.relocated.len(), 1);

    let second = run(&FixedRoot(root.clone()), &settings(), &shutdown).unwrap();
    assert_eq!(second.files_scanned, 1);
    assert!(second.groups.is_empty());
    assert_eq!(quarantine_names(&root), vec!["b.txt"]);
}

#[test]
fn test_dry_run_leaves_tree_untouched() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    let a = write(&root, "a.txt", "same");
    let b = write(&root, "b.txt", "same");

    let settings = Settings {
        dry_run: true,
        ..settings()
    };
    let shutdown = AtomicBool::new(false);
    let report = run(&FixedRoot(root.clone()), &settings, &shutdown).unwrap();

    assert!(report.dry_run);
    assert_eq!(report.relocated.len(), 1);
    assert_eq!(report.relocated[0].destination, root.join("duplicates/b.txt"));
    assert!(a.exists() && b.exists());
    assert!(!root.join("duplicates").exists());
}

#[test]
fn test_custom_quarantine_name() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    write(&root, "a.txt", "same");
    write(&root, "b.txt", "same");

    let settings = Settings {
        quarantine_dir: "held".to_string(),
        ..settings()
    };
    let shutdown = AtomicBool::new(false);
    let report = run(&FixedRoot(root.clone()), &settings, &shutdown).unwrap();

    assert_eq!(report.quarantine, root.join("held"));
    assert!(root.join("held/b.txt").exists());
}

#[test]
fn test_invalid_root_is_fatal() {
    let dir = tempdir().unwrap();
    let shutdown = AtomicBool::new(false);

    let missing = FixedRoot(dir.path().join("missing"));
    assert!(matches!(
        run(&missing, &settings(), &shutdown),
        Err(DedupError::InvalidRoot { .. })
    ));

    let file = write(dir.path(), "plain.txt", "x");
    assert!(matches!(
        run(&FixedRoot(file), &settings(), &shutdown),
        Err(DedupError::InvalidRoot { .. })
    ));
}

#[test]
fn test_cancelled_selection_is_fatal() {
    let shutdown = AtomicBool::new(false);
    let selector = PromptRoot::new(Cursor::new(""));
    assert!(matches!(
        run(&selector, &settings(), &shutdown),
        Err(DedupError::SelectionCancelled)
    ));
}

#[test]
fn test_prompted_root_is_scanned() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    write(&root, "a.txt", "same");
    write(&root, "b.txt", "same");

    let selector = PromptRoot::new(Cursor::new(format!("{}\n", root.display())));
    let shutdown = AtomicBool::new(false);
    let report = run(&selector, &settings(), &shutdown).unwrap();
    assert_eq!(report.root, root);
    assert_eq!(report.relocated.len(), 1);
}

#[test]
fn test_interrupt_before_hashing_moves_nothing() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    let a = write(&root, "a.txt", "same");
    let b = write(&root, "b.txt", "same");

    let shutdown = AtomicBool::new(true);
    let result = run(&FixedRoot(root.clone()), &settings(), &shutdown);
    assert!(matches!(result, Err(DedupError::Interrupted)));
    assert!(a.exists() && b.exists());
}

#[test]
fn test_invalid_settings_rejected_before_scan() {
    let dir = tempdir().unwrap();
    let settings = Settings {
        quarantine_dir: "../escape".to_string(),
        ..settings()
    };
    let shutdown = AtomicBool::new(false);
    assert!(matches!(
        run(&FixedRoot(dir.path().to_path_buf()), &settings, &shutdown),
        Err(DedupError::Config(_))
    ));
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_cycle_terminates() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    write(&root, "real/a.txt", "same");
    write(&root, "real/b.txt", "same");
    std::os::unix::fs::symlink(&root, root.join("real/cycle")).unwrap();

    let shutdown = AtomicBool::new(false);
    let report = run(&FixedRoot(root.clone()), &settings(), &shutdown).unwrap();
    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.relocated.len(), 1);
}

#[test]
fn test_json_report_lists_relocations() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    write(&root, "a.txt", "same");
    write(&root, "b.txt", "same");

    let shutdown = AtomicBool::new(false);
    let report = run(&FixedRoot(root.clone()), &settings(), &shutdown).unwrap();
    let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(value["files_scanned"], 2);
    assert_eq!(value["relocated"].as_array().unwrap().len(), 1);
    assert_eq!(
        value["groups"][0]["keeper"],
        &*root.join("a.txt").to_string_lossy()
    );
}

#[test]
fn test_hard_linked_duplicates_leave_their_paths_with_overwrite() {
    let dir = tempdir().unwrap();
    let root = resolve_root(dir.path()).unwrap();
    let keep = write(&root, "a/keep.txt", "same");
    let x = write(&root, "x/f.txt", "same");
    let y = root.join("y/f.txt");
    fs::create_dir_all(y.parent().unwrap()).unwrap();
    fs::hard_link(&x, &y).unwrap();

    let settings = Settings {
        on_collision: CollisionPolicy::Overwrite,
        ..settings()
    };
    let shutdown = AtomicBool::new(false);
    let report = run(&FixedRoot(root.clone()), &settings, &shutdown).unwrap();

    assert_eq!(report.relocated.len(), 2);
    assert!(report.relocation_failures.is_empty());
    assert!(keep.exists());
    assert!(!x.exists(), "duplicate left behind: {}", x.display());
    assert!(!y.exists(), "duplicate left behind: {}", y.display());
    assert_eq!(quarantine_names(&root), vec!["f.txt"]);
}
