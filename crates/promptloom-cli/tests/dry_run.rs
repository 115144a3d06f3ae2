use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

/// `loom --dry-run` prints the composed request and leaves no cache state
/// behind. HOME is pointed at the temp dir so no real config file leaks in;
/// the env-only configuration path carries the run.
#[test]
fn dry_run_prints_sections_and_stays_pure() {
    let temp = tempfile::tempdir().unwrap();
    let specs = temp.path().join("specs");
    fs::create_dir_all(&specs).unwrap();
    fs::write(specs.join("root.xml"), "<system>system text</system>").unwrap();
    fs::write(specs.join("task.xml"), "<prompt>build the thing</prompt>").unwrap();

    let mut cmd = Command::cargo_bin("loom").unwrap();
    cmd.current_dir(temp.path())
        .env("HOME", temp.path())
        .env("USERPROFILE", temp.path())
        .env("LOOM_API_KEY", "test-key")
        .arg("--dry-run");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("=== SYSTEM ==="))
        .stdout(predicate::str::contains("system text"))
        .stdout(predicate::str::contains("=== PROMPT ==="))
        .stdout(predicate::str::contains("build the thing"));

    // Dry runs never mutate the ledger or manifest.
    assert!(!temp.path().join(".loom/ledger.txt").exists());
    assert!(!temp.path().join(".loom/last-output.json").exists());
}

#[test]
fn dry_run_inline_prompt_skips_specs_tree() {
    let temp = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("loom").unwrap();
    cmd.current_dir(temp.path())
        .env("HOME", temp.path())
        .env("USERPROFILE", temp.path())
        .env("LOOM_API_KEY", "test-key")
        .args(["--dry-run", "--prompt", "one-shot question"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("one-shot question"));
}

#[test]
fn missing_config_is_reported() {
    let temp = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("loom").unwrap();
    cmd.current_dir(temp.path())
        .env("HOME", temp.path())
        .env("USERPROFILE", temp.path())
        .env_remove("LOOM_API_KEY")
        .arg("--dry-run");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("loom init"));
}
