//! Throwaway git repositories for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

pub fn git(repo: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// `git init -b main` with a local identity and one commit.
pub fn init_repo(dir: &Path) {
    git(dir, &["init", "-q", "-b", "main"]);
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["config", "tag.gpgsign", "false"]);
    commit_file(dir, "README", "init\n", "initial commit");
}

/// Write `name`, commit it with `message`, return the new HEAD hash.
pub fn commit_file(dir: &Path, name: &str, content: &str, message: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

/// One commit per version, each tagged `release-<version>`.
pub fn tagged_repo(dir: &Path, versions: &[&str]) {
    init_repo(dir);
    for (i, version) in versions.iter().enumerate() {
        commit_file(
            dir,
            "src/Main.java",
            &format!("class Main {{ int v = {i}; }}\n"),
            &format!("prepare {version}"),
        );
        git(dir, &["tag", &format!("release-{version}")]);
    }
}

pub fn current_branch(repo: &Path) -> String {
    git(repo, &["rev-parse", "--abbrev-ref", "HEAD"])
}
