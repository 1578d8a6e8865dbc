#![allow(dead_code, deprecated)]

use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

pub fn taggable_cmd() -> Command {
    let mut cmd = Command::cargo_bin("taggable").unwrap();
    cmd.env_remove("TAGGABLE_ROOT");
    cmd.env_remove("TAGGABLE_LOG");
    cmd
}

/// A fresh workspace with the given name policy
pub fn workspace(policy: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    taggable_cmd()
        .arg("init")
        .arg(temp.path())
        .arg("--policy")
        .arg(policy)
        .assert()
        .success();
    temp
}

/// Replace the tag list of `Type id` in `context`
pub fn set_tags(root: &Path, taggable_type: &str, id: i64, tags: &str, context: &str) {
    taggable_cmd()
        .current_dir(root)
        .args(["set", taggable_type, &id.to_string(), tags, "--on", context])
        .assert()
        .success();
}
