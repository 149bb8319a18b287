//! Build script for the parkdesk CLI
//!
//! Stamps `--version` with the commit, build time and build host.

use std::env;
use std::process::Command;

fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    let commit = env::var("GIT_COMMIT_HASH")
        .ok()
        .or_else(git_short_hash)
        .unwrap_or_else(|| "unknown".to_string());

    for (key, value) in [
        ("BUILT_GIT_COMMIT_HASH", commit),
        (
            "BUILT_HOST",
            env::var("HOST").unwrap_or_else(|_| "unknown".to_string()),
        ),
        ("BUILT_TIME_UTC", chrono::Utc::now().to_rfc3339()),
    ] {
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rerun-if-env-changed=GIT_COMMIT_HASH");
}

/// Short hash of HEAD when building from a git checkout
fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string()).filter(|h| !h.is_empty())
}
