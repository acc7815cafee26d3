use std::env;
use std::process::Command;

use time::{Date, OffsetDateTime};

// Version metadata for `radiod --version`. Packagers without a git checkout
// can pin the revision with RADIOD_REVISION; SOURCE_DATE_EPOCH pins the date.
fn main() {
    for var in ["RADIOD_REVISION", "SOURCE_DATE_EPOCH"] {
        println!("cargo:rerun-if-env-changed={var}");
    }
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/index");

    let revision = env::var("RADIOD_REVISION")
        .ok()
        .filter(|rev| !rev.trim().is_empty())
        .or_else(describe_checkout)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_SHA={}", revision.trim());
    println!("cargo:rustc-env=BUILD_DATE={}", build_day());
}

/// `git describe` of the checkout, marked `-dirty` when the tree has edits.
fn describe_checkout() -> Option<String> {
    let out = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=10"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let described = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if described.is_empty() { None } else { Some(described) }
}

fn build_day() -> Date {
    let pinned = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok());
    pinned.unwrap_or_else(OffsetDateTime::now_utc).date()
}
