//! Embeds the short git hash as `BUILD_GIT_HASH` for `--version` output.
//! CI can pin the value through the environment; local builds ask git.

fn main() {
    println!("cargo:rerun-if-env-changed=BUILD_GIT_HASH");

    let hash = match std::env::var("BUILD_GIT_HASH") {
        Ok(h) if !h.is_empty() => h,
        _ => git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string()),
    };
    println!("cargo:rustc-env=BUILD_GIT_HASH={hash}");

    // Track the repository head so new commits rebuild the version string.
    if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
        println!("cargo:rerun-if-changed={git_dir}/HEAD");
        println!("cargo:rerun-if-changed={git_dir}/refs");
    }
}

fn git(args: &[&str]) -> Option<String> {
    let out = std::process::Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
