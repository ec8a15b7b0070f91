use std::env;
use std::process::Command;

/// Release builds report the crate version. Nightly builds (TURBOVAC_NIGHTLY=1)
/// append the commit so field logs name the exact controller build.
fn main() {
    let version = match (nightly_requested(), commit_id()) {
        (false, _) => env!("CARGO_PKG_VERSION").to_string(),
        (true, None) => format!("{}-nightly", env!("CARGO_PKG_VERSION")),
        (true, Some(commit)) => format!("{}-nightly+{}", env!("CARGO_PKG_VERSION"), commit),
    };
    println!("cargo:rustc-env=APP_VERSION={}", version);

    for var in ["TURBOVAC_NIGHTLY", "GIT_SHA"] {
        println!("cargo:rerun-if-env-changed={}", var);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
}

fn nightly_requested() -> bool {
    env::var("TURBOVAC_NIGHTLY")
        .is_ok_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Short commit id, preferring an explicit GIT_SHA for builds outside a checkout
fn commit_id() -> Option<String> {
    let explicit = env::var("GIT_SHA").ok().filter(|s| !s.trim().is_empty());
    explicit.or_else(|| {
        let output = Command::new("git")
            .args(["rev-parse", "--short=8", "HEAD"])
            .output()
            .ok()
            .filter(|o| o.status.success())?;
        let sha = String::from_utf8(output.stdout).ok()?.trim().to_string();
        (!sha.is_empty()).then_some(sha)
    })
}
