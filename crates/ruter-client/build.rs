use std::fs;
use std::path::Path;

const VERSION_ENV: &str = "RUTER_CLIENT_VERSION";

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("cargo sets CARGO_MANIFEST_DIR");
    let Some(workspace_root) = Path::new(&manifest_dir).ancestors().nth(2) else {
        panic!("ruter-client must live at <workspace>/crates/ruter-client");
    };
    let version_file = workspace_root.join("VERSION");
    println!("cargo:rerun-if-changed={}", version_file.display());

    // Published crates ship without the workspace VERSION file.
    let version = match fs::read_to_string(&version_file) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        _ => std::env::var("CARGO_PKG_VERSION").expect("cargo sets CARGO_PKG_VERSION"),
    };

    println!("cargo:rustc-env={VERSION_ENV}={version}");
}
