use std::fs;
use std::path::Path;

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("manifest dir");
    let workspace_root = Path::new(&manifest_dir)
        .ancestors()
        .nth(2)
        .expect("crate sits two levels below the workspace root");
    let version_path = workspace_root.join("VERSION");
    println!("cargo:rerun-if-changed={}", version_path.display());

    let version = fs::read_to_string(&version_path)
        .expect("read VERSION file")
        .trim()
        .to_string();
    assert!(
        !version.is_empty() && version.split('.').all(|part| !part.is_empty()),
        "VERSION must hold a dotted version, got {version:?}"
    );

    println!("cargo:rustc-env=RPA_CONSOLE_VERSION={version}");
}
