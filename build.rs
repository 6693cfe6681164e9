fn main() {
    // Declared here because `tauri_build` is skipped without the `app` feature.
    println!("cargo:rustc-check-cfg=cfg(desktop)");
    println!("cargo:rustc-check-cfg=cfg(mobile)");

    // `--no-default-features` builds the task, reminder and storage logic without Tauri,
    // and `tauri_build` needs the env vars the `tauri` crate exports.
    if std::env::var_os("CARGO_FEATURE_APP").is_some() {
        tauri_build::build()
    }
}
