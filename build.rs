/// Expose the compilation target triple as an environment variable at build time.
///
/// `relmine version` prints it alongside the package version.
fn main() {
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=TARGET={target}");
}
