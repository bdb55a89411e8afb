//! Build script for symsync-core
//!
//! Checks the minimum Rust version before compilation. The crate relies on
//! generic associated types, `let`-`else` and `Result::inspect_err`.

fn main()
{
    // Result::inspect_err is the newest API in use
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 76, 0);

        if rustc_version < min_rust_version {
            panic!("symsync-core requires Rust {min_rust_version} or newer, found {rustc_version}");
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }
}
