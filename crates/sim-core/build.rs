//! Links against the external golden-model library (§11). The model is
//! never vendored or built by this crate — it's an external artifact the
//! caller points us at, matching the source's treatment of the reference
//! model as an out-of-tree collaborator.

fn main() {
    println!("cargo:rerun-if-env-changed=RV64EMU_LIB_DIR");
    if let Ok(dir) = std::env::var("RV64EMU_LIB_DIR") {
        println!("cargo:rustc-link-search=native={dir}");
        println!("cargo:rustc-link-lib=dylib=rv64emu");
    }
}
