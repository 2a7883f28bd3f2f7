//! Links against the external Verilator-generated DUT library. Like the
//! golden-model link in `sim-core`, this is never vendored: point
//! `DUT_LIB_DIR` at wherever the hardware team's build produced it.

fn main() {
    println!("cargo:rerun-if-env-changed=DUT_LIB_DIR");
    if let Ok(dir) = std::env::var("DUT_LIB_DIR") {
        println!("cargo:rustc-link-search=native={dir}");
        println!("cargo:rustc-link-lib=dylib=dut");
    }
}
