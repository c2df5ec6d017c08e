// Build script for the echo native library
//
// Oboe is a C++ library; the oboe-sys build compiles it, but the final
// cdylib still has to pull in the shared C++ runtime shipped with the APK.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Ensure Android builds link against libc++_shared so symbols like
    // __cxa_pure_virtual resolve correctly on all ABIs (arm/x86).
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("android") {
        println!("cargo:rustc-link-lib=c++_shared");
    }
}
