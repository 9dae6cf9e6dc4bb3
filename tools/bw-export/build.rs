// Build script for bw-export
//
// This links the C++ standard library required by intel_tex_2's ISPC kernels.

fn main() {
    #[cfg(target_os = "linux")]
    println!("cargo:rustc-link-lib=stdc++");

    #[cfg(target_os = "macos")]
    println!("cargo:rustc-link-lib=c++");
}
