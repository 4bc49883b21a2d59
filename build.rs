use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
    println!("cargo:rerun-if-env-changed=VCPKG_ROOT");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows")
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!(
            "cargo:warning=framepack links FFmpeg; on Windows set FFMPEG_DIR (or VCPKG_ROOT with an ffmpeg[vpx] install) before building."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install = PathBuf::from(vcpkg_root).join("installed").join(triplet);
    if install.exists() {
        println!(
            "cargo:warning=Found vcpkg FFmpeg at {}; set FFMPEG_DIR to it to make discovery explicit.",
            install.display()
        );
    } else {
        println!(
            "cargo:warning=VCPKG_ROOT is set but {} does not exist.",
            install.display()
        );
    }
}
