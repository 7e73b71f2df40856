// Build script for GLSL -> SPIR-V shader compilation.
//
// Compiles every shader under resources/shaders into target/shaders using
// glslc from the Vulkan SDK. Compilation is skipped (with a warning) when the
// SDK is not installed so that host-side tests still build.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../../resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };

    if !Path::new(&glslc).exists() {
        eprintln!("error: glslc not found at: {}", glslc);
        panic!("shader compiler not found");
    }

    let shader_dir = PathBuf::from("../../resources/shaders");
    let out_dir = PathBuf::from("../../target/shaders");

    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        eprintln!("warning: failed to create shader output directory: {}", e);
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: no shader directory at {:?}", shader_dir);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_shader = path
            .extension()
            .map_or(false, |ext| ext == "vert" || ext == "frag");
        if !is_shader {
            continue;
        }

        // viewport.vert -> viewport.vert.spv, keeping the stage in the name
        let out_file = out_dir.join(format!(
            "{}.spv",
            path.file_name().unwrap().to_string_lossy()
        ));

        let up_to_date = match (std::fs::metadata(&path), std::fs::metadata(&out_file)) {
            (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
                (Ok(s), Ok(d)) => s <= d,
                _ => false,
            },
            _ => false,
        };
        if up_to_date {
            continue;
        }

        let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: compiled {:?}", path.file_name().unwrap());
            }
            Ok(s) => {
                eprintln!(
                    "error: glslc failed for {:?} with exit code {}",
                    path,
                    s.code().unwrap_or(-1)
                );
                panic!("shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: failed to run glslc for {:?}: {}", path, e);
                panic!("failed to execute shader compiler");
            }
        }
    }
}
