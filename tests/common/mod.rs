//! Fake external tools for pipeline and runner tests.

#![allow(dead_code)]

use perf_runner::{MlirPaths, RunnerConfig};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const ARCH: &str = "amdgcn-amd-amdhsa:gfx90a:sramecc+:xnack-";

pub const RESNET_VECTOR: &str = "conv -F 1 -f NCHW -I NCHW -O NCHW -n 256 -c 1024 -H 14 -W 14 -k 2048 -y 1 -x 1 -p 0 -q 0 -u 2 -v 2 -l 1 -j 1 -g 1";

/// Writes an executable shell script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A profiler that swallows its stdin and writes a statistics file whose
/// `AverageNs` column sums to 150.
pub fn write_fake_rocprof(dir: &Path, stats_file: &Path) -> PathBuf {
    let body = format!(
        "cat > /dev/null\nprintf 'Name,Calls,TotalDurationNs,AverageNs,Percentage\\n\"kernel_a\",5,500,100,66.6\\n\"kernel_b\",5,250,50,33.3\\n' > '{}'",
        stats_file.display()
    );
    write_script(dir, "rocprof", &body)
}

/// Generator, lowering driver and CPU runner stand-ins for the generated-kernel path.
pub fn fake_mlir_paths(dir: &Path) -> MlirPaths {
    MlirPaths {
        rocmlir_gen_path: write_script(dir, "rocmlir-gen", "echo \"module { $* }\""),
        rocmlir_driver_path: write_script(dir, "rocmlir-driver", "cat"),
        cpu_runner_path: write_script(dir, "mlir-cpu-runner", "true"),
        libmlir_rocm_runtime_path: dir.join("libmlir_rocm_runtime.so"),
        libconv_validation_wrappers_path: dir.join("libconv-validation-wrappers.so"),
        libmlir_runtime_utils_path: dir.join("libmlir_runner_utils.so"),
        rocblas_benchmark_driver_path: None,
    }
}

/// A runner configuration pointing at a fake profiler inside `dir`.
pub fn fake_runner_config(dir: &Path) -> RunnerConfig {
    let stats_file = dir.join("results.stats.csv");
    RunnerConfig {
        rocprof_path: write_fake_rocprof(dir, &stats_file),
        stats_file,
        mlir_timeout_secs: 10,
        reference_conv_timeout_secs: 10,
        reference_gemm_timeout_secs: 10,
        mlir_build_dir: None,
        miopen_build_dir: None,
    }
}

/// A convolution reference driver printing a fixed elapsed time of 0.25 ms.
pub fn write_fake_miopen_driver(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "MIOpenDriver",
        "echo 'MIOpen Forward Conv. Algorithm: 1'\necho 'GPU Kernel Time Forward Conv. Elapsed: 0.250000 ms (average)'",
    )
}
