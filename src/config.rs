//! Runner configuration and external tool locations.

use crate::configuration::Operation;
use crate::errors::{PerfRunnerError, PerfRunnerResult, PipelineError, PipelineResult};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings that shape how pipelines run. Every field has a default, so a
/// configuration file only needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Profiler wrapper used for every profiled pipeline.
    pub rocprof_path: PathBuf,
    /// Statistics file the profiler writes into its working directory.
    pub stats_file: PathBuf,
    pub mlir_timeout_secs: u64,
    /// Reference convolution runs may include an autotuning search.
    pub reference_conv_timeout_secs: u64,
    pub reference_gemm_timeout_secs: u64,
    pub mlir_build_dir: Option<PathBuf>,
    pub miopen_build_dir: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            rocprof_path: PathBuf::from("/opt/rocm/bin/rocprof"),
            stats_file: PathBuf::from("results.stats.csv"),
            mlir_timeout_secs: 60,
            reference_conv_timeout_secs: 300,
            reference_gemm_timeout_secs: 60,
            mlir_build_dir: None,
            miopen_build_dir: None,
        }
    }
}

impl RunnerConfig {
    /// The profiler wrapper, which must exist for every profiled pipeline.
    pub fn profiler(&self) -> PipelineResult<&Path> {
        require_file(&self.rocprof_path)
    }

    pub fn mlir_timeout(&self) -> Duration {
        Duration::from_secs(self.mlir_timeout_secs)
    }

    pub fn reference_conv_timeout(&self) -> Duration {
        Duration::from_secs(self.reference_conv_timeout_secs)
    }

    pub fn reference_gemm_timeout(&self) -> Duration {
        Duration::from_secs(self.reference_gemm_timeout_secs)
    }
}

/// Configuration loader that handles JSON files with fallbacks.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads a runner configuration, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> PerfRunnerResult<RunnerConfig> {
        match fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| PerfRunnerError::ConfigLoad {
                    path: path.display().to_string(),
                    source: e,
                })
            }
            Err(_) => {
                warn!(
                    "Config file '{}' not found, using default runner configuration",
                    path.display()
                );
                Ok(RunnerConfig::default())
            }
        }
    }
}

/// Locations of the kernel generator toolchain inside its build directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MlirPaths {
    pub rocmlir_gen_path: PathBuf,
    pub rocmlir_driver_path: PathBuf,
    pub cpu_runner_path: PathBuf,
    pub libmlir_rocm_runtime_path: PathBuf,
    pub libconv_validation_wrappers_path: PathBuf,
    pub libmlir_runtime_utils_path: PathBuf,
    pub rocblas_benchmark_driver_path: Option<PathBuf>,
}

impl MlirPaths {
    pub fn from_build_dir(build_dir: &Path) -> Self {
        let bin_dir = build_dir.join("bin");
        let lib_dir = build_dir.join("lib");
        let llvm_bin_dir = build_dir.join("external/llvm-project/llvm/bin");
        let llvm_lib_dir = build_dir.join("external/llvm-project/llvm/lib");
        let rocblas_driver = bin_dir.join("rocblas-benchmark-driver");

        Self {
            rocmlir_gen_path: bin_dir.join("rocmlir-gen"),
            rocmlir_driver_path: bin_dir.join("rocmlir-driver"),
            cpu_runner_path: llvm_bin_dir.join("mlir-cpu-runner"),
            libmlir_rocm_runtime_path: llvm_lib_dir.join("libmlir_rocm_runtime.so"),
            libconv_validation_wrappers_path: lib_dir.join("libconv-validation-wrappers.so"),
            libmlir_runtime_utils_path: llvm_lib_dir.join("libmlir_runner_utils.so"),
            rocblas_benchmark_driver_path: rocblas_driver.exists().then_some(rocblas_driver),
        }
    }

    /// The `--shared-libs=` argument handed to the CPU runner.
    pub fn shared_libs_argument(&self) -> String {
        format!(
            "--shared-libs={},{},{}",
            self.libmlir_rocm_runtime_path.display(),
            self.libconv_validation_wrappers_path.display(),
            self.libmlir_runtime_utils_path.display()
        )
    }
}

fn require_file(path: &Path) -> PipelineResult<&Path> {
    if path.exists() {
        Ok(path)
    } else {
        Err(PipelineError::ExternalToolMissing {
            tool: path.display().to_string(),
        })
    }
}

/// Every external tool a run may need. Absent tools are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
    pub mlir: Option<MlirPaths>,
    pub miopen_driver_path: Option<PathBuf>,
}

impl ToolPaths {
    pub fn from_build_dirs(mlir_build_dir: Option<&Path>, miopen_build_dir: Option<&Path>) -> Self {
        let miopen_driver_path = miopen_build_dir
            .map(|dir| dir.join("bin").join("MIOpenDriver"))
            .filter(|path| path.exists());

        Self {
            mlir: mlir_build_dir.map(MlirPaths::from_build_dir),
            miopen_driver_path,
        }
    }

    /// The generator toolchain, once its executables are confirmed present.
    pub fn mlir(&self) -> PipelineResult<&MlirPaths> {
        let mlir = self.mlir.as_ref().ok_or_else(|| PipelineError::ExternalToolMissing {
            tool: "MLIR build dir".to_string(),
        })?;
        for tool in [
            &mlir.rocmlir_gen_path,
            &mlir.rocmlir_driver_path,
            &mlir.cpu_runner_path,
        ] {
            require_file(tool)?;
        }
        Ok(mlir)
    }

    pub fn miopen_driver(&self) -> PipelineResult<&Path> {
        self.miopen_driver_path
            .as_deref()
            .ok_or_else(|| PipelineError::ExternalToolMissing {
                tool: "MIOpenDriver".to_string(),
            })
    }

    pub fn rocblas_driver(&self) -> PipelineResult<&Path> {
        self.mlir
            .as_ref()
            .and_then(|mlir| mlir.rocblas_benchmark_driver_path.as_deref())
            .ok_or_else(|| PipelineError::ExternalToolMissing {
                tool: "rocblas-benchmark-driver".to_string(),
            })
    }

    /// Checks that the reference tool of `operation` is available.
    pub fn require_external(&self, operation: Operation) -> PipelineResult<()> {
        match operation {
            Operation::Conv => self.miopen_driver().map(|_| ()),
            Operation::Gemm => self.rocblas_driver().map(|_| ()),
        }
    }
}
