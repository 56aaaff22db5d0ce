//! End-to-end runner tests against shell stand-ins for the external tools.

#![cfg(unix)]

mod common;

use common::{
    ARCH, RESNET_VECTOR, fake_mlir_paths, fake_runner_config, write_fake_miopen_driver,
    write_script,
};
use perf_runner::benchmarks::report_table::MLIR_THROUGHPUT_COLUMN;
use perf_runner::benchmarks::{MIOPEN_TUNED_REPORT_FILE, report_file_name};
use perf_runner::configuration::{BenchmarkDescriptor, Operation};
use perf_runner::errors::{PerfRunnerError, PipelineError};
use perf_runner::{BenchmarkRunner, ConfigLoader, RunnerConfig, ToolPaths};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const GEMM_VECTOR: &str = "-t f32 -transA false -transB false -g 1 -m 256 -k 256 -n 256";

fn conv_runner(dir: &TempDir) -> BenchmarkRunner {
    let tools = ToolPaths {
        mlir: Some(fake_mlir_paths(dir.path())),
        miopen_driver_path: Some(write_fake_miopen_driver(dir.path())),
    };
    BenchmarkRunner::new(ARCH, tools, fake_runner_config(dir.path()))
}

#[cfg(test)]
mod benchmark_runner_tests {
    use super::*;

    #[test]
    fn test_conv_comparison_report() {
        let dir = TempDir::new().unwrap();
        let runner = conv_runner(&dir);

        let table = runner
            .generate_performance_results(Operation::Conv, &[RESNET_VECTOR])
            .unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.columns().len(), 19 + 3);
        let descriptor =
            BenchmarkDescriptor::parse_test_vector(Operation::Conv, RESNET_VECTOR, ARCH).unwrap();
        let mlir = table.float_column(MLIR_THROUGHPUT_COLUMN)[0];
        let miopen = table.float_column("MIOpen TFlops (no MLIR Kernels)")[0];
        let ratio = table.float_column("MLIR/MIOpen")[0];

        assert_eq!(mlir, descriptor.compute_tflops(150.0));
        assert_eq!(miopen, descriptor.compute_tflops(250_000.0));
        assert!((ratio - 250_000.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_gemm_comparison_report() {
        let dir = TempDir::new().unwrap();
        let mut paths = fake_mlir_paths(dir.path());
        paths.rocblas_benchmark_driver_path =
            Some(write_script(dir.path(), "rocblas-benchmark-driver", "true"));
        let tools = ToolPaths {
            mlir: Some(paths),
            miopen_driver_path: None,
        };
        let runner = BenchmarkRunner::new(ARCH, tools, fake_runner_config(dir.path()));

        let table = runner
            .generate_performance_results(Operation::Gemm, &[GEMM_VECTOR])
            .unwrap();

        assert_eq!(table.len(), 1);
        assert!((table.float_column("MLIR/rocBLAS")[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_batch_mlir_only() {
        let dir = TempDir::new().unwrap();
        let runner = conv_runner(&dir);
        let nhwc = RESNET_VECTOR.replace("NCHW", "NHWC");

        let table = runner
            .batch_mlir(Operation::Conv, &[RESNET_VECTOR, nhwc.as_str()])
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.columns().last().map(String::as_str), Some("TFlops"));
        assert_eq!(
            table.value(1, "InputLayout").map(|v| v.to_string()),
            Some("nhwc".to_string())
        );
    }

    #[test]
    fn test_malformed_configuration_aborts_before_running() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("invocations.log");
        let mut paths = fake_mlir_paths(dir.path());
        paths.rocmlir_gen_path = write_script(
            dir.path(),
            "logging-gen",
            &format!("echo run >> '{}'", log.display()),
        );
        let tools = ToolPaths {
            mlir: Some(paths),
            miopen_driver_path: None,
        };
        let runner = BenchmarkRunner::new(ARCH, tools, fake_runner_config(dir.path()));
        let broken = RESNET_VECTOR.replace("-F 1", "-F 3");

        let result = runner.batch_mlir(Operation::Conv, &[RESNET_VECTOR, broken.as_str()]);

        assert!(matches!(result, Err(PerfRunnerError::Configuration(_))));
        assert!(!log.exists());
    }

    #[test]
    fn test_missing_tools_are_reported() {
        let runner = BenchmarkRunner::new(ARCH, ToolPaths::default(), RunnerConfig::default());

        let result = runner.batch_mlir(Operation::Conv, &[RESNET_VECTOR]);
        assert!(matches!(
            result,
            Err(PerfRunnerError::Pipeline(PipelineError::ExternalToolMissing { .. }))
        ));

        let result = runner.batch_external(Operation::Gemm, &[GEMM_VECTOR]);
        assert!(matches!(
            result,
            Err(PerfRunnerError::Pipeline(PipelineError::ExternalToolMissing { .. }))
        ));
    }

    #[test]
    fn test_nonexistent_mlir_build_dir_is_reported() {
        let tools = ToolPaths::from_build_dirs(Some(Path::new("/nonexistent/build")), None);
        let runner = BenchmarkRunner::new(ARCH, tools, RunnerConfig::default());

        let result = runner.batch_mlir(Operation::Conv, &[RESNET_VECTOR]);
        assert!(matches!(
            result,
            Err(PerfRunnerError::Pipeline(PipelineError::ExternalToolMissing { ref tool }))
                if tool.starts_with("/nonexistent/build")
        ));
    }

    #[test]
    fn test_missing_profiler_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut config = fake_runner_config(dir.path());
        config.rocprof_path = dir.path().join("no-such-rocprof");
        let tools = ToolPaths {
            mlir: Some(fake_mlir_paths(dir.path())),
            miopen_driver_path: None,
        };
        let runner = BenchmarkRunner::new(ARCH, tools, config);

        let result = runner.batch_mlir(Operation::Conv, &[RESNET_VECTOR]);
        assert!(matches!(
            result,
            Err(PerfRunnerError::Pipeline(PipelineError::ExternalToolMissing { ref tool }))
                if tool.ends_with("no-such-rocprof")
        ));
    }

    #[test]
    fn test_miopen_with_mlir_kernels() {
        let dir = TempDir::new().unwrap();
        let driver = write_script(
            dir.path(),
            "MIOpenDriver",
            "if [ \"$MIOPEN_DEBUG_FIND_ONLY_SOLVER\" = ConvMlirIgemmFwdXdlops ]; then echo 'Elapsed: 2 ms'; fi",
        );
        let tools = ToolPaths {
            mlir: None,
            miopen_driver_path: Some(driver),
        };
        let runner = BenchmarkRunner::new(ARCH, tools, fake_runner_config(dir.path()));

        let table = runner.benchmark_miopen_with_mlir_kernels(&[RESNET_VECTOR]).unwrap();

        let descriptor =
            BenchmarkDescriptor::parse_test_vector(Operation::Conv, RESNET_VECTOR, ARCH).unwrap();
        assert_eq!(
            table.float_column("TFlops"),
            vec![descriptor.compute_tflops(2_000_000.0)]
        );
    }

    #[test]
    fn test_tuning_skips_non_nchw() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("tuning.log");
        let driver = write_script(
            dir.path(),
            "MIOpenDriver",
            &format!(
                "echo \"$MIOPEN_FIND_ENFORCE $MIOPEN_DEBUG_FIND_ONLY_SOLVER $*\" >> '{}'",
                log.display()
            ),
        );
        let tools = ToolPaths {
            mlir: None,
            miopen_driver_path: Some(driver),
        };
        let runner = BenchmarkRunner::new(ARCH, tools, fake_runner_config(dir.path()));
        let nhwc = RESNET_VECTOR.replace("NCHW", "NHWC");

        runner
            .tune_mlir_kernels(&[RESNET_VECTOR, nhwc.as_str()])
            .unwrap();

        let content = fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            format!("4 ConvMlirIgemmFwdXdlops {RESNET_VECTOR} -V 0")
        );
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name("gfx90a", Operation::Conv.report_file()),
            "gfx90a_mlir_vs_miopen_perf.csv"
        );
        assert_eq!(
            report_file_name("gfx908", MIOPEN_TUNED_REPORT_FILE),
            "gfx908_miopen_tuned_perf.csv"
        );
    }
}

#[cfg(test)]
mod config_loader_tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ConfigLoader::load(Path::new("/nonexistent/perf_runner.json")).unwrap();

        assert_eq!(config, RunnerConfig::default());
        assert_eq!(config.mlir_timeout(), Duration::from_secs(60));
        assert_eq!(config.reference_conv_timeout(), Duration::from_secs(300));
        assert_eq!(config.rocprof_path, Path::new("/opt/rocm/bin/rocprof"));
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("perf_runner.json");
        fs::write(
            &path,
            r#"{ "mlir_timeout_secs": 5, "miopen_build_dir": "/opt/miopen/build" }"#,
        )
        .unwrap();

        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.mlir_timeout_secs, 5);
        assert_eq!(config.reference_gemm_timeout_secs, 60);
        assert_eq!(
            config.miopen_build_dir.as_deref(),
            Some(Path::new("/opt/miopen/build"))
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("perf_runner.json");
        fs::write(&path, "{ mlir_timeout_secs = 5 }").unwrap();

        let result = ConfigLoader::load(&path);
        assert!(matches!(result, Err(PerfRunnerError::ConfigLoad { .. })));
    }

    #[test]
    fn test_tool_paths_from_build_dirs() {
        let dir = TempDir::new().unwrap();
        let miopen_build = dir.path().join("miopen");
        fs::create_dir_all(miopen_build.join("bin")).unwrap();

        let tools = ToolPaths::from_build_dirs(Some(dir.path()), Some(miopen_build.as_path()));
        assert!(tools.miopen_driver().is_err());
        assert!(tools.rocblas_driver().is_err());
        assert!(matches!(
            tools.mlir(),
            Err(PipelineError::ExternalToolMissing { ref tool }) if tool.ends_with("rocmlir-gen")
        ));

        let bin = dir.path().join("bin");
        let llvm_bin = dir.path().join("external/llvm-project/llvm/bin");
        fs::create_dir_all(&bin).unwrap();
        fs::create_dir_all(&llvm_bin).unwrap();
        write_script(&bin, "rocmlir-gen", "true");
        write_script(&bin, "rocmlir-driver", "true");
        assert!(matches!(
            tools.mlir(),
            Err(PipelineError::ExternalToolMissing { ref tool }) if tool.ends_with("mlir-cpu-runner")
        ));
        write_script(&llvm_bin, "mlir-cpu-runner", "true");
        let mlir = tools.mlir().unwrap();
        assert_eq!(mlir.rocmlir_gen_path, dir.path().join("bin/rocmlir-gen"));
        assert!(
            mlir.shared_libs_argument()
                .starts_with("--shared-libs=")
        );

        write_script(&miopen_build.join("bin"), "MIOpenDriver", "true");
        let tools = ToolPaths::from_build_dirs(None, Some(miopen_build.as_path()));
        assert_eq!(
            tools.miopen_driver().unwrap(),
            miopen_build.join("bin/MIOpenDriver")
        );
        assert!(tools.require_external(Operation::Conv).is_ok());
        assert!(tools.require_external(Operation::Gemm).is_err());
    }
}
