//! System Preparation
//!
//! Pins clocks and compute modes for known benchmark machines and collects
//! the compiler version and per-device properties recorded with each result.
//! Every step is best effort: a failing SMI call is logged and skipped.

use crate::runner::{Invocation, ToolRunner};
use gemmbench_core::{DeviceMask, TargetRuntime};

/// Benchmark machine family, derived from the `--target` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// AMD Instinct MI100 (ROCm)
    Mi100,
    /// NVIDIA RTX A6000 (CUDA)
    RtxA6000,
    /// Anything else: no preparation
    Generic,
}

impl Target {
    pub fn from_name(name: &str) -> Self {
        match name {
            "AMD MI100" => Target::Mi100,
            "NVidia RTX A6000" => Target::RtxA6000,
            _ => Target::Generic,
        }
    }

    pub fn runtime(self) -> Option<TargetRuntime> {
        match self {
            Target::Mi100 => Some(TargetRuntime::Rocm),
            Target::RtxA6000 => Some(TargetRuntime::Cuda),
            Target::Generic => None,
        }
    }
}

/// Environment captured once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemProfile {
    pub compiler_version: String,
    pub device_properties: Vec<String>,
    pub runtime: Option<TargetRuntime>,
}

impl SystemProfile {
    /// Properties of a device slot, empty when unknown.
    pub fn device_properties(&self, gpu_id: usize) -> &str {
        self.device_properties
            .get(gpu_id)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Put the machine into a reproducible state and describe it.
pub fn prepare_system(runner: &dyn ToolRunner, target: Target, devices: &DeviceMask) -> SystemProfile {
    let mut profile = SystemProfile {
        runtime: target.runtime(),
        ..Default::default()
    };

    match target {
        Target::Mi100 => {
            // fix shader clock speeds
            capture(runner, "rocm-smi", &["--setsclk", "15"]);
            capture(runner, "rocm-smi", &["-g"]);

            profile.compiler_version = capture(runner, "hipcc", &["--version"]);

            for id in 0..devices.len() {
                let id = id.to_string();
                profile
                    .device_properties
                    .push(capture(runner, "rocm-smi", &["-a", "-d", &id, "--json"]));
            }
        }
        Target::RtxA6000 => {
            capture(runner, "nvidia-smi", &["--persistence-mode=1"]);
            // exclusive process mode, one process per GPU
            capture(runner, "nvidia-smi", &["--compute-mode=3"]);
            capture(runner, "nvidia-smi", &["--applications-clocks=8001,2100"]);

            profile.compiler_version = capture(runner, "nvcc", &["--version"]);

            for id in 0..devices.len() {
                let id = id.to_string();
                profile
                    .device_properties
                    .push(capture(runner, "nvidia-smi", &["-q", "-i", &id]));
            }
        }
        Target::Generic => {
            tracing::info!("no system preparation for this target");
        }
    }

    profile
}

/// Run a preparation command and return its stdout, or empty on failure.
fn capture(runner: &dyn ToolRunner, program: &str, args: &[&str]) -> String {
    let invocation = Invocation::new(program).args(args.iter().copied());
    match runner.run(&invocation) {
        Ok(output) if output.success() => {
            tracing::debug!(command = %invocation, "{}", output.stdout.trim_end());
            output.stdout
        }
        // Some SMI tools report errors on stdout, which must not be recorded.
        Ok(output) => {
            tracing::warn!(
                command = %invocation,
                stdout = %output.stdout.trim(),
                stderr = %output.stderr.trim(),
                "preparation step failed"
            );
            String::new()
        }
        Err(e) => {
            tracing::warn!(command = %invocation, "preparation step skipped: {}", e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{RunError, ToolOutput};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl ToolRunner for Recorder {
        fn run(&self, inv: &Invocation) -> Result<ToolOutput, RunError> {
            self.calls.lock().unwrap().push(inv.to_string());
            match inv.program_name().as_str() {
                "hipcc" => Ok(ToolOutput::ok("HIP version: 5.4\n")),
                "rocm-smi" if inv.args.first().map(String::as_str) == Some("-a") => {
                    Ok(ToolOutput::ok(format!("{{\"card{}\":{{}}}}", inv.args[2])))
                }
                "rocm-smi" => Ok(ToolOutput {
                    code: Some(1),
                    stdout: String::new(),
                    stderr: "permission denied".to_string(),
                }),
                _ => Err(RunError::Spawn {
                    program: inv.program.display().to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            }
        }
    }

    #[test]
    fn target_names() {
        assert_eq!(Target::from_name("AMD MI100"), Target::Mi100);
        assert_eq!(Target::from_name("NVidia RTX A6000"), Target::RtxA6000);
        assert_eq!(Target::from_name("Intel Xeon"), Target::Generic);
        assert_eq!(Target::Mi100.runtime(), Some(TargetRuntime::Rocm));
    }

    #[test]
    fn mi100_collects_every_slot() {
        let runner = Recorder::default();
        let devices = DeviceMask::parse("2").unwrap();
        let profile = prepare_system(&runner, Target::Mi100, &devices);

        assert_eq!(profile.compiler_version, "HIP version: 5.4\n");
        assert_eq!(profile.device_properties.len(), 3);
        assert_eq!(profile.device_properties(2), "{\"card2\":{}}");
        assert_eq!(profile.device_properties(7), "");

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0], "rocm-smi --setsclk 15");
        assert_eq!(calls[1], "rocm-smi -g");
        assert_eq!(calls[2], "hipcc --version");
    }

    #[test]
    fn missing_tools_are_tolerated() {
        let runner = Recorder::default();
        let devices = DeviceMask::parse("0,1").unwrap();
        let profile = prepare_system(&runner, Target::RtxA6000, &devices);
        assert_eq!(profile.compiler_version, "");
        assert_eq!(profile.device_properties, vec![String::new(), String::new()]);
        assert_eq!(profile.runtime, Some(TargetRuntime::Cuda));
    }

    #[test]
    fn failed_steps_record_nothing() {
        struct Broken;
        impl ToolRunner for Broken {
            fn run(&self, _: &Invocation) -> Result<ToolOutput, RunError> {
                Ok(ToolOutput {
                    code: Some(9),
                    stdout: "NVIDIA-SMI has failed because it couldn't communicate\n".to_string(),
                    stderr: String::new(),
                })
            }
        }
        let devices = DeviceMask::parse("1").unwrap();
        let profile = prepare_system(&Broken, Target::RtxA6000, &devices);
        assert_eq!(profile.compiler_version, "");
        assert_eq!(profile.device_properties, vec![String::new(), String::new()]);
    }

    #[test]
    fn generic_target_runs_nothing() {
        let runner = Recorder::default();
        let devices = DeviceMask::parse("0").unwrap();
        let profile = prepare_system(&runner, Target::Generic, &devices);
        assert!(runner.calls.lock().unwrap().is_empty());
        assert_eq!(profile, SystemProfile::default());
    }
}
