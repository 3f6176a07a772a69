//! Run Configuration
//!
//! Validates parsed CLI arguments into a [`RunConfig`] before any work is
//! done, so conflicting options fail immediately.

use crate::backend::Backend;
use crate::Cli;
use gemmbench_core::{DeviceError, DeviceMask};
use gemmbench_report::{validate_collection, ReportFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("{0} and {1} options are mutually exclusive")]
    MutuallyExclusive(&'static str, &'static str),

    #[error("one of --input or --string is required")]
    MissingInput,

    #[error("no baseline tool given and no --harness configured")]
    MissingHarness,

    #[error("invalid --devices: {0}")]
    Devices(#[from] DeviceError),

    #[error("invalid --upload collection '{0}'")]
    Collection(String),

    #[error("invalid --report-format: {0}")]
    ReportFormat(String),
}

/// Where benchmark configurations come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Inline(String),
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: ConfigSource,
    pub devices: DeviceMask,
    pub branch: Option<String>,
    pub target_name: String,
    pub output_prefix: PathBuf,
    pub backend: Backend,
    pub upload: Option<String>,
    pub store_root: PathBuf,
    pub report_format: ReportFormat,
    pub check: bool,
    pub janitor: bool,
    pub dry_run: bool,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ArgsError> {
        let source = match (&cli.input, &cli.string) {
            (Some(_), Some(_)) => return Err(ArgsError::MutuallyExclusive("input", "string")),
            (Some(path), None) => ConfigSource::File(path.clone()),
            (None, Some(rows)) => ConfigSource::Inline(rows.clone()),
            (None, None) => return Err(ArgsError::MissingInput),
        };

        let baselines = [
            ("rocblas", cli.rocblas.as_ref().map(|p| Backend::Rocblas(p.clone()))),
            ("cublas", cli.cublas.as_ref().map(|p| Backend::Cublas(p.clone()))),
            (
                "composable_kernel",
                cli.composable_kernel
                    .as_ref()
                    .map(|p| Backend::ComposableKernel(p.clone())),
            ),
            ("cutlass", cli.cutlass.as_ref().map(|p| Backend::Cutlass(p.clone()))),
        ];
        let mut selected: Option<(&'static str, Backend)> = None;
        for (name, backend) in baselines {
            let Some(backend) = backend else { continue };
            if let Some((first, _)) = &selected {
                return Err(ArgsError::MutuallyExclusive(*first, name));
            }
            selected = Some((name, backend));
        }

        let backend = match selected {
            Some((_, backend)) => backend,
            None => Backend::Harness(cli.harness.clone().ok_or(ArgsError::MissingHarness)?),
        };

        if let Some(upload) = &cli.upload {
            validate_collection(upload).map_err(|_| ArgsError::Collection(upload.clone()))?;
        }

        Ok(Self {
            source,
            devices: DeviceMask::parse(&cli.devices)?,
            branch: cli.branch.clone(),
            target_name: cli.target.clone().unwrap_or_default(),
            output_prefix: cli.output.clone(),
            backend,
            upload: cli.upload.clone(),
            store_root: cli.store.clone(),
            report_format: cli.report_format.parse().map_err(ArgsError::ReportFormat)?,
            check: cli.check,
            janitor: cli.janitor,
            dry_run: cli.dry_run,
        })
    }

    /// Directory part of the output prefix, `.` when there is none.
    pub fn output_dir(&self) -> PathBuf {
        output_dir(&self.output_prefix)
    }

    /// Collection the run's results are persisted to, if any.
    pub fn collection(&self) -> Option<String> {
        self.backend.collection(self.upload.as_deref())
    }

    /// Name used for local report files.
    pub fn report_name(&self) -> String {
        self.collection()
            .unwrap_or_else(|| self.backend.name().to_string())
    }
}

pub fn output_dir(prefix: &Path) -> PathBuf {
    match prefix.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether the output directory may be deleted wholesale.
///
/// Only an explicit directory qualifies; the working directory, filesystem
/// roots and anything resolving to them never do.
pub fn is_removable_dir(dir: &Path) -> bool {
    if dir == Path::new(".") || dir.as_os_str().is_empty() || dir.parent().is_none() {
        return false;
    }
    match (dir.canonicalize(), std::env::current_dir().and_then(|d| d.canonicalize())) {
        (Ok(resolved), Ok(cwd)) => resolved.parent().is_some() && !cwd.starts_with(&resolved),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<RunConfig, ArgsError> {
        let cli = Cli::try_parse_from(std::iter::once("gemmbench").chain(args.iter().copied()))
            .expect("arguments parse");
        RunConfig::from_cli(&cli)
    }

    #[test]
    fn defaults() {
        let config = parse(&["-z", "s,c,0,0,8,8,8,1,0,8,8,8", "--harness", "bin/harness"]).unwrap();
        assert_eq!(config.devices.enabled().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(config.output_prefix, PathBuf::from("results"));
        assert_eq!(config.output_dir(), PathBuf::from("."));
        assert_eq!(config.backend, Backend::Harness(PathBuf::from("bin/harness")));
        assert_eq!(config.collection(), None);
        assert_eq!(config.report_name(), "harness");
        assert_eq!(config.report_format, ReportFormat::All);
        assert!(!config.janitor && !config.check && !config.dry_run);
    }

    #[test]
    fn input_and_string_conflict() {
        let err = parse(&["-i", "a.csv", "-z", "row", "--rocblas", "t"]).unwrap_err();
        assert!(matches!(err, ArgsError::MutuallyExclusive("input", "string")));
        assert_eq!(err.to_string(), "input and string options are mutually exclusive");
    }

    #[test]
    fn rocblas_and_ck_conflict() {
        let err = parse(&["-i", "a.csv", "--rocblas", "r", "--ck", "c"]).unwrap_err();
        assert!(matches!(
            err,
            ArgsError::MutuallyExclusive("rocblas", "composable_kernel")
        ));
    }

    #[test]
    fn any_two_baselines_conflict() {
        let err = parse(&["-i", "a.csv", "--cublas", "a", "--cutlass", "b"]).unwrap_err();
        assert!(matches!(err, ArgsError::MutuallyExclusive("cublas", "cutlass")));
    }

    #[test]
    fn input_required() {
        assert!(matches!(parse(&["--rocblas", "r"]), Err(ArgsError::MissingInput)));
    }

    #[test]
    fn harness_required_without_baseline() {
        assert!(matches!(
            parse(&["-i", "a.csv"]),
            Err(ArgsError::MissingHarness)
        ));
    }

    #[test]
    fn baseline_collection_ignores_upload() {
        let config = parse(&["-i", "a.csv", "--composable-kernel", "ck", "-u", "mine"]).unwrap();
        assert_eq!(config.collection(), Some("composable_kernel".to_string()));
        assert_eq!(config.source, ConfigSource::File(PathBuf::from("a.csv")));
    }

    #[test]
    fn rejects_bad_devices_and_collections() {
        assert!(matches!(
            parse(&["-i", "a.csv", "--cutlass", "c", "-d", "0,x"]),
            Err(ArgsError::Devices(_))
        ));
        assert!(matches!(
            parse(&["-i", "a.csv", "--harness", "h", "-u", "../x"]),
            Err(ArgsError::Collection(_))
        ));
        assert!(matches!(
            parse(&["-i", "a.csv", "--harness", "h", "--report-format", "xml"]),
            Err(ArgsError::ReportFormat(_))
        ));
    }

    #[test]
    fn output_dir_of_prefix() {
        assert_eq!(output_dir(Path::new("out/run1/results")), PathBuf::from("out/run1"));
        assert_eq!(output_dir(Path::new("results")), PathBuf::from("."));
    }

    #[test]
    fn working_directory_is_never_removable() {
        assert!(!is_removable_dir(Path::new(".")));
        assert!(!is_removable_dir(Path::new("/")));
        assert!(!is_removable_dir(Path::new("")));
        assert!(!is_removable_dir(Path::new("..")));

        let dir = tempfile::tempdir().unwrap();
        assert!(is_removable_dir(&dir.path().join("out")));
        assert!(is_removable_dir(Path::new("does/not/exist/yet")));
    }
}
