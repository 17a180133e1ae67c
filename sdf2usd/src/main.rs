//! `sdf2usd` - convert SDF robot descriptions to USD.
//!
//! # Commands
//!
//! - `sdf2usd convert <input> <output>` - Convert one SDF model to a USDA stage
//!
//! Mesh assets are written next to the output under `meshes/`. Logging goes
//! to stderr; `-v` enables debug output, `-q` limits it to errors, and
//! `RUST_LOG` overrides both.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sim_sdf::{ConversionReport, ConvertOptions, SdfToUsdConverter, UpAxis};
use sim_usd::{UsdaMeshConverter, UsdaStage};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Convert SDF robot descriptions to USD scenes.
#[derive(Parser)]
#[command(name = "sdf2usd")]
#[command(about = "Convert SDF robot descriptions to USD", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an SDF file to a USDA stage
    Convert {
        /// Source SDF file
        input: PathBuf,

        /// Destination stage (.usda)
        output: PathBuf,

        /// Skip rigid bodies, mass, colliders and joints
        #[arg(long)]
        no_physics: bool,

        /// Skip collision geometry
        #[arg(long)]
        no_collision: bool,

        /// Fold links attached by fixed joints into their parent
        #[arg(long)]
        merge_fixed_joints: bool,

        /// Uniform scale applied to the model
        #[arg(long, default_value_t = 1.0)]
        scale: f64,

        /// Up axis of the stage
        #[arg(long, value_enum, default_value_t = UpAxisArg::Z)]
        up_axis: UpAxisArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UpAxisArg {
    #[value(name = "Y", alias = "y")]
    Y,
    #[value(name = "Z", alias = "z")]
    Z,
}

impl From<UpAxisArg> for UpAxis {
    fn from(arg: UpAxisArg) -> Self {
        match arg {
            UpAxisArg::Y => Self::Y,
            UpAxisArg::Z => Self::Z,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            no_physics,
            no_collision,
            merge_fixed_joints,
            scale,
            up_axis,
        } => {
            let options = ConvertOptions::new(input, output)
                .with_physics(!no_physics)
                .with_collision(!no_collision)
                .with_merge_fixed_joints(merge_fixed_joints)
                .with_scale(scale)
                .with_up_axis(up_axis.into());
            convert(options)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn convert(options: ConvertOptions) -> Result<()> {
    let input = options.input.clone();
    let mut converter = SdfToUsdConverter::new(options, UsdaMeshConverter::new());
    let report = converter
        .convert(&mut UsdaStage::new())
        .with_context(|| format!("failed to convert {}", input.display()))?;
    summarize(&report);
    Ok(())
}

fn summarize(report: &ConversionReport) {
    info!(
        output = %report.output.display(),
        links = report.links,
        joints = report.joints,
        meshes = report.meshes_converted,
        materials = report.materials,
        "conversion complete"
    );
    if !report.is_clean() {
        info!(
            warnings = report.warnings.len(),
            unsupported = report.unsupported_count(),
            "conversion finished with warnings"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_convert_flags() {
        let cli = Cli::try_parse_from([
            "sdf2usd",
            "-v",
            "convert",
            "model.sdf",
            "out.usda",
            "--no-collision",
            "--scale",
            "0.5",
            "--up-axis",
            "Y",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Convert {
            no_physics,
            no_collision,
            scale,
            up_axis,
            ..
        } = cli.command;
        assert!(!no_physics);
        assert!(no_collision);
        assert!((scale - 0.5).abs() < f64::EPSILON);
        assert_eq!(UpAxis::from(up_axis), UpAxis::Y);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["sdf2usd", "-v", "-q", "convert", "a.sdf", "b.usda"]).is_err());
    }

    #[test]
    fn test_convert_writes_stage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("model.sdf");
        std::fs::write(
            &input,
            r#"<sdf version="1.7"><model name="cube"><link name="body">
                <visual name="v"><geometry><box><size>1 1 1</size></box></geometry></visual>
            </link></model></sdf>"#,
        )
        .unwrap();
        let output = dir.path().join("cube.usda");

        convert(ConvertOptions::new(&input, &output)).unwrap();
        assert!(output.is_file());
    }

    #[test]
    fn test_convert_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert(ConvertOptions::new(
            dir.path().join("missing.sdf"),
            dir.path().join("out.usda"),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("failed to convert"));
    }
}
