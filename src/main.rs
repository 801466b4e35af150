use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::*;

use pio_ota_hooks::compress::{compress_firmware, CompressMode, CompressionOutcome};
use pio_ota_hooks::context::{BuildContext, DEFAULT_BUILD_ROOT};
use pio_ota_hooks::logging;
use pio_ota_hooks::ota::upload_firmware;
use pio_ota_hooks::project::{resolve_option, ProjectConfig};

#[derive(Parser)]
#[command(name = "pio-ota-hooks", version)]
#[command(about = "PlatformIO compressed OTA build hooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// `pio project config --json-output` dump to read project options from
    #[arg(long, global = true, env = "PIO_PROJECT_CONFIG", value_name = "JSON")]
    project_config: Option<PathBuf>,

    /// PlatformIO environment the hook runs for
    #[arg(short, long, global = true, env = "PIOENV")]
    environment: Option<String>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Gzip the built firmware in place before it is uploaded
    Compress {
        /// Directory holding `<progname>.bin` ($BUILD_DIR)
        #[arg(long, env = "BUILD_DIR")]
        build_dir: Option<PathBuf>,

        /// Firmware base name ($PROGNAME)
        #[arg(long, env = "PROGNAME", default_value = "firmware")]
        progname: String,

        /// Backup/skip policy
        #[arg(long, value_enum, default_value_t = CompressMode::Once)]
        mode: CompressMode,
    },
    /// Upload a firmware image to the device's OTA endpoint
    Upload {
        /// Firmware image to send ($SOURCE)
        #[arg(value_name = "FIRMWARE")]
        firmware: PathBuf,

        /// OTA endpoint, e.g. http://192.168.4.1/update
        #[arg(long, env = "UPLOAD_URL")]
        upload_url: Option<String>,

        /// Give up after this many seconds (default: wait indefinitely)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = std::env::var("PIO_OTA_LOG")
        .ok()
        .and_then(|level| logging::level_from_str(&level))
        .unwrap_or_else(|| logging::level_for(cli.verbose, cli.quiet));
    if let Err(e) = logging::init_logger(level) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", "❌".red(), err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let project = cli
        .project_config
        .as_deref()
        .map(ProjectConfig::load)
        .transpose()
        .context("Cannot read project options")?;
    let environment = cli.environment.as_deref();

    match cli.command {
        Commands::Compress {
            build_dir,
            progname,
            mode,
        } => {
            let build_dir = match build_dir {
                Some(dir) => dir,
                None => environment_build_dir(project.as_ref(), environment)?,
            };
            compress(&BuildContext::new(build_dir, progname), mode)
        }
        Commands::Upload {
            firmware,
            upload_url,
            timeout,
        } => {
            let mut ctx = BuildContext::default()
                .with_upload_timeout(timeout.map(Duration::from_secs));
            ctx.upload_url =
                resolve_option(upload_url, project.as_ref(), environment, "upload_url");
            upload(&ctx, &firmware)
        }
    }
}

/// `<build_dir>/<env>` when only the project options are known
fn environment_build_dir(
    project: Option<&ProjectConfig>,
    environment: Option<&str>,
) -> Result<PathBuf> {
    let environment = environment
        .map(str::to_string)
        .or_else(|| project.and_then(ProjectConfig::default_env))
        .ok_or_else(|| {
            anyhow!("No build directory: pass --build-dir or select a PlatformIO environment")
        })?;
    let root = project
        .and_then(ProjectConfig::build_root)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_ROOT));
    Ok(BuildContext::for_environment(&root, &environment).build_dir)
}

fn compress(ctx: &BuildContext, mode: CompressMode) -> Result<()> {
    println!("{}", "Compressing firmware for upload...".cyan());
    match compress_firmware(ctx, mode).context("Firmware compression failed")? {
        CompressionOutcome::Compressed(report) => {
            println!("{}", report);
        }
        CompressionOutcome::Skipped { backup } => {
            println!(
                "{} {}",
                "Firmware already compressed, keeping".yellow(),
                backup.display()
            );
        }
    }
    Ok(())
}

fn upload(ctx: &BuildContext, firmware: &Path) -> Result<()> {
    let receipt = upload_firmware(ctx, firmware).context("OTA upload failed")?;
    println!(
        "{}Firmware: {} bytes, md5 {}",
        "   ".dimmed(),
        receipt.firmware_size,
        receipt.md5
    );
    println!("{} {}", "✅".green(), "OTA finished successfully".green());
    Ok(())
}
