//! Treebuilder - boot image tree builder.
//!
//! Runs the arch template against an install tree to produce the boot
//! tree of an installation medium, and manipulates the initrds in it.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use treebuilder::config::Config;

#[derive(Parser)]
#[command(name = "treebuilder")]
#[command(about = "Boot image tree builder")]
#[command(
    after_help = "QUICK START:\n  treebuilder preflight                                  Check host tools\n  treebuilder kernels --root installtree                 List kernels\n  treebuilder build --inroot installtree --outroot tree --arch x86_64"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the arch template and finalize boot images
    Build {
        /// Install tree (read-only source)
        #[arg(long)]
        inroot: PathBuf,
        /// Output tree to build
        #[arg(long)]
        outroot: PathBuf,
        /// Target architecture (e.g. x86_64, i686, ppc64)
        #[arg(long)]
        arch: String,
        /// Product name (default: TREEBUILDER_PRODUCT)
        #[arg(long)]
        product: Option<String>,
        /// Template directory (default: TREEBUILDER_TEMPLATE_DIR)
        #[arg(long)]
        templates: Option<PathBuf>,
        /// Stop at the first failing template line
        #[arg(long)]
        strict: bool,
        /// Write tree metadata as JSON to this file
        #[arg(long)]
        treeinfo_json: Option<PathBuf>,
        /// Extra template variable, KEY=VALUE (repeatable)
        #[arg(long = "var")]
        vars: Vec<String>,
    },

    /// List kernels and their initrds
    Kernels {
        /// Tree to scan
        #[arg(long)]
        root: PathBuf,
        /// Kernel directory inside the tree
        #[arg(long, default_value = "boot")]
        boot_dir: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Rebuild every initrd in the install tree with dracut
    RebuildInitrds {
        #[arg(long)]
        inroot: PathBuf,
        #[arg(long)]
        arch: String,
        /// Keep the old initrd, renamed with this suffix
        #[arg(long)]
        backup: Option<String>,
        /// Extra dracut arguments
        #[arg(last = true)]
        dracut_args: Vec<String>,
    },

    /// Append the files under DIR to every initrd as a cpio archive
    InitrdAppend {
        #[arg(long)]
        inroot: PathBuf,
        #[arg(long)]
        arch: String,
        dir: PathBuf,
    },

    /// Run preflight checks (verify host tools before build)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show the template used for each base architecture
    Templates,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let base_dir = std::env::current_dir()?;

    // Load .env if present
    dotenvy::dotenv().ok();
    let config = Config::load(&base_dir);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            inroot,
            outroot,
            arch,
            product,
            templates,
            strict,
            treeinfo_json,
            vars,
        } => {
            let opts = commands::build::BuildOptions {
                inroot,
                outroot,
                arch,
                product,
                templates,
                strict,
                treeinfo_json,
                vars,
            };
            commands::cmd_build(opts, &config)?;
        }

        Commands::Kernels {
            root,
            boot_dir,
            json,
        } => {
            commands::cmd_kernels(&root, &boot_dir, json)?;
        }

        Commands::RebuildInitrds {
            inroot,
            arch,
            backup,
            dracut_args,
        } => {
            commands::cmd_rebuild_initrds(
                &config,
                &inroot,
                &arch,
                backup.as_deref(),
                &dracut_args,
            )?;
        }

        Commands::InitrdAppend { inroot, arch, dir } => {
            commands::cmd_initrd_append(&config, &inroot, &arch, &dir)?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(strict)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Templates => commands::show::ShowTarget::Templates,
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
