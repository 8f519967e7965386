use anyhow::Result;
use clap::{Args, CommandFactory, Parser};
use color_eyre::config::HookBuilder;
use sitepush_core::{ConfigOverrides, DeploySection, StorageSection};
use std::path::PathBuf;

mod handlers;

/// sitepush - publish a generated static site to an S3-compatible bucket
#[derive(Parser, Debug)]
#[command(name = "sitepush")]
#[command(version)]
#[command(about = "Publish a static site directory to S3, COS, R2 or any S3-compatible bucket", long_about = None)]
struct Cli {
    /// Config file (defaults to ./sitepush.toml, then ~/.config/sitepush/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Sub-command to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Upload new and changed files to the bucket
    Deploy {
        #[command(flatten)]
        target: TargetArgs,
        /// Do not ask before deleting remote objects
        #[arg(short, long)]
        yes: bool,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Show what deploy would transfer, without transferring anything
    Plan {
        #[command(flatten)]
        target: TargetArgs,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Shell completion
    Completion {
        /// Shell type (bash, zsh, fish, elvish, powershell)
        shell: String,
    },
}

/// Options selecting what to publish and where
#[derive(Args, Debug)]
struct TargetArgs {
    /// Directory containing the generated site (default: public)
    #[arg(short = 'd', long)]
    public_dir: Option<PathBuf>,
    /// Target bucket
    #[arg(short, long)]
    bucket: Option<String>,
    /// Bucket region
    #[arg(short, long)]
    region: Option<String>,
    /// Access key id
    #[arg(long)]
    secret_id: Option<String>,
    /// Secret access key
    #[arg(long)]
    secret_key: Option<String>,
    /// Account id appended to the bucket name (COS)
    #[arg(long)]
    app_id: Option<String>,
    /// Custom S3-compatible endpoint URL
    #[arg(long)]
    endpoint: Option<String>,
    /// Address the bucket in the URL path instead of the host name
    #[arg(long)]
    path_style: bool,
    /// Delete remote objects that no longer exist locally
    #[arg(long, overrides_with = "no_delete")]
    delete: bool,
    /// Keep remote objects that no longer exist locally
    #[arg(long, overrides_with = "delete")]
    no_delete: bool,
    /// Maximum transfers in flight
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,
    /// Keys per delete request
    #[arg(long)]
    delete_batch_size: Option<usize>,
}

impl TargetArgs {
    fn into_overrides(self) -> ConfigOverrides {
        let delete_extras = match (self.delete, self.no_delete) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        ConfigOverrides {
            storage: StorageSection {
                credential_id: self.secret_id,
                credential_secret: self.secret_key,
                bucket: self.bucket,
                region: self.region,
                app_id: self.app_id,
                endpoint: self.endpoint,
                path_style: self.path_style.then_some(true),
            },
            deploy: DeploySection {
                public_dir: self.public_dir,
                delete_extras,
                concurrency: self.concurrency,
                delete_batch_size: self.delete_batch_size,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup error handling
    if let Err(e) = HookBuilder::default().install() {
        eprintln!("Warning: Failed to install error handler: {}", e);
    }

    // Parse CLI arguments
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    // Execute command
    match cli.command {
        Commands::Deploy { target, yes, output } => {
            handlers::handle_deploy(config_path, cli.verbose, target.into_overrides(), yes, &output)
                .await
        }
        Commands::Plan { target, output } => {
            handlers::handle_plan(config_path, cli.verbose, target.into_overrides(), &output).await
        }
        Commands::Completion { shell } => handlers::handle_completion(&shell, &mut Cli::command()),
    }
}
