//! Command handlers for sitepush CLI

use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Shell as ClapShell};
use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};
use sitepush_core::config::{
    ENV_APP_ID, ENV_BUCKET, ENV_COS_BUCKET, ENV_COS_REGION, ENV_COS_SECRET_ID, ENV_COS_SECRET_KEY,
    ENV_ENDPOINT, ENV_REGION, ENV_SECRET_ID, ENV_SECRET_KEY,
};
use sitepush_core::{
    find_config_file, load_config, process_env, resolve_config, BucketClient, ConfigOverrides,
    DeployConfig, DeployReport, Deployer, ReconciliationResult, RunSummary,
};
use std::path::Path;
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

/// Log level used when neither the config file nor RUST_LOG sets one
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Handle deploy command
pub async fn handle_deploy(
    config_path: Option<&Path>,
    verbose: bool,
    overrides: ConfigOverrides,
    yes: bool,
    output: &str,
) -> Result<()> {
    let deployer = connect(config_path, verbose, overrides)?;
    let config = deployer.config();
    let json = output == "json";

    if !json {
        println!(
            "Deploying {} -> {}...",
            config.public_dir.display(),
            deployer.store().bucket()
        );
    }

    let plan = deployer.plan().await?;

    if !json {
        print_plan_overview(&plan, config.transfer.delete_extras);
    }

    if config.transfer.delete_extras && !plan.to_delete.is_empty() && !yes {
        if !Term::stdout().is_term() {
            return Err(anyhow::anyhow!(
                "Refusing to delete {} remote object(s) without confirmation.\n\
                 Re-run with --yes, or with --no-delete to keep them.",
                plan.to_delete.len()
            ));
        }

        let confirm = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Delete {} remote object(s) missing locally?",
                plan.to_delete.len()
            ))
            .default(false)
            .interact()?;

        if !confirm {
            println!("❌ Deploy cancelled");
            return Ok(());
        }
    }

    let total = deployer.dispatched(&plan);
    let pb = if json || total == 0 {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=>-"),
        );
        pb
    };

    let summary = deployer
        .execute(&plan, |outcome| {
            pb.inc(1);
            match &outcome.error {
                None => pb.set_message(outcome.key.clone()),
                Some(error) => pb.println(format!(
                    "  ❌ {} {}: {}",
                    outcome.kind, outcome.key, error
                )),
            }
        })
        .await;
    pb.finish_and_clear();

    let report = deployer.report(plan, summary);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if !report.summary.is_success() {
        return Err(anyhow::anyhow!(
            "{} of {} transfer(s) failed",
            report.summary.failed,
            report.summary.total
        ));
    }

    Ok(())
}

/// Handle plan command
pub async fn handle_plan(
    config_path: Option<&Path>,
    verbose: bool,
    overrides: ConfigOverrides,
    output: &str,
) -> Result<()> {
    let deployer = connect(config_path, verbose, overrides)?;
    let config = deployer.config();

    let plan = deployer.plan().await?;

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!(
        "Plan for {} -> {}",
        config.public_dir.display(),
        deployer.store().bucket()
    );
    print_plan_overview(&plan, config.transfer.delete_extras);

    if plan.is_in_sync() {
        return Ok(());
    }

    #[derive(Tabled)]
    struct PlanRow {
        action: String,
        key: String,
        size: String,
    }

    let mut rows: Vec<PlanRow> = plan
        .to_upload
        .iter()
        .map(|u| PlanRow {
            action: format!("upload ({})", u.reason),
            key: u.entry.key.clone(),
            size: format_bytes(u.entry.size),
        })
        .collect();

    let delete_action = if config.transfer.delete_extras {
        "delete"
    } else {
        "keep"
    };
    rows.extend(plan.to_delete.iter().map(|key| PlanRow {
        action: delete_action.to_string(),
        key: key.clone(),
        size: "-".to_string(),
    }));

    println!();
    println!("{}", Table::new(rows));

    Ok(())
}

/// Resolve the configuration and build the deployer, printing a
/// remediation hint when the configuration is incomplete.
fn connect(
    config_path: Option<&Path>,
    verbose: bool,
    overrides: ConfigOverrides,
) -> Result<Deployer<BucketClient>> {
    let config = resolve(config_path, verbose, overrides).inspect_err(|e| {
        if e.is_config() {
            print_config_hint(e);
        }
    })?;
    tracing::debug!(config = ?config, "Resolved configuration");

    Ok(Deployer::connect(config)?)
}

fn resolve(
    config_path: Option<&Path>,
    verbose: bool,
    overrides: ConfigOverrides,
) -> sitepush_core::Result<DeployConfig> {
    let file = match find_config_file(config_path)? {
        Some(path) => Some(load_config(&path)?),
        None => None,
    };

    let level = file
        .as_ref()
        .and_then(|f| f.logging.as_ref())
        .map(|l| l.level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    init_logging(verbose, &level);

    resolve_config(overrides, file, process_env)
}

/// Install the tracing subscriber; RUST_LOG takes precedence
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,sitepush={level},sitepush_core={level}"))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_config_hint(err: &sitepush_core::Error) {
    let tips = [
        style("Oops, the deploy target is not fully configured.").red().bold().to_string(),
        err.to_string(),
        String::new(),
        "Set the options with flags, in sitepush.toml:".to_string(),
        String::new(),
        "  [storage]".to_string(),
        "  credential_id = \"yourSecretId\"".to_string(),
        "  credential_secret = \"yourSecretKey\"".to_string(),
        "  bucket = \"yourBucket\"".to_string(),
        "  region = \"yourRegion\"".to_string(),
        "  # app_id = \"yourAppId\"        (COS buckets)".to_string(),
        "  # endpoint = \"https://...\"    (non-AWS providers)".to_string(),
        String::new(),
        format!(
            "or through {}, {}, {}, {}, {} and {}.",
            ENV_SECRET_ID, ENV_SECRET_KEY, ENV_BUCKET, ENV_REGION, ENV_APP_ID, ENV_ENDPOINT
        ),
        format!(
            "{}, {}, {} and {} are still read as fallbacks.",
            ENV_COS_SECRET_ID, ENV_COS_SECRET_KEY, ENV_COS_BUCKET, ENV_COS_REGION
        ),
    ];
    eprintln!("{}", tips.join("\n"));
}

fn print_plan_overview(plan: &ReconciliationResult, delete_extras: bool) {
    use sitepush_core::UploadReason;

    println!(
        "  {} new, {} changed, {} unchanged ({} to upload)",
        plan.count(UploadReason::New),
        plan.count(UploadReason::Changed),
        plan.unchanged.len(),
        format_bytes(plan.upload_bytes())
    );

    for warning in &plan.warnings {
        println!("  ⚠️  {}: {} (will upload)", warning.key, warning.message);
    }

    if !plan.to_delete.is_empty() {
        if delete_extras {
            println!("  {} remote object(s) to delete", plan.to_delete.len());
        } else {
            println!(
                "  {} remote object(s) missing locally will be kept (use --delete to remove them)",
                plan.to_delete.len()
            );
        }
    }

    if plan.is_in_sync() {
        println!("  ✅ Bucket already up to date");
    }
}

fn print_summary(report: &DeployReport) {
    let summary: &RunSummary = &report.summary;

    if summary.total > 0 {
        println!(
            "  ✅ {} uploaded, {} deleted",
            summary.uploaded, summary.deleted
        );
    }

    if !summary.failures.is_empty() {
        #[derive(Tabled)]
        struct FailureRow {
            kind: String,
            key: String,
            error: String,
        }

        let rows: Vec<FailureRow> = summary
            .failures
            .iter()
            .map(|f| FailureRow {
                kind: f.kind.to_string(),
                key: f.key.clone(),
                error: f.error.clone(),
            })
            .collect();

        println!();
        println!("{}", Table::new(rows));
    }

    if report.kept > 0 {
        println!("  {} remote-only object(s) kept", report.kept);
    }

    println!("Done: {}/{} succeeded", summary.succeeded, summary.total);
}

/// Format bytes to human-readable size
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Handle shell completion generation
pub fn handle_completion(shell: &str, cmd: &mut Command) -> Result<()> {
    use std::io;

    let clap_shell = match shell {
        "bash" => ClapShell::Bash,
        "zsh" => ClapShell::Zsh,
        "fish" => ClapShell::Fish,
        "elvish" => ClapShell::Elvish,
        "powershell" | "pwsh" => ClapShell::PowerShell,
        _ => {
            return Err(anyhow::anyhow!(
                "Unsupported shell: {}\nSupported shells: bash, zsh, fish, elvish, powershell",
                shell
            ));
        }
    };

    // Only the script goes to stdout so it can be sourced directly
    generate(clap_shell, cmd, "sitepush", &mut io::stdout());

    match shell {
        "bash" => eprintln!("# Add to your ~/.bashrc:\n#   source <(sitepush completion bash)"),
        "zsh" => eprintln!("# Add to your ~/.zshrc:\n#   source <(sitepush completion zsh)"),
        "fish" => eprintln!(
            "# Install with:\n#   sitepush completion fish > ~/.config/fish/completions/sitepush.fish"
        ),
        "elvish" => eprintln!("# Install with:\n#   sitepush completion elvish > ~/.elvish/lib/sitepush.elv"),
        _ => eprintln!("# Run in PowerShell:\n#   sitepush completion powershell | Out-String | Invoke-Expression"),
    }

    Ok(())
}
