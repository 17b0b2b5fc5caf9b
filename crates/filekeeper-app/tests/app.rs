//! Whole-binary flows driven through `run_app`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use filekeeper_app::{Cli, run_app};
use filekeeper_test_support::fixtures::TargetTree;
use serde_json::json;

fn write_config(dir: &Path, body: &serde_json::Value) -> Result<PathBuf> {
    let path = dir.join("config.json");
    std::fs::write(&path, serde_json::to_vec_pretty(body)?)?;
    Ok(path)
}

fn same_code(left: ExitCode, right: ExitCode) -> bool {
    format!("{left:?}") == format!("{right:?}")
}

#[tokio::test]
async fn validate_accepts_a_good_configuration() -> Result<()> {
    let tree = TargetTree::new()?;
    let backup = tree.scratch("backup");
    let config = write_config(
        &tree.scratch(""),
        &json!({
            "prune_after_hours": 1,
            "target_folder": tree.root(),
            "run_interval": 60,
            "enable_backup": true,
            "backup_path": backup,
            "remote_backups": ["ops@vault:/srv/backups"],
            "compression": { "enabled": true }
        }),
    )?;
    let config = config.display().to_string();
    let cli = Cli::try_parse_from(["filekeeper", "--validate", "-c", config.as_str()])?;

    let code = run_app(&cli).await?;

    assert!(same_code(code, ExitCode::SUCCESS));
    assert!(!backup.exists());
    Ok(())
}

#[tokio::test]
async fn validate_rejects_a_bad_configuration() -> Result<()> {
    let tree = TargetTree::new()?;
    let config = write_config(
        &tree.scratch(""),
        &json!({
            "prune_after_hours": 1,
            "target_folder": tree.root(),
            "run_interval": 60,
            "remote_backups": ["-oProxyCommand=evil:/tmp"]
        }),
    )?;
    let cli = Cli {
        config,
        once: false,
        dry_run: false,
        verbose: false,
        validate: true,
    };

    let code = run_app(&cli).await?;

    assert!(same_code(code, ExitCode::FAILURE));
    Ok(())
}

#[tokio::test]
async fn single_dry_run_leaves_the_tree_alone() -> Result<()> {
    let tree = TargetTree::new()?;
    let old = tree.write_old("app/old.log", "keep me")?;
    let backup = tree.scratch("backup");
    let config = write_config(
        &tree.scratch(""),
        &json!({
            "prune_after_hours": 1,
            "target_folder": tree.root(),
            "run_interval": 60,
            "enable_backup": true,
            "backup_paths": [backup],
            "log_level": "error"
        }),
    )?;
    let cli = Cli {
        config,
        once: true,
        dry_run: true,
        verbose: false,
        validate: false,
    };

    let code = run_app(&cli).await?;

    assert!(same_code(code, ExitCode::SUCCESS));
    assert!(old.exists());
    assert!(!backup.exists());
    Ok(())
}

#[tokio::test]
async fn missing_configuration_is_an_error() -> Result<()> {
    let tree = TargetTree::new()?;
    let cli = Cli {
        config: tree.scratch("absent.json"),
        once: true,
        dry_run: false,
        verbose: false,
        validate: false,
    };
    assert!(run_app(&cli).await.is_err());
    Ok(())
}
