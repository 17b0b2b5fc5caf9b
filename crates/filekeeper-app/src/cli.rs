use std::path::PathBuf;

use clap::Parser;

const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Command-line flags for the `filekeeper` service.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "filekeeper",
    version,
    about = "Back up and prune aged files on an interval"
)]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(
        short = 'c',
        long = "config",
        env = "FILEKEEPER_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,
    /// Run a single cycle and exit.
    #[arg(short = '1', long)]
    pub once: bool,
    /// Log what would be done without touching the filesystem.
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,
    /// Force debug logging regardless of the configured level.
    #[arg(short = 'v', long)]
    pub verbose: bool,
    /// Validate the configuration file and exit.
    #[arg(long)]
    pub validate: bool,
}

impl Cli {
    /// Log level to install, honouring `--verbose`.
    #[must_use]
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        if self.verbose { "debug" } else { configured }
    }

    /// Span mode recorded for the process.
    #[must_use]
    pub const fn mode(&self) -> &'static str {
        match (self.once, self.dry_run) {
            (true, true) => "once-dry-run",
            (true, false) => "once",
            (false, true) => "service-dry-run",
            (false, false) => "service",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use std::error::Error;

    #[test]
    fn defaults_run_as_a_service() -> Result<(), Box<dyn Error>> {
        let cli = Cli::try_parse_from(["filekeeper"])?;
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!cli.once && !cli.dry_run && !cli.verbose && !cli.validate);
        assert_eq!(cli.mode(), "service");
        assert_eq!(cli.log_level("warn"), "warn");
        Ok(())
    }

    #[test]
    fn short_flags_combine() -> Result<(), Box<dyn Error>> {
        let cli = Cli::try_parse_from(["filekeeper", "-1nv", "-c", "/etc/filekeeper.json"])?;
        assert!(cli.once && cli.dry_run && cli.verbose);
        assert_eq!(cli.config, PathBuf::from("/etc/filekeeper.json"));
        assert_eq!(cli.mode(), "once-dry-run");
        assert_eq!(cli.log_level("error"), "debug");
        Ok(())
    }

    #[test]
    fn long_flags_parse() -> Result<(), Box<dyn Error>> {
        let cli = Cli::try_parse_from([
            "filekeeper",
            "--config",
            "custom.json",
            "--once",
            "--dry-run",
            "--validate",
        ])?;
        assert!(cli.once && cli.dry_run && cli.validate);
        assert_eq!(cli.config, PathBuf::from("custom.json"));
        Ok(())
    }

    #[test]
    fn version_flag_short_circuits() {
        let outcome = Cli::try_parse_from(["filekeeper", "-V"]);
        assert!(matches!(outcome, Err(err) if err.kind() == ErrorKind::DisplayVersion));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(Cli::try_parse_from(["filekeeper", "--prune-everything"]).is_err());
    }
}
