use std::path::PathBuf;

use clap::{Args, Parser};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the command output.
    #[arg(long)]
    pub verbose: Option<LevelFilter>,

    /// TOML file with the job settings. Created with defaults if missing.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Exit with a failure status if any backup phase failed.
    #[arg(long)]
    pub strict: bool,

    /// Loggly customer token. Records are only logged locally without it.
    #[arg(long, env = "LOGGLY_TOKEN", hide_env_values = true)]
    pub loggly_token: Option<String>,

    #[command(flatten)]
    pub deployment: Deployment,
}

/// Credentials and paths configured on the deployment itself.
#[derive(Args, Debug, Clone, Default)]
pub struct Deployment {
    /// Access key of the storage account.
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub aws_access_key_id: Option<String>,

    /// Secret of the storage account.
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub aws_secret_access_key: Option<String>,

    /// Directory of user uploaded files to back up, e.g. `/app/storage/app/uploads`.
    #[arg(long, env = "FILES_TO_BACKUP")]
    pub files_to_backup: Option<PathBuf>,
}
