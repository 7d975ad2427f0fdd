//! A single backup run: database first, then the uploaded files.

use std::process::ExitCode;

use log::Level;

use crate::backends::{Backup, Database, Files, PhaseName, PhaseOutcome};
use crate::cli::Cli;
use crate::config::{BackupConfiguration, ConfigError};
use crate::dump::Dump;
use crate::naming::KeyPrefix;
use crate::platform::Platform;
use crate::report::{LogSink, Reporter};
use crate::settings::JobSettings;
use crate::storage::{Storage, StorageError};

/// How a run of the backup command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Not running on the platform, nothing was done or reported.
    Skipped,
    /// The job couldn't be set up, no phase ran.
    ConfigurationFailed,
    /// The phases ran, each of them reported its result.
    Finished(JobSummary),
}

impl RunOutcome {
    /// Whether the run counts as successful.
    ///
    /// Failed phases only count with `strict`, they are reported through the
    /// log sink otherwise.
    pub fn succeeded(&self, strict: bool) -> bool {
        match self {
            Self::Skipped => true,
            Self::ConfigurationFailed => false,
            Self::Finished(summary) => !strict || summary.all_succeeded(),
        }
    }

    pub fn exit_code(&self, strict: bool) -> ExitCode {
        if self.succeeded(strict) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Resolves the configuration and runs the backup job.
///
/// `open_storage` is only called once the configuration is complete.
/// Setup errors are reported through `sink` as a single
/// `Backup configuration error` record.
pub fn execute<S, F>(
    cli: &Cli,
    platform: &Platform,
    settings: &JobSettings,
    sink: &dyn LogSink,
    dump: &dyn Dump,
    open_storage: F,
) -> RunOutcome
where
    S: Storage,
    F: FnOnce(&BackupConfiguration) -> Result<S, StorageError>,
{
    let config = match BackupConfiguration::resolve(platform, &cli.deployment, settings) {
        Ok(config) => config,
        Err(ConfigError::Unavailable) => {
            log::debug!(target: "platform", "Not running on the platform, skipping backup");
            return RunOutcome::Skipped;
        }
        Err(e) => {
            sink.record(Level::Error, &format!("Backup configuration error: {e}"));
            return RunOutcome::ConfigurationFailed;
        }
    };

    let storage = match open_storage(&config) {
        Ok(storage) => storage,
        Err(e) => {
            sink.record(Level::Error, &format!("Backup configuration error: {e}"));
            return RunOutcome::ConfigurationFailed;
        }
    };

    let summary = Job::new(&config, dump, &storage, sink)
        .remove_staging(settings.remove_staging)
        .run();
    RunOutcome::Finished(summary)
}

/// Outcomes of all phases that ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub outcomes: Vec<PhaseOutcome>,
}

impl JobSummary {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.success)
    }

    pub fn outcome(&self, phase: PhaseName) -> Option<&PhaseOutcome> {
        self.outcomes.iter().find(|outcome| outcome.phase == phase)
    }
}

/// The backup job with all of its collaborators.
///
/// Phases run sequentially and independently: a failed database backup
/// doesn't keep the files from being backed up and vice versa.
pub struct Job<'a> {
    config: &'a BackupConfiguration,
    dump: &'a dyn Dump,
    storage: &'a dyn Storage,
    reporter: Reporter<'a>,
    remove_staging: bool,
}

impl<'a> Job<'a> {
    pub fn new(
        config: &'a BackupConfiguration,
        dump: &'a dyn Dump,
        storage: &'a dyn Storage,
        sink: &'a dyn LogSink,
    ) -> Self {
        Self {
            config,
            dump,
            storage,
            reporter: Reporter::new(sink),
            remove_staging: false,
        }
    }

    /// Delete the local database dump after it has been uploaded.
    pub fn remove_staging(mut self, remove_staging: bool) -> Self {
        self.remove_staging = remove_staging;
        self
    }

    pub fn run(&self) -> JobSummary {
        let prefix = KeyPrefix::new(&self.config.application_name, &self.config.branch_name);
        log::info!(target: "job", "Backing up to {}/{prefix}", self.config.bucket_name);

        let mut summary = JobSummary::default();

        let database = Database::new(self.dump, self.storage).remove_staging(self.remove_staging);
        summary.outcomes.push(self.run_phase(&database, &prefix));

        if let Some(source) = &self.config.files_source {
            let files = Files::new(self.storage, source);
            summary.outcomes.push(self.run_phase(&files, &prefix));
        }

        summary
    }

    fn run_phase<B: Backup>(&self, backend: &B, prefix: &KeyPrefix) -> PhaseOutcome {
        let outcome = PhaseOutcome::of(backend, self.config, prefix);
        self.reporter.report(&outcome);
        outcome
    }
}
