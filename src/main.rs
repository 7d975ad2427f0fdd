use std::process::ExitCode;

use clap::Parser;

use platform_backup_lib::cli::Cli;
use platform_backup_lib::dump::MysqlDump;
use platform_backup_lib::job;
use platform_backup_lib::platform::Platform;
use platform_backup_lib::report::{LocalSink, LogSink, LogglySink};
use platform_backup_lib::settings::JobSettings;
use platform_backup_lib::storage::ObjectStorage;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger = env_logger::builder();
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    env_logger.try_init().expect("env_logger should not fail");

    let settings = match &cli.config {
        Some(path) => match JobSettings::load_or_init(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => JobSettings::default(),
    };

    let sink: Box<dyn LogSink> = match cli.loggly_token.as_deref() {
        Some(token) => match LogglySink::new(token) {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                log::warn!(target: "report::loggly", "Records are only logged locally: {e}");
                Box::new(LocalSink)
            }
        },
        None => Box::new(LocalSink),
    };

    let platform = Platform::from_env();
    let dump = MysqlDump::new(&settings.dump_program);
    let outcome = job::execute(
        &cli,
        &platform,
        &settings,
        sink.as_ref(),
        &dump,
        |config| ObjectStorage::s3(&config.storage, &config.bucket_name),
    );

    outcome.exit_code(cli.strict)
}
