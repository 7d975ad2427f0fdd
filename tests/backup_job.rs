use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use log::Level;
use object_store::local::LocalFileSystem;

use platform_backup_lib::backends::PhaseName;
use platform_backup_lib::cli::{Cli, Deployment};
use platform_backup_lib::config::BackupConfiguration;
use platform_backup_lib::dump::MysqlDump;
use platform_backup_lib::job::{self, Job, RunOutcome};
use platform_backup_lib::platform::Platform;
use platform_backup_lib::report::LogSink;
use platform_backup_lib::settings::JobSettings;
use platform_backup_lib::storage::ObjectStorage;

#[derive(Default)]
struct Recorder(Mutex<Vec<(Level, String)>>);

impl LogSink for Recorder {
    fn record(&self, level: Level, message: &str) {
        self.0.lock().unwrap().push((level, message.to_string()));
    }
}

fn platform(app_dir: &Path) -> Platform {
    let relationships = STANDARD.encode(
        r#"{"database": [{"host": "db", "username": "u", "password": "p",
            "path": "app", "scheme": "mysql"}]}"#,
    );

    Platform::from_vars([
        ("PLATFORM_DIR", app_dir.display().to_string()),
        ("PLATFORM_APPLICATION_NAME", "courier".to_string()),
        ("PLATFORM_BRANCH", "main".to_string()),
        ("PLATFORM_RELATIONSHIPS", relationships),
    ])
}

fn deployment(files_to_backup: Option<&Path>) -> Deployment {
    Deployment {
        aws_access_key_id: Some("key".to_string()),
        aws_secret_access_key: Some("secret".to_string()),
        files_to_backup: files_to_backup.map(Path::to_path_buf),
    }
}

fn bucket_storage(bucket: &Path) -> ObjectStorage {
    let store = LocalFileSystem::new_with_prefix(bucket).unwrap();
    ObjectStorage::new(Arc::new(store)).unwrap()
}

#[cfg(unix)]
#[test]
fn backs_up_database_and_files() {
    let app_dir = tempfile::tempdir().unwrap();
    let bucket = tempfile::tempdir().unwrap();
    let uploads = tempfile::tempdir().unwrap();
    fs::create_dir_all(uploads.path().join("avatars")).unwrap();
    fs::write(uploads.path().join("avatars/me.png"), b"png").unwrap();

    let config = BackupConfiguration::resolve(
        &platform(app_dir.path()),
        &deployment(Some(uploads.path())),
        &JobSettings::default(),
    )
    .unwrap();

    // `echo` stands in for mysqldump and prints its arguments as the dump
    let dump = MysqlDump::new("echo");
    let storage = bucket_storage(bucket.path());
    let sink = Recorder::default();

    let summary = Job::new(&config, &dump, &storage, &sink).run();
    assert!(summary.all_succeeded(), "{summary:?}");

    let database_dir = bucket.path().join("platform/courier/main/database");
    let dumps: Vec<_> = fs::read_dir(&database_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(dumps.len(), 1);
    let dump_name = &dumps[0];
    assert!(dump_name.ends_with(".gz"));
    // YYYY-MM-DD_HH:MM:SS.gz
    assert_eq!(dump_name.len(), "2024-01-02_03:04:05.gz".len());

    let mut content = String::new();
    std::io::Read::read_to_string(
        &mut GzDecoder::new(fs::File::open(database_dir.join(dump_name)).unwrap()),
        &mut content,
    )
    .unwrap();
    assert_eq!(content, "--opt -h db -u u app\n");

    // the staging copy stays in place
    assert!(app_dir.path().join("backups").join(dump_name).exists());

    assert_eq!(
        fs::read(bucket.path().join("platform/courier/main/files/avatars/me.png")).unwrap(),
        b"png"
    );

    let records = sink.0.into_inner().unwrap();
    assert_eq!(
        records,
        [
            (Level::Info, format!("Successfully backed up {dump_name}")),
            (
                Level::Info,
                format!("Successfully backed up: {}", uploads.path().display())
            ),
        ]
    );
}

#[cfg(unix)]
#[test]
fn failing_dump_still_backs_up_files() {
    let app_dir = tempfile::tempdir().unwrap();
    let bucket = tempfile::tempdir().unwrap();
    let uploads = tempfile::tempdir().unwrap();
    fs::write(uploads.path().join("doc.txt"), b"doc").unwrap();

    let config = BackupConfiguration::resolve(
        &platform(app_dir.path()),
        &deployment(Some(uploads.path())),
        &JobSettings::default(),
    )
    .unwrap();
    let storage = bucket_storage(bucket.path());
    let sink = Recorder::default();

    let summary = Job::new(&config, &MysqlDump::new("false"), &storage, &sink).run();

    assert!(!summary.all_succeeded());
    assert!(!summary.outcome(PhaseName::Database).unwrap().success);
    assert!(summary.outcome(PhaseName::Files).unwrap().success);
    assert!(!bucket.path().join("platform/courier/main/database").exists());
    assert!(bucket
        .path()
        .join("platform/courier/main/files/doc.txt")
        .exists());

    let records = sink.0.into_inner().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].0, Level::Error);
    assert!(records[0].1.starts_with("Database backup error: false exited with"));
    assert_eq!(records[1].0, Level::Info);
}

#[test]
fn missing_files_source_is_reported_as_files_error() {
    let app_dir = tempfile::tempdir().unwrap();
    let bucket = tempfile::tempdir().unwrap();
    let missing = app_dir.path().join("no-uploads-here");

    let config = BackupConfiguration::resolve(
        &platform(app_dir.path()),
        &deployment(Some(&missing)),
        &JobSettings::default(),
    )
    .unwrap();
    let storage = bucket_storage(bucket.path());
    let sink = Recorder::default();

    let dump = MysqlDump::new("/nonexistent/mysqldump");
    let summary = Job::new(&config, &dump, &storage, &sink).run();

    assert_eq!(summary.outcomes.len(), 2);
    let records = sink.0.into_inner().unwrap();
    assert!(records.iter().all(|(level, _)| *level == Level::Error));
    assert!(records[0].1.starts_with("Database backup error: "));
    assert!(records[1].1.starts_with("Files backup error: "));
}

fn cli(strict: bool, deployment: Deployment) -> Cli {
    Cli {
        verbose: None,
        config: None,
        strict,
        loggly_token: None,
        deployment,
    }
}

#[test]
fn nothing_happens_outside_the_platform() {
    let bucket = tempfile::tempdir().unwrap();
    let uploads = tempfile::tempdir().unwrap();
    fs::write(uploads.path().join("doc.txt"), b"doc").unwrap();
    let platform = Platform::from_vars([("PLATFORM_BRANCH", "main")]);
    let sink = Recorder::default();

    let outcome = job::execute(
        &cli(true, deployment(Some(uploads.path()))),
        &platform,
        &JobSettings::default(),
        &sink,
        &MysqlDump::new("/nonexistent/mysqldump"),
        |_| ObjectStorage::new(Arc::new(LocalFileSystem::new_with_prefix(bucket.path())?)),
    );

    assert_eq!(outcome, RunOutcome::Skipped);
    assert!(outcome.succeeded(true));
    assert!(sink.0.into_inner().unwrap().is_empty());
    assert_eq!(fs::read_dir(bucket.path()).unwrap().count(), 0);
}

#[test]
fn incomplete_configuration_fails_the_run() {
    let app_dir = tempfile::tempdir().unwrap();
    let bucket = tempfile::tempdir().unwrap();
    let sink = Recorder::default();

    let outcome = job::execute(
        &cli(false, Deployment::default()),
        &platform(app_dir.path()),
        &JobSettings::default(),
        &sink,
        &MysqlDump::new("/nonexistent/mysqldump"),
        |_| Ok(bucket_storage(bucket.path())),
    );

    assert_eq!(outcome, RunOutcome::ConfigurationFailed);
    assert!(!outcome.succeeded(false));
    let records = sink.0.into_inner().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, Level::Error);
    assert!(records[0].1.starts_with("Backup configuration error: "));
}
