//! Serialization of the database through an external dump program.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use derive_more::{Display, Error};

use crate::config::DatabaseConnection;

/// Errors on dumping the database.
#[derive(Debug, Display, Error)]
pub enum DumpError {
    /// The dump program couldn't be started.
    #[display("Starting {program} failed: {source}")]
    Spawn { program: String, source: io::Error },
    /// Reading the dump or writing it to the output failed.
    #[display("Streaming the dump failed: {_0}")]
    Stream(io::Error),
    /// The dump program reported a failure.
    #[display("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Something that writes the contents of a database to a byte stream.
pub trait Dump {
    /// Writes a dump of `database` to `out` and returns the number of bytes written.
    fn dump(&self, database: &DatabaseConnection, out: &mut dyn Write) -> Result<u64, DumpError>;
}

/// Dumps a MySQL/MariaDB database with `mysqldump` (or a compatible program).
///
/// The password is handed over in `MYSQL_PWD` so it never shows up in the
/// process list.
#[derive(Debug, Clone)]
pub struct MysqlDump {
    program: PathBuf,
}

impl Default for MysqlDump {
    fn default() -> Self {
        Self::new("mysqldump")
    }
}

impl MysqlDump {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// The command dumping `database`, without any stdio configuration.
    pub fn command(&self, database: &DatabaseConnection) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--opt") // sensible dump defaults
            .arg("-h")
            .arg(&database.host);
        if let Some(port) = database.port {
            command.arg("-P").arg(port.to_string());
        }
        command
            .arg("-u")
            .arg(&database.username)
            .arg(&database.database_name)
            .env("MYSQL_PWD", &database.password);

        command
    }
}

impl Dump for MysqlDump {
    fn dump(&self, database: &DatabaseConnection, out: &mut dyn Write) -> Result<u64, DumpError> {
        let program = self.program_name();
        log::info!(target: "dump", "Create database dump of: {}", database.database_name);
        log::trace!(target: "dump", "Using user '{}' on {} for the dump", database.username, database.host);

        let mut dump_process = self
            .command(database)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DumpError::Spawn {
                program: program.clone(),
                source,
            })?;
        log::trace!(target: "dump", "Started {program} process.");

        // drain stderr concurrently so a chatty dump can't block on a full pipe
        let stderr = dump_process.stderr.take();
        let stderr_reader = thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf);
            }
            buf
        });

        let copied = match dump_process.stdout.take() {
            Some(mut stdout) => io::copy(&mut stdout, out),
            None => Err(io::Error::other("stdout of the dump wasn't captured")),
        };
        let written = match copied {
            Ok(written) => written,
            Err(e) => {
                let _ = dump_process.kill();
                let _ = dump_process.wait();
                return Err(DumpError::Stream(e));
            }
        };

        let status = dump_process.wait().map_err(DumpError::Stream)?;
        let stderr = stderr_reader.join().unwrap_or_default();
        let stderr = stderr.trim();

        if !status.success() {
            return Err(DumpError::Exit {
                program,
                status,
                stderr: stderr.to_string(),
            });
        }
        if !stderr.is_empty() {
            log::warn!(target: "dump", "{stderr}");
        }

        log::debug!(target: "dump", "Finished database dump of {written} bytes.");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> DatabaseConnection {
        DatabaseConnection {
            host: "db".into(),
            port: Some(3307),
            username: "u".into(),
            password: "hunter2".into(),
            database_name: "app".into(),
        }
    }

    #[test]
    fn password_is_passed_in_environment_only() {
        let command = MysqlDump::default().command(&database());

        let args: Vec<_> = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["--opt", "-h", "db", "-P", "3307", "-u", "u", "app"]);

        let password = command
            .get_envs()
            .find(|(name, _)| *name == "MYSQL_PWD")
            .and_then(|(_, value)| value);
        assert_eq!(password.and_then(|p| p.to_str()), Some("hunter2"));
    }

    #[test]
    fn port_is_optional() {
        let database = DatabaseConnection {
            port: None,
            ..database()
        };
        let command = MysqlDump::default().command(&database);
        assert!(!command.get_args().any(|arg| arg == "-P"));
    }

    #[cfg(unix)]
    #[test]
    fn streams_program_output() {
        // `echo` prints the arguments it was invoked with
        let mut out = Vec::new();
        let written = MysqlDump::new("echo").dump(&database(), &mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "--opt -h db -P 3307 -u u app\n");
        assert_eq!(written, out.len() as u64);
        assert!(!out.contains("hunter2"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_is_an_error() {
        let mut out = Vec::new();
        let result = MysqlDump::new("false").dump(&database(), &mut out);
        assert!(matches!(result, Err(DumpError::Exit { .. })));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let mut out = Vec::new();
        let result = MysqlDump::new("/nonexistent/mysqldump").dump(&database(), &mut out);
        assert!(matches!(result, Err(DumpError::Spawn { .. })));
    }
}
