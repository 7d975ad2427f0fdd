//! Library to back up a [Platform.sh][psh] application to S3.
//!
//! A backup run dumps the application database, compresses the dump and
//! uploads it, then mirrors the directory of user uploaded files if one is
//! configured. The phases are located in the [`backends`] module and run by
//! [`job::Job`]. Each phase reports exactly one record to a [`report::LogSink`].
//!
//! [psh]: https://platform.sh/

#![forbid(unsafe_code)]

pub mod backends;
pub mod cli;
pub mod config;
pub mod dump;
pub mod job;
pub mod naming;
pub mod platform;
pub mod report;
pub mod settings;
pub mod storage;
