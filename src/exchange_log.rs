//! # Exchange Log Module
//!
//! Records completed telemetry exchanges to JSONL files with rotation.
//!
//! This module handles:
//! - One JSON line per notable poll event (exchanges, timeouts, resyncs)
//! - Writing to rotating log files (max N records per file)
//! - Retaining only the last M files

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::config::ExchangeLogConfig;
use crate::error::Result;
use crate::hott::driver::{PollEvent, ResponseKind};
use crate::hott::protocol;

const FILE_PREFIX: &str = "exchanges-";
const FILE_SUFFIX: &str = ".jsonl";

/// One logged line
#[derive(Debug, Serialize)]
struct ExchangeRecord<'a> {
    /// Wall-clock time, RFC 3339
    timestamp: String,

    /// What happened ("eam", "gps", "text", "timeout", "garbage", "rejected")
    event: &'a str,

    /// Bytes put on the wire, checksum included (0 for resync events)
    bytes: usize,
}

/// JSONL log of telemetry exchanges with file rotation
pub struct ExchangeLog {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: BufWriter<File>,
    records_in_current: usize,
    next_seq: u64,
}

impl ExchangeLog {
    /// Open a log in the configured directory, continuing after any files
    /// left by previous runs
    pub fn new(config: &ExchangeLogConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;

        let next_seq = Self::existing_files(&dir)?
            .last()
            .and_then(|name| {
                name.strip_prefix(FILE_PREFIX)?
                    .strip_suffix(FILE_SUFFIX)?
                    .parse::<u64>()
                    .ok()
            })
            .map_or(0, |seq| seq + 1);

        let writer = Self::open_file(&dir, next_seq)?;

        let mut log = Self {
            dir,
            max_records_per_file: config.max_records_per_file,
            max_files_to_keep: config.max_files_to_keep,
            writer,
            records_in_current: 0,
            next_seq: next_seq + 1,
        };
        log.prune()?;
        Ok(log)
    }

    /// Append a poll event; `PollEvent::None` is ignored
    pub fn record(&mut self, event: PollEvent) -> Result<()> {
        let (label, bytes) = match event {
            PollEvent::None => return Ok(()),
            PollEvent::RequestTimeout => ("timeout", 0),
            PollEvent::UnrecognizedRequest => ("garbage", 0),
            PollEvent::RequestRejected => ("rejected", 0),
            // Armed responses are logged once fully sent
            PollEvent::ResponseArmed(_) => return Ok(()),
            PollEvent::ExchangeComplete(kind) => (kind_label(kind), wire_len(kind)),
        };

        let record = ExchangeRecord {
            timestamp: Utc::now().to_rfc3339(),
            event: label,
            bytes,
        };

        serde_json::to_writer(&mut self.writer, &record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        self.records_in_current += 1;
        if self.records_in_current >= self.max_records_per_file {
            self.rotate()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer = Self::open_file(&self.dir, self.next_seq)?;
        self.next_seq += 1;
        self.records_in_current = 0;
        self.prune()
    }

    fn open_file(dir: &Path, seq: u64) -> Result<BufWriter<File>> {
        let path = dir.join(format!("{}{:05}{}", FILE_PREFIX, seq, FILE_SUFFIX));
        Ok(BufWriter::new(File::create(path)?))
    }

    /// Log file names in the directory, sorted oldest first
    fn existing_files(dir: &Path) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Delete the oldest files beyond the retention limit
    fn prune(&self) -> Result<()> {
        let names = Self::existing_files(&self.dir)?;
        if names.len() <= self.max_files_to_keep {
            return Ok(());
        }
        for name in &names[..names.len() - self.max_files_to_keep] {
            if let Err(error) = fs::remove_file(self.dir.join(name)) {
                warn!(%error, file = %name, "failed to prune exchange log");
            }
        }
        Ok(())
    }
}

fn kind_label(kind: ResponseKind) -> &'static str {
    match kind {
        ResponseKind::Gps => "gps",
        ResponseKind::Eam => "eam",
        ResponseKind::Text => "text",
    }
}

/// Record length plus the trailing checksum byte
fn wire_len(kind: ResponseKind) -> usize {
    let len = match kind {
        ResponseKind::Gps => protocol::gps::MSG_LEN,
        ResponseKind::Eam => protocol::eam::MSG_LEN,
        ResponseKind::Text => protocol::textmode::MSG_LEN,
    };
    len + 1
}
