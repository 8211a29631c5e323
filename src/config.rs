// Run parameters consumed by the converter. Built once by the CLI and never
// mutated during a run.

use crate::error::ConvertError;
use crate::parser::ArityPolicy;
use std::path::PathBuf;

pub const DEFAULT_CHUNK_SIZE: u64 = 100_000;
pub const DEFAULT_PATTERN: &str = "{table}_part_{n}.csv";
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub output_dir: PathBuf,
    pub table: String,
    // Data rows per chunk file, header excluded.
    pub chunk_size: u64,
    // File name template; `{n}` is the 4-digit chunk id, `{table}` the table.
    pub pattern: String,
    pub arity: ArityPolicy,
    // Lines between periodic progress events.
    pub progress_interval: u64,
}

impl ConvertConfig {
    pub fn new(output_dir: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            table: table.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            pattern: DEFAULT_PATTERN.to_string(),
            arity: ArityPolicy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn chunk_size(mut self, rows: u64) -> Self {
        self.chunk_size = rows;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn arity(mut self, arity: ArityPolicy) -> Self {
        self.arity = arity;
        self
    }

    pub fn progress_interval(mut self, lines: u64) -> Self {
        self.progress_interval = lines;
        self
    }

    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.table.trim().is_empty() {
            return Err(ConvertError::Config("table name is empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(ConvertError::Config("chunk size must be at least 1".to_string()));
        }
        if !self.pattern.contains("{n}") {
            return Err(ConvertError::Config(format!(
                "output pattern {:?} has no {{n}} placeholder",
                self.pattern
            )));
        }
        Ok(())
    }

    // File name for chunk `index`, e.g. `users_part_0003.csv`.
    pub fn chunk_file_name(&self, index: u32) -> String {
        self.pattern
            .replace("{table}", &self.table)
            .replace("{n}", &format!("{:04}", index))
    }
}
