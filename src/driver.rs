// Stream driver: a single forward pass over the dump. Lines are assembled into
// CREATE TABLE / INSERT statements for the target table and dispatched to the
// parsers and the chunk writer. Only one statement and one chunk are ever held.

use crate::config::ConvertConfig;
use crate::error::{ConvertError, StatementError};
use crate::parser::insert::expand_insert;
use crate::parser::scanner::QuoteScanner;
use crate::parser::schema::{extract_columns, StatementKind, StatementMatcher};
use crate::parser::Schema;
use crate::writer::{ChunkRecord, ChunkSink, ChunkWriter};
use serde::Serialize;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const READ_BUF_BYTES: usize = 64 * 1024;

// Snapshot handed to the progress collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub line: u64,
    pub bytes: u64,
    pub statements: u64,
    pub rows: u64,
    pub chunks: u32,
    pub elapsed: Duration,
}

// Receives progress events; it cannot influence the run.
pub trait ProgressObserver {
    fn on_progress(&self, event: &ProgressEvent);

    fn on_finish(&self, _summary: &RunSummary) {}
}

// Recovered, non-fatal conditions surfaced in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    // Row data arrived (or the run ended) without a schema statement.
    SchemaNotFound { line: u64 },
    // The schema statement declared no recognizable columns.
    EmptySchema { line: u64 },
    // A later schema statement for the same table; ignored.
    DuplicateSchema { line: u64 },
    // A schema statement after rows were already written without one; ignored.
    LateSchema { line: u64 },
    MalformedStatement { line: u64, reason: StatementError },
    // Input ended or the run was interrupted mid-statement.
    UnterminatedStatement { line: u64 },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub table: String,
    pub schema: Schema,
    pub lines_read: u64,
    pub bytes_read: u64,
    pub statements: u64,
    pub rows_written: u64,
    pub rows_padded: u64,
    pub rows_truncated: u64,
    pub rows_rejected: u64,
    pub chunks: Vec<ChunkRecord>,
    pub anomalies: Vec<Anomaly>,
    pub interrupted: bool,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Seeking,
    AccumulatingSchema,
    AccumulatingInsert,
}

// Text of one statement spanning one or more physical lines.
#[derive(Default)]
struct RawStatement {
    text: String,
    scanner: QuoteScanner,
    start_line: u64,
}

impl RawStatement {
    fn begin(&mut self, line: &str, line_no: u64) -> bool {
        self.text.clear();
        self.scanner = QuoteScanner::new();
        self.start_line = line_no;
        self.append(line)
    }

    // Append a line; true once a top-level `;` is seen. Whatever follows the
    // terminator on that line (usually a trailing comment) is dropped.
    fn append(&mut self, line: &str) -> bool {
        for (i, c) in line.char_indices() {
            if self.scanner.advance(c) && c == ';' {
                self.text.push_str(&line[..=i]);
                return true;
            }
        }
        self.text.push_str(line);
        false
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

pub struct StreamDriver<'a, S: ChunkSink> {
    config: ConvertConfig,
    matcher: StatementMatcher,
    writer: ChunkWriter<S>,
    schema: Option<Schema>,
    state: DriverState,
    raw: RawStatement,
    summary: RunSummary,
    schema_missing_reported: bool,
    observer: Option<&'a dyn ProgressObserver>,
    cancel: Option<Arc<AtomicBool>>,
    started: Instant,
}

impl<'a, S: ChunkSink> StreamDriver<'a, S> {
    pub fn new(config: &ConvertConfig, sink: S) -> Result<Self, ConvertError> {
        config.validate()?;
        let matcher = StatementMatcher::new(&config.table)
            .map_err(|e| ConvertError::Config(format!("table pattern: {}", e)))?;
        Ok(Self {
            config: config.clone(),
            matcher,
            writer: ChunkWriter::new(sink, config.chunk_size),
            schema: None,
            state: DriverState::Seeking,
            raw: RawStatement::default(),
            summary: RunSummary {
                table: config.table.clone(),
                ..RunSummary::default()
            },
            schema_missing_reported: false,
            observer: None,
            cancel: None,
            started: Instant::now(),
        })
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    // Checked before every line; once set the run stops gracefully.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    // Consume the whole input. Only sink or read failures return Err.
    pub fn run<R: BufRead>(&mut self, mut reader: R) -> Result<RunSummary, ConvertError> {
        self.started = Instant::now();
        let mut buf = Vec::with_capacity(READ_BUF_BYTES);

        loop {
            if self.is_cancelled() {
                info!(line = self.summary.lines_read, "interrupted, closing open chunk");
                self.summary.interrupted = true;
                break;
            }
            buf.clear();
            let n = match reader.read_until(b'\n', &mut buf) {
                Ok(n) => n,
                Err(e) => {
                    error!(line = self.summary.lines_read, error = %e, "failed to read input");
                    self.writer.abort();
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }
            self.summary.lines_read += 1;
            self.summary.bytes_read += n as u64;

            // Undecodable bytes are replaced, never fatal.
            let line = String::from_utf8_lossy(&buf);
            if let Err(e) = self.process_line(&line) {
                error!(line = self.summary.lines_read, error = %e, "aborting run");
                self.writer.abort();
                return Err(e);
            }

            if self.config.progress_interval > 0
                && self.summary.lines_read % self.config.progress_interval == 0
            {
                self.emit_progress();
            }
        }

        self.end_of_input();
        if let Err(e) = self.writer.finish() {
            error!(error = %e, "failed to close final chunk");
            self.writer.abort();
            return Err(e);
        }
        self.emit_progress();

        let mut summary = std::mem::take(&mut self.summary);
        summary.schema = self.schema.clone().unwrap_or_default();
        summary.rows_written = self.writer.rows_written();
        summary.chunks = self.writer.chunks().to_vec();
        summary.elapsed_ms = self.started.elapsed().as_millis();
        if let Some(observer) = self.observer {
            observer.on_finish(&summary);
        }
        Ok(summary)
    }

    pub fn sink(&self) -> &S {
        self.writer.sink()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    fn process_line(&mut self, line: &str) -> Result<(), ConvertError> {
        let line_no = self.summary.lines_read;
        match self.state {
            DriverState::Seeking => {
                let trimmed = line.trim();
                if trimmed.is_empty()
                    || trimmed.starts_with("--")
                    || trimmed.starts_with("/*")
                    || trimmed.starts_with('#')
                {
                    return Ok(());
                }
                match self.matcher.classify(line) {
                    Some(StatementKind::Schema) => {
                        debug!(line = line_no, "found CREATE TABLE for {}", self.config.table);
                        self.state = DriverState::AccumulatingSchema;
                        if self.raw.begin(line, line_no) {
                            self.complete_schema();
                        }
                    }
                    Some(StatementKind::Insert) => {
                        self.state = DriverState::AccumulatingInsert;
                        if self.raw.begin(line, line_no) {
                            self.dispatch_insert()?;
                        }
                    }
                    None => {}
                }
            }
            // Comments and blank lines are content while accumulating.
            DriverState::AccumulatingSchema => {
                if self.raw.append(line) {
                    self.complete_schema();
                }
            }
            DriverState::AccumulatingInsert => {
                if self.raw.append(line) {
                    self.dispatch_insert()?;
                }
            }
        }
        Ok(())
    }

    fn complete_schema(&mut self) {
        self.state = DriverState::Seeking;
        let text = self.raw.take();
        let line = self.raw.start_line;
        if self.schema_missing_reported {
            warn!(line, "ignoring CREATE TABLE for {} after schema-less rows", self.config.table);
            self.summary.anomalies.push(Anomaly::LateSchema { line });
            return;
        }
        if self.schema.is_some() {
            warn!(line, "ignoring repeated CREATE TABLE for {}", self.config.table);
            self.summary.anomalies.push(Anomaly::DuplicateSchema { line });
            return;
        }

        let columns = extract_columns(&text);
        if columns.is_empty() {
            warn!(line, "CREATE TABLE for {} declares no columns", self.config.table);
            self.summary.anomalies.push(Anomaly::EmptySchema { line });
        } else {
            info!(line, columns = columns.len(), "schema for {}: {}", self.config.table, columns.join(", "));
        }
        self.writer.set_header(columns.clone());
        self.schema = Some(columns);
    }

    fn dispatch_insert(&mut self) -> Result<(), ConvertError> {
        self.state = DriverState::Seeking;
        let text = self.raw.take();
        let line = self.raw.start_line;
        self.summary.statements += 1;

        // The first schema-less INSERT fixes the schema as empty for the run.
        if self.schema.is_none() {
            warn!(line, "INSERT for {} before any CREATE TABLE; rows will be empty", self.config.table);
            self.summary.anomalies.push(Anomaly::SchemaNotFound { line });
            self.schema_missing_reported = true;
            self.schema = Some(Vec::new());
        }
        let schema = self.schema.as_deref().unwrap_or_default();

        let expanded = match expand_insert(&text, schema, self.config.arity) {
            Ok(expanded) => expanded,
            Err(reason) => {
                warn!(line, %reason, "skipping malformed INSERT");
                self.summary
                    .anomalies
                    .push(Anomaly::MalformedStatement { line, reason });
                return Ok(());
            }
        };

        if expanded.rejected > 0 {
            debug!(line, rejected = expanded.rejected, "skipped tuples with mismatched arity");
        }
        self.summary.rows_padded += expanded.padded;
        self.summary.rows_truncated += expanded.truncated;
        self.summary.rows_rejected += expanded.rejected;

        for row in &expanded.rows {
            self.writer.write_row(row)?;
        }
        debug!(line, rows = expanded.rows.len(), "dispatched INSERT");
        self.emit_progress();
        Ok(())
    }

    fn end_of_input(&mut self) {
        if self.state != DriverState::Seeking {
            let line = self.raw.start_line;
            warn!(line, open_literal = self.raw.scanner.in_quotes(), "dropping unterminated statement");
            self.summary
                .anomalies
                .push(Anomaly::UnterminatedStatement { line });
            self.raw.take();
            self.state = DriverState::Seeking;
        }
        if self.schema.is_none() {
            warn!("no CREATE TABLE found for {}", self.config.table);
            self.summary.anomalies.push(Anomaly::SchemaNotFound {
                line: self.summary.lines_read,
            });
            self.schema_missing_reported = true;
        }
    }

    fn emit_progress(&self) {
        let event = ProgressEvent {
            line: self.summary.lines_read,
            bytes: self.summary.bytes_read,
            statements: self.summary.statements,
            rows: self.writer.rows_written(),
            chunks: self.writer.chunk_index(),
            elapsed: self.started.elapsed(),
        };
        match self.observer {
            Some(observer) => observer.on_progress(&event),
            None => debug!(
                line = event.line,
                rows = event.rows,
                elapsed_ms = event.elapsed.as_millis() as u64,
                "progress"
            ),
        }
    }
}
