// sqldump2csv: stream one table out of a large SQL dump into bounded-size CSV
// chunk files, in a single forward pass with bounded memory.

pub mod config;
pub mod driver;
pub mod error;
pub mod logger;
pub mod parser;
pub mod progress;
pub mod writer;

pub use config::ConvertConfig;
pub use driver::{Anomaly, ProgressEvent, ProgressObserver, RunSummary, StreamDriver};
pub use error::{ConvertError, StatementError};
pub use parser::ArityPolicy;
pub use writer::{ChunkRecord, ChunkSink, ChunkWriter, DirectorySink, MemorySink};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

const INPUT_BUF_BYTES: usize = 1024 * 1024;

// Convert `input` into chunk files under `config.output_dir`.
pub fn convert_file(
    input: &Path,
    config: &ConvertConfig,
    observer: Option<&dyn ProgressObserver>,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<RunSummary, ConvertError> {
    let file = File::open(input)?;
    let reader = BufReader::with_capacity(INPUT_BUF_BYTES, file);
    let mut driver = StreamDriver::new(config, DirectorySink::new(config))?;
    if let Some(observer) = observer {
        driver = driver.with_observer(observer);
    }
    if let Some(flag) = cancel {
        driver = driver.with_cancel_flag(flag);
    }
    driver.run(reader)
}
