// Chunk writer: streams rows into bounded CSV files, one header per file.
// A chunk is opened lazily on its first row and closed as soon as it is full,
// so no empty chunk file is ever created.

use crate::config::ConvertConfig;
use crate::error::ConvertError;
use csv::WriterBuilder;
use serde::Serialize;
use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, warn};

const WRITER_BUF_BYTES: usize = 1024 * 1024;

// Where chunk outputs come from.
pub trait ChunkSink {
    type Output: Write;

    // Open the output for chunk `index`; returns a display location and the writer.
    fn open_chunk(&mut self, index: u32) -> io::Result<(String, Self::Output)>;
}

// Files named by the configured pattern inside the output directory.
pub struct DirectorySink {
    config: ConvertConfig,
}

impl DirectorySink {
    pub fn new(config: &ConvertConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn chunk_path(&self, index: u32) -> PathBuf {
        self.config
            .output_dir
            .join(self.config.chunk_file_name(index))
    }
}

impl ChunkSink for DirectorySink {
    type Output = BufWriter<File>;

    fn open_chunk(&mut self, index: u32) -> io::Result<(String, Self::Output)> {
        let path = self.chunk_path(index);
        let file = File::create(&path)?;
        Ok((
            path.display().to_string(),
            BufWriter::with_capacity(WRITER_BUF_BYTES, file),
        ))
    }
}

// In-memory sink; each chunk is a shared byte buffer.
#[derive(Default)]
pub struct MemorySink {
    chunks: Vec<Rc<RefCell<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    // Contents of every chunk opened so far, in order.
    pub fn contents(&self) -> Vec<String> {
        self.chunks
            .iter()
            .map(|buf| String::from_utf8_lossy(&buf.borrow()).into_owned())
            .collect()
    }
}

pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ChunkSink for MemorySink {
    type Output = SharedBuffer;

    fn open_chunk(&mut self, index: u32) -> io::Result<(String, Self::Output)> {
        let buf = Rc::new(RefCell::new(Vec::new()));
        self.chunks.push(Rc::clone(&buf));
        Ok((format!("memory:{:04}", index), SharedBuffer(buf)))
    }
}

// One closed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkRecord {
    pub index: u32,
    pub location: String,
    pub rows: u64,
}

struct OpenChunk<W: Write> {
    writer: csv::Writer<W>,
    record: ChunkRecord,
}

pub struct ChunkWriter<S: ChunkSink> {
    sink: S,
    chunk_size: u64,
    header: Vec<String>,
    current: Option<OpenChunk<S::Output>>,
    // Id of the most recently opened chunk; 0 before the first row.
    chunk_index: u32,
    closed: Vec<ChunkRecord>,
    rows_written: u64,
}

impl<S: ChunkSink> ChunkWriter<S> {
    pub fn new(sink: S, chunk_size: u64) -> Self {
        Self {
            sink,
            chunk_size: chunk_size.max(1),
            header: Vec::new(),
            current: None,
            chunk_index: 0,
            closed: Vec::new(),
            rows_written: 0,
        }
    }

    // Header written at the top of every chunk opened from now on.
    pub fn set_header(&mut self, header: Vec<String>) {
        self.header = header;
    }

    pub fn write_row(&mut self, row: &[String]) -> Result<(), ConvertError> {
        let OpenChunk { writer, mut record } = match self.current.take() {
            Some(chunk) => chunk,
            None => self.open_next()?,
        };
        let writer = write_fields(writer, row, record.index)?;
        record.rows += 1;
        let chunk = OpenChunk { writer, record };
        self.rows_written += 1;

        if chunk.record.rows >= self.chunk_size {
            self.close(chunk)
        } else {
            self.current = Some(chunk);
            Ok(())
        }
    }

    // Close the open chunk, if it holds any rows.
    pub fn finish(&mut self) -> Result<(), ConvertError> {
        match self.current.take() {
            Some(chunk) if chunk.record.rows > 0 => self.close(chunk),
            Some(chunk) => {
                debug!(chunk = chunk.record.index, "discarding empty chunk");
                Ok(())
            }
            None => Ok(()),
        }
    }

    // Best-effort close after a fatal error; failures are only logged.
    pub fn abort(&mut self) {
        if let Some(mut chunk) = self.current.take() {
            if let Err(e) = chunk.writer.flush() {
                warn!(chunk = chunk.record.index, error = %e, "failed to flush chunk while aborting");
            } else {
                self.closed.push(chunk.record);
            }
        }
    }

    pub fn chunks(&self) -> &[ChunkRecord] {
        &self.closed
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn open_next(&mut self) -> Result<OpenChunk<S::Output>, ConvertError> {
        self.chunk_index += 1;
        let index = self.chunk_index;
        let (location, out) = self
            .sink
            .open_chunk(index)
            .map_err(|source| ConvertError::SinkWrite { chunk: index, source })?;
        let writer = write_fields(csv_writer(out), &self.header, index)?;
        debug!(chunk = index, location = %location, "opened chunk");
        Ok(OpenChunk {
            writer,
            record: ChunkRecord {
                index,
                location,
                rows: 0,
            },
        })
    }

    fn close(&mut self, mut chunk: OpenChunk<S::Output>) -> Result<(), ConvertError> {
        let index = chunk.record.index;
        chunk
            .writer
            .flush()
            .map_err(|source| ConvertError::SinkWrite { chunk: index, source })?;
        debug!(chunk = index, rows = chunk.record.rows, "closed chunk");
        self.closed.push(chunk.record);
        Ok(())
    }
}

fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    WriterBuilder::new().flexible(true).from_writer(out)
}

// Write one record, consuming and returning the writer. csv renders a
// zero-field record as `""`, which reads back as one empty column, so
// zero-width records go out as a bare line terminator instead.
fn write_fields<W: Write>(
    mut writer: csv::Writer<W>,
    fields: &[String],
    chunk: u32,
) -> Result<csv::Writer<W>, ConvertError> {
    if !fields.is_empty() {
        writer
            .write_record(fields)
            .map_err(|e| ConvertError::from_csv(chunk, e))?;
        return Ok(writer);
    }
    let mut out = writer
        .into_inner()
        .map_err(|e| ConvertError::SinkWrite { chunk, source: e.into_error() })?;
    out.write_all(b"\n")
        .map_err(|source| ConvertError::SinkWrite { chunk, source })?;
    Ok(csv_writer(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn header() -> Vec<String> {
        row(&["id", "name"])
    }

    #[test]
    fn test_rolls_over_at_chunk_size() {
        let mut writer = ChunkWriter::new(MemorySink::new(), 3);
        writer.set_header(header());
        for i in 0..7 {
            let id = i.to_string();
            writer.write_row(&row(&[id.as_str(), "x"])).unwrap();
        }
        writer.finish().unwrap();

        let rows: Vec<u64> = writer.chunks().iter().map(|c| c.rows).collect();
        assert_eq!(rows, vec![3, 3, 1]);
        let ids: Vec<u32> = writer.chunks().iter().map(|c| c.index).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        // Data rows across chunks, in file order, reproduce the input order.
        let mut seen = Vec::new();
        for content in writer.sink().contents() {
            let mut lines = content.lines();
            assert_eq!(lines.next(), Some("id,name"));
            seen.extend(lines.map(|l| l.split(',').next().unwrap_or_default().to_string()));
        }
        assert_eq!(seen, (0..7).map(|i| i.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn test_exact_multiple_leaves_no_empty_chunk() {
        let mut writer = ChunkWriter::new(MemorySink::new(), 2);
        writer.set_header(header());
        for _ in 0..4 {
            writer.write_row(&row(&["1", "a"])).unwrap();
        }
        writer.finish().unwrap();
        assert_eq!(writer.chunks().len(), 2);
        assert_eq!(writer.sink().contents().len(), 2);
    }

    #[test]
    fn test_finish_without_rows_creates_nothing() {
        let mut writer = ChunkWriter::new(MemorySink::new(), 10);
        writer.finish().unwrap();
        assert!(writer.chunks().is_empty());
        assert!(writer.sink().contents().is_empty());
        assert_eq!(writer.chunk_index(), 0);
    }

    #[test]
    fn test_fields_are_quoted_when_needed() {
        let mut writer = ChunkWriter::new(MemorySink::new(), 10);
        writer.set_header(header());
        writer.write_row(&row(&["1", "hi, there"])).unwrap();
        writer.write_row(&row(&["2", "say \"x\""])).unwrap();
        writer.write_row(&row(&["3", "two\nlines"])).unwrap();
        writer.finish().unwrap();
        assert_eq!(
            writer.sink().contents()[0],
            "id,name\n1,\"hi, there\"\n2,\"say \"\"x\"\"\"\n3,\"two\nlines\"\n"
        );
    }

    #[test]
    fn test_zero_width_records_are_bare_lines() {
        let mut writer = ChunkWriter::new(MemorySink::new(), 10);
        writer.write_row(&[]).unwrap();
        writer.write_row(&[]).unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.sink().contents(), vec!["\n\n\n".to_string()]);
        assert_eq!(writer.chunks()[0].rows, 2);
    }

    struct FailingSink;

    struct FailingOutput;

    impl Write for FailingOutput {
        fn write(&mut self, _data: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    impl ChunkSink for FailingSink {
        type Output = FailingOutput;

        fn open_chunk(&mut self, _index: u32) -> io::Result<(String, Self::Output)> {
            Ok(("failing".to_string(), FailingOutput))
        }
    }

    #[test]
    fn test_sink_failure_is_reported() {
        // chunk_size 1 forces a flush on the first row.
        let mut writer = ChunkWriter::new(FailingSink, 1);
        writer.set_header(header());
        let err = writer.write_row(&row(&["1", "a"])).unwrap_err();
        assert!(matches!(err, ConvertError::SinkWrite { chunk: 1, .. }));
    }

    #[test]
    fn test_directory_sink_writes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ConvertConfig::new(dir.path(), "users");
        let mut writer = ChunkWriter::new(DirectorySink::new(&config), 1);
        writer.set_header(header());
        writer.write_row(&row(&["1", "a"])).unwrap();
        writer.write_row(&row(&["2", "b"])).unwrap();
        writer.finish().unwrap();

        let second = std::fs::read_to_string(dir.path().join("users_part_0002.csv")).unwrap();
        assert_eq!(second, "id,name\n2,b\n");
        assert_eq!(writer.chunks()[0].location, dir.path().join("users_part_0001.csv").display().to_string());
    }
}
