//! Columnar file reader.
//!
//! All page bytes flow through the [`ByteRangeReader`] boundary, the seam
//! where an external I/O scheduler, cancellation, or timeouts plug in; the
//! default implementation serves ranges from a read-only memory map.
//! `Cancelled` and `Timeout` errors raised by an implementation propagate
//! unchanged.

use super::footer::{Footer, FOOTER_SIZE};
use super::page::{read_page, Page};
use super::{parse_header, HEADER_SIZE};
use crate::array::{Array, RecordBatch, Schema};
use crate::error::{Error, ErrorCode, Result};
use bytes::Bytes;
use memmap2::Mmap;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Byte-range source for page reads.
///
/// Implementations must be cheap to call concurrently; `read_column`
/// fetches the pages of a column in parallel.
pub trait ByteRangeReader: Send + Sync {
    /// Total length of the underlying file.
    fn len(&self) -> u64;

    /// Returns true for a zero-length source.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads `length` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` for ranges past the end; implementations may also
    /// surface `Cancelled` or `Timeout`.
    fn read_range(&self, offset: u64, length: usize) -> Result<Bytes>;
}

/// Default [`ByteRangeReader`] over a read-only memory map.
pub struct MmapByteRangeReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MmapByteRangeReader {
    /// Maps the file read-only.
    ///
    /// # Errors
    ///
    /// I/O errors propagate with path context.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::from(e).op("reader::open").path(&path))?;
        // SAFETY: the map is read-only and private to this reader; writers
        // finalize files before readers open them.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::from(e).op("reader::open").path(&path))?;
        Ok(Self { mmap, path })
    }
}

impl ByteRangeReader for MmapByteRangeReader {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_range(&self, offset: u64, length: usize) -> Result<Bytes> {
        let end = offset
            .checked_add(length as u64)
            .filter(|&end| end <= self.len())
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::UnexpectedEof,
                    format!("range {offset}+{length} past end of {}-byte file", self.len()),
                )
                .op("reader::read_range")
                .path(&self.path)
                .offset(offset)
            })?;
        #[allow(clippy::cast_possible_truncation)]
        Ok(Bytes::copy_from_slice(&self.mmap[offset as usize..end as usize]))
    }
}

/// Reader for one columnar file.
///
/// Concurrent `read_*` calls are safe; `close` is exclusive and further
/// reads fail.
pub struct FileReader {
    source: Arc<dyn ByteRangeReader>,
    schema: Schema,
    num_rows: u64,
    footer: Footer,
    closed: RwLock<bool>,
}

impl std::fmt::Debug for FileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReader")
            .field("schema", &self.schema)
            .field("num_rows", &self.num_rows)
            .field("footer", &self.footer)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl FileReader {
    /// Opens a file through the default mmap source.
    ///
    /// # Errors
    ///
    /// `InvalidMagic` / `VersionMismatch` / `CorruptedFile` for format
    /// violations; I/O errors propagate.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let source = MmapByteRangeReader::open(&path)?;
        Self::open_with_source(Arc::new(source))
    }

    /// Opens a file through a caller-supplied byte-range source.
    ///
    /// # Errors
    ///
    /// Same as [`FileReader::open`].
    pub fn open_with_source(source: Arc<dyn ByteRangeReader>) -> Result<Self> {
        let file_len = source.len();
        if file_len < (HEADER_SIZE + FOOTER_SIZE) as u64 {
            return Err(Error::corrupted(format!(
                "file is {file_len} bytes, smaller than header + footer"
            ))
            .op("reader::open"));
        }

        let header_bytes = source.read_range(0, HEADER_SIZE)?;
        let (schema, num_rows) = parse_header(&header_bytes)?;

        let footer_offset = file_len - FOOTER_SIZE as u64;
        let footer_bytes = source.read_range(footer_offset, FOOTER_SIZE)?;
        let footer = Footer::from_bytes(&footer_bytes)?;

        // Every page must land inside the page stream.
        for entry in &footer.pages {
            let (lo, size) = (entry.offset, i64::from(entry.size));
            #[allow(clippy::cast_possible_wrap)]
            let stream_end = footer_offset as i64;
            if lo < HEADER_SIZE as i64 || size <= 0 || lo.saturating_add(size) > stream_end {
                return Err(Error::corrupted(format!(
                    "page index entry (column {}, page {}) spans {lo}..{} outside the page stream",
                    entry.column_index,
                    entry.page_number,
                    lo.saturating_add(size)
                ))
                .op("reader::open")
                .offset(entry.offset.max(0) as u64));
            }
        }

        debug!(
            rows = num_rows,
            pages = footer.pages.len(),
            version = ?footer.version,
            "opened columnar file"
        );
        Ok(Self {
            source,
            schema,
            num_rows,
            footer,
            closed: RwLock::new(false),
        })
    }

    /// The file schema.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Total rows recorded at close time.
    #[must_use]
    pub const fn num_rows(&self) -> u64 {
        self.num_rows
    }

    /// Footer metadata.
    #[must_use]
    pub const fn metadata(&self) -> &std::collections::BTreeMap<String, String> {
        &self.footer.metadata
    }

    /// Footer feature bitmap. The core understands the row-index and
    /// block-cache bits but does not own their semantics.
    #[must_use]
    pub const fn features(&self) -> u32 {
        self.footer.features
    }

    fn ensure_open(&self, op: &'static str) -> Result<()> {
        if *self.closed.read() {
            return Err(Error::invalid_argument("reader is closed").op(op));
        }
        Ok(())
    }

    /// Reads and decodes every page of a column, concatenated in page
    /// order.
    ///
    /// Pages are fetched in parallel through the byte-range source;
    /// per-column order is preserved in the output.
    ///
    /// # Errors
    ///
    /// `ColumnNotFound` for out-of-range columns, `PageNotFound` when the
    /// footer lists no pages for an existing column with rows, decode and
    /// corruption errors otherwise.
    pub fn read_column(&self, column_index: usize) -> Result<Array> {
        self.ensure_open("reader::read_column")?;
        let field = self.schema.field(column_index)?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let entries = self.footer.pages_of(column_index as i32);
        if entries.is_empty() {
            // Zero-row files legitimately index no pages.
            if self.num_rows == 0 {
                return Ok(Array::empty(&field.data_type));
            }
            return Err(Error::new(
                ErrorCode::PageNotFound,
                format!("no pages recorded for column {column_index}"),
            )
            .op("reader::read_column"));
        }

        let arrays: Vec<Array> = entries
            .par_iter()
            .map(|entry| {
                #[allow(clippy::cast_sign_loss)]
                let bytes = self
                    .source
                    .read_range(entry.offset as u64, entry.size as usize)?;
                let page = Page::from_bytes(&bytes).map_err(|e| {
                    e.ctx("column", entry.column_index.to_string())
                        .ctx("page", entry.page_number.to_string())
                })?;
                if page.num_values != entry.num_values || page.encoding != entry.encoding {
                    return Err(Error::corrupted(format!(
                        "page header disagrees with the footer index for column {}, page {}",
                        entry.column_index, entry.page_number
                    ))
                    .op("reader::read_column")
                    .offset(entry.offset as u64));
                }
                read_page(&page, &field.data_type)
            })
            .collect::<Result<_>>()?;

        Array::concat(&arrays)
    }

    /// Reads the whole file into a single batch.
    ///
    /// # Errors
    ///
    /// Propagates column read errors; `CorruptedFile` when columns
    /// disagree on length.
    pub fn read_batch(&self) -> Result<RecordBatch> {
        self.ensure_open("reader::read_batch")?;
        let columns: Vec<Array> = (0..self.schema.len())
            .map(|i| self.read_column(i))
            .collect::<Result<_>>()?;
        let batch = RecordBatch::new(self.schema.clone(), columns)
            .map_err(|e| Error::corrupted("columns disagree on row count").caused_by(e))?;
        if batch.num_rows() as u64 != self.num_rows {
            return Err(Error::corrupted(format!(
                "file declares {} rows, pages decode to {}",
                self.num_rows,
                batch.num_rows()
            ))
            .op("reader::read_batch"));
        }
        Ok(batch)
    }

    /// Closes the reader; subsequent reads and a second close fail.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when already closed.
    pub fn close(&self) -> Result<()> {
        let mut closed = self.closed.write();
        if *closed {
            return Err(Error::invalid_argument("reader already closed").op("reader::close"));
        }
        *closed = true;
        Ok(())
    }
}
