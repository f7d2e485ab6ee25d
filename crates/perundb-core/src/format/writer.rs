//! Columnar file writer.
//!
//! Write sequence: zero-padded header up front, pages appended per batch,
//! footer + finalized header at close. The header rewrite is in place; the
//! 8 KiB reservation guarantees no page moves.

use super::footer::{Footer, PageIndexEntry};
use super::page::write_page;
use super::{serialize_header, HEADER_SIZE};
use crate::array::{RecordBatch, Schema};
use crate::encoding::EncoderConfig;
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Streaming writer for one columnar file.
#[derive(Debug)]
pub struct FileWriter {
    file: File,
    path: PathBuf,
    schema: Schema,
    config: EncoderConfig,
    pages: Vec<PageIndexEntry>,
    /// Next page number per column.
    page_numbers: FxHashMap<i32, i32>,
    metadata: BTreeMap<String, String>,
    num_rows: u64,
    offset: u64,
    closed: bool,
}

impl FileWriter {
    /// Creates the file and reserves the header region.
    ///
    /// # Errors
    ///
    /// `MetadataError` when the schema does not serialize within the
    /// header reservation; `InvalidArgument` for invalid schemas; I/O
    /// errors propagate with path context.
    pub fn create(
        path: impl AsRef<Path>,
        schema: Schema,
        config: EncoderConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        schema.validate()?;
        // Serialize up front so oversized schemas fail before any I/O.
        let header = serialize_header(&schema, 0)?;

        let mut file = File::create(&path)
            .map_err(|e| Error::from(e).op("writer::create").path(&path))?;
        file.write_all(&header)
            .map_err(|e| Error::from(e).op("writer::create").path(&path))?;

        debug!(path = %path.display(), columns = schema.len(), "created columnar file");
        Ok(Self {
            file,
            path,
            schema,
            config,
            pages: Vec::new(),
            page_numbers: FxHashMap::default(),
            metadata: BTreeMap::new(),
            num_rows: 0,
            offset: HEADER_SIZE as u64,
            closed: false,
        })
    }

    /// The writer's schema.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Rows written so far.
    #[must_use]
    pub const fn num_rows(&self) -> u64 {
        self.num_rows
    }

    /// Adds a key/value pair to the footer metadata.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Appends one page per column for the batch.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` after close or for empty batches, `SchemaMismatch`
    /// when the batch schema differs from the writer schema.
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_argument("writer is closed").op("writer::write_batch"));
        }
        if batch.num_rows() == 0 {
            return Err(Error::invalid_argument("batch has no rows").op("writer::write_batch"));
        }
        if *batch.schema() != self.schema {
            return Err(Error::schema_mismatch("batch schema differs from the writer schema")
                .op("writer::write_batch")
                .path(&self.path));
        }

        for (i, array) in batch.columns().iter().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let column_index = i as i32;
            let page = write_page(array, column_index, &self.config)
                .map_err(|e| e.path(&self.path))?;
            let bytes = page.to_bytes();
            self.file
                .write_all(&bytes)
                .map_err(|e| Error::from(e).op("writer::write_batch").path(&self.path))?;

            let page_number = self.page_numbers.entry(column_index).or_insert(0);
            #[allow(clippy::cast_possible_wrap)]
            self.pages.push(PageIndexEntry {
                column_index,
                page_number: *page_number,
                offset: self.offset as i64,
                size: bytes.len() as i32,
                num_values: page.num_values,
                encoding: page.encoding,
            });
            *page_number += 1;
            self.offset += bytes.len() as u64;
        }

        self.num_rows += batch.num_rows() as u64;
        Ok(())
    }

    /// Writes the footer, finalizes the header row count, and syncs.
    ///
    /// # Errors
    ///
    /// A second close returns `InvalidArgument`; footer overflow returns
    /// `MetadataError`; I/O errors propagate.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_argument("writer already closed").op("writer::close"));
        }

        let footer = Footer::new(std::mem::take(&mut self.pages), std::mem::take(&mut self.metadata));
        let footer_bytes = footer.to_bytes().map_err(|e| e.path(&self.path))?;
        self.file
            .seek(SeekFrom::Start(self.offset))
            .and_then(|_| self.file.write_all(&footer_bytes))
            .map_err(|e| Error::from(e).op("writer::close").path(&self.path))?;

        // Rewrite the header in place with the final row count.
        let header = serialize_header(&self.schema, self.num_rows)?;
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.write_all(&header))
            .and_then(|_| self.file.sync_all())
            .map_err(|e| Error::from(e).op("writer::close").path(&self.path))?;

        self.closed = true;
        info!(
            path = %self.path.display(),
            rows = self.num_rows,
            pages = footer.pages.len(),
            "closed columnar file"
        );
        Ok(())
    }
}
