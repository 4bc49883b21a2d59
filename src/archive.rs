//! Zip packaging of a frame collection.
//!
//! [`ArchiveBuilder`] writes every stored frame of a [`FrameCollection`]
//! into one in-memory zip file. The encoded bytes are copied as-is; nothing
//! is re-encoded. An empty collection produces no archive at all.
//!
//! # Example
//!
//! ```no_run
//! use framepack::{ArchiveBuilder, ExtractOptions, ExtractionSession};
//!
//! let mut session = ExtractionSession::open("input.mp4", ExtractOptions::new())?;
//! let frames = session.extract(2.0)?;
//! if let Some(archive) = ArchiveBuilder::new().build(&frames)? {
//!     archive.save("frames.zip")?;
//! }
//! # Ok::<(), framepack::FramepackError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

use async_zip::base::read::mem::ZipFileReader;
use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use futures_lite::future::block_on;
use futures_lite::io::Cursor;

use crate::{
    error::FramepackError,
    packager::{EncodedFrame, FrameCollection},
    progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker},
};

/// Default file name offered for a saved archive.
pub const DEFAULT_ARCHIVE_NAME: &str = "frames.zip";

/// How entries are stored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveCompression {
    /// No compression. Fastest; PNG and JPEG barely shrink anyway.
    Stored,
    /// Deflate. This is the default.
    #[default]
    Deflate,
}

impl ArchiveCompression {
    fn to_zip(self) -> Compression {
        match self {
            ArchiveCompression::Stored => Compression::Stored,
            ArchiveCompression::Deflate => Compression::Deflate,
        }
    }
}

/// A finished zip file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    bytes: Vec<u8>,
    entry_count: usize,
}

impl Archive {
    /// The complete zip file.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the archive, returning the zip bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of entries written.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Write the archive to `path`, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FramepackError> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes)?;
        log::info!(
            "Saved {} entries ({} bytes) to {}",
            self.entry_count,
            self.bytes.len(),
            path.display()
        );
        Ok(())
    }
}

/// One file read back from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry file name.
    pub name: String,
    /// Uncompressed contents.
    pub data: Vec<u8>,
}

/// Builds zip archives from frame collections.
#[derive(Clone)]
pub struct ArchiveBuilder {
    compression: ArchiveCompression,
    prefix: String,
    progress: Arc<dyn ProgressCallback>,
}

impl Debug for ArchiveBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ArchiveBuilder")
            .field("compression", &self.compression)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    /// A deflate builder with the `frame` name prefix.
    pub fn new() -> Self {
        Self {
            compression: ArchiveCompression::default(),
            prefix: "frame".to_string(),
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Entry compression method.
    #[must_use]
    pub fn with_compression(mut self, compression: ArchiveCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Prefix of every entry name.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Report one progress step per entry written.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Entry name for `frame`: `<prefix>_<index:05>_<seconds:.3>s.<ext>`.
    pub fn entry_name(&self, frame: &EncodedFrame) -> String {
        format!(
            "{}_{:05}_{:.3}s.{}",
            self.prefix,
            frame.index,
            frame.timestamp.as_secs_f64(),
            frame.format.extension()
        )
    }

    /// Package every frame of `collection`.
    ///
    /// Returns `Ok(None)` when the collection is empty.
    ///
    /// # Errors
    ///
    /// [`FramepackError::ArchiveError`] if the zip writer fails.
    pub fn build(&self, collection: &FrameCollection) -> Result<Option<Archive>, FramepackError> {
        if collection.is_empty() {
            log::debug!("Nothing to archive");
            return Ok(None);
        }

        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.progress),
            OperationType::ArchiveBuilding,
            Some(collection.len() as u64),
            1,
        );
        let compression = self.compression.to_zip();

        let bytes = block_on(async {
            let mut writer = ZipFileWriter::new(Cursor::new(Vec::new()));
            for frame in collection {
                let entry = ZipEntryBuilder::new(self.entry_name(frame).into(), compression);
                writer.write_entry_whole(entry, &frame.data).await?;
                tracker.advance(Some(frame.index), Some(frame.timestamp));
            }
            let cursor = writer.close().await?;
            Ok::<_, FramepackError>(cursor.into_inner())
        })?;
        tracker.finish();

        log::info!(
            "Built archive with {} entries ({} bytes, {:?})",
            collection.len(),
            bytes.len(),
            self.compression
        );
        Ok(Some(Archive {
            bytes,
            entry_count: collection.len(),
        }))
    }
}

/// Read every entry of a zip file, in archive order.
pub fn unpack(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, FramepackError> {
    block_on(async {
        let reader = ZipFileReader::new(bytes.to_vec()).await?;
        let count = reader.file().entries().len();
        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            let mut entry_reader = reader.reader_with_entry(index).await?;
            let name = entry_reader
                .entry()
                .filename()
                .as_str()?
                .to_string();
            let mut data = Vec::new();
            entry_reader.read_to_end_checked(&mut data).await?;
            entries.push(ArchiveEntry { name, data });
        }
        Ok::<_, FramepackError>(entries)
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::packager::FrameImageFormat;

    fn frame(index: u64, seconds: f64) -> EncodedFrame {
        EncodedFrame {
            index,
            timestamp: Duration::from_secs_f64(seconds),
            presentation_time: Duration::from_secs_f64(seconds),
            width: 1,
            height: 1,
            format: FrameImageFormat::Png,
            data: vec![index as u8],
        }
    }

    #[test]
    fn entry_names_are_padded_and_sortable() {
        let builder = ArchiveBuilder::new();
        assert_eq!(builder.entry_name(&frame(0, 0.0)), "frame_00000_0.000s.png");
        assert_eq!(builder.entry_name(&frame(12, 24.5)), "frame_00012_24.500s.png");
    }

    #[test]
    fn prefix_is_configurable() {
        let builder = ArchiveBuilder::new().with_prefix("still");
        assert_eq!(builder.entry_name(&frame(3, 1.0)), "still_00003_1.000s.png");
    }

    #[test]
    fn garbage_is_not_an_archive() {
        let error = unpack(b"not a zip").unwrap_err();
        assert!(matches!(error, FramepackError::ArchiveError(_)));
    }
}
