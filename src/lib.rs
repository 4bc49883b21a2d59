//! # framepack
//!
//! Sample still frames from a video at a fixed interval, package them as
//! images in a zip archive, and optionally re-encode them into a new video
//! at a different speed or in reverse.
//!
//! Decoding, scaling and video encoding are done by FFmpeg through
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next); images are encoded
//! with [`image`]; archives are written with
//! [`async_zip`](https://crates.io/crates/async_zip).
//!
//! ## Quick Start
//!
//! ### Frames to a zip archive
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
//!
//! ### Reverse at double speed
//!
//! ```no_run
//! use framepack::{ExtractOptions, ExtractionSession, ReencodeOptions, Reencoder};
//!
//! let mut session = ExtractionSession::open("input.mp4", ExtractOptions::new())?;
//! let frames = session.extract(1.0 / 30.0)?;
//! let reencoder = Reencoder::new(
//!     ReencodeOptions::new().with_speed_factor(2.0).with_reverse(true),
//! )?;
//! reencoder.write(&frames, "reversed.webm")?;
//! # Ok::<(), framepack::FramepackError>(())
//! ```
//!
//! ## Sampling strategies
//!
//! | Strategy | Behaviour |
//! |----------|-----------|
//! | `SeekAndWait` | Seek to every sample time, decode until the seek lands |
//! | `FrameCallback` | Decode forward, take the next frame reaching each time (default) |
//! | `Accelerated` | Decode once on a GPU, keep every Nth frame (`hardware` feature) |
//!
//! ## Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`sample_stream`] yields frames from a Tokio blocking thread |
//! | `hardware` | Accelerated sampling (CUDA, VAAPI, DXVA2, D3D11VA, VideoToolbox, QSV) |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries (libavcodec, libavformat, libavutil,
//! libswscale) must be installed. Re-encoding to WebM needs an FFmpeg built
//! with libvpx.

pub mod archive;
pub mod backend;
pub mod config;
mod conversion;
mod decode;
pub mod error;
#[cfg(feature = "hardware")]
pub mod hardware;
pub mod logging;
pub mod metadata;
pub mod packager;
pub mod progress;
pub mod readiness;
pub mod reencode;
pub mod sampler;
pub mod schedule;
pub mod session;
pub mod source;
#[cfg(feature = "async")]
pub mod stream;

pub use archive::{
    Archive, ArchiveBuilder, ArchiveCompression, ArchiveEntry, DEFAULT_ARCHIVE_NAME, unpack,
};
pub use backend::{CapturedFrame, FrameBackend, SamplingStrategy, select_backend};
pub use config::{ExtractOptions, PixelFormat};
pub use decode::{FrameCallbackBackend, SeekAndWaitBackend};
pub use error::FramepackError;
#[cfg(feature = "hardware")]
pub use hardware::{
    AcceleratedBackend, HardwareAccelerationMode, HardwareDeviceType, available_hardware_devices,
};
pub use logging::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use metadata::SourceMetadata;
pub use packager::{
    EncodedFrame, FrameCollection, FrameEncoder, FrameImageFormat, Packager, Thumbnail,
    ThumbnailOptions,
};
pub use progress::{OperationType, ProgressCallback, ProgressInfo};
pub use readiness::{DEFAULT_DECODE_TIMEOUT, Deadline, WaitCondition};
pub use reencode::{FramePacing, ReencodeOptions, Reencoder, VideoCodec, playback_order};
pub use sampler::{FrameSampler, SampledFrame, Samples};
pub use schedule::{MAX_SCHEDULE_LEN, SampleSchedule};
pub use session::{ExtractionSession, RunGate, RunPermit};
pub use source::MediaSource;
#[cfg(feature = "async")]
pub use stream::{FrameStream, sample_stream};
