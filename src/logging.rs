//! FFmpeg console verbosity.
//!
//! FFmpeg writes its own diagnostics to stderr, independently of the `log`
//! facade this crate logs through. [`set_ffmpeg_log_level`] tunes that
//! output; configure Rust-side logging with a `log` implementation such as
//! `env_logger`.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ffmpeg_next::util::log::Level;

/// FFmpeg's stderr verbosity, quietest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FfmpegLogLevel {
    /// No output.
    Quiet,
    /// Unrecoverable errors only.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings. FFmpeg's own default.
    Warning,
    /// Informational messages.
    Info,
    /// Debugging output.
    Debug,
}

impl FfmpegLogLevel {
    const NAMES: [(&'static str, FfmpegLogLevel); 6] = [
        ("quiet", FfmpegLogLevel::Quiet),
        ("fatal", FfmpegLogLevel::Fatal),
        ("error", FfmpegLogLevel::Error),
        ("warning", FfmpegLogLevel::Warning),
        ("info", FfmpegLogLevel::Info),
        ("debug", FfmpegLogLevel::Debug),
    ];

    fn to_ffmpeg(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }

    fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, level)| *level == self)
            .map_or("warning", |(name, _)| name)
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.to_ascii_lowercase();
        let lowered = if lowered == "warn" { "warning" } else { lowered.as_str() };
        Self::NAMES
            .iter()
            .find(|(name, _)| *name == lowered)
            .map(|(_, level)| *level)
            .ok_or_else(|| {
                format!("unknown FFmpeg log level '{value}' (expected quiet, fatal, error, warning, info or debug)")
            })
    }
}

/// Set FFmpeg's stderr verbosity for the whole process.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Quiet".parse::<FfmpegLogLevel>(), Ok(FfmpegLogLevel::Quiet));
        assert_eq!("warn".parse::<FfmpegLogLevel>(), Ok(FfmpegLogLevel::Warning));
        assert!("loud".parse::<FfmpegLogLevel>().is_err());
    }

    #[test]
    fn display_matches_parse() {
        for (name, level) in FfmpegLogLevel::NAMES {
            assert_eq!(level.to_string(), name);
        }
    }
}
