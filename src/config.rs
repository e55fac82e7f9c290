//! Configuration Module
//!
//! Decompression and input-size limits, read from environment variables
//! with sensible defaults. These bound how much work a single uploaded
//! file can cause before any XML is parsed.

use anyhow::Result;
use std::env;

/// Hard ceiling on the configurable input size. Overrides above this are
/// rejected rather than clamped.
const HARD_INPUT_CAP: usize = 500_000_000;

/// Resource limits applied while decoding uploads.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum size of the raw input stream, compressed or not.
    pub max_input_size: usize,
    /// Maximum decompressed size of any single gzip stream or zip member.
    pub max_decompressed_size: usize,
    /// Maximum number of members in a zip archive.
    pub max_archive_members: usize,
    /// Maximum declared-to-compressed size ratio for a zip member.
    pub max_compression_ratio: f64,
    /// Maximum length of a zip member name.
    pub max_member_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_input_size: 10 * 1024 * 1024,
            max_decompressed_size: 100 * 1024 * 1024,
            max_archive_members: 1000,
            max_compression_ratio: 1000.0,
            max_member_name_len: 256,
        }
    }
}

impl Limits {
    /// Reads limits from environment variables. A missing or unparseable
    /// variable falls back to its default.
    pub fn from_env() -> Result<Self> {
        let defaults = Limits::default();

        let max_input_size = env::var("DMARC_MAX_FILE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_input_size);

        if max_input_size > HARD_INPUT_CAP {
            return Err(anyhow::anyhow!("max input size too large (500MB limit)"));
        }

        let max_decompressed_size = env::var("DMARC_MAX_DECOMPRESSED_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_decompressed_size);

        let max_archive_members = env::var("DMARC_MAX_FILES_IN_ZIP")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_archive_members);

        let max_compression_ratio = env::var("DMARC_MAX_COMPRESSION_RATIO")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_compression_ratio);

        let max_member_name_len = env::var("DMARC_MAX_FILENAME_LENGTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_member_name_len);

        Ok(Limits {
            max_input_size,
            max_decompressed_size,
            max_archive_members,
            max_compression_ratio,
            max_member_name_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // All env mutation lives in one test so a parallel test harness cannot
    // interleave set_var calls between cases.
    #[test]
    fn from_env_defaults_overrides_and_cap() {
        env::remove_var("DMARC_MAX_FILE_SIZE");
        env::remove_var("DMARC_MAX_DECOMPRESSED_SIZE");
        env::remove_var("DMARC_MAX_FILES_IN_ZIP");
        env::remove_var("DMARC_MAX_COMPRESSION_RATIO");
        env::remove_var("DMARC_MAX_FILENAME_LENGTH");

        let limits = Limits::from_env().unwrap();
        assert_eq!(limits.max_input_size, 10 * 1024 * 1024);
        assert_eq!(limits.max_decompressed_size, 100 * 1024 * 1024);
        assert_eq!(limits.max_archive_members, 1000);
        assert_eq!(limits.max_compression_ratio, 1000.0);
        assert_eq!(limits.max_member_name_len, 256);

        env::set_var("DMARC_MAX_FILE_SIZE", "5242880");
        env::set_var("DMARC_MAX_DECOMPRESSED_SIZE", "10485760");
        env::set_var("DMARC_MAX_FILES_IN_ZIP", "500");
        env::set_var("DMARC_MAX_COMPRESSION_RATIO", "500.0");
        env::set_var("DMARC_MAX_FILENAME_LENGTH", "128");

        let limits = Limits::from_env().unwrap();
        assert_eq!(limits.max_input_size, 5_242_880);
        assert_eq!(limits.max_decompressed_size, 10_485_760);
        assert_eq!(limits.max_archive_members, 500);
        assert_eq!(limits.max_compression_ratio, 500.0);
        assert_eq!(limits.max_member_name_len, 128);

        // Unparseable values fall back instead of failing.
        env::set_var("DMARC_MAX_FILES_IN_ZIP", "not-a-number");
        let limits = Limits::from_env().unwrap();
        assert_eq!(limits.max_archive_members, 1000);

        // The input-size override is capped at 500MB.
        env::set_var("DMARC_MAX_FILE_SIZE", "600000000");
        assert!(Limits::from_env().is_err());

        env::remove_var("DMARC_MAX_FILE_SIZE");
        env::remove_var("DMARC_MAX_DECOMPRESSED_SIZE");
        env::remove_var("DMARC_MAX_FILES_IN_ZIP");
        env::remove_var("DMARC_MAX_COMPRESSION_RATIO");
        env::remove_var("DMARC_MAX_FILENAME_LENGTH");
    }
}
