//! # Config - compaction settings
//!
//! Settings consumed when building a compaction iterator. They come from
//! one of three places:
//!
//! | Source            | Entry point                    |
//! |-------------------|--------------------------------|
//! | built-in defaults | [`CompactionConfig::default`]  |
//! | environment       | [`CompactionConfig::from_env`] |
//! | text file         | [`CompactionConfig::load`]     |
//!
//! ## File Format
//!
//! ```text
//! # compaction settings
//! format_version = delete-sized
//! allow_zero_seqnum = true
//! disable_span_elision = false
//! ```
//!
//! Lines starting with `#` are comments. Empty lines are ignored. Keys not
//! present keep their default.

use anyhow::{anyhow, bail, Context, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

pub const ENV_FORMAT_VERSION: &str = "RIPTIDE_FORMAT_VERSION";
pub const ENV_ALLOW_ZERO_SEQNUM: &str = "RIPTIDE_ALLOW_ZERO_SEQNUM";
pub const ENV_DISABLE_SPAN_ELISION: &str = "RIPTIDE_DISABLE_SPAN_ELISION";

/// On-disk format generations. Later versions understand more key kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatMajorVersion {
    Original,
    /// Adds `SETWITHDEL`.
    SetWithDelete,
    RangeKeys,
    /// Adds `DELSIZED`.
    DeleteSized,
}

impl FormatMajorVersion {
    pub const NEWEST: FormatMajorVersion = FormatMajorVersion::DeleteSized;

    /// Whether a SET that shadowed a DEL may be written as `SETWITHDEL`.
    pub fn supports_set_with_delete(self) -> bool {
        self >= FormatMajorVersion::SetWithDelete
    }

    pub fn name(self) -> &'static str {
        match self {
            FormatMajorVersion::Original => "original",
            FormatMajorVersion::SetWithDelete => "set-with-delete",
            FormatMajorVersion::RangeKeys => "range-keys",
            FormatMajorVersion::DeleteSized => "delete-sized",
        }
    }
}

impl Default for FormatMajorVersion {
    fn default() -> Self {
        Self::NEWEST
    }
}

impl fmt::Display for FormatMajorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormatMajorVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" | "1" => Ok(Self::Original),
            "set-with-delete" | "2" => Ok(Self::SetWithDelete),
            "range-keys" | "3" => Ok(Self::RangeKeys),
            "delete-sized" | "4" => Ok(Self::DeleteSized),
            other => bail!("unknown format version '{}'", other),
        }
    }
}

/// Settings for one compaction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionConfig {
    pub format_version: FormatMajorVersion,
    /// Permit rewriting sequence numbers to zero in the oldest stripe.
    /// Only meaningful for outputs at the bottom of the tree.
    pub allow_zero_seqnum: bool,
    /// Never elide range tombstones, even when nothing below overlaps them.
    pub disable_span_elision: bool,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            format_version: FormatMajorVersion::NEWEST,
            allow_zero_seqnum: false,
            disable_span_elision: false,
        }
    }
}

impl CompactionConfig {
    /// Reads settings from `RIPTIDE_*` environment variables, falling back
    /// to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup(ENV_FORMAT_VERSION) {
            cfg.format_version = v
                .parse()
                .with_context(|| format!("{}={}", ENV_FORMAT_VERSION, v))?;
        }
        if let Some(v) = lookup(ENV_ALLOW_ZERO_SEQNUM) {
            cfg.allow_zero_seqnum =
                parse_bool(&v).with_context(|| format!("{}={}", ENV_ALLOW_ZERO_SEQNUM, v))?;
        }
        if let Some(v) = lookup(ENV_DISABLE_SPAN_ELISION) {
            cfg.disable_span_elision =
                parse_bool(&v).with_context(|| format!("{}={}", ENV_DISABLE_SPAN_ELISION, v))?;
        }
        Ok(cfg)
    }

    /// Loads settings from a `key = value` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a line is malformed, a
    /// key is unknown, or a value does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open config at {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut cfg = Self::default();

        for (line_num, line) in reader.lines().enumerate() {
            let line =
                line.with_context(|| format!("failed to read config line {}", line_num + 1))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (key, value) = trimmed.split_once('=').ok_or_else(|| {
                anyhow!(
                    "config line {}: expected 'key = value': {}",
                    line_num + 1,
                    trimmed
                )
            })?;
            let (key, value) = (key.trim(), value.trim());
            let ctx = || format!("config line {}: {}", line_num + 1, key);
            match key {
                "format_version" => cfg.format_version = value.parse().with_context(ctx)?,
                "allow_zero_seqnum" => cfg.allow_zero_seqnum = parse_bool(value).with_context(ctx)?,
                "disable_span_elision" => {
                    cfg.disable_span_elision = parse_bool(value).with_context(ctx)?
                }
                other => bail!("config line {}: unknown key '{}'", line_num + 1, other),
            }
        }
        Ok(cfg)
    }
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}
