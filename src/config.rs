// Read options

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest single read that is allocated up front (10 MiB).
pub const DEFAULT_MAX_UPFRONT_READ: usize = 10 << 20;

/// Tunables for a probing session.
///
/// Every field has a default, so a partial JSON document is accepted:
///
/// ```
/// let options = audioprobe::ReadOptions::from_json(r#"{ "max_identify_depth": 1 }"#).unwrap();
/// assert_eq!(options.max_identify_depth, 1);
/// assert_eq!(options.max_upfront_read, audioprobe::config::DEFAULT_MAX_UPFRONT_READ);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Reads larger than this are filled incrementally instead of with one allocation.
    pub max_upfront_read: usize,
    /// Number of sniff passes the identifier may make (the first pass plus WAV hops).
    pub max_identify_depth: u8,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            max_upfront_read: DEFAULT_MAX_UPFRONT_READ,
            max_identify_depth: 2,
        }
    }
}

impl ReadOptions {
    /// Parse options from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let options: ReadOptions = serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("read options: {}", e)))?;
        if options.max_identify_depth == 0 {
            return Err(Error::InvalidArgument(
                "max_identify_depth must be at least 1".to_string(),
            ));
        }
        Ok(options)
    }
}
