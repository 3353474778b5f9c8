// src/encoding.rs
// Ordered character-encoding fallback for text sources.

use std::borrow::Cow;
use std::path::Path;

use encoding_rs::Encoding;
use tracing::{debug, trace};

use crate::error::{Result, SyncError};

pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "windows-1252"];

/// Candidate encodings tried in priority order. The first one that decodes
/// the whole buffer without malformed sequences wins, even when a later
/// candidate would also succeed.
#[derive(Debug, Clone)]
pub struct EncodingChain {
    candidates: Vec<&'static Encoding>,
}

impl EncodingChain {
    /// Resolves WHATWG labels such as `utf-8`, `latin1`, or `utf-16le`.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        if labels.is_empty() {
            return Err(SyncError::Config("encoding list is empty".into()));
        }
        let candidates = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                Encoding::for_label(label.trim().as_bytes())
                    .ok_or_else(|| SyncError::Config(format!("unknown encoding label '{label}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(EncodingChain { candidates })
    }

    /// Decodes `bytes` read from `path`, reporting which encoding was used.
    pub fn decode<'a>(&self, path: &Path, bytes: &'a [u8]) -> Result<(Cow<'a, str>, &'static Encoding)> {
        for encoding in &self.candidates {
            let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
            if had_errors {
                trace!(path = %path.display(), encoding = encoding.name(), "decode attempt failed");
                continue;
            }
            debug!(path = %path.display(), encoding = encoding.name(), "decoded source file");
            return Ok((text, encoding));
        }

        Err(SyncError::Decoding {
            path: path.to_path_buf(),
            tried: self
                .candidates
                .iter()
                .map(|encoding| encoding.name())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

impl Default for EncodingChain {
    fn default() -> Self {
        EncodingChain {
            candidates: vec![encoding_rs::UTF_8, encoding_rs::WINDOWS_1252],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // "é" in UTF-8; also valid windows-1252 ("Ã©").
    const AMBIGUOUS: &[u8] = &[0xC3, 0xA9];

    #[test]
    fn first_successful_candidate_wins() {
        let path = Path::new("sample.csv");

        let utf8_first = EncodingChain::from_labels(&["utf-8", "latin1"]).unwrap();
        let (text, used) = utf8_first.decode(path, AMBIGUOUS).unwrap();
        assert_eq!(text, "é");
        assert_eq!(used, encoding_rs::UTF_8);

        let latin_first = EncodingChain::from_labels(&["latin1", "utf-8"]).unwrap();
        let (text, used) = latin_first.decode(path, AMBIGUOUS).unwrap();
        assert_eq!(text, "Ã©");
        assert_eq!(used, encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn falls_back_after_malformed_input() {
        let chain = EncodingChain::default();
        let (text, used) = chain.decode(Path::new("x.csv"), b"caf\xE9").unwrap();
        assert_eq!(text, "café");
        assert_eq!(used, encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let chain = EncodingChain::default();
        let (text, _) = chain.decode(Path::new("x.csv"), b"\xEF\xBB\xBFid,name").unwrap();
        assert_eq!(text, "id,name");
    }

    #[test]
    fn exhausted_chain_reports_path() {
        let chain = EncodingChain::from_labels(&["utf-8"]).unwrap();
        let err = chain.decode(Path::new("broken.csv"), b"\xFF\xFE\xFD").unwrap_err();
        match err {
            SyncError::Decoding { path, tried } => {
                assert_eq!(path, Path::new("broken.csv"));
                assert_eq!(tried, "UTF-8");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_label_is_a_config_error() {
        let err = EncodingChain::from_labels(&["utf-8", "klingon"]).unwrap_err();
        assert!(err.is_fatal());
    }
}
