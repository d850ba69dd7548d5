use std::fmt;
use std::str::FromStr;

use crate::memory::{Byte, MemoryRegion};
use crate::scanner::CancelToken;
use crate::{ScanError, ScanResult};

const MASK_EXACT: char = 'x';
const MASK_ANY: char = '?';

/// A byte signature with optional wildcard positions.
///
/// `bytes` and `mask` always have the same, non-zero length. A wildcard position
/// carries the byte `0x00` in `bytes` and `false` in `mask`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Vec<u8>,
    mask: Vec<bool>,
}

impl Pattern {
    /// Parses an IDA-style signature such as `"5A 0F ?? 9A"`.
    ///
    /// Whitespace is stripped first, so `"5a0f??9a"` decodes identically. Every remaining
    /// two-character token is either two hex digits (any case) or `??`.
    ///
    /// # Arguments
    /// * `signature`: IDA-style byte pattern
    /// # Returns
    /// * `ScanResult<Pattern>`: The decoded pattern, or `InvalidArgument` for empty text, an odd
    ///   digit count or a token that is neither hex nor `??`
    pub fn parse(signature: &str) -> ScanResult<Self> {
        let compact: Vec<u8> = signature
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();

        if compact.is_empty() {
            return Err(ScanError::invalid_argument("pattern text is empty"));
        }
        if compact.len() % 2 != 0 {
            return Err(ScanError::invalid_argument(format!(
                "pattern text has an odd number of digits ({})",
                compact.len()
            )));
        }

        let mut bytes = Vec::with_capacity(compact.len() / 2);
        let mut mask = Vec::with_capacity(compact.len() / 2);

        for (index, token) in compact.chunks_exact(2).enumerate() {
            match token {
                b"??" => {
                    bytes.push(0x00);
                    mask.push(false);
                }
                [hi, lo] => match (hex_value(*hi), hex_value(*lo)) {
                    (Some(hi), Some(lo)) => {
                        bytes.push(hi << 4 | lo);
                        mask.push(true);
                    }
                    _ => {
                        return Err(ScanError::invalid_argument(format!(
                            "invalid pattern token \"{}\" at position {index}",
                            String::from_utf8_lossy(token)
                        )));
                    }
                },
                _ => unreachable!("chunks_exact(2) yields two-byte tokens"),
            }
        }

        Ok(Pattern { bytes, mask })
    }

    /// Builds a pattern from raw bytes and an explicit mask (`x` = exact, `?` = any byte).
    ///
    /// # Arguments
    /// * `bytes`: Pattern bytes; bytes under a `?` are ignored
    /// * `mask`: One `x` or `?` per byte
    /// # Returns
    /// * `ScanResult<Pattern>`: `InvalidArgument` when the lengths differ or the mask has another character
    pub fn from_bytes_with_mask(bytes: &[u8], mask: &str) -> ScanResult<Self> {
        if bytes.is_empty() {
            return Err(ScanError::invalid_argument("pattern is empty"));
        }

        let mask: Vec<bool> = mask
            .chars()
            .map(|c| match c {
                MASK_EXACT => Ok(true),
                MASK_ANY => Ok(false),
                other => Err(ScanError::invalid_argument(format!(
                    "invalid mask character '{other}'"
                ))),
            })
            .collect::<ScanResult<_>>()?;

        if mask.len() != bytes.len() {
            return Err(ScanError::invalid_argument(format!(
                "mask length {} does not match pattern length {}",
                mask.len(),
                bytes.len()
            )));
        }

        let bytes = bytes
            .iter()
            .zip(&mask)
            .map(|(&b, &exact)| if exact { b } else { 0x00 })
            .collect();

        Ok(Pattern { bytes, mask })
    }

    /// Builds a pattern from optional bytes, where `None` is a wildcard.
    pub fn from_tokens(tokens: &[Byte]) -> ScanResult<Self> {
        if tokens.is_empty() {
            return Err(ScanError::invalid_argument("pattern is empty"));
        }

        Ok(Pattern {
            bytes: tokens.iter().map(|t| t.unwrap_or(0x00)).collect(),
            mask: tokens.iter().map(Option::is_some).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The mask in its textual form, e.g. `"xx?x"`.
    pub fn mask_string(&self) -> String {
        self.mask
            .iter()
            .map(|&exact| if exact { MASK_EXACT } else { MASK_ANY })
            .collect()
    }

    pub fn tokens(&self) -> Vec<Byte> {
        self.bytes
            .iter()
            .zip(&self.mask)
            .map(|(&b, &exact)| exact.then_some(b))
            .collect()
    }

    /// Whether the pattern matches `haystack` starting at `offset`.
    pub fn matches_at(&self, haystack: &[u8], offset: usize) -> bool {
        let Some(window) = offset
            .checked_add(self.len())
            .and_then(|end| haystack.get(offset..end))
        else {
            return false;
        };

        window
            .iter()
            .zip(self.bytes.iter().zip(&self.mask))
            .all(|(&byte, (&want, &exact))| !exact || byte == want)
    }

    /// First offset in `haystack` where the pattern matches.
    ///
    /// Offsets are tried in ascending order from 0 to `haystack.len() - self.len()`.
    ///
    /// # Arguments
    /// * `haystack`: Bytes to search
    /// * `cancel`: Polled before every offset
    /// # Returns
    /// * `ScanResult<Option<usize>>`: Offset relative to `haystack`, `None` when there is no match
    ///   (including a pattern longer than `haystack`), or `Cancelled`
    pub fn find_in(&self, haystack: &[u8], cancel: &CancelToken) -> ScanResult<Option<usize>> {
        if self.len() > haystack.len() {
            return Ok(None);
        }

        for offset in 0..=haystack.len() - self.len() {
            cancel.check()?;
            if self.matches_at(haystack, offset) {
                return Ok(Some(offset));
            }
        }

        Ok(None)
    }
}

impl FromStr for Pattern {
    type Err = ScanError;

    fn from_str(s: &str) -> ScanResult<Self> {
        Pattern::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens().into_iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match token {
                Some(b) => write!(f, "{b:02X}")?,
                None => f.write_str("??")?,
            }
        }
        Ok(())
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Searches region buffers in the order given and returns the absolute address of the first match.
///
/// Matches never span two buffers, even when the regions are adjacent.
///
/// # Arguments
/// * `pattern`: Pattern to find
/// * `regions`: Region metadata paired with the bytes copied from it
/// * `cancel`: Cancellation token polled by the matcher
/// # Returns
/// * `ScanResult<Option<usize>>`: `region.base_address + offset` of the first match, or `None`
///   when the pattern occurs nowhere; address 0 is never used as a sentinel
pub fn find_first<'a, I>(pattern: &Pattern, regions: I, cancel: &CancelToken) -> ScanResult<Option<usize>>
where
    I: IntoIterator<Item = (&'a MemoryRegion, &'a [u8])>,
{
    for (region, bytes) in regions {
        if let Some(offset) = pattern.find_in(bytes, cancel)? {
            return Ok(Some(region.base_address + offset));
        }
    }

    Ok(None)
}
