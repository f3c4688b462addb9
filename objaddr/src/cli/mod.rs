//! Command-line interface for the `objaddr` inspection tool

pub mod args;

pub use args::Args;

use crate::domain::FramePtr;

/// Parse a hex address as typed on a command line
///
/// Accepts an optional `0x`/`0X` prefix and `_` digit separators.
#[must_use]
pub fn parse_address(text: &str) -> Option<FramePtr> {
    let digits = text.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits)
        .replace('_', "");
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(&digits, 16).ok().map(FramePtr)
}
