//! Process-wide settings for the aggregation functions.
//!
//! Values are initialized from environment variables on first access and
//! can be overridden at runtime via setter functions.
//!
//! - `UDAF_TRIM_PERCENT`: share of histogram mass, in percent, that the
//!   trimmed average keeps. Must be in `1..=100`. Default: 80.
//!
//! - `UDAF_MAX_ENCODED_LEN`: largest length or element count accepted from
//!   a single prefix while decoding a binary partial. Accepts byte-size
//!   suffixes. Default: 256 MiB.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Once;

use tracing::warn;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const DEFAULT_TRIM_PERCENT: u32 = 80;
const DEFAULT_MAX_ENCODED_LEN: usize = 256 * 1024 * 1024; // 256 MiB

// ---------------------------------------------------------------------------
// Atomic globals
// ---------------------------------------------------------------------------

static TRIM_PERCENT: AtomicU32 = AtomicU32::new(DEFAULT_TRIM_PERCENT);
static MAX_ENCODED_LEN: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_ENCODED_LEN);

static INIT: Once = Once::new();

/// Ensure environment variable overrides are applied (idempotent).
fn ensure_init() {
    INIT.call_once(|| {
        if let Ok(val) = std::env::var("UDAF_TRIM_PERCENT") {
            match parse_percent(&val) {
                Some(p) => TRIM_PERCENT.store(p, Ordering::Relaxed),
                None => warn!(value = %val, "ignoring invalid UDAF_TRIM_PERCENT"),
            }
        }
        if let Ok(val) = std::env::var("UDAF_MAX_ENCODED_LEN") {
            match parse_byte_size(&val) {
                Ok(n) => MAX_ENCODED_LEN.store(n, Ordering::Relaxed),
                Err(()) => warn!(value = %val, "ignoring invalid UDAF_MAX_ENCODED_LEN"),
            }
        }
    });
}

fn parse_percent(s: &str) -> Option<u32> {
    s.trim()
        .parse::<u32>()
        .ok()
        .filter(|p| (1..=100).contains(p))
}

/// Parse a byte size string. Supports plain integers and suffixes:
/// `K`/`KB`, `M`/`MB`, `G`/`GB` (case-insensitive).
fn parse_byte_size(s: &str) -> Result<usize, ()> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    const SUFFIXES: [(&str, usize); 6] = [
        ("GB", 1 << 30),
        ("G", 1 << 30),
        ("MB", 1 << 20),
        ("M", 1 << 20),
        ("KB", 1 << 10),
        ("K", 1 << 10),
    ];
    let (num_str, multiplier) = SUFFIXES
        .iter()
        .find_map(|&(suffix, mult)| {
            upper
                .strip_suffix(suffix)
                .map(|n| (n.trim().to_string(), mult))
        })
        .unwrap_or_else(|| (upper.clone(), 1));
    num_str
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Percent of histogram mass kept by the trimmed average.
pub fn get_trim_percent() -> u32 {
    ensure_init();
    TRIM_PERCENT.load(Ordering::Relaxed)
}

/// Set the percent of histogram mass kept by the trimmed average.
/// Values outside `1..=100` are ignored and the previous setting is kept.
pub fn set_trim_percent(percent: u32) {
    ensure_init();
    if (1..=100).contains(&percent) {
        TRIM_PERCENT.store(percent, Ordering::Relaxed);
    } else {
        warn!(percent, "ignoring out-of-range trim percent");
    }
}

/// Largest length prefix accepted while decoding a binary partial.
pub fn get_max_encoded_len() -> usize {
    ensure_init();
    MAX_ENCODED_LEN.load(Ordering::Relaxed)
}

/// Set the largest length prefix accepted while decoding a binary partial.
pub fn set_max_encoded_len(len: usize) {
    ensure_init();
    MAX_ENCODED_LEN.store(len, Ordering::Relaxed);
}
