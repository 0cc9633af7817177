//! Retry bookkeeping encoded in file names.
//!
//! A label that failed extraction `N` times is named
//! `<base-stem>__retry<N><ext>`. No marker means `N = 0`. These functions
//! do no I/O and never fail: a malformed marker reads as a first attempt.
//! Counters of any length are accepted, so the sequence never wraps.

/// Segment separating the base stem from the attempt counter.
pub const RETRY_MARKER: &str = "__retry";

/// Suffix of the sidecar that marks a retry-folder label as stuck.
pub const STUCK_SUFFIX: &str = ".stuck";

/// Split a file name into stem and extension (with its leading dot).
///
/// Mirrors `Path::file_stem`/`Path::extension`: a leading dot alone does
/// not start an extension, so `.hidden` has no extension.
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Decimal counter after the last marker, if it is one.
fn counter_digits(name: &str) -> Option<&str> {
    let (stem, _) = split_name(name);
    let (_, payload) = stem.rsplit_once(RETRY_MARKER)?;
    (!payload.is_empty() && payload.bytes().all(|b| b.is_ascii_digit())).then_some(payload)
}

/// Number of retries recorded in `name`, 0 if absent or unparseable.
///
/// Counters too large for a `u64` saturate rather than reading as 0.
pub fn retry_count(name: &str) -> u64 {
    match counter_digits(name) {
        Some(digits) => digits.parse().unwrap_or(u64::MAX),
        None => 0,
    }
}

/// Stem with any retry marker stripped; stable across the retry chain.
pub fn base_name(name: &str) -> &str {
    let (stem, _) = split_name(name);
    match stem.split_once(RETRY_MARKER) {
        Some((base, _)) => base,
        None => stem,
    }
}

/// Extension of `name` without the dot, if any.
pub fn extension(name: &str) -> Option<&str> {
    let (_, ext) = split_name(name);
    ext.strip_prefix('.').filter(|e| !e.is_empty())
}

/// Name for the next attempt: `base_name + __retry<count+1> + ext`.
pub fn next_retry_name(name: &str) -> String {
    let (_, ext) = split_name(name);
    let next = match counter_digits(name) {
        Some(digits) => increment_decimal(digits),
        None => "1".to_string(),
    };
    format!("{}{RETRY_MARKER}{next}{ext}", base_name(name))
}

/// Sidecar file name recording that `name` exhausted its retries.
pub fn stuck_marker_name(name: &str) -> String {
    format!("{name}{STUCK_SUFFIX}")
}

/// Add one to a decimal digit string, dropping leading zeros.
fn increment_decimal(digits: &str) -> String {
    let mut bytes: Vec<u8> = digits.trim_start_matches('0').bytes().collect();
    let mut idx = bytes.len();
    loop {
        if idx == 0 {
            bytes.insert(0, b'1');
            break;
        }
        idx -= 1;
        if bytes[idx] == b'9' {
            bytes[idx] = b'0';
        } else {
            bytes[idx] += 1;
            break;
        }
    }
    bytes.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_name_has_no_retries() {
        assert_eq!(retry_count("label.jpg"), 0);
        assert_eq!(base_name("label.jpg"), "label");
        assert_eq!(extension("label.jpg"), Some("jpg"));
    }

    #[test]
    fn test_marker_is_parsed() {
        assert_eq!(retry_count("label__retry2.jpg"), 2);
        assert_eq!(base_name("label__retry2.jpg"), "label");
        assert_eq!(retry_count("IMG_0042__retry12.PNG"), 12);
    }

    #[test]
    fn test_malformed_marker_degrades_to_first_attempt() {
        assert_eq!(retry_count("label__retry.jpg"), 0);
        assert_eq!(retry_count("label__retryabc.jpg"), 0);
        assert_eq!(retry_count("label__retry-1.jpg"), 0);
        assert_eq!(base_name("label__retryabc.jpg"), "label");
        assert_eq!(next_retry_name("label__retryabc.jpg"), "label__retry1.jpg");
    }

    #[test]
    fn test_next_retry_name_sequence() {
        let mut name = "batch 7.jpeg".to_string();
        for expected in 1..=5 {
            name = next_retry_name(&name);
            assert_eq!(retry_count(&name), expected);
            assert_eq!(base_name(&name), "batch 7");
            assert!(name.ends_with(".jpeg"));
        }
        assert_eq!(name, "batch 7__retry5.jpeg");
    }

    #[test]
    fn test_rederiving_from_any_point_is_deterministic() {
        let third = next_retry_name(&next_retry_name(&next_retry_name("x.png")));
        assert_eq!(third, "x__retry3.png");
        assert_eq!(next_retry_name(&third), next_retry_name("x__retry3.png"));
    }

    #[test]
    fn test_names_without_extension() {
        assert_eq!(next_retry_name("scan"), "scan__retry1");
        assert_eq!(retry_count("scan__retry1"), 1);
        assert_eq!(extension("scan"), None);
        assert_eq!(extension(".hidden"), None);
        assert_eq!(base_name(".hidden"), ".hidden");
    }

    #[test]
    fn test_counter_beyond_u32_keeps_climbing() {
        assert_eq!(retry_count("x__retry5000000000.jpg"), 5_000_000_000);
        assert_eq!(next_retry_name("x__retry5000000000.jpg"), "x__retry5000000001.jpg");

        let name = next_retry_name("x__retry4294967295.jpg");
        assert_eq!(name, "x__retry4294967296.jpg");
        assert!(retry_count(&name) > retry_count("x__retry4294967295.jpg"));
    }

    #[test]
    fn test_counter_beyond_u64_saturates_and_still_increments() {
        let huge = "x__retry99999999999999999999999.jpg";
        assert_eq!(retry_count(huge), u64::MAX);
        assert_eq!(next_retry_name(huge), "x__retry100000000000000000000000.jpg");
    }

    #[test]
    fn test_carry_and_leading_zeros() {
        assert_eq!(next_retry_name("x__retry9.jpg"), "x__retry10.jpg");
        assert_eq!(next_retry_name("x__retry199.jpg"), "x__retry200.jpg");
        assert_eq!(next_retry_name("x__retry007.jpg"), "x__retry8.jpg");
        assert_eq!(next_retry_name("x__retry0.jpg"), "x__retry1.jpg");
    }

    #[test]
    fn test_stuck_marker_name_keeps_full_name() {
        assert_eq!(stuck_marker_name("x__retry3.jpg"), "x__retry3.jpg.stuck");
        assert_eq!(extension(&stuck_marker_name("x__retry3.jpg")), Some("stuck"));
    }

    #[test]
    fn test_only_last_extension_is_kept() {
        assert_eq!(next_retry_name("label.v2.jpg"), "label.v2__retry1.jpg");
        assert_eq!(base_name("label.v2__retry1.jpg"), "label.v2");
    }
}
