//! Human-readable byte counts.
//!
//! Two flavours, each matching what its log consumers already expect:
//!
//! - [`byte_count_iec`]: base 1024, one decimal, `KiB`/`MiB`/... Used by the
//!   access log `size` attribute.
//! - [`human_size`]: base 1000, four significant digits, `kB`/`MB`/...
//!   without a separating space. Used by the memory reporter.

const IEC_UNIT: u64 = 1024;
const IEC_PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

const SI_BASE: f64 = 1000.0;
const SI_UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Format a byte count with binary (IEC) units.
///
/// The unit advances only while the running quotient stays at or above 1024,
/// so 1000 GiB is printed as `"1000.0 GiB"` rather than rolling over.
///
/// ```rust
/// use slogx::humanize::byte_count_iec;
///
/// assert_eq!(byte_count_iec(10), "10 B");
/// assert_eq!(byte_count_iec(10240), "10.0 KiB");
/// assert_eq!(byte_count_iec(1073741824000), "1000.0 GiB");
/// ```
pub fn byte_count_iec(bytes: u64) -> String {
    if bytes < IEC_UNIT {
        return format!("{bytes} B");
    }

    let mut div = IEC_UNIT;
    let mut exp = 0usize;
    let mut n = bytes / IEC_UNIT;
    while n >= IEC_UNIT {
        div *= IEC_UNIT;
        exp += 1;
        n /= IEC_UNIT;
    }

    let prefix = IEC_PREFIXES.get(exp).copied().unwrap_or('E');
    format!("{:.1} {prefix}iB", bytes as f64 / div as f64)
}

/// Format a byte count with decimal (SI) units and four significant digits.
///
/// ```rust
/// use slogx::humanize::human_size;
///
/// assert_eq!(human_size(999), "999B");
/// assert_eq!(human_size(1_048_576), "1.049MB");
/// ```
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0usize;
    while size >= SI_BASE && unit < SI_UNITS.len() - 1 {
        size /= SI_BASE;
        unit += 1;
    }

    let suffix = SI_UNITS.get(unit).copied().unwrap_or("YB");
    format!("{}{suffix}", significant(size, 4))
}

/// `%g`-style rendering of a non-negative value below 1000: `digits`
/// significant digits, trailing zeros and a dangling point removed.
fn significant(value: f64, digits: i32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs().log10().floor() as i32;
    let decimals = usize::try_from(digits - 1 - magnitude).unwrap_or(0);
    let formatted = format!("{value:.decimals$}");

    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_count_iec_table() {
        let cases: [(u64, &str); 6] = [
            (10, "10 B"),
            (10240, "10.0 KiB"),
            (10485760, "10.0 MiB"),
            (10737418240, "10.0 GiB"),
            (1073741824000, "1000.0 GiB"),
            (10995116277760, "10.0 TiB"),
        ];

        for (input, expected) in cases {
            assert_eq!(byte_count_iec(input), expected, "input {input}");
        }
    }

    #[test]
    fn test_byte_count_iec_boundaries() {
        assert_eq!(byte_count_iec(0), "0 B");
        assert_eq!(byte_count_iec(1023), "1023 B");
        assert_eq!(byte_count_iec(1024), "1.0 KiB");
        assert_eq!(byte_count_iec(1536), "1.5 KiB");
    }

    #[test]
    fn test_byte_count_iec_max() {
        assert!(byte_count_iec(u64::MAX).ends_with("EiB"));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0B");
        assert_eq!(human_size(999), "999B");
        assert_eq!(human_size(1000), "1kB");
        assert_eq!(human_size(1_500), "1.5kB");
        assert_eq!(human_size(1_048_576), "1.049MB");
        assert_eq!(human_size(123_456_789), "123.5MB");
    }

    #[test]
    fn test_significant_rounds_up() {
        assert_eq!(significant(9.99996, 4), "10");
        assert_eq!(significant(1.0, 4), "1");
    }
}
