//! Duration strings in the `300ms` / `1.5s` / `1m30s` notation.

use std::time::Duration;

use eyre::{bail, eyre};

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a sequence of decimal numbers, each with a unit suffix, into a
/// [`Duration`]. Units: `ns`, `us` (`µs`, `μs`), `ms`, `s`, `m`, `h`.
/// A bare `0` is accepted. Negative durations are rejected.
pub fn parse_duration(text: &str) -> eyre::Result<Duration> {
    let s = text.trim();
    let (negative, mut rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        bail!("invalid duration {text:?}");
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        if number.is_empty() || number == "." {
            bail!("invalid duration {text:?}");
        }

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        if unit.is_empty() {
            bail!("missing unit in duration {text:?}");
        }
        let scale =
            unit_nanos(unit).ok_or_else(|| eyre!("unknown unit {unit:?} in duration {text:?}"))?;

        let nanos = segment_nanos(number, scale)
            .ok_or_else(|| eyre!("invalid duration {text:?}"))?;
        total = total
            .checked_add(nanos)
            .ok_or_else(|| eyre!("duration {text:?} is out of range"))?;
        rest = tail;
    }

    if negative && total > 0 {
        bail!("negative duration {text:?} is not allowed");
    }
    let nanos = u64::try_from(total).map_err(|_| eyre!("duration {text:?} is out of range"))?;
    Ok(Duration::from_nanos(nanos))
}

/// `None` for an empty or blank string, the parsed value otherwise.
pub fn parse_optional_duration(text: &str) -> eyre::Result<Option<Duration>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_duration(text).map(Some)
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

fn segment_nanos(number: &str, scale: u128) -> Option<u128> {
    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if frac.contains('.') {
        return None;
    }
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(scale)?;

    // Digits past nanosecond precision of the largest unit cannot matter.
    let mut frac_value: u128 = 0;
    let mut denom: u128 = 1;
    for digit in frac.bytes().take(18) {
        frac_value = frac_value * 10 + u128::from(digit - b'0');
        denom *= 10;
    }
    nanos = nanos.checked_add(frac_value * scale / denom)?;
    Some(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", Duration::ZERO)]
    #[case("300ms", Duration::from_millis(300))]
    #[case("1.5s", Duration::from_millis(1500))]
    #[case("1m30s", Duration::from_secs(90))]
    #[case("2h", Duration::from_secs(7200))]
    #[case("250us", Duration::from_micros(250))]
    #[case("250µs", Duration::from_micros(250))]
    #[case("10ns", Duration::from_nanos(10))]
    #[case(".5s", Duration::from_millis(500))]
    #[case("+1s", Duration::from_secs(1))]
    #[case("-0", Duration::ZERO)]
    #[case(" 50ms ", Duration::from_millis(50))]
    fn parses(#[case] text: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(text).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("5")]
    #[case("ms")]
    #[case("1.2.3s")]
    #[case("10 parsecs")]
    #[case("3d")]
    #[case("-1s")]
    #[case(".s")]
    fn rejects(#[case] text: &str) {
        assert!(parse_duration(text).is_err(), "{text:?} should not parse");
    }

    #[test]
    fn blank_is_unset() {
        assert_eq!(parse_optional_duration("  ").unwrap(), None);
        assert_eq!(
            parse_optional_duration("2s").unwrap(),
            Some(Duration::from_secs(2))
        );
    }
}
