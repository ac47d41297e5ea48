//! Timecode strings in the `HH:MM:SS:MMM` form used by project files and the
//! `/duration/seektotimecode` command.

pub fn format(millis: u64) -> String {
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1_000) % 60;
    let ms = millis % 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}:{ms:03}")
}

/// Parses `HH:MM:SS:MMM` into milliseconds. Minutes and seconds above 59 are
/// rejected; the hour field is unbounded.
pub fn parse(timecode: &str) -> Option<u64> {
    let mut parts = timecode.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    let millis: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes > 59 || seconds > 59 || millis > 999 {
        return None;
    }
    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}

#[cfg(test)]
mod tests {
    use super::{format, parse};

    #[test]
    fn formats_zero() {
        assert_eq!(format(0), "00:00:00:000");
    }

    #[test]
    fn parses_one_second() {
        assert_eq!(parse("00:00:01:000"), Some(1_000));
    }

    #[test]
    fn round_trips_awkward_values() {
        for millis in [1, 999, 61_001, 3_599_999, 7_425_042] {
            assert_eq!(parse(&format(millis)), Some(millis));
        }
    }

    #[test]
    fn rejects_malformed_fields() {
        assert_eq!(parse("00:61:00:000"), None);
        assert_eq!(parse("00:00:00"), None);
        assert_eq!(parse("00:00:00:000:1"), None);
        assert_eq!(parse("a:b:c:d"), None);
    }
}
