use std::ops::Range;

/// How to answer a request given its `Range` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable range; send the whole body.
    Full,
    Partial(Range<u64>),
    Unsatisfiable,
}

/// Parse a single `bytes=` range against a body of `len` bytes.
///
/// Supports `a-b`, `a-` and `-n`. Malformed headers and multi-range
/// requests are ignored and yield [`RangeOutcome::Full`].
pub fn parse_range(header: &str, len: u64) -> RangeOutcome {
    let Some(ranges) = header.trim().strip_prefix("bytes=") else {
        return RangeOutcome::Full;
    };
    if ranges.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = ranges.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        return match last.parse::<u64>() {
            Ok(0) => RangeOutcome::Unsatisfiable,
            Ok(_) if len == 0 => RangeOutcome::Unsatisfiable,
            Ok(n) => RangeOutcome::Partial(len.saturating_sub(n)..len),
            Err(_) => RangeOutcome::Full,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeOutcome::Full;
    };
    if start >= len {
        return RangeOutcome::Unsatisfiable;
    }
    let end = if last.is_empty() {
        len - 1
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end.min(len - 1),
            _ => return RangeOutcome::Full,
        }
    };
    RangeOutcome::Partial(start..end + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_range() {
        assert_eq!(parse_range("bytes=0-4", 10), RangeOutcome::Partial(0..5));
        assert_eq!(parse_range("bytes=3-3", 10), RangeOutcome::Partial(3..4));
    }

    #[test]
    fn end_is_clamped() {
        assert_eq!(parse_range("bytes=5-100", 10), RangeOutcome::Partial(5..10));
    }

    #[test]
    fn open_ended_range() {
        assert_eq!(parse_range("bytes=7-", 10), RangeOutcome::Partial(7..10));
    }

    #[test]
    fn suffix_range() {
        assert_eq!(parse_range("bytes=-3", 10), RangeOutcome::Partial(7..10));
        assert_eq!(parse_range("bytes=-50", 10), RangeOutcome::Partial(0..10));
    }

    #[test]
    fn unsatisfiable() {
        assert_eq!(parse_range("bytes=10-", 10), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range("bytes=-0", 10), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range("bytes=0-", 0), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn ignored_forms() {
        assert_eq!(parse_range("items=0-1", 10), RangeOutcome::Full);
        assert_eq!(parse_range("bytes=0-1,4-5", 10), RangeOutcome::Full);
        assert_eq!(parse_range("bytes=5-2", 10), RangeOutcome::Full);
        assert_eq!(parse_range("bytes=abc", 10), RangeOutcome::Full);
        assert_eq!(parse_range("bytes=x-2", 10), RangeOutcome::Full);
    }
}
