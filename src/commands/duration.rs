use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DURATION_REGEX: Regex =
        Regex::new(r"(?i)^(?P<value>\d+)(?P<unit>[smhdw])$").unwrap();
}

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[readonly::make]
pub struct ParsedDuration {
    pub millis: i64,
}

// Parses the compact duration grammar used by commands: a number
// followed by s/m/h/d/w, e.g. "5m", "24h", "90d".
pub fn parse_duration(text: &str) -> Option<ParsedDuration> {
    let captures = DURATION_REGEX.captures(text.trim())?;
    let value = captures.name("value")?.as_str().parse::<i64>().ok()?;
    let multiplier = match captures.name("unit")?.as_str().to_lowercase().as_str() {
        "s" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        "d" => MILLIS_PER_DAY,
        "w" => 7 * MILLIS_PER_DAY,
        _ => return None,
    };
    let millis = value.checked_mul(multiplier)?;
    Some(ParsedDuration { millis })
}

#[cfg(test)]
mod tests {
    use crate::commands::duration::{MILLIS_PER_DAY, parse_duration};

    #[test]
    fn test_parse_minutes() {
        let parsed = parse_duration("5m").unwrap();
        assert_eq!(parsed.millis, 5 * 60 * 1000);
    }

    #[test]
    fn test_parse_hours_and_days() {
        assert_eq!(parse_duration("2h").unwrap().millis, 2 * 60 * 60 * 1000);
        assert_eq!(parse_duration("90d").unwrap().millis, 90 * MILLIS_PER_DAY);
        assert_eq!(parse_duration("1w").unwrap().millis, 7 * MILLIS_PER_DAY);
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trims() {
        assert_eq!(parse_duration(" 10M ").unwrap().millis, 10 * 60 * 1000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_duration("").is_none(), true);
        assert_eq!(parse_duration("5x").is_none(), true);
        assert_eq!(parse_duration("m5").is_none(), true);
        assert_eq!(parse_duration("five minutes").is_none(), true);
    }

    #[test]
    fn test_parse_rejects_overflowing_values() {
        assert_eq!(parse_duration("99999999999999999999d").is_none(), true);
    }
}
