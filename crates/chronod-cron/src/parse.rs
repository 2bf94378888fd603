//! Schedule expression parsing.

use std::time::Duration as StdDuration;

use crate::error::{CronError, Result};
use crate::schedule::{FieldSchedule, Schedule};

/// Parse a schedule expression: five-field cron syntax, an `@` macro, or
/// `@every <duration>`.
pub fn parse(expr: &str) -> Result<Schedule> {
    let spec = expr.trim();
    if spec.is_empty() {
        return Err(CronError::invalid(expr, "empty expression"));
    }

    if let Some(rest) = spec.strip_prefix("@every") {
        if rest.starts_with(char::is_whitespace) {
            return Ok(Schedule::Every(parse_duration(spec, rest.trim())?));
        }
    }

    if spec.starts_with('@') {
        let fields = match spec {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            other => {
                return Err(CronError::invalid(spec, format!("unknown macro '{other}'")));
            }
        };
        return parse_fields(spec, fields);
    }

    parse_fields(spec, spec)
}

fn parse_fields(expr: &str, spec: &str) -> Result<Schedule> {
    let parts: Vec<&str> = spec.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(CronError::invalid(
            expr,
            format!("expected 5 fields, got {}", parts.len()),
        ));
    }

    let (minute, _) = parse_field(expr, parts[0], 0, 59)?;
    let (hour, _) = parse_field(expr, parts[1], 0, 23)?;
    let (dom, dom_star) = parse_field(expr, parts[2], 1, 31)?;
    let (month, _) = parse_field(expr, parts[3], 1, 12)?;
    let (dow, dow_star) = parse_field(expr, parts[4], 0, 6)?;

    Ok(Schedule::Field(FieldSchedule {
        minute,
        hour: hour as u32,
        dom: dom as u32,
        month: month as u16,
        dow: dow as u8,
        dom_restricted: !dom_star,
        dow_restricted: !dow_star,
    }))
}

/// Parse one cron field into a bitmask of allowed values plus a flag telling
/// whether the field contained a bare `*` (needed for the dom/dow rule).
fn parse_field(expr: &str, field: &str, min: u32, max: u32) -> Result<(u64, bool)> {
    let mut bits = 0u64;
    let mut star = false;

    for part in field.split(',') {
        if part.is_empty() {
            return Err(CronError::invalid(expr, "empty list element"));
        }

        let (range, step_str) = match part.split_once('/') {
            Some((r, s)) => (r, Some(s)),
            None => (part, None),
        };
        let step = match step_str {
            Some(s) => {
                let n = parse_value(expr, s, "step")?;
                if n == 0 {
                    return Err(CronError::invalid(expr, "step must be positive"));
                }
                n
            }
            None => 1,
        };

        let (lo, hi) = if range == "*" {
            // A step turns `*` into a restricted set; only a bare `*`
            // (or the equivalent `*/1`) leaves the field unrestricted
            // for the dom/dow rule.
            if step == 1 {
                star = true;
            }
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(expr, a, "range start")?, parse_value(expr, b, "range end")?)
        } else {
            let v = parse_value(expr, range, "value")?;
            // `a/n` means "from a to the field maximum, step n".
            if step_str.is_some() {
                (v, max)
            } else {
                (v, v)
            }
        };

        if lo < min || hi > max {
            return Err(CronError::invalid(
                expr,
                format!("value out of range ({lo}-{hi} not within {min}-{max})"),
            ));
        }
        if lo > hi {
            return Err(CronError::invalid(
                expr,
                format!("range start {lo} beyond range end {hi}"),
            ));
        }

        let mut v = lo;
        while v <= hi {
            bits |= 1 << v;
            // Steps near u32::MAX are grammar-valid; stop instead of
            // wrapping.
            match v.checked_add(step) {
                Some(n) => v = n,
                None => break,
            }
        }
    }

    Ok((bits, star))
}

fn parse_value(expr: &str, s: &str, what: &str) -> Result<u32> {
    s.parse::<u32>()
        .map_err(|_| CronError::invalid(expr, format!("{what} '{s}' is not an integer")))
}

/// Parse a Go-style duration: a sequence of `<integer><unit>` tokens combined
/// additively. Units run from nanoseconds to hours.
fn parse_duration(expr: &str, s: &str) -> Result<StdDuration> {
    const UNITS: [(&str, u128); 7] = [
        ("ns", 1),
        ("us", 1_000),
        ("µs", 1_000),
        ("ms", 1_000_000),
        ("s", 1_000_000_000),
        ("m", 60 * 1_000_000_000),
        ("h", 3_600 * 1_000_000_000),
    ];

    if s.is_empty() {
        return Err(CronError::invalid(expr, "missing duration"));
    }

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(CronError::invalid(
                expr,
                format!("expected integer at '{rest}'"),
            ));
        }
        let value: u128 = rest[..digits]
            .parse()
            .map_err(|_| CronError::invalid(expr, format!("bad integer '{}'", &rest[..digits])))?;
        rest = &rest[digits..];

        // Two-character units must be tried before their one-character
        // prefixes ('m' would otherwise swallow 'ms').
        let Some((unit, mult)) = UNITS.iter().find(|(u, _)| rest.starts_with(u)).copied() else {
            return Err(CronError::invalid(
                expr,
                format!("missing or unknown unit at '{rest}'"),
            ));
        };
        rest = &rest[unit.len()..];
        total += value * mult;
    }

    if total == 0 {
        return Err(CronError::invalid(expr, "duration must be positive"));
    }
    u64::try_from(total)
        .map(StdDuration::from_nanos)
        .map_err(|_| CronError::invalid(expr, "duration too large"))
}
