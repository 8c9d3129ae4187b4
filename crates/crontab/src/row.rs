//! A single parsed crontab row.
//!
//! Parsing never discards a row outright: a commented row that still parses
//! is kept (so "commented for too long" can alert), and an uncommented row
//! that fails to parse is kept with its malformed flag set. The whole-file
//! loader decides what to do with commented rows that do not parse.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::RangeInclusive;

use tracing::warn;

use crate::error::CrontabError;
use crate::schedule::Schedule;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// The five schedule fields of an expression, in row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Minutes,
    Hours,
    DaysOfMonth,
    Months,
    DaysOfWeek,
}

impl Field {
    const ALL: [Field; 5] = [
        Field::Minutes,
        Field::Hours,
        Field::DaysOfMonth,
        Field::Months,
        Field::DaysOfWeek,
    ];

    fn name(self) -> &'static str {
        match self {
            Field::Minutes => "minutes",
            Field::Hours => "hours",
            Field::DaysOfMonth => "days of month",
            Field::Months => "months",
            Field::DaysOfWeek => "days of week",
        }
    }

    fn allowed(self) -> RangeInclusive<u32> {
        match self {
            Field::Minutes => 0..=59,
            Field::Hours => 0..=23,
            Field::DaysOfMonth => 1..=31,
            Field::Months => 1..=12,
            Field::DaysOfWeek => 0..=6,
        }
    }

    /// Translate a unit token into its numeric value: a decimal integer, or
    /// for months and weekdays a case-insensitive three-letter name.
    fn unit_value(self, token: &str) -> Option<u32> {
        if let Ok(value) = token.parse::<u32>() {
            // Sunday can be written as either 0 or 7 in crond expressions;
            // normalise before range validation so week-wrapping ranges
            // like 5-7 are rejected rather than silently accepted.
            if self == Field::DaysOfWeek && value == 7 {
                return Some(0);
            }
            return Some(value);
        }

        let names: &[&str] = match self {
            Field::Months => &MONTH_NAMES,
            Field::DaysOfWeek => &WEEKDAY_NAMES,
            _ => return None,
        };

        let lower = token.to_ascii_lowercase();
        names
            .iter()
            .position(|name| **name == lower)
            .map(|index| index as u32 + *self.allowed().start())
    }
}

/// A crontab row with its parsed runtime whitelists.
#[derive(Debug, Clone)]
pub struct CrontabRow {
    line_number: u32,
    raw_expression: String,
    executing_user: String,
    command: String,
    commented: bool,
    malformed: bool,
    read_timestamp_millis: i64,
    schedule: Option<Schedule>,
}

impl CrontabRow {
    /// Parse one trimmed crontab line.
    ///
    /// Never fails: parse problems set the malformed flag instead, since
    /// malformed rows are retained for SLA reporting. `read_timestamp_millis`
    /// is when the crontab read happened, used by the commented/malformed
    /// alert policies.
    pub fn parse(line_number: u32, line: &str, read_timestamp_millis: i64) -> CrontabRow {
        let coalesced = coalesce_hashmarks(line.trim());
        let commented = coalesced.starts_with('#');
        let raw_expression = if commented {
            coalesced[1..].to_string()
        } else {
            coalesced
        };

        match parse_expression(&raw_expression) {
            Ok((executing_user, command, schedule)) => CrontabRow {
                line_number,
                raw_expression,
                executing_user,
                command,
                commented,
                malformed: false,
                read_timestamp_millis,
                schedule: Some(schedule),
            },
            Err(e) => {
                if !commented {
                    warn!(line = line_number, error = %e, "crontab interpretation error");
                }
                CrontabRow {
                    line_number,
                    raw_expression,
                    executing_user: String::new(),
                    command: String::new(),
                    commented,
                    malformed: true,
                    read_timestamp_millis,
                    schedule: None,
                }
            }
        }
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    /// The expression text after hash coalescing, with the leading `#`
    /// stripped for commented rows.
    pub fn raw_expression(&self) -> &str {
        &self.raw_expression
    }

    pub fn executing_user(&self) -> &str {
        &self.executing_user
    }

    /// The command with internal whitespace collapsed to single spaces,
    /// before variable substitution.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn is_commented(&self) -> bool {
        self.commented
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed
    }

    /// A row launches tasks only when it is neither commented nor malformed.
    pub fn is_runnable(&self) -> bool {
        !self.commented && !self.malformed
    }

    pub fn read_timestamp_millis(&self) -> i64 {
        self.read_timestamp_millis
    }

    /// The parsed schedule; `None` for malformed rows.
    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }
}

impl fmt::Display for CrontabRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line: {}] {}", self.line_number, self.raw_expression)
    }
}

// Row identity for crontab reconciliation: the expression text compared
// case-insensitively, plus the commented flag. Line numbers and read
// timestamps do not participate.
impl PartialEq for CrontabRow {
    fn eq(&self, other: &Self) -> bool {
        self.commented == other.commented
            && self.raw_expression.eq_ignore_ascii_case(&other.raw_expression)
    }
}

impl Eq for CrontabRow {}

impl Hash for CrontabRow {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.commented.hash(state);
        self.raw_expression.to_ascii_lowercase().hash(state);
    }
}

/// Collapse a leading run of `#` characters and interleaved whitespace into
/// a single `#`. `## foo` and `#  # foo` both become `# foo`; a line with no
/// leading hash is returned untouched.
fn coalesce_hashmarks(trimmed: &str) -> String {
    let mut hash_found = false;

    for (index, ch) in trimmed.char_indices() {
        if ch == '#' {
            hash_found = true;
            continue;
        }

        if !ch.is_whitespace() {
            if !hash_found {
                return trimmed.to_string();
            }
            return format!("#{}", &trimmed[index..]);
        }
    }

    trimmed.to_string()
}

/// Split an uncommented expression into user, command, and schedule.
fn parse_expression(raw: &str) -> Result<(String, String, Schedule), CrontabError> {
    if raw.trim().is_empty() {
        return Err(CrontabError::Empty);
    }

    let tokens: Vec<&str> = raw.split_whitespace().collect();

    // Five schedule fields, the executing user, and at least one command token.
    if tokens.len() < 7 {
        return Err(CrontabError::MissingParts(raw.to_string()));
    }

    let mut sets: Vec<BTreeSet<u32>> = Vec::with_capacity(Field::ALL.len());
    for (field, token) in Field::ALL.into_iter().zip(&tokens) {
        sets.push(parse_field(field, token)?);
    }

    let executing_user = tokens[5].to_string();
    // Joining with single spaces collapses whitespace inside the command.
    let command = tokens[6..].join(" ");

    let mut sets = sets.into_iter();
    let schedule = Schedule::new(
        sets.next().unwrap_or_default(),
        sets.next().unwrap_or_default(),
        sets.next().unwrap_or_default(),
        sets.next().unwrap_or_default(),
        sets.next().unwrap_or_default(),
    );

    Ok((executing_user, command, schedule))
}

/// Evaluate one schedule field into its numeric whitelist.
///
/// Grammar per item (comma-joined): `RANGE` or `RANGE/STEP`, where `RANGE`
/// is `*`, a single unit, or `A-B` within the field's allowed range.
fn parse_field(field: Field, expression: &str) -> Result<BTreeSet<u32>, CrontabError> {
    let fail = |reason: String| CrontabError::Expression {
        field: field.name(),
        expression: expression.to_string(),
        reason,
    };

    let mut results = BTreeSet::new();

    for item in expression.split(',') {
        let item = item.trim();
        if item.is_empty() {
            return Err(fail("empty list item".to_string()));
        }

        let slash_parts: Vec<&str> = item.split('/').collect();
        if slash_parts.len() > 2 || slash_parts.iter().any(|part| part.is_empty()) {
            return Err(fail("malformed step expression".to_string()));
        }

        let step: u32 = if slash_parts.len() == 2 {
            let step = slash_parts[1]
                .parse()
                .map_err(|_| fail(format!("step is not a positive integer: {}", slash_parts[1])))?;
            if step == 0 {
                return Err(fail("step must be positive".to_string()));
            }
            step
        } else {
            1
        };

        let allowed = field.allowed();
        let range_expression = slash_parts[0];

        let (start, end) = if range_expression == "*" {
            (*allowed.start(), *allowed.end())
        } else {
            let hyphen_parts: Vec<&str> = range_expression.split('-').collect();
            if hyphen_parts.len() > 2 || hyphen_parts.iter().any(|part| part.is_empty()) {
                return Err(fail("malformed range expression".to_string()));
            }

            let start = field
                .unit_value(hyphen_parts[0])
                .ok_or_else(|| fail(format!("not a valid unit: {}", hyphen_parts[0])))?;
            if !allowed.contains(&start) {
                return Err(fail(format!("value out of range {allowed:?}: {start}")));
            }

            let end = if hyphen_parts.len() == 2 {
                let end = field
                    .unit_value(hyphen_parts[1])
                    .ok_or_else(|| fail(format!("not a valid unit: {}", hyphen_parts[1])))?;
                if !allowed.contains(&end) {
                    return Err(fail(format!("value out of range {allowed:?}: {end}")));
                }
                end
            } else {
                start
            };

            (start, end)
        };

        // Ranges that would wrap the end of the week or year are expressed
        // as lists of non-wrapping ranges instead.
        if start > end {
            return Err(fail(format!("range start {start} is greater than range end {end}")));
        }

        let mut value = start;
        while value <= end {
            results.insert(value);
            match value.checked_add(step) {
                Some(next) => value = next,
                None => break,
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: &str) -> CrontabRow {
        CrontabRow::parse(1, line, 1_000)
    }

    #[test]
    fn plain_expression_parses() {
        let r = row("*/2 10 * * * root cd / &&   run-parts  --report /etc/cron.hourly");
        assert!(r.is_runnable());
        assert_eq!(r.executing_user(), "root");
        // Internal whitespace collapses to single spaces.
        assert_eq!(r.command(), "cd / && run-parts --report /etc/cron.hourly");
        assert_eq!(r.schedule().unwrap().hours().len(), 1);
    }

    #[test]
    fn commented_expression_is_retained() {
        let r = row("# */5 * * * * deploy /usr/local/bin/sync");
        assert!(r.is_commented());
        assert!(!r.is_malformed());
        assert!(!r.is_runnable());
        assert_eq!(r.raw_expression(), " */5 * * * * deploy /usr/local/bin/sync");
    }

    #[test]
    fn double_hash_coalesces_to_one() {
        let a = row("## */5 * * * * deploy /usr/local/bin/sync");
        let b = row("#  # */5 * * * * deploy /usr/local/bin/sync");
        assert!(a.is_commented() && !a.is_malformed());
        assert!(b.is_commented() && !b.is_malformed());
        assert_eq!(a, b);
    }

    #[test]
    fn five_field_row_is_malformed_but_kept() {
        let r = row("* * * * root echo hi");
        assert!(r.is_malformed());
        assert!(!r.is_commented());
        assert!(!r.is_runnable());
        assert!(r.schedule().is_none());
    }

    #[test]
    fn missing_command_is_malformed() {
        assert!(row("* * * * * root").is_malformed());
    }

    #[test]
    fn general_comment_is_commented_and_malformed() {
        let r = row("# remember to feed the build servers");
        assert!(r.is_commented());
        assert!(r.is_malformed());
    }

    #[test]
    fn weekday_seven_normalises_to_sunday() {
        let r = row("* * * * 7 root x y");
        assert_eq!(r.schedule().unwrap().days_of_week().iter().copied().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn week_wrapping_range_is_rejected() {
        // fri-tue wraps the week boundary and must be written as two ranges.
        assert!(row("* * * * fri-tue root x").is_malformed());
        assert!(row("* * * * 5-7 root x").is_malformed());
        assert!(!row("* * * * fri-sat,sun-tue root x").is_malformed());
    }

    #[test]
    fn month_and_weekday_names_are_case_insensitive() {
        let r = row("* * * JAN-May Sun root x");
        let s = r.schedule().unwrap();
        assert_eq!(s.months().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(s.days_of_week().iter().copied().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn step_grammar() {
        // 1-7/7 selects only the range start.
        let r = row("1-7/7 * * * * root x");
        assert_eq!(r.schedule().unwrap().minutes().iter().copied().collect::<Vec<_>>(), vec![1]);

        let r = row("*/15 * * * * root x");
        assert_eq!(
            r.schedule().unwrap().minutes().iter().copied().collect::<Vec<_>>(),
            vec![0, 15, 30, 45]
        );
    }

    #[test]
    fn rejects_bad_field_grammar() {
        assert!(row("60 * * * * root x").is_malformed()); // out of range
        assert!(row("*/0 * * * * root x").is_malformed()); // zero step
        assert!(row("1//2 * * * * root x").is_malformed()); // extra slash
        assert!(row("1--2 * * * * root x").is_malformed()); // extra hyphen
        assert!(row("5-1 * * * * root x").is_malformed()); // inverted range
        assert!(row("1,,2 * * * * root x").is_malformed()); // empty list item
        assert!(row("* * 0 * * root x").is_malformed()); // day of month below 1
        assert!(row("* * * 13 * root x").is_malformed()); // month above 12
    }

    #[test]
    fn list_of_ranges_accumulates() {
        let r = row("0-10,20-30 * * * * root x");
        let minutes = r.schedule().unwrap().minutes();
        assert_eq!(minutes.len(), 22);
        assert!(minutes.contains(&0) && minutes.contains(&30));
        assert!(!minutes.contains(&15));
    }

    #[test]
    fn identity_ignores_case_and_line_number() {
        let a = CrontabRow::parse(3, "* * * * * root Echo Hi", 0);
        let b = CrontabRow::parse(9, "* * * * * ROOT echo hi", 500);
        assert_eq!(a, b);

        // Commented and uncommented variants of the same text differ.
        let c = CrontabRow::parse(3, "# * * * * * root Echo Hi", 0);
        assert_ne!(a, c);
    }
}
