//! Crontab variable definitions and whole-token command substitution.

use regex::Regex;

/// A `NAME=value` definition read from the crontab.
///
/// Substitution replaces `$NAME` only when the token ends at whitespace or
/// end-of-line, so a variable named `VAR` never clobbers a `$VAR1` token.
#[derive(Debug, Clone)]
pub struct CronVariable {
    name: String,
    value: String,
    pattern: Regex,
}

impl CronVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> CronVariable {
        let name = name.into();
        let value = value.into();

        // The regex crate has no lookahead; capturing the trailing
        // whitespace-or-end and writing it back achieves the same
        // whole-token guarantee.
        let pattern = Regex::new(&format!(r"\${}(\s+|$)", regex::escape(&name)))
            .unwrap_or_else(|_| Regex::new(r"\z.").unwrap());

        CronVariable { name, value, pattern }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Replace every whole-token occurrence of `$NAME` in `line`.
    pub fn apply(&self, line: &str) -> String {
        self.pattern
            .replace_all(line, |caps: &regex::Captures<'_>| {
                format!("{}{}", self.value, &caps[1])
            })
            .into_owned()
    }

    /// Try to read a `NAME=value` definition from a crontab line.
    ///
    /// The name is everything before the first `=` and may not contain
    /// whitespace. A double-quoted value keeps exactly the text between the
    /// first and last quote.
    pub fn parse(line: &str) -> Option<CronVariable> {
        let equal_index = line.find('=')?;

        let name = &line[..equal_index];
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return None;
        }

        let value = match line.find('"') {
            Some(quote_index) => {
                // A quote before the equal sign means this is not an assignment.
                if quote_index < equal_index {
                    return None;
                }
                let last_quote = line.rfind('"').unwrap_or(quote_index);
                &line[quote_index + 1..last_quote]
            }
            None => &line[equal_index + 1..],
        };

        Some(CronVariable::new(name, value))
    }
}

/// Apply every variable to a command line.
///
/// Longest names first, so overlapping names cannot shadow each other even
/// when one is a prefix of another.
pub fn substitute(command: &str, variables: &[CronVariable]) -> String {
    let mut ordered: Vec<&CronVariable> = variables.iter().collect();
    ordered.sort_by_key(|var| std::cmp::Reverse(var.name().len()));

    let mut result = command.to_string();
    for variable in ordered {
        result = variable.apply(&result);
    }
    result
}
