//! Whole-file crontab loading.
//!
//! Rows are read line by line; `#override:` lines are held as a pending
//! override and attached to the next retained row, variable definitions are
//! collected in order, and rows are deduplicated by expression identity.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use tracing::{info, warn};

use omicron_conf::{ConfigKey, Configuration};
use omicron_core::fs::{file_exists_and_can_read, mtime_millis};
use omicron_core::Clock;

use crate::error::CrontabError;
use crate::row::CrontabRow;
use crate::variable::CronVariable;

/// Prefix marking a per-row configuration override line.
pub const OVERRIDE_KEYWORD: &str = "#override:";

/// An in-memory snapshot of the crontab file.
#[derive(Debug, Clone)]
pub struct Crontab {
    rows: Vec<CrontabRow>,
    variables: Vec<CronVariable>,
    overrides: HashMap<u32, Configuration>,
    bad_row_count: u32,
    file_mtime_millis: i64,
}

impl Crontab {
    /// Read the crontab named by `crontab.path` in the base configuration.
    ///
    /// An unreadable crontab is a hard error: the supervisor has nothing to
    /// schedule without one.
    pub fn load(base: &Configuration, clock: &dyn Clock) -> Result<Crontab, CrontabError> {
        let path = base.get(ConfigKey::CrontabPath).to_string();
        Self::load_path(Path::new(&path), base, clock)
    }

    fn load_path(
        path: &Path,
        base: &Configuration,
        clock: &dyn Clock,
    ) -> Result<Crontab, CrontabError> {
        if !file_exists_and_can_read(path) {
            return Err(CrontabError::Unreadable(path.display().to_string()));
        }

        let file_mtime_millis = mtime_millis(path);
        let content = std::fs::read_to_string(path)?;
        let read_timestamp = clock.now_millis();

        let mut rows: Vec<CrontabRow> = Vec::new();
        let mut seen: HashSet<(String, bool)> = HashSet::new();
        let mut variables: Vec<CronVariable> = Vec::new();
        let mut overrides: HashMap<u32, Configuration> = HashMap::new();
        let mut pending_override: Option<BTreeMap<ConfigKey, String>> = None;
        let mut bad_row_count = 0u32;

        for (index, line) in content.lines().enumerate() {
            let line_number = index as u32 + 1;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with(OVERRIDE_KEYWORD) {
                pending_override = Some(parse_override_line(trimmed));
                continue;
            }

            // Variable assignments keep any pending override for the next row.
            if let Some(variable) = CronVariable::parse(trimmed) {
                info!(
                    line = line_number,
                    name = variable.name(),
                    value = variable.value(),
                    "found variable definition"
                );
                variables.push(variable);
                continue;
            }

            let row = CrontabRow::parse(line_number, trimmed, read_timestamp);

            // A commented line that does not parse is just a comment.
            if row.is_commented() && row.is_malformed() {
                info!(line = line_number, "skipping general comment");
                if pending_override.take().is_some() {
                    warn!(line = line_number, "override line is followed by a comment and dropped");
                }
                continue;
            }

            if row.is_malformed() {
                bad_row_count += 1;
            }

            let identity = (row.raw_expression().to_ascii_lowercase(), row.is_commented());
            if !seen.insert(identity) {
                warn!(line = line_number, "duplicate crontab expression dropped");
                if pending_override.take().is_some() {
                    warn!(line = line_number, "override on duplicate expression dropped");
                }
                continue;
            }

            // Commented-but-parseable and malformed rows are retained for the
            // SLA policies; runnable rows are retained to be scheduled.
            if let Some(map) = pending_override.take() {
                info!(
                    line = line_number,
                    overrides = %summarise_overrides(&map),
                    command = row.command(),
                    "adding schedule with config overrides"
                );
                overrides.insert(line_number, base.with_overrides(&map));
            } else {
                info!(line = line_number, command = row.command(), "adding schedule");
            }

            rows.push(row);
        }

        Ok(Crontab {
            rows,
            variables,
            overrides,
            bad_row_count,
            file_mtime_millis,
        })
    }

    pub fn rows(&self) -> &[CrontabRow] {
        &self.rows
    }

    pub fn variables(&self) -> &[CronVariable] {
        &self.variables
    }

    /// The override configuration attached to a row, by line number.
    pub fn override_for(&self, line_number: u32) -> Option<&Configuration> {
        self.overrides.get(&line_number)
    }

    /// Rows that were uncommented but failed to parse.
    pub fn bad_row_count(&self) -> u32 {
        self.bad_row_count
    }

    /// Mtime of the crontab file at load time, used for reload detection.
    pub fn file_mtime_millis(&self) -> i64 {
        self.file_mtime_millis
    }
}

/// Parse an `#override: key=v,key=v` line into the subset of keys that are
/// recognised and overridable. Everything else is warned about and dropped.
fn parse_override_line(line: &str) -> BTreeMap<ConfigKey, String> {
    let mut result = BTreeMap::new();

    let body = line[OVERRIDE_KEYWORD.len()..].trim();

    for entry in body.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = entry.split_once('=') else {
            warn!(line, "malformed override entry");
            continue;
        };

        let Some(key) = ConfigKey::from_raw(raw_key) else {
            warn!(line, "malformed override: unknown key");
            continue;
        };

        if !key.allow_override() {
            warn!(key = key.raw_name(), line, "config key cannot be overridden per row");
            continue;
        }

        result.insert(key, raw_value.trim().to_string());
    }

    result
}

fn summarise_overrides(map: &BTreeMap<ConfigKey, String>) -> String {
    map.iter()
        .map(|(key, value)| format!("{}->{}", key.raw_name(), value))
        .collect::<Vec<_>>()
        .join(",")
}
