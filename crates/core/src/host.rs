//! Host identity helpers: short hostname resolution and the root-principal
//! check required before launching tasks as other users.

use std::env;

const UNKNOWN_HOST: &str = "UNKNOWN_HOST";

/// Short hostname for alert subjects.
///
/// Prefers the `HOSTNAME` environment variable, falls back to the OS
/// hostname, and yields `UNKNOWN_HOST` when neither resolves. Only the
/// first dot-separated label is kept.
pub fn short_hostname() -> String {
    env::var("HOSTNAME")
        .ok()
        .and_then(|name| first_label(&name))
        .or_else(os_hostname)
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

fn os_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .and_then(|name| first_label(&name))
}

fn first_label(name: &str) -> Option<String> {
    name.split('.')
        .map(str::trim)
        .find(|label| !label.is_empty())
        .map(str::to_string)
}

/// True when the process runs with root privileges.
///
/// Launching children via `su` requires an effective uid of 0; on non-unix
/// hosts this is always false and every task reports a failed start.
#[cfg(unix)]
pub fn is_running_as_root() -> bool {
    // Safety: geteuid has no failure modes and touches no memory.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_running_as_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_label_strips_domain() {
        assert_eq!(first_label("web01.example.com"), Some("web01".to_string()));
        assert_eq!(first_label("web01"), Some("web01".to_string()));
        assert_eq!(first_label(""), None);
        assert_eq!(first_label("..."), None);
    }

    #[test]
    fn short_hostname_never_empty() {
        assert!(!short_hostname().is_empty());
    }
}
