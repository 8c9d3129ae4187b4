//! Alert batching and delivery.
//!
//! Policy alerts from one tick are folded into a single plain-text email
//! and handed to a background dispatch worker; SMTP trouble is logged and
//! dropped, never surfaced to the scheduler loop.

pub mod email;
pub mod manager;
pub mod traits;

pub use email::EmailNotifier;
pub use manager::AlertManager;
pub use traits::{Notifier, NotifyError, OutboundEmail};
