use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid time interval '{0}': expected HH:mm+H with a positive hour count")]
    Interval(String),

    #[error("unknown time zone: {0}")]
    TimeZone(String),
}
