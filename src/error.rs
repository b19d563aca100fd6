//! Error types shared by the loader, the workload mix and the benchmark driver.

use thiserror::Error;

/// The category of an [`Error`], for callers (and tests) that only care about what went wrong,
/// not the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    KeyEncoding,
    Integrity,
    Dispatch,
    Decode,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::KeyEncoding => "key_encoding",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Dispatch => "dispatch",
            ErrorKind::Decode => "decode",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The configuration can never produce a valid dataset or run.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Two logical rows would share one key, or a key falls outside the encodable space.
    #[error("key encoding: {0}")]
    KeyEncoding(String),

    /// A table load wrote a different number of rows than it generated.
    #[error("table {table}: inserted {inserted} records but examined {examined}")]
    Integrity {
        table: &'static str,
        inserted: u64,
        examined: u64,
    },

    /// The workload mix produced no transaction type for a draw.
    #[error("transaction dispatch: {0}")]
    Dispatch(String),

    #[error("record codec: {0}")]
    Codec(#[from] bincode::Error),

    #[error("table {table}: no record at key {key:#018x}")]
    MissingRecord { table: &'static str, key: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::KeyEncoding(_) => ErrorKind::KeyEncoding,
            Error::Integrity { .. } => ErrorKind::Integrity,
            Error::Dispatch(_) => ErrorKind::Dispatch,
            Error::Codec(_) | Error::MissingRecord { .. } => ErrorKind::Decode,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinguishable() {
        let e = Error::Integrity {
            table: "stock",
            inserted: 9,
            examined: 10,
        };
        assert_eq!(e.kind(), ErrorKind::Integrity);
        assert_eq!(
            e.to_string(),
            "table stock: inserted 9 records but examined 10"
        );
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Config);
        assert_eq!(
            Error::MissingRecord {
                table: "item",
                key: 1
            }
            .kind(),
            ErrorKind::Decode
        );
        assert_eq!(ErrorKind::KeyEncoding.to_string(), "key_encoding");
    }
}
