use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// xrandr (or a hook) exited non-zero; carries its stderr verbatim.
    #[error("{0}")]
    Invocation(String),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xrandr output was not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
