use thiserror::Error;

/// Crate-wide error type. One variant per failure kind the compiler,
/// codec and interpreter can raise; see `SPEC_FULL.md` §7.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Compiler(String),

    #[error("unsupported input format for {filename:?} (format tag: {format:?})")]
    UnsupportedInputFormat {
        filename: Option<String>,
        format: Option<String>,
    },

    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("bytecode parser error while parsing {node}: {message}")]
    BytecodeParser { node: &'static str, message: String },

    #[error("unexpected end of stream while parsing {node}")]
    BytecodeParserEof { node: &'static str },

    #[error("unresolved forward-reference marker reached the emit stage")]
    MarkerNotResolvable,

    #[error("feature not implemented: {0}")]
    FeatureNotImplemented(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
