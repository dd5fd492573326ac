use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("expected exactly one top-level chunk, found {0}")]
    TopLevelChunkCount(usize),
    #[error("invalid chunk type: expected '{expected}', found '{found}'")]
    UnexpectedChunk { expected: String, found: String },
    #[error("invalid signature: expected '{expected}', found '{found}'")]
    UnexpectedSignature { expected: String, found: String },
    #[error("invalid {list} structure: expected {expected} sub-chunks, found {found}")]
    SubChunkCount {
        list: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("missing '{0}' chunk")]
    MissingChunk(&'static str),
    #[error("read error: {0}")]
    Read(String),
}

// binread errors carry `Box<dyn Any>` payloads, so only their debug form is kept.
impl From<binread::Error> for ParseError {
    fn from(err: binread::Error) -> Self {
        ParseError::Read(format!("{:?}", err))
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
