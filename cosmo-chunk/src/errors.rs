#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("Invalid chunk magic: expected \"CCHK\", got {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("Unsupported chunk version: expected {expected}, got {found}")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("Chunk file truncated: needed {needed} bytes at offset {offset}, file has {actual}")]
    Truncated {
        offset: usize,
        needed: usize,
        actual: usize,
    },

    #[error("Payload range at offset {offset} (len {len}) out of bounds for file of {file_size} bytes")]
    ShortRead {
        offset: u64,
        len: u64,
        file_size: u64,
    },

    #[error("Unknown dtype code: {0}")]
    UnknownDType(u8),

    #[error("Invalid chunk format: {0}")]
    InvalidFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChunkError>;
