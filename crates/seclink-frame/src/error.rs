/// Errors that can occur during frame or envelope encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The checksum in the frame header does not match the payload.
    #[error("frame CRC mismatch (declared 0x{declared:04X}, computed 0x{computed:04X})")]
    CrcMismatch { declared: u16, computed: u16 },

    /// The declared length disagrees with the bytes actually supplied
    /// or is impossible for the wire format.
    #[error("frame length mismatch (declared {declared} bytes, got {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// Fewer bytes were available than the declared length.
    #[error("truncated frame (declared {declared} bytes, got {actual})")]
    Truncated { declared: usize, actual: usize },

    /// The body exceeds the transport's maximum.
    #[error("body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// The message id byte of a proxy envelope is unknown.
    #[error("unknown proxy message id 0x{0:02X}")]
    UnknownMessageId(u8),
}

pub type Result<T> = std::result::Result<T, FrameError>;
