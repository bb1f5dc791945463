use std::str;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("control header of {0} bytes does not fit the frame")]
    Oversize(usize),
    #[error("control header is not valid UTF-8")]
    NotUtf8,
    #[error("unknown stream command `{0}`")]
    UnknownCommand(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not a number")]
    InvalidNumber(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The fixed-size control header that precedes every chunk payload on a
/// stream connection: `PUT <file> <chunk_id> <sender_rate> <chunk_size>`,
/// NUL-padded to the frame length. The receiver reads the whole frame before
/// parsing, so no delimiter ever has to be found inside the byte stream.
pub struct ChunkHeader {
    pub file_name: String,
    pub chunk_id: u32,
    /// The sender's advertised rate; the receiver sizes its reads by it.
    pub sender_rate: u32,
    /// Exact number of payload bytes that follow the header.
    pub chunk_size: usize,
}

impl ChunkHeader {
    /// Writes the header into `frame`, padding the remainder with NULs.
    pub fn encode_into(&self, frame: &mut [u8]) -> Result<(), FrameError> {
        let line = format!(
            "PUT {} {} {} {}",
            self.file_name, self.chunk_id, self.sender_rate, self.chunk_size
        );
        if line.len() >= frame.len() {
            return Err(FrameError::Oversize(line.len()));
        }
        frame.fill(0);
        frame[..line.len()].copy_from_slice(line.as_bytes());
        Ok(())
    }

    /// Parses a fully assembled frame, ignoring the NUL padding.
    pub fn parse(frame: &[u8]) -> Result<ChunkHeader, FrameError> {
        let end = frame.iter().position(|&b| b == 0).unwrap_or(frame.len());
        let text = str::from_utf8(&frame[..end]).map_err(|_| FrameError::NotUtf8)?;

        let mut tokens = text.split_whitespace();
        match tokens.next() {
            Some("PUT") => {}
            Some(other) => return Err(FrameError::UnknownCommand(other.to_string())),
            None => return Err(FrameError::MissingField("command")),
        }
        let file_name = tokens
            .next()
            .ok_or(FrameError::MissingField("file"))?
            .to_string();
        let chunk_id = number_field(tokens.next(), "chunk_id")?;
        let sender_rate = number_field(tokens.next(), "sender_rate")?;
        let chunk_size = tokens
            .next()
            .ok_or(FrameError::MissingField("chunk_size"))?
            .parse()
            .map_err(|_| FrameError::InvalidNumber("chunk_size"))?;

        Ok(ChunkHeader {
            file_name,
            chunk_id,
            sender_rate,
            chunk_size,
        })
    }
}

fn number_field(token: Option<&str>, name: &'static str) -> Result<u32, FrameError> {
    token
        .ok_or(FrameError::MissingField(name))?
        .parse()
        .map_err(|_| FrameError::InvalidNumber(name))
}
