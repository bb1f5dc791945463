use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::entities::{EndpointError, PeerEndpoint};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not a number")]
    InvalidNumber(&'static str),
    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),
    #[error("REQUEST carries no chunk ids")]
    EmptyRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A control-plane datagram. One ASCII line, tokens separated by single
/// spaces; chunk ids are decimal, endpoints are `ip:port`.
pub enum Message {
    /// `DISCOVERY <file> <total_chunks> <ttl> <origin_ip>:<origin_port>` —
    /// flooded query; `origin` is the searching peer, preserved across hops.
    Discovery {
        file: String,
        total_chunks: u32,
        ttl: u32,
        origin: PeerEndpoint,
    },
    /// `RESPONSE <file> <advertised_rate> <chunk_id>*` — sent straight to
    /// the origin by any peer holding chunks of `file`.
    Response {
        file: String,
        rate: u32,
        chunks: Vec<u32>,
    },
    /// `REQUEST <file> <stream_port> <chunk_id>+` — asks a provider to push
    /// the listed chunks to the requester's stream port.
    Request {
        file: String,
        stream_port: u16,
        chunks: Vec<u32>,
    },
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Discovery {
                file,
                total_chunks,
                ttl,
                origin,
            } => write!(f, "DISCOVERY {file} {total_chunks} {ttl} {origin}"),
            Message::Response { file, rate, chunks } => {
                write!(f, "RESPONSE {file} {rate}")?;
                for chunk in chunks {
                    write!(f, " {chunk}")?;
                }
                Ok(())
            }
            Message::Request {
                file,
                stream_port,
                chunks,
            } => {
                write!(f, "REQUEST {file} {stream_port}")?;
                for chunk in chunks {
                    write!(f, " {chunk}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Message {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let command = tokens.next().ok_or(MessageError::Empty)?;
        match command {
            "DISCOVERY" => {
                let file = text_field(tokens.next(), "file")?;
                let total_chunks = number_field(tokens.next(), "total_chunks")?;
                let ttl = number_field(tokens.next(), "ttl")?;
                let origin = text_field(tokens.next(), "origin")?.parse()?;
                Ok(Message::Discovery {
                    file,
                    total_chunks,
                    ttl,
                    origin,
                })
            }
            "RESPONSE" => {
                let file = text_field(tokens.next(), "file")?;
                let rate = number_field(tokens.next(), "advertised_rate")?;
                let chunks = chunk_list(tokens)?;
                Ok(Message::Response { file, rate, chunks })
            }
            "REQUEST" => {
                let file = text_field(tokens.next(), "file")?;
                let stream_port = tokens
                    .next()
                    .ok_or(MessageError::MissingField("stream_port"))?
                    .parse()
                    .map_err(|_| MessageError::InvalidNumber("stream_port"))?;
                let chunks = chunk_list(tokens)?;
                if chunks.is_empty() {
                    return Err(MessageError::EmptyRequest);
                }
                Ok(Message::Request {
                    file,
                    stream_port,
                    chunks,
                })
            }
            other => Err(MessageError::UnknownCommand(other.to_string())),
        }
    }
}

fn text_field(token: Option<&str>, name: &'static str) -> Result<String, MessageError> {
    token
        .map(str::to_string)
        .ok_or(MessageError::MissingField(name))
}

fn number_field(token: Option<&str>, name: &'static str) -> Result<u32, MessageError> {
    token
        .ok_or(MessageError::MissingField(name))?
        .parse()
        .map_err(|_| MessageError::InvalidNumber(name))
}

fn chunk_list<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Vec<u32>, MessageError> {
    tokens
        .map(|t| t.parse().map_err(|_| MessageError::InvalidNumber("chunk_id")))
        .collect()
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_discovery_wire_format() {
        let message = Message::Discovery {
            file: String::from("book.txt"),
            total_chunks: 10,
            ttl: 3,
            origin: PeerEndpoint::new("10.0.0.1", 8000),
        };
        assert_eq!(message.to_string(), "DISCOVERY book.txt 10 3 10.0.0.1:8000");
        assert_eq!(message.to_string().parse::<Message>().unwrap(), message);
    }

    #[test]
    fn test_response_wire_format() {
        let message = Message::Response {
            file: String::from("book.txt"),
            rate: 64,
            chunks: vec![0, 2, 5],
        };
        assert_eq!(message.to_string(), "RESPONSE book.txt 64 0 2 5");
        assert_eq!(message.to_string().parse::<Message>().unwrap(), message);
    }

    #[test]
    fn test_response_with_no_chunks_parses() {
        let message: Message = "RESPONSE book.txt 64".parse().unwrap();
        assert_eq!(
            message,
            Message::Response {
                file: String::from("book.txt"),
                rate: 64,
                chunks: Vec::new(),
            }
        );
    }

    #[test]
    fn test_request_wire_format() {
        let message = Message::Request {
            file: String::from("book.txt"),
            stream_port: 9000,
            chunks: vec![1, 3],
        };
        assert_eq!(message.to_string(), "REQUEST book.txt 9000 1 3");
        assert_eq!(message.to_string().parse::<Message>().unwrap(), message);
    }

    #[test]
    fn test_request_without_chunks_is_rejected() {
        assert_eq!(
            "REQUEST book.txt 9000".parse::<Message>(),
            Err(MessageError::EmptyRequest)
        );
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert_eq!(
            "HELLO book.txt".parse::<Message>(),
            Err(MessageError::UnknownCommand(String::from("HELLO")))
        );
        assert_eq!("".parse::<Message>(), Err(MessageError::Empty));
    }

    #[test]
    fn test_malformed_fields_are_rejected() {
        assert_eq!(
            "DISCOVERY book.txt ten 3 10.0.0.1:8000".parse::<Message>(),
            Err(MessageError::InvalidNumber("total_chunks"))
        );
        assert_eq!(
            "DISCOVERY book.txt 10 3".parse::<Message>(),
            Err(MessageError::MissingField("origin"))
        );
        assert!(matches!(
            "DISCOVERY book.txt 10 3 nowhere".parse::<Message>(),
            Err(MessageError::InvalidEndpoint(_))
        ));
        assert_eq!(
            "RESPONSE book.txt 64 0 x".parse::<Message>(),
            Err(MessageError::InvalidNumber("chunk_id"))
        );
    }
}
