//! NDJSON framing for the agent socket.
//!
//! Inbound lines decode to [`Frame`]s. Malformed and oversized lines become
//! frames too rather than decoder errors, because a `FramedRead` stops
//! yielding after a decoder error. Only genuine socket errors end the stream.

use bytes::BytesMut;
use switchyard_core::wire::AgentResponse;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// One inbound unit from an agent.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Response(AgentResponse),
    /// The line was not a valid response document.
    Malformed { reason: String },
    /// The line exceeded the frame limit and was discarded up to its newline.
    Oversized,
}

/// Line codec for the agent wire protocol.
#[derive(Debug)]
pub struct AgentCodec {
    lines: LinesCodec,
}

impl AgentCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_frame_bytes),
        }
    }

    fn classify(result: Result<Option<String>, LinesCodecError>) -> Step {
        match result {
            Ok(Some(line)) if line.trim().is_empty() => Step::Blank,
            Ok(Some(line)) => Step::Frame(match AgentResponse::from_json(&line) {
                Ok(response) => Frame::Response(response),
                Err(e) => Frame::Malformed {
                    reason: e.to_string(),
                },
            }),
            Ok(None) => Step::NeedMore,
            Err(LinesCodecError::MaxLineLengthExceeded) => Step::Frame(Frame::Oversized),
            // Decoding never touches the socket; the only io error LinesCodec
            // raises here is a line that is not UTF-8.
            Err(LinesCodecError::Io(e)) => Step::Frame(Frame::Malformed {
                reason: e.to_string(),
            }),
        }
    }
}

enum Step {
    Frame(Frame),
    Blank,
    NeedMore,
}

impl Decoder for AgentCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        loop {
            match Self::classify(self.lines.decode(src)) {
                Step::Frame(frame) => return Ok(Some(frame)),
                Step::Blank => continue,
                Step::NeedMore => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        loop {
            match Self::classify(self.lines.decode_eof(src)) {
                Step::Frame(frame) => return Ok(Some(frame)),
                Step::Blank => continue,
                Step::NeedMore => return Ok(None),
            }
        }
    }
}

impl Encoder<String> for AgentCodec {
    type Error = std::io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.lines.encode(line, dst).map_err(|e| match e {
            LinesCodecError::Io(e) => e,
            LinesCodecError::MaxLineLengthExceeded => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "line too long")
            }
        })
    }
}
