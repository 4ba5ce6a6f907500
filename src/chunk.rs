//! Units of data that cross the session boundary in either direction.

use std::fmt;

/// MIME type attached to re-encoded camera frames.
pub const JPEG_MIME: &str = "image/jpeg";

/// One outbound piece of user input. Owned by exactly one stage at a time:
/// producer, then queue, then forwarder.
#[derive(Clone, PartialEq, Eq)]
pub enum OutboundChunk {
    /// A console line. `end_of_turn` tells the remote side the utterance is complete.
    Text { text: String, end_of_turn: bool },
    /// Raw 16-bit little-endian PCM.
    Audio {
        pcm: Vec<u8>,
        sample_rate: u32,
        channels: u16,
    },
    /// An encoded still image.
    Image { data: Vec<u8>, mime_type: String },
}

impl OutboundChunk {
    pub fn user_turn(text: impl Into<String>) -> Self {
        OutboundChunk::Text {
            text: text.into(),
            end_of_turn: true,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboundChunk::Text { .. } => "text",
            OutboundChunk::Audio { .. } => "audio",
            OutboundChunk::Image { .. } => "image",
        }
    }

    /// Payload size in bytes, used for logging only.
    pub fn payload_len(&self) -> usize {
        match self {
            OutboundChunk::Text { text, .. } => text.len(),
            OutboundChunk::Audio { pcm, .. } => pcm.len(),
            OutboundChunk::Image { data, .. } => data.len(),
        }
    }
}

// Payloads can be hundreds of kilobytes; keep Debug output to a summary.
impl fmt::Debug for OutboundChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundChunk::Text { text, end_of_turn } => f
                .debug_struct("Text")
                .field("text", text)
                .field("end_of_turn", end_of_turn)
                .finish(),
            OutboundChunk::Audio {
                pcm,
                sample_rate,
                channels,
            } => f
                .debug_struct("Audio")
                .field("bytes", &pcm.len())
                .field("sample_rate", sample_rate)
                .field("channels", channels)
                .finish(),
            OutboundChunk::Image { data, mime_type } => f
                .debug_struct("Image")
                .field("bytes", &data.len())
                .field("mime_type", mime_type)
                .finish(),
        }
    }
}

/// Something the remote session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Partial model text; meaningful incrementally.
    Text(String),
    /// Raw 16-bit little-endian mono PCM at the receive rate.
    Audio(Vec<u8>),
    /// The model finished its turn, or was cut off by the user.
    TurnBoundary { interrupted: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_turn_marks_end_of_turn() {
        assert_eq!(
            OutboundChunk::user_turn("hello"),
            OutboundChunk::Text {
                text: "hello".to_string(),
                end_of_turn: true
            }
        );
    }

    #[test]
    fn debug_omits_binary_payloads() {
        let chunk = OutboundChunk::Audio {
            pcm: vec![0u8; 4096],
            sample_rate: 16_000,
            channels: 1,
        };
        let rendered = format!("{chunk:?}");
        assert!(rendered.contains("bytes: 4096"));
        assert_eq!(chunk.kind(), "audio");
        assert_eq!(chunk.payload_len(), 4096);
    }
}
