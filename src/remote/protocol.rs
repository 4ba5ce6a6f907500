//! JSON messages for the bidirectional live endpoint.
//!
//! Every websocket frame in either direction is one JSON object. Client
//! messages are externally tagged (`{"setup": {...}}`); server messages may
//! carry several optional sections at once.

use crate::chunk::{InboundEvent, OutboundChunk};
use crate::error::SessionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

// ============================================================================
// Client → server
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    ClientContent(ClientContent),
    RealtimeInput(RealtimeInput),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoice,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoice {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

// ============================================================================
// Server → client
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub go_away: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
}

// ============================================================================
// Conversions
// ============================================================================

/// Options baked into the opening `setup` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOptions {
    pub model: String,
    pub response_modality: String,
    pub voice: Option<String>,
    pub system_prompt: Option<String>,
}

impl ClientMessage {
    pub fn setup(options: &SetupOptions) -> Self {
        ClientMessage::Setup(Setup {
            model: options.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec![options.response_modality.clone()],
                speech_config: options.voice.as_ref().map(|voice| SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoice {
                            voice_name: voice.clone(),
                        },
                    },
                }),
            },
            system_instruction: options.system_prompt.as_ref().map(|prompt| Content {
                role: None,
                parts: vec![Part {
                    text: Some(prompt.clone()),
                    inline_data: None,
                }],
            }),
        })
    }

    /// Wrap one outbound chunk in the message the endpoint expects for it.
    pub fn from_chunk(chunk: &OutboundChunk) -> Self {
        match chunk {
            OutboundChunk::Text { text, end_of_turn } => ClientMessage::ClientContent(ClientContent {
                turns: vec![Content {
                    role: Some("user".to_string()),
                    parts: vec![Part {
                        text: Some(text.clone()),
                        inline_data: None,
                    }],
                }],
                turn_complete: *end_of_turn,
            }),
            OutboundChunk::Audio {
                pcm, sample_rate, ..
            } => ClientMessage::RealtimeInput(RealtimeInput {
                media_chunks: vec![Blob {
                    mime_type: format!("audio/pcm;rate={sample_rate}"),
                    data: STANDARD.encode(pcm),
                }],
            }),
            OutboundChunk::Image { data, mime_type } => {
                ClientMessage::RealtimeInput(RealtimeInput {
                    media_chunks: vec![Blob {
                        mime_type: mime_type.clone(),
                        data: STANDARD.encode(data),
                    }],
                })
            }
        }
    }

    pub fn to_json(&self) -> Result<String, SessionError> {
        serde_json::to_string(self).map_err(SessionError::transport)
    }
}

impl ServerMessage {
    pub fn parse(raw: &[u8]) -> Result<Self, SessionError> {
        serde_json::from_slice(raw)
            .map_err(|err| SessionError::Transport(format!("malformed server message: {err}")))
    }

    /// Flatten the message into session events, in wire order.
    ///
    /// Inline data that is not audio is skipped. A message that is both
    /// interrupted and complete yields a single boundary.
    pub fn into_events(self) -> Result<Vec<InboundEvent>, SessionError> {
        let mut events = Vec::new();
        let Some(content) = self.server_content else {
            return Ok(events);
        };
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(text) = part.text {
                    if !text.is_empty() {
                        events.push(InboundEvent::Text(text));
                    }
                }
                if let Some(blob) = part.inline_data {
                    if !blob.mime_type.starts_with("audio/") {
                        tracing::debug!(mime = %blob.mime_type, "skipping non-audio inline data");
                        continue;
                    }
                    let pcm = STANDARD.decode(blob.data.as_bytes()).map_err(|err| {
                        SessionError::Transport(format!("invalid audio payload: {err}"))
                    })?;
                    events.push(InboundEvent::Audio(pcm));
                }
            }
        }
        if content.interrupted || content.turn_complete {
            events.push(InboundEvent::TurnBoundary {
                interrupted: content.interrupted,
            });
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(message: &ClientMessage) -> Value {
        serde_json::from_str(&message.to_json().unwrap()).unwrap()
    }

    #[test]
    fn setup_message_shape() {
        let message = ClientMessage::setup(&SetupOptions {
            model: "models/test".to_string(),
            response_modality: "AUDIO".to_string(),
            voice: Some("Puck".to_string()),
            system_prompt: None,
        });
        assert_eq!(
            to_value(&message),
            json!({
                "setup": {
                    "model": "models/test",
                    "generationConfig": {
                        "responseModalities": ["AUDIO"],
                        "speechConfig": {
                            "voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Puck"}}
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn text_chunk_becomes_complete_user_turn() {
        let value = to_value(&ClientMessage::from_chunk(&OutboundChunk::user_turn("hello")));
        assert_eq!(
            value,
            json!({
                "clientContent": {
                    "turns": [{"role": "user", "parts": [{"text": "hello"}]}],
                    "turnComplete": true
                }
            })
        );
    }

    #[test]
    fn audio_chunk_is_base64_realtime_input() {
        let chunk = OutboundChunk::Audio {
            pcm: vec![1, 2, 3],
            sample_rate: 16_000,
            channels: 1,
        };
        let value = to_value(&ClientMessage::from_chunk(&chunk));
        assert_eq!(
            value["realtimeInput"]["mediaChunks"][0],
            json!({"mimeType": "audio/pcm;rate=16000", "data": "AQID"})
        );
    }

    #[test]
    fn image_chunk_keeps_mime_type() {
        let chunk = OutboundChunk::Image {
            data: vec![0xFF, 0xD8],
            mime_type: "image/jpeg".to_string(),
        };
        let value = to_value(&ClientMessage::from_chunk(&chunk));
        assert_eq!(value["realtimeInput"]["mediaChunks"][0]["mimeType"], "image/jpeg");
    }

    #[test]
    fn server_content_flattens_in_order() {
        let raw = json!({
            "serverContent": {
                "modelTurn": {"parts": [
                    {"text": "Hi"},
                    {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AQID"}}
                ]},
                "turnComplete": true
            }
        })
        .to_string();
        let events = ServerMessage::parse(raw.as_bytes())
            .unwrap()
            .into_events()
            .unwrap();
        assert_eq!(
            events,
            vec![
                InboundEvent::Text("Hi".to_string()),
                InboundEvent::Audio(vec![1, 2, 3]),
                InboundEvent::TurnBoundary { interrupted: false },
            ]
        );
    }

    #[test]
    fn interrupted_yields_one_boundary() {
        let raw = br#"{"serverContent": {"interrupted": true, "turnComplete": true}}"#;
        let events = ServerMessage::parse(raw).unwrap().into_events().unwrap();
        assert_eq!(events, vec![InboundEvent::TurnBoundary { interrupted: true }]);
    }

    #[test]
    fn setup_complete_has_no_events() {
        let message = ServerMessage::parse(br#"{"setupComplete": {}}"#).unwrap();
        assert!(message.setup_complete.is_some());
        assert!(message.into_events().unwrap().is_empty());
    }

    #[test]
    fn bad_audio_payload_is_a_transport_error() {
        let raw = br#"{"serverContent": {"modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm", "data": "***"}}]}}}"#;
        let err = ServerMessage::parse(raw).unwrap().into_events().unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(ServerMessage::parse(b"{not json").is_err());
    }
}
