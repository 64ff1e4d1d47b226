//! Gemini Live bidirectional wire format.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::audio::codec;

pub const INPUT_AUDIO_MIME: &str = "audio/pcm;rate=16000";

/// A function call requested by the remote agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Little-endian PCM16 mono at 16 kHz.
    RealtimeAudio(Vec<u8>),
    RealtimeText(String),
    ToolResponse {
        id: String,
        name: String,
        response: Value,
    },
}

impl ClientMessage {
    pub fn tool_ok(call: &ToolCall) -> Self {
        ClientMessage::ToolResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response: json!({ "result": "ok" }),
        }
    }

    pub fn tool_error(call: &ToolCall, reason: &str) -> Self {
        ClientMessage::ToolResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response: json!({ "error": reason }),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ClientMessage::RealtimeAudio(pcm) => json!({
                "realtimeInput": {
                    "audio": {
                        "data": codec::encode_base64_bytes(pcm),
                        "mimeType": INPUT_AUDIO_MIME,
                    }
                }
            }),
            ClientMessage::RealtimeText(text) => json!({
                "realtimeInput": { "text": text }
            }),
            ClientMessage::ToolResponse { id, name, response } => json!({
                "toolResponse": {
                    "functionResponses": [{
                        "id": id,
                        "name": name,
                        "response": response,
                    }]
                }
            }),
        }
    }
}

/// Everything the session needs to open a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetup {
    pub model: String,
    pub voice: String,
    pub system_instruction: String,
    pub function_declarations: Vec<Value>,
}

impl SessionSetup {
    pub fn to_json(&self) -> Value {
        json!({
            "setup": {
                "model": self.model,
                "generationConfig": {
                    "responseModalities": ["AUDIO"],
                    "speechConfig": {
                        "voiceConfig": {
                            "prebuiltVoiceConfig": { "voiceName": self.voice }
                        }
                    }
                },
                "systemInstruction": {
                    "parts": [{ "text": self.system_instruction }]
                },
                "tools": [{ "functionDeclarations": self.function_declarations }],
                "outputAudioTranscription": {}
            }
        })
    }
}

/// One inbound item. A single server message may carry several.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Interrupted,
    /// Base64 PCM16 mono at the playback rate.
    Audio(String),
    Transcription(String),
    ToolCall(Vec<ToolCall>),
    TurnComplete,
    /// The server will close the connection soon.
    GoAway(Option<String>),
    Error(String),
    Closed,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub tool_call: Option<ToolCallMessage>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub inline_data: Option<InlineData>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallMessage {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Map<String, Value>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

fn arg_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ServerMessage {
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Flatten into events in handling order: a barge-in flush comes before
    /// any new audio in the same message, turn completion comes last.
    pub fn into_events(self) -> Vec<ServerEvent> {
        let mut events = Vec::new();

        if let Some(content) = self.server_content {
            if content.interrupted {
                events.push(ServerEvent::Interrupted);
            }
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    if let Some(inline) = part.inline_data {
                        if inline.mime_type.is_empty() || inline.mime_type.starts_with("audio/") {
                            events.push(ServerEvent::Audio(inline.data));
                        }
                    }
                }
            }
            if let Some(t) = content.output_transcription {
                if !t.text.is_empty() {
                    events.push(ServerEvent::Transcription(t.text));
                }
            }
            if content.turn_complete {
                events.push(ServerEvent::TurnComplete);
            }
        }

        if let Some(tool_call) = self.tool_call {
            let calls: Vec<ToolCall> = tool_call
                .function_calls
                .into_iter()
                .map(|fc| ToolCall {
                    id: fc.id,
                    name: fc.name,
                    args: fc
                        .args
                        .iter()
                        .map(|(k, v)| (k.clone(), arg_to_string(v)))
                        .collect(),
                })
                .collect();
            if !calls.is_empty() {
                events.push(ServerEvent::ToolCall(calls));
            }
        }

        if let Some(go_away) = self.go_away {
            events.push(ServerEvent::GoAway(go_away.time_left));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_content_flattens_in_order() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": {"parts": [
                    {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAA="}},
                    {"text": "thinking"}
                ]},
                "outputTranscription": {"text": "Nice set!"},
                "turnComplete": true,
                "interrupted": true
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(!msg.is_setup_complete());
        assert_eq!(
            msg.into_events(),
            vec![
                ServerEvent::Interrupted,
                ServerEvent::Audio("AAA=".into()),
                ServerEvent::Transcription("Nice set!".into()),
                ServerEvent::TurnComplete,
            ]
        );
    }

    #[test]
    fn tool_call_args_become_strings() {
        let raw = r#"{"toolCall": {"functionCalls": [
            {"id": "c1", "name": "updateWorkoutState", "args": {"action": "set_difficulty", "value": "hard"}},
            {"id": "c2", "name": "updateWorkoutState", "args": {"action": "finish_set", "count": 2}}
        ]}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let events = msg.into_events();
        let ServerEvent::ToolCall(calls) = &events[0] else {
            panic!("expected tool call, got {:?}", events);
        };
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args.get("value").map(String::as_str), Some("hard"));
        assert_eq!(calls[1].args.get("count").map(String::as_str), Some("2"));
    }

    #[test]
    fn setup_complete_and_go_away() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        assert!(msg.is_setup_complete());
        assert!(msg.into_events().is_empty());

        let msg: ServerMessage =
            serde_json::from_str(r#"{"goAway": {"timeLeft": "10s"}}"#).unwrap();
        assert_eq!(msg.into_events(), vec![ServerEvent::GoAway(Some("10s".into()))]);
    }

    #[test]
    fn client_messages_serialize_to_wire_shape() {
        let audio = ClientMessage::RealtimeAudio(vec![0, 64]).to_json();
        assert_eq!(audio["realtimeInput"]["audio"]["mimeType"], INPUT_AUDIO_MIME);
        assert_eq!(audio["realtimeInput"]["audio"]["data"], "AEA=");

        let call = ToolCall {
            id: "c9".into(),
            name: "updateWorkoutState".into(),
            args: HashMap::new(),
        };
        let resp = ClientMessage::tool_ok(&call).to_json();
        let fr = &resp["toolResponse"]["functionResponses"][0];
        assert_eq!(fr["id"], "c9");
        assert_eq!(fr["response"]["result"], "ok");
    }

    #[test]
    fn setup_declares_audio_and_tools() {
        let setup = SessionSetup {
            model: "models/test".into(),
            voice: "Puck".into(),
            system_instruction: "coach".into(),
            function_declarations: vec![json!({"name": "updateWorkoutState"})],
        };
        let v = setup.to_json();
        assert_eq!(v["setup"]["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            v["setup"]["tools"][0]["functionDeclarations"][0]["name"],
            "updateWorkoutState"
        );
        assert!(v["setup"]["outputAudioTranscription"].is_object());
    }
}
