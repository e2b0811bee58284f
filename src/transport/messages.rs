use serde::{Deserialize, Serialize};

/// Audio frame published to the dialogue service (and on the playback
/// and candidate-media subjects)
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String,  // Base64-encoded PCM16-LE bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String,  // RFC3339 timestamp
}

/// System-directed text sent to the agent (liveness prompts, forced
/// conclusion)
#[derive(Debug, Serialize, Deserialize)]
pub struct SystemTextMessage {
    pub session_id: String,
    pub text: String,
    pub timestamp: String,
}

/// Acknowledgement of a tool call issued by the agent
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolResponseMessage {
    pub session_id: String,
    pub id: String,
    pub payload: serde_json::Value,
}

/// Session setup announced to the dialogue service on connect
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSetupMessage {
    pub session_id: String,
    pub candidate_name: String,
    pub target_role: String,
    pub language: String,
    pub timestamp: String,
}

/// Server-to-client event received on the dialogue event subject
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEventMessage {
    Opened,
    Closed { code: Option<i32> },
    Error { message: String },
    AudioFrame { pcm: String },
    PartialTranscript { speaker: String, text: String },
    TurnComplete,
    Interrupted,
    ToolCall {
        name: String,
        args: serde_json::Value,
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_event_wire_format() {
        let json = r#"{"type":"partial_transcript","speaker":"candidate","text":"hello"}"#;
        let event: ServerEventMessage = serde_json::from_str(json).unwrap();

        match event {
            ServerEventMessage::PartialTranscript { speaker, text } => {
                assert_eq!(speaker, "candidate");
                assert_eq!(text, "hello");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_tool_call_round_trip() {
        let event = ServerEventMessage::ToolCall {
            name: "submit_result".to_string(),
            args: serde_json::json!({"passed": true, "reason": "strong answers"}),
            id: "call-1".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));

        let back: ServerEventMessage = serde_json::from_str(&json).unwrap();
        match back {
            ServerEventMessage::ToolCall { name, id, .. } => {
                assert_eq!(name, "submit_result");
                assert_eq!(id, "call-1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
