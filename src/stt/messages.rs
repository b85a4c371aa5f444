//! Wire messages for the streaming STT session.
//!
//! Outbound control messages carry a `command` discriminant with a
//! command-specific `value`; inbound server messages carry a `type`
//! discriminant. Inbound text may arrive split across several frames, so
//! decoding goes through [`MessageAssembler`], which buffers fragments until
//! a frame is marked final.

use serde::{Deserialize, Serialize};

use super::SttError;

// =============================================================================
// Outbound Control Messages
// =============================================================================

/// Control message sent to the server as a JSON text frame.
///
/// Serializes as `{"command": "...", "value": ...}`; the `value` field is
/// omitted for commands that carry none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    /// Select the speech language before streaming.
    SetLanguage(String),
    /// Select the audio sampling rate in Hz.
    SetSamplingRate(u32),
    /// All audio has been transmitted.
    EndStream,
    /// End the session without waiting for the stream to finish.
    EndSession,
}

// =============================================================================
// Inbound Server Messages
// =============================================================================

/// Recognition result payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Transcript {
    /// Server-reported status of this result.
    pub status: String,
    /// Recognized text.
    #[serde(rename = "value")]
    pub text: String,
}

/// A decoded message from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The requested speech language was accepted.
    LanguageReady,
    /// The requested sampling rate was accepted.
    SamplingRateReady,
    /// A recognition result for previously sent audio.
    RecognitionResult(Transcript),
    /// The server failed to recognize previously sent audio.
    RecognitionError { detail: Option<String> },
    /// A message type this client does not know.
    Unknown(String),
}

impl ServerEvent {
    /// Decode one complete server message.
    ///
    /// Peeks the `type` field first and then decodes the payload for that
    /// type, so unknown types are classified without failing. Returns
    /// [`SttError::MalformedMessage`] when the payload is not JSON, lacks
    /// the discriminant, or is missing a required field.
    pub fn parse(raw: &str) -> Result<Self, SttError> {
        #[derive(Deserialize)]
        struct TypePeek {
            #[serde(rename = "type")]
            message_type: String,
        }

        let peek: TypePeek = serde_json::from_str(raw)
            .map_err(|e| SttError::MalformedMessage(format!("{e}")))?;

        match peek.message_type.as_str() {
            "LANGUAGE_READY" => Ok(Self::LanguageReady),
            "SAMPLING_RATE_READY" => Ok(Self::SamplingRateReady),
            "RECOGNITION_RESULT" => {
                let transcript: Transcript = serde_json::from_str(raw).map_err(|e| {
                    SttError::MalformedMessage(format!("invalid RECOGNITION_RESULT: {e}"))
                })?;
                Ok(Self::RecognitionResult(transcript))
            }
            "RECOGNITION_ERROR" => {
                #[derive(Deserialize)]
                struct ErrorPayload {
                    value: Option<String>,
                }
                let payload: ErrorPayload = serde_json::from_str(raw).map_err(|e| {
                    SttError::MalformedMessage(format!("invalid RECOGNITION_ERROR: {e}"))
                })?;
                Ok(Self::RecognitionError {
                    detail: payload.value,
                })
            }
            other => Ok(Self::Unknown(other.to_string())),
        }
    }
}

// =============================================================================
// Fragment Assembly
// =============================================================================

/// Accumulates fragmented text frames into complete messages.
///
/// One assembler belongs to one session and is owned by the dispatch loop.
/// Fragments are appended in arrival order; when a frame is marked final the
/// accumulated payload is handed out and the buffer resets, whether or not
/// the payload turns out to be decodable.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buffer: String,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment; returns the complete payload on the final frame.
    pub fn push(&mut self, fragment: &str, last: bool) -> Option<String> {
        self.buffer.push_str(fragment);
        if last {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    /// True when no partial message is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_set_language() {
        let json = serde_json::to_string(&ControlCommand::SetLanguage("ja".to_string())).unwrap();
        assert_eq!(json, r#"{"command":"SET_LANGUAGE","value":"ja"}"#);
    }

    #[test]
    fn test_serialize_set_sampling_rate() {
        let json = serde_json::to_string(&ControlCommand::SetSamplingRate(16000)).unwrap();
        assert_eq!(json, r#"{"command":"SET_SAMPLING_RATE","value":16000}"#);
    }

    #[test]
    fn test_serialize_end_stream_has_no_value() {
        let json = serde_json::to_string(&ControlCommand::EndStream).unwrap();
        assert_eq!(json, r#"{"command":"END_STREAM"}"#);
    }

    #[test]
    fn test_serialize_end_session_has_no_value() {
        let json = serde_json::to_string(&ControlCommand::EndSession).unwrap();
        assert_eq!(json, r#"{"command":"END_SESSION"}"#);
    }

    #[test]
    fn test_parse_language_ready() {
        let event = ServerEvent::parse(r#"{"type":"LANGUAGE_READY"}"#).unwrap();
        assert_eq!(event, ServerEvent::LanguageReady);
    }

    #[test]
    fn test_parse_sampling_rate_ready() {
        let event = ServerEvent::parse(r#"{"type":"SAMPLING_RATE_READY"}"#).unwrap();
        assert_eq!(event, ServerEvent::SamplingRateReady);
    }

    #[test]
    fn test_parse_recognition_result() {
        let raw = r#"{"type":"RECOGNITION_RESULT","status":"ok","value":"hello world"}"#;
        let event = ServerEvent::parse(raw).unwrap();
        assert_eq!(
            event,
            ServerEvent::RecognitionResult(Transcript {
                status: "ok".to_string(),
                text: "hello world".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_recognition_result_unicode() {
        let raw = r#"{"type":"RECOGNITION_RESULT","status":"ok","value":"こんにちは世界"}"#;
        let event = ServerEvent::parse(raw).unwrap();
        match event {
            ServerEvent::RecognitionResult(transcript) => {
                assert_eq!(transcript.text, "こんにちは世界");
            }
            other => panic!("expected RecognitionResult, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_recognition_result_missing_value() {
        let result = ServerEvent::parse(r#"{"type":"RECOGNITION_RESULT","status":"ok"}"#);
        assert!(matches!(result, Err(SttError::MalformedMessage(_))));
    }

    #[test]
    fn test_parse_recognition_error_with_detail() {
        let raw = r#"{"type":"RECOGNITION_ERROR","value":"audio too noisy"}"#;
        let event = ServerEvent::parse(raw).unwrap();
        assert_eq!(
            event,
            ServerEvent::RecognitionError {
                detail: Some("audio too noisy".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_recognition_error_without_detail() {
        let event = ServerEvent::parse(r#"{"type":"RECOGNITION_ERROR"}"#).unwrap();
        assert_eq!(event, ServerEvent::RecognitionError { detail: None });
    }

    #[test]
    fn test_parse_unknown_type() {
        let event = ServerEvent::parse(r#"{"type":"SOMETHING_NEW","value":42}"#).unwrap();
        assert_eq!(event, ServerEvent::Unknown("SOMETHING_NEW".to_string()));
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = ServerEvent::parse("not json at all");
        assert!(matches!(result, Err(SttError::MalformedMessage(_))));
    }

    #[test]
    fn test_parse_missing_discriminant() {
        let result = ServerEvent::parse(r#"{"status":"ok","value":"hi"}"#);
        assert!(matches!(result, Err(SttError::MalformedMessage(_))));
    }

    #[test]
    fn test_assembler_single_frame() {
        let mut assembler = MessageAssembler::new();
        let complete = assembler.push(r#"{"type":"LANGUAGE_READY"}"#, true);
        assert_eq!(complete.as_deref(), Some(r#"{"type":"LANGUAGE_READY"}"#));
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_assembler_fragments_match_single_frame() {
        let raw = r#"{"type":"RECOGNITION_RESULT","status":"ok","value":"こんにちは"}"#;

        let mut whole = MessageAssembler::new();
        let from_single = whole.push(raw, true).unwrap();

        // Split at char boundaries into three fragments; only the final one
        // is marked last.
        let mut pieces = MessageAssembler::new();
        let chars: Vec<char> = raw.chars().collect();
        let first: String = chars[..10].iter().collect();
        let second: String = chars[10..40].iter().collect();
        let third: String = chars[40..].iter().collect();

        assert_eq!(pieces.push(&first, false), None);
        assert_eq!(pieces.push(&second, false), None);
        let from_fragments = pieces.push(&third, true).unwrap();

        assert_eq!(from_fragments, from_single);
        assert_eq!(
            ServerEvent::parse(&from_fragments).unwrap(),
            ServerEvent::parse(&from_single).unwrap()
        );
    }

    #[test]
    fn test_assembler_resets_between_messages() {
        let mut assembler = MessageAssembler::new();
        assembler.push(r#"{"type":"LANGUAGE_READY"}"#, true);

        let second = assembler
            .push(r#"{"type":"SAMPLING_RATE_READY"}"#, true)
            .unwrap();
        assert_eq!(second, r#"{"type":"SAMPLING_RATE_READY"}"#);
    }

    #[test]
    fn test_assembler_resets_after_undecodable_payload() {
        let mut assembler = MessageAssembler::new();
        let garbage = assembler.push(";;; not json ;;;", true).unwrap();
        assert!(ServerEvent::parse(&garbage).is_err());

        // The buffer does not keep the bad payload around.
        assert!(assembler.is_empty());
        let next = assembler.push(r#"{"type":"LANGUAGE_READY"}"#, true).unwrap();
        assert_eq!(
            ServerEvent::parse(&next).unwrap(),
            ServerEvent::LanguageReady
        );
    }

    #[test]
    fn test_assembler_retains_partial_payload() {
        let mut assembler = MessageAssembler::new();
        assert_eq!(assembler.push(r#"{"type":"LANG"#, false), None);
        assert!(!assembler.is_empty());
        let complete = assembler.push(r#"UAGE_READY"}"#, true).unwrap();
        assert_eq!(complete, r#"{"type":"LANGUAGE_READY"}"#);
    }
}
