use super::*;

pub(super) const MARKER_PREFIX: &str = "[MSG_ID:";
const MARKER_SUFFIX: char = ']';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(super) enum ParseError {
    #[error("no message marker in prompt")]
    MissingMarker,
    #[error("message marker is not terminated")]
    UnterminatedMarker,
    #[error("message marker does not hold a valid id")]
    InvalidId,
    #[error("malformed callback data")]
    MalformedCallback,
}

/// What a pressed inline button asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CallbackAction {
    Tag { tag_id: i64, message_id: i64 },
    NewTag { message_id: i64 },
}

/// Carries the id of the message being tagged across the stateless
/// prompt/reply and button round trips.
pub(super) trait ConversationCodec: Send + Sync {
    fn encode_prompt(&self, body: &str, message_id: i64) -> String;
    fn decode_prompt(&self, prompt: &str) -> Result<i64, ParseError>;
    fn encode_callback(&self, action: CallbackAction) -> String;
    fn decode_callback(&self, data: &str) -> Result<CallbackAction, ParseError>;
}

/// Textual `[MSG_ID:n]` marker for prompts and `tag:..`/`new_tag:..`
/// callback payloads.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct MarkerCodec;

impl ConversationCodec for MarkerCodec {
    fn encode_prompt(&self, body: &str, message_id: i64) -> String {
        format!("{}\n\n{}{}{}", body, MARKER_PREFIX, message_id, MARKER_SUFFIX)
    }

    // The marker is always appended last, so only the final occurrence counts.
    // Tag names echoed in the body cannot smuggle in a different id.
    fn decode_prompt(&self, prompt: &str) -> Result<i64, ParseError> {
        let start = prompt.rfind(MARKER_PREFIX).ok_or(ParseError::MissingMarker)?;
        let rest = &prompt[start + MARKER_PREFIX.len()..];
        let end = rest
            .find(MARKER_SUFFIX)
            .ok_or(ParseError::UnterminatedMarker)?;
        rest[..end]
            .trim()
            .parse::<i64>()
            .map_err(|_| ParseError::InvalidId)
    }

    fn encode_callback(&self, action: CallbackAction) -> String {
        match action {
            CallbackAction::Tag { tag_id, message_id } => format!("tag:{}:{}", tag_id, message_id),
            CallbackAction::NewTag { message_id } => format!("new_tag:{}", message_id),
        }
    }

    fn decode_callback(&self, data: &str) -> Result<CallbackAction, ParseError> {
        let parts: Vec<&str> = data.split(':').collect();
        match parts.as_slice() {
            ["tag", tag_id, message_id] => Ok(CallbackAction::Tag {
                tag_id: parse_id(tag_id)?,
                message_id: parse_id(message_id)?,
            }),
            ["new_tag", message_id] => Ok(CallbackAction::NewTag {
                message_id: parse_id(message_id)?,
            }),
            _ => Err(ParseError::MalformedCallback),
        }
    }
}

fn parse_id(raw: &str) -> Result<i64, ParseError> {
    raw.parse::<i64>().map_err(|_| ParseError::MalformedCallback)
}
