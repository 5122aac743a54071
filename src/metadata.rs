use super::*;
use once_cell::sync::Lazy;
use regex::Regex;

pub(super) const PREVIEW_MAX_CHARS: usize = 150;
const PREVIEW_ELLIPSIS: &str = "...";

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("url pattern"));
// ASCII word characters only; `#привет` is not a hashtag here.
static HASHTAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#[0-9A-Za-z_]+").expect("hashtag pattern"));
static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@[0-9A-Za-z_]+").expect("mention pattern"));

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(super) enum MessageType {
    Text,
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    VideoNote,
    Sticker,
}

impl MessageType {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Photo => "photo",
            MessageType::Video => "video",
            MessageType::Document => "document",
            MessageType::Audio => "audio",
            MessageType::Voice => "voice",
            MessageType::VideoNote => "video_note",
            MessageType::Sticker => "sticker",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct FileDescriptor {
    pub(super) file_id: Option<String>,
    pub(super) file_name: Option<String>,
    pub(super) mime_type: Option<String>,
    pub(super) file_size: Option<i64>,
    pub(super) duration: Option<i64>,
}

/// Forwarding metadata kept alongside a stored message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Provenance {
    pub(super) date: Option<DateTime<Utc>>,
    pub(super) from: String,
}

/// First media field present wins, in this order, regardless of text or
/// caption.
pub(super) fn classify(msg: &IncomingMessage) -> MessageType {
    if !msg.photo.is_empty() {
        MessageType::Photo
    } else if msg.video.is_some() {
        MessageType::Video
    } else if msg.document.is_some() {
        MessageType::Document
    } else if msg.audio.is_some() {
        MessageType::Audio
    } else if msg.voice.is_some() {
        MessageType::Voice
    } else if msg.video_note.is_some() {
        MessageType::VideoNote
    } else if msg.sticker.is_some() {
        MessageType::Sticker
    } else {
        MessageType::Text
    }
}

pub(super) fn extract_urls(text: Option<&str>, caption: Option<&str>) -> Vec<String> {
    scan(&URL_RE, text, caption)
        .map(|found| found.to_string())
        .collect()
}

/// Fragments such as `https://x.io/#intro` also yield `intro`.
pub(super) fn extract_hashtags(text: Option<&str>, caption: Option<&str>) -> Vec<String> {
    scan(&HASHTAG_RE, text, caption)
        .map(|found| found.trim_start_matches('#').to_string())
        .collect()
}

/// Email addresses yield their domain label (`a@example.com` -> `example`).
pub(super) fn extract_mentions(text: Option<&str>, caption: Option<&str>) -> Vec<String> {
    scan(&MENTION_RE, text, caption)
        .map(|found| found.trim_start_matches('@').to_string())
        .collect()
}

fn scan<'a>(
    re: &'a Regex,
    text: Option<&'a str>,
    caption: Option<&'a str>,
) -> impl Iterator<Item = &'a str> + 'a {
    text.into_iter()
        .chain(caption)
        .flat_map(move |field| re.find_iter(field).map(|found| found.as_str()))
}

pub(super) fn file_metadata(msg: &IncomingMessage, kind: MessageType) -> FileDescriptor {
    match kind {
        // Sizes arrive smallest first.
        MessageType::Photo => msg
            .photo
            .first()
            .map(|photo| FileDescriptor {
                file_id: Some(photo.file_id.clone()),
                file_size: photo.file_size,
                ..FileDescriptor::default()
            })
            .unwrap_or_default(),
        MessageType::Video => media_descriptor(msg.video.as_ref(), true),
        MessageType::Document => media_descriptor(msg.document.as_ref(), false),
        MessageType::Audio => media_descriptor(msg.audio.as_ref(), true),
        MessageType::Voice => media_descriptor(msg.voice.as_ref(), true),
        MessageType::VideoNote | MessageType::Sticker | MessageType::Text => {
            FileDescriptor::default()
        }
    }
}

fn media_descriptor(file: Option<&MediaFile>, with_duration: bool) -> FileDescriptor {
    let Some(file) = file else {
        return FileDescriptor::default();
    };
    FileDescriptor {
        file_id: Some(file.file_id.clone()),
        file_name: file.file_name.clone().filter(|name| !name.is_empty()),
        mime_type: file.mime_type.clone().filter(|mime| !mime.is_empty()),
        file_size: file.file_size,
        duration: if with_duration { file.duration } else { None },
    }
}

pub(super) fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_MAX_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], PREVIEW_ELLIPSIS),
        None => text.to_string(),
    }
}

pub(super) fn provenance(msg: &IncomingMessage) -> Option<Provenance> {
    let forward = msg.forward.as_ref()?;
    let from = match &forward.origin {
        ForwardOrigin::User {
            first_name,
            last_name,
            username,
        } => {
            let mut from = first_name.clone();
            if let Some(last_name) = last_name.as_deref().filter(|s| !s.is_empty()) {
                from.push(' ');
                from.push_str(last_name);
            }
            if let Some(username) = username.as_deref().filter(|s| !s.is_empty()) {
                from.push_str(&format!(" (@{})", username));
            }
            from
        }
        ForwardOrigin::HiddenUser(name) => name.clone(),
        ForwardOrigin::Chat(title) => title.clone(),
    };
    Some(Provenance {
        date: forward.date,
        from,
    })
}

/// Everything the store keeps about an inbound message. Scanning runs on the
/// full text and caption; only the stored copies are truncated.
pub(super) fn describe_message(msg: &IncomingMessage) -> NewMessage {
    let kind = classify(msg);
    let text = msg.text.as_deref().filter(|s| !s.is_empty());
    let caption = msg.caption.as_deref().filter(|s| !s.is_empty());
    NewMessage {
        telegram_message_id: i64::from(msg.message_id),
        message_type: kind,
        text_content: text.map(preview),
        caption: caption.map(preview),
        file: file_metadata(msg, kind),
        provenance: provenance(msg),
        urls: extract_urls(text, caption),
        hashtags: extract_hashtags(text, caption),
        mentions: extract_mentions(text, caption),
    }
}
