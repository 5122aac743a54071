use super::*;
use teloxide::types::User;

/// Who sent an update, as far as the store cares.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct Sender {
    pub(super) telegram_id: i64,
    pub(super) is_bot: bool,
    pub(super) username: Option<String>,
    pub(super) first_name: String,
    pub(super) last_name: Option<String>,
}

impl Sender {
    pub(super) fn from_user(user: &User) -> Self {
        Sender {
            telegram_id: user.id.0 as i64,
            is_bot: user.is_bot,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }

    pub(super) fn display_name(&self) -> String {
        match &self.username {
            Some(username) => format!("@{}", username),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct PhotoVariant {
    pub(super) file_id: String,
    pub(super) file_size: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct MediaFile {
    pub(super) file_id: String,
    pub(super) file_name: Option<String>,
    pub(super) mime_type: Option<String>,
    pub(super) file_size: Option<i64>,
    pub(super) duration: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum ForwardOrigin {
    User {
        first_name: String,
        last_name: Option<String>,
        username: Option<String>,
    },
    HiddenUser(String),
    Chat(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Forwarded {
    pub(super) date: Option<DateTime<Utc>>,
    pub(super) origin: ForwardOrigin,
}

/// The bot message a user replied to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct RepliedMessage {
    pub(super) from_bot: bool,
    pub(super) text: Option<String>,
}

/// Platform-neutral view of an inbound message. Media fields mirror the
/// platform payload; `metadata::classify` decides which one wins.
#[derive(Clone, Debug, Default)]
pub(super) struct IncomingMessage {
    pub(super) chat_id: i64,
    pub(super) message_id: i32,
    pub(super) from: Option<Sender>,
    pub(super) text: Option<String>,
    pub(super) caption: Option<String>,
    pub(super) photo: Vec<PhotoVariant>,
    pub(super) video: Option<MediaFile>,
    pub(super) document: Option<MediaFile>,
    pub(super) audio: Option<MediaFile>,
    pub(super) voice: Option<MediaFile>,
    pub(super) video_note: Option<MediaFile>,
    pub(super) sticker: Option<MediaFile>,
    pub(super) forward: Option<Forwarded>,
    pub(super) reply_to: Option<RepliedMessage>,
}

impl IncomingMessage {
    pub(super) fn from_telegram(msg: &Message) -> Self {
        let photo = msg
            .photo()
            .map(|sizes| {
                sizes
                    .iter()
                    .map(|size| PhotoVariant {
                        file_id: size.file.id.clone(),
                        file_size: non_zero(size.file.size),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let video = msg.video().map(|video| MediaFile {
            file_id: video.file.id.clone(),
            file_name: video.file_name.clone(),
            mime_type: video.mime_type.as_ref().map(|m| m.essence_str().to_string()),
            file_size: non_zero(video.file.size),
            duration: non_zero(video.duration),
        });
        let document = msg.document().map(|document| MediaFile {
            file_id: document.file.id.clone(),
            file_name: document.file_name.clone(),
            mime_type: document
                .mime_type
                .as_ref()
                .map(|m| m.essence_str().to_string()),
            file_size: non_zero(document.file.size),
            duration: None,
        });
        let audio = msg.audio().map(|audio| MediaFile {
            file_id: audio.file.id.clone(),
            file_name: audio.file_name.clone(),
            mime_type: audio.mime_type.as_ref().map(|m| m.essence_str().to_string()),
            file_size: non_zero(audio.file.size),
            duration: non_zero(audio.duration),
        });
        let voice = msg.voice().map(|voice| MediaFile {
            file_id: voice.file.id.clone(),
            file_name: None,
            mime_type: voice.mime_type.as_ref().map(|m| m.essence_str().to_string()),
            file_size: non_zero(voice.file.size),
            duration: non_zero(voice.duration),
        });
        let video_note = msg.video_note().map(|note| MediaFile {
            file_id: note.file.id.clone(),
            file_size: non_zero(note.file.size),
            ..MediaFile::default()
        });
        let sticker = msg.sticker().map(|sticker| MediaFile {
            file_id: sticker.file.id.clone(),
            file_size: non_zero(sticker.file.size),
            ..MediaFile::default()
        });

        IncomingMessage {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
            from: msg.from().map(Sender::from_user),
            text: msg.text().map(str::to_string),
            caption: msg.caption().map(str::to_string),
            photo,
            video,
            document,
            audio,
            voice,
            video_note,
            sticker,
            forward: forwarded_from_telegram(msg),
            reply_to: msg.reply_to_message().map(|replied| RepliedMessage {
                from_bot: replied.from().map(|user| user.is_bot).unwrap_or(false),
                text: replied.text().map(str::to_string),
            }),
        }
    }
}

fn forwarded_from_telegram(msg: &Message) -> Option<Forwarded> {
    let origin = if let Some(user) = msg.forward_from_user() {
        ForwardOrigin::User {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    } else if let Some(name) = msg.forward_from_sender_name() {
        ForwardOrigin::HiddenUser(name.to_string())
    } else if let Some(chat) = msg.forward_from_chat() {
        ForwardOrigin::Chat(chat.title().unwrap_or_default().to_string())
    } else {
        return None;
    };
    Some(Forwarded {
        date: msg.forward_date(),
        origin,
    })
}

/// A pressed inline button.
#[derive(Clone, Debug, Default)]
pub(super) struct CallbackPress {
    pub(super) id: String,
    pub(super) from: Sender,
    pub(super) data: Option<String>,
    pub(super) chat_id: i64,
    pub(super) prompt_message_id: Option<i32>,
}

impl CallbackPress {
    pub(super) fn from_telegram(q: &CallbackQuery) -> Self {
        let from = Sender::from_user(&q.from);
        // Private chats share the user's id, so that is where replies go when
        // the originating message is too old to be attached.
        let chat_id = q
            .message
            .as_ref()
            .map(|message| message.chat.id.0)
            .unwrap_or(from.telegram_id);
        CallbackPress {
            id: q.id.clone(),
            data: q.data.clone(),
            chat_id,
            prompt_message_id: q.message.as_ref().map(|message| message.id.0),
            from,
        }
    }
}

fn non_zero(value: u32) -> Option<i64> {
    (value != 0).then(|| i64::from(value))
}
