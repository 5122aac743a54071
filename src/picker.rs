use super::*;

/// Largest tag count still rendered as inline buttons.
pub(super) const BUTTON_MODE_MAX_TAGS: usize = 20;
const BUTTONS_PER_ROW: usize = 2;

pub(super) const CREATE_TAG_LABEL: &str = "➕ Create New Tag";
pub(super) const NO_TAGS_PROMPT: &str =
    "You don't have any tags yet. Click the button below to create your first tag:";
pub(super) const CHOOSE_TAG_PROMPT: &str = "Choose a tag or create a new one:";
pub(super) const MANY_TAGS_PREFIX: &str = "You have many tags";
const MANY_TAGS_FOOTER: &str = "Type a tag name/number or create a new tag.";

/// Telegram rejects message text longer than this.
pub(super) const MESSAGE_TEXT_MAX_CHARS: usize = 4096;
/// Listed names longer than this are cut short in the text picker.
pub(super) const LISTED_NAME_MAX_CHARS: usize = 64;
// Room kept for the "...and N more" line.
const MORE_LINE_RESERVE: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum PickerMode {
    Buttons,
    Text,
}

pub(super) fn choose_mode(tag_count: usize) -> PickerMode {
    if tag_count <= BUTTON_MODE_MAX_TAGS {
        PickerMode::Buttons
    } else {
        PickerMode::Text
    }
}

/// A rendered tag picker, ready to be sent as a reply to the saved message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Picker {
    pub(super) mode: PickerMode,
    pub(super) text: String,
    pub(super) markup: OutgoingMarkup,
}

pub(super) fn build_picker(codec: &dyn ConversationCodec, tags: &[Tag], message_id: i64) -> Picker {
    match choose_mode(tags.len()) {
        PickerMode::Buttons => button_picker(codec, tags, message_id),
        PickerMode::Text => text_picker(codec, tags, message_id),
    }
}

fn button_picker(codec: &dyn ConversationCodec, tags: &[Tag], message_id: i64) -> Picker {
    let body = if tags.is_empty() {
        NO_TAGS_PROMPT
    } else {
        CHOOSE_TAG_PROMPT
    };

    let mut rows: Vec<Vec<ButtonSpec>> = tags
        .chunks(BUTTONS_PER_ROW)
        .map(|chunk| {
            chunk
                .iter()
                .map(|tag| {
                    ButtonSpec::callback(
                        tag.name.clone(),
                        codec.encode_callback(CallbackAction::Tag {
                            tag_id: tag.id,
                            message_id,
                        }),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![ButtonSpec::callback(
        CREATE_TAG_LABEL,
        codec.encode_callback(CallbackAction::NewTag { message_id }),
    )]);

    Picker {
        mode: PickerMode::Buttons,
        text: codec.encode_prompt(body, message_id),
        markup: OutgoingMarkup::Keyboard(rows),
    }
}

/// Numbered listing of every tag. Long names are shortened and the listing
/// stops early when the whole prompt would not fit in one message; typed
/// numbers still index the full listing.
fn text_picker(codec: &dyn ConversationCodec, tags: &[Tag], message_id: i64) -> Picker {
    let mut body = format!(
        "{} ({}). Choose by typing its name or number, or create a new one:\n\n",
        MANY_TAGS_PREFIX,
        tags.len()
    );
    let marker_len = codec.encode_prompt("", message_id).chars().count();
    let budget = MESSAGE_TEXT_MAX_CHARS
        .saturating_sub(marker_len + MANY_TAGS_FOOTER.chars().count() + 1 + MORE_LINE_RESERVE);

    let mut used = body.chars().count();
    let mut listed = 0;
    for (i, tag) in tags.iter().enumerate() {
        let line = format!("{}. {}\n", i + 1, shorten(&tag.name, LISTED_NAME_MAX_CHARS));
        let len = line.chars().count();
        if used + len > budget {
            break;
        }
        body.push_str(&line);
        used += len;
        listed += 1;
    }
    if listed < tags.len() {
        body.push_str(&format!("...and {} more\n", tags.len() - listed));
    }
    body.push('\n');
    body.push_str(MANY_TAGS_FOOTER);

    Picker {
        mode: PickerMode::Text,
        text: codec.encode_prompt(&body, message_id),
        markup: OutgoingMarkup::ForceReply,
    }
}

fn shorten(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    let kept: String = name.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
