use super::*;

pub(super) const ORIGINAL_NOT_FOUND: &str = "Could not find the original message to tag.";
pub(super) const EMPTY_TAG_NAME: &str = "Please enter a tag name.";
pub(super) const INVALID_TAG_NUMBER: &str = "Invalid tag number. Please try again.";
pub(super) const TAG_FAILED: &str = "Could not tag the message. Please try again.";
pub(super) const TAGS_UNAVAILABLE: &str = "Could not load your tags.";
pub(super) const NEW_TAG_PROMPT: &str = "Please reply with the name for your new tag:";
pub(super) const AWAITING_NEW_TAG: &str = "Please reply with your new tag name...";

#[derive(Debug, Error)]
pub(super) enum TagFlowError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("message or tag not found for this user")]
    NotFound,
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TagFlowError {
    fn from(err: StoreError) -> Self {
        match err {
            // Missing and foreign rows look the same to the user.
            StoreError::NotFound | StoreError::NotFoundOrForbidden => TagFlowError::NotFound,
            other => TagFlowError::Store(other),
        }
    }
}

impl TagFlowError {
    pub(super) fn user_message(&self) -> &'static str {
        match self {
            TagFlowError::Parse(_) | TagFlowError::NotFound => ORIGINAL_NOT_FOUND,
            TagFlowError::Validation(text) => *text,
            TagFlowError::Store(_) => TAG_FAILED,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct TagCommit {
    pub(super) message_row: i64,
    pub(super) tag_id: i64,
    pub(super) tag_name: String,
    pub(super) newly_linked: bool,
}

/// Where a conversation ended up after one update.
#[derive(Debug)]
pub(super) enum TagSelection {
    AwaitingTagChoice { message_id: i64 },
    Resolved(TagCommit),
    Failed(TagFlowError),
}

/// Whether a bot message the user replied to is one of our tag prompts.
pub(super) fn is_tag_prompt(text: &str) -> bool {
    text.contains(MARKER_PREFIX)
        || text.contains(NO_TAGS_PROMPT)
        || text.contains(MANY_TAGS_PREFIX)
        || text.contains(NEW_TAG_PROMPT)
}

/// Two-turn tag selection. Nothing is kept between turns: the message being
/// tagged travels inside the prompt text or the button payload.
///
/// Numeric replies index into the tag listing as it is when the reply
/// arrives. If tags were created in between, the same number can point at a
/// different tag than the one shown in the prompt.
pub(super) struct TagFlow<'a, M> {
    store: &'a Store,
    codec: &'a dyn ConversationCodec,
    messenger: &'a M,
}

impl<'a, M: Messenger> TagFlow<'a, M> {
    pub(super) fn new(store: &'a Store, codec: &'a dyn ConversationCodec, messenger: &'a M) -> Self {
        TagFlow {
            store,
            codec,
            messenger,
        }
    }

    /// Sends the picker as a reply to the freshly saved message.
    pub(super) async fn prompt(
        &self,
        user_id: i64,
        chat_id: i64,
        telegram_message_id: i32,
    ) -> TagSelection {
        let tags = match self.store.list_tags(user_id) {
            Ok(tags) => tags,
            Err(err) => {
                error!("list tags for user {}: {}", user_id, err);
                self.notify(chat_id, TAGS_UNAVAILABLE).await;
                return TagSelection::Failed(TagFlowError::Store(err));
            }
        };

        let message_id = i64::from(telegram_message_id);
        let picker = build_picker(self.codec, &tags, message_id);
        info!(
            "tag picker for message {}: {:?} with {} tags",
            message_id,
            picker.mode,
            tags.len()
        );
        let outgoing = OutgoingMessage::new(chat_id, picker.text)
            .reply_to(telegram_message_id)
            .markup(picker.markup);
        if let Err(err) = self.messenger.send(outgoing).await {
            error!("send tag picker: {:#}", err);
        }
        TagSelection::AwaitingTagChoice { message_id }
    }

    pub(super) async fn resolve_reply(
        &self,
        user_id: i64,
        chat_id: i64,
        prompt_text: &str,
        reply_text: &str,
    ) -> TagSelection {
        let outcome = self.commit_reply(user_id, prompt_text, reply_text);
        self.finish(chat_id, outcome).await
    }

    fn commit_reply(
        &self,
        user_id: i64,
        prompt_text: &str,
        reply_text: &str,
    ) -> Result<TagCommit, TagFlowError> {
        let telegram_message_id = self.codec.decode_prompt(prompt_text)?;
        let message_row = self
            .store
            .resolve_message_id(user_id, telegram_message_id)?;

        let reply = reply_text.trim();
        if reply.is_empty() {
            return Err(TagFlowError::Validation(EMPTY_TAG_NAME));
        }

        let tag_name = match reply.parse::<i64>() {
            Ok(position) => self.tag_at_position(user_id, position)?,
            Err(_) => reply.to_string(),
        };

        let tag_id = self.store.get_or_create_tag(user_id, &tag_name)?;
        let newly_linked = self.store.link_tag(message_row, tag_id)?;
        Ok(TagCommit {
            message_row,
            tag_id,
            tag_name,
            newly_linked,
        })
    }

    fn tag_at_position(&self, user_id: i64, position: i64) -> Result<String, TagFlowError> {
        let tags = self.store.list_tags(user_id)?;
        usize::try_from(position)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| tags.into_iter().nth(index))
            .map(|tag| tag.name)
            .ok_or(TagFlowError::Validation(INVALID_TAG_NUMBER))
    }

    pub(super) async fn resolve_callback(&self, user_id: i64, press: &CallbackPress) -> TagSelection {
        if let Err(err) = self.messenger.answer_callback(&press.id).await {
            error!("answer callback {}: {:#}", press.id, err);
        }

        let action = match self
            .codec
            .decode_callback(press.data.as_deref().unwrap_or_default())
        {
            Ok(action) => action,
            Err(err) => return self.finish(press.chat_id, Err(err.into())).await,
        };

        match action {
            CallbackAction::Tag { tag_id, message_id } => {
                let outcome = self.commit_button(user_id, tag_id, message_id);
                let selection = self.finish(press.chat_id, outcome).await;
                if let (TagSelection::Resolved(commit), Some(picker_id)) =
                    (&selection, press.prompt_message_id)
                {
                    let text = format!("✅ Tagged with '{}'", commit.tag_name);
                    self.edit(press.chat_id, picker_id, &text).await;
                }
                selection
            }
            CallbackAction::NewTag { message_id } => {
                let prompt = OutgoingMessage::new(
                    press.chat_id,
                    self.codec.encode_prompt(NEW_TAG_PROMPT, message_id),
                )
                .markup(OutgoingMarkup::ForceReply);
                if let Err(err) = self.messenger.send(prompt).await {
                    error!("send new tag prompt: {:#}", err);
                }
                // The edited picker keeps the marker so a reply to it still resolves.
                if let Some(picker_id) = press.prompt_message_id {
                    let text = self.codec.encode_prompt(AWAITING_NEW_TAG, message_id);
                    self.edit(press.chat_id, picker_id, &text).await;
                }
                TagSelection::AwaitingTagChoice { message_id }
            }
        }
    }

    fn commit_button(
        &self,
        user_id: i64,
        tag_id: i64,
        telegram_message_id: i64,
    ) -> Result<TagCommit, TagFlowError> {
        let message_row = self
            .store
            .resolve_message_id(user_id, telegram_message_id)?;
        // Scoped by owner so a forged payload cannot reach another user's tag.
        let tag_name = self.store.tag_name_for_user(tag_id, user_id)?;
        let newly_linked = self.store.link_tag(message_row, tag_id)?;
        Ok(TagCommit {
            message_row,
            tag_id,
            tag_name,
            newly_linked,
        })
    }

    async fn finish(&self, chat_id: i64, outcome: Result<TagCommit, TagFlowError>) -> TagSelection {
        match outcome {
            Ok(commit) => {
                info!(
                    "tagged message {} with '{}' (tag {}, new link: {})",
                    commit.message_row, commit.tag_name, commit.tag_id, commit.newly_linked
                );
                let text = format!("✅ Message tagged with '{}'", commit.tag_name);
                self.notify(chat_id, &text).await;
                TagSelection::Resolved(commit)
            }
            Err(err) => {
                match &err {
                    TagFlowError::Store(_) => error!("tag selection failed: {}", err),
                    _ => warn!("tag selection rejected: {}", err),
                }
                self.notify(chat_id, err.user_message()).await;
                TagSelection::Failed(err)
            }
        }
    }

    async fn notify(&self, chat_id: i64, text: &str) {
        if let Err(err) = self.messenger.send(OutgoingMessage::new(chat_id, text)).await {
            error!("send to chat {}: {:#}", chat_id, err);
        }
    }

    async fn edit(&self, chat_id: i64, message_id: i32, text: &str) {
        if let Err(err) = self.messenger.edit_text(chat_id, message_id, text).await {
            error!("edit message {} in chat {}: {:#}", message_id, chat_id, err);
        }
    }
}
