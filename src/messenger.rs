use super::*;
use std::future::Future;
use teloxide::types::{ForceReply, ReplyMarkup};
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct ButtonSpec {
    pub(super) label: String,
    pub(super) callback_data: String,
}

impl ButtonSpec {
    pub(super) fn callback(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        ButtonSpec {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum OutgoingMarkup {
    Keyboard(Vec<Vec<ButtonSpec>>),
    Link { label: String, url: Url },
    ForceReply,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct OutgoingMessage {
    pub(super) chat_id: i64,
    pub(super) text: String,
    pub(super) reply_to: Option<i32>,
    pub(super) markup: Option<OutgoingMarkup>,
}

impl OutgoingMessage {
    pub(super) fn new(chat_id: i64, text: impl Into<String>) -> Self {
        OutgoingMessage {
            chat_id,
            text: text.into(),
            reply_to: None,
            markup: None,
        }
    }

    pub(super) fn reply_to(mut self, message_id: i32) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub(super) fn markup(mut self, markup: OutgoingMarkup) -> Self {
        self.markup = Some(markup);
        self
    }
}

/// Outbound side of the bot. `Bot` talks to Telegram; tests record calls.
pub(super) trait Messenger: Send + Sync {
    /// Resolves to the id of the sent message.
    fn send(&self, message: OutgoingMessage) -> impl Future<Output = Result<i32>> + Send;
    fn edit_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
    ) -> impl Future<Output = Result<()>> + Send;
    fn answer_callback(&self, callback_id: &str) -> impl Future<Output = Result<()>> + Send;
}

impl Messenger for Bot {
    async fn send(&self, message: OutgoingMessage) -> Result<i32> {
        let mut request = self.send_message(ChatId(message.chat_id), message.text);
        if let Some(reply_to) = message.reply_to {
            request = request.reply_to_message_id(MessageId(reply_to));
        }
        if let Some(markup) = message.markup {
            request = request.reply_markup(reply_markup(markup));
        }
        let sent = request.await.context("send message")?;
        Ok(sent.id.0)
    }

    async fn edit_text(&self, chat_id: i64, message_id: i32, text: &str) -> Result<()> {
        self.edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .await
            .context("edit message text")?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.answer_callback_query(callback_id.to_string())
            .await
            .context("answer callback query")?;
        Ok(())
    }
}

pub(super) fn reply_markup(markup: OutgoingMarkup) -> ReplyMarkup {
    match markup {
        OutgoingMarkup::Keyboard(rows) => {
            let rows = rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|button| {
                            InlineKeyboardButton::callback(button.label, button.callback_data)
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();
            ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(rows))
        }
        OutgoingMarkup::Link { label, url } => ReplyMarkup::InlineKeyboard(
            InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(label, url)]]),
        ),
        OutgoingMarkup::ForceReply => ReplyMarkup::ForceReply(ForceReply::new().selective(true)),
    }
}
