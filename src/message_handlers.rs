use super::*;

pub(super) const START_TEXT: &str =
    "Hello! I'm your Telegram Content Organizer bot. Send me any message or forward content to me!";
pub(super) const HELP_TEXT: &str = "Available commands:\n/start - Get started\n/help - Show this help message\n/miniapp - Open mini-app to view your tags\n\nYou can also send me any message or forward content to me.";
pub(super) const UNKNOWN_COMMAND: &str = "Unknown command. Use /help to see available commands.";
pub(super) const MINIAPP_TEXT: &str = "Open the mini-app to view and manage your tags:";
pub(super) const MINIAPP_BUTTON: &str = "🏷️ View My Tags";
pub(super) const MINIAPP_UNAVAILABLE: &str = "The mini-app is not configured for this bot yet.";
pub(super) const SAVE_FAILED: &str = "Sorry, I couldn't save your message. Please try again.";
pub(super) const ALREADY_SAVED: &str = "This message is already saved.";

pub(super) async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let incoming = IncomingMessage::from_telegram(&msg);
    process_message(&bot, &state, incoming).await
}

/// Commands, then replies to a tag prompt, then ingestion of anything else.
pub(super) async fn process_message<M: Messenger>(
    messenger: &M,
    state: &AppState,
    msg: IncomingMessage,
) -> Result<()> {
    let sender = match &msg.from {
        Some(sender) if !sender.is_bot => sender,
        _ => return Ok(()),
    };

    let user_id = match state.store.upsert_user(sender) {
        Ok(user_id) => Some(user_id),
        Err(err) => {
            error!("save user {}: {}", sender.telegram_id, err);
            None
        }
    };

    if let Some(command) = msg.text.as_deref().and_then(parse_command) {
        info!("command /{} from {}", command, sender.display_name());
        return handle_command(messenger, state, &msg, command).await;
    }

    let flow = TagFlow::new(&state.store, &state.codec, messenger);

    if let Some(prompt) = msg
        .reply_to
        .as_ref()
        .filter(|replied| replied.from_bot)
        .and_then(|replied| replied.text.as_deref())
        .filter(|text| is_tag_prompt(text))
    {
        match user_id {
            Some(user_id) => {
                let reply = msg.text.as_deref().unwrap_or_default();
                flow.resolve_reply(user_id, msg.chat_id, prompt, reply).await;
            }
            None => send_text(messenger, msg.chat_id, TAG_FAILED, None).await,
        }
        return Ok(());
    }

    let Some(user_id) = user_id else {
        send_text(messenger, msg.chat_id, SAVE_FAILED, Some(msg.message_id)).await;
        return Ok(());
    };

    let record = describe_message(&msg);
    match state.store.save_message(user_id, &record) {
        Ok(row_id) => {
            info!(
                "saved {} message {} (row {}) for {}",
                record.message_type.as_str(),
                record.telegram_message_id,
                row_id,
                sender.display_name()
            );
            flow.prompt(user_id, msg.chat_id, msg.message_id).await;
        }
        Err(StoreError::Conflict) => {
            warn!(
                "message {} already saved for user {}",
                record.telegram_message_id, user_id
            );
            send_text(messenger, msg.chat_id, ALREADY_SAVED, Some(msg.message_id)).await;
        }
        Err(err) => {
            error!("save message {}: {}", record.telegram_message_id, err);
            send_text(messenger, msg.chat_id, SAVE_FAILED, Some(msg.message_id)).await;
        }
    }
    Ok(())
}

async fn handle_command<M: Messenger>(
    messenger: &M,
    state: &AppState,
    msg: &IncomingMessage,
    command: &str,
) -> Result<()> {
    let text = match command {
        "start" => START_TEXT,
        "help" => HELP_TEXT,
        "miniapp" => {
            send_miniapp_button(messenger, state, msg.chat_id).await;
            return Ok(());
        }
        _ => UNKNOWN_COMMAND,
    };
    send_text(messenger, msg.chat_id, text, Some(msg.message_id)).await;
    Ok(())
}

async fn send_miniapp_button<M: Messenger>(messenger: &M, state: &AppState, chat_id: i64) {
    let Some(url) = state.config.miniapp_url.clone() else {
        send_text(messenger, chat_id, MINIAPP_UNAVAILABLE, None).await;
        return;
    };
    let message = OutgoingMessage::new(chat_id, MINIAPP_TEXT).markup(OutgoingMarkup::Link {
        label: MINIAPP_BUTTON.to_string(),
        url,
    });
    if let Err(err) = messenger.send(message).await {
        error!("send mini-app button: {:#}", err);
    }
}
