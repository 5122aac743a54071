use super::*;

pub(super) async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    let press = CallbackPress::from_telegram(&q);
    process_callback(&bot, &state, press).await
}

pub(super) async fn process_callback<M: Messenger>(
    messenger: &M,
    state: &AppState,
    press: CallbackPress,
) -> Result<()> {
    info!(
        "callback {:?} from {}",
        press.data.as_deref().unwrap_or_default(),
        press.from.display_name()
    );

    let user_id = match state.store.upsert_user(&press.from) {
        Ok(user_id) => user_id,
        Err(err) => {
            error!("save user {}: {}", press.from.telegram_id, err);
            if let Err(err) = messenger.answer_callback(&press.id).await {
                error!("answer callback {}: {:#}", press.id, err);
            }
            send_text(messenger, press.chat_id, TAG_FAILED, None).await;
            return Ok(());
        }
    };

    TagFlow::new(&state.store, &state.codec, messenger)
        .resolve_callback(user_id, &press)
        .await;
    Ok(())
}
