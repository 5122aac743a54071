use super::*;

pub(super) fn load_config(path: &Path) -> Result<Config> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config_file: ConfigFile = toml::from_str(&contents).context("parse config")?;
    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let token = resolve_token(config_file.token, config_dir)?;
    let miniapp_url = config_file
        .miniapp_url
        .map(|raw| Url::parse(raw.trim()).with_context(|| format!("parse miniapp_url {}", raw)))
        .transpose()?;

    Ok(Config {
        token,
        database_path: resolve_config_path(&config_file.database_path, config_dir),
        miniapp_url,
        api: config_file.api,
    })
}

pub(super) fn resolve_token(input: TokenInput, config_dir: &Path) -> Result<String> {
    let token = match input {
        TokenInput::Inline(raw) => raw.trim().to_string(),
        TokenInput::File { file } => {
            let path = resolve_config_path(&file, config_dir);
            fs::read_to_string(&path)
                .with_context(|| format!("read token file {}", path.display()))?
                .trim()
                .to_string()
        }
    };
    if token.is_empty() {
        return Err(anyhow!("token is empty"));
    }
    Ok(token)
}

pub(super) fn resolve_config_path(path: &Path, config_dir: &Path) -> PathBuf {
    if path.is_relative() {
        config_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

/// `/cmd@botname args` -> `cmd`.
pub(super) fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let cmd = first.strip_prefix('/')?;
    Some(cmd.split('@').next().unwrap_or(cmd))
}

pub(super) async fn send_text<M: Messenger>(
    messenger: &M,
    chat_id: i64,
    text: &str,
    reply_to: Option<i32>,
) {
    let mut message = OutgoingMessage::new(chat_id, text);
    if let Some(reply_to) = reply_to {
        message = message.reply_to(reply_to);
    }
    if let Err(err) = messenger.send(message).await {
        error!("send to chat {}: {:#}", chat_id, err);
    }
}
