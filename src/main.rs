use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use thiserror::Error;
use url::Url;

mod api;
mod auth;
mod callback_handlers;
mod codec;
mod flow;
mod helpers;
mod inbound;
mod message_handlers;
mod messenger;
mod metadata;
mod picker;
mod store;

use api::*;
use auth::*;
use callback_handlers::*;
use codec::*;
use flow::*;
use helpers::*;
use inbound::*;
use message_handlers::*;
use messenger::*;
use metadata::*;
use picker::*;
use store::*;


/// Bot token inline, or a file holding it (relative to the config file).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenInput {
    Inline(String),
    File { file: PathBuf },
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    token: TokenInput,
    database_path: PathBuf,
    miniapp_url: Option<String>,
    api: Option<ApiConfig>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
struct ApiConfig {
    bind: SocketAddr,
}

#[derive(Debug, Clone)]
struct Config {
    token: String,
    database_path: PathBuf,
    miniapp_url: Option<Url>,
    api: Option<ApiConfig>,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    config: PathBuf,
}

struct AppState {
    config: Config,
    store: Store,
    codec: MarkerCodec,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    if let Some(dir) = config
        .database_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        fs::create_dir_all(dir).context("create database dir")?;
    }

    let store = Store::open(&config.database_path).context("open store")?;
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        codec: MarkerCodec,
    });

    if let Some(api) = &config.api {
        start_api_server(api.bind, state.clone());
    }

    let bot = Bot::new(config.token.clone());

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    info!("starting dispatcher");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
