use dotenv::dotenv;
use env_logger::Env;
use log::error;

use crate::config::ServerConfig;
use crate::serve::start_server;

mod chunk;
mod config;
mod connection;
mod err;
mod packets;
mod protocol_types;
pub(crate) mod protocol_util;
mod serve;
mod storage;
mod web;
mod world;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env();
    if let Err(e) = start_server(config).await {
        error!("{e}");
        std::process::exit(1);
    }
}
