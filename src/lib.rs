use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use config::Config;
use generation::MessageGenerator;
use notify::Notifier;

pub mod config;
pub mod error;
pub mod generation;
pub mod middleware;
pub mod notify;
pub mod utils;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub generator: Arc<MessageGenerator>,
    pub notifier: Arc<Notifier>,
}
