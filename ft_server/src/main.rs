//! FinTrack authentication server.
//!
//! Connects PostgreSQL and Redis, starts the email delivery worker and serves
//! the HTTP API until Ctrl+C, then drains pending email before exiting.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Error};
use fintrack::{
    auth::{
        AuthManager, PasswordHandler, PasswordValidator, RefreshTokenStore, TokenIssuer,
    },
    db::{Database, PgUserRepository},
    email::{
        EmailQueue, EmailSender, LogSender, Mailer, SmtpSender, TemplateRenderer,
        queue::DEFAULT_QUEUE_CAPACITY,
    },
    kv::{KeyValueStore, RedisStore},
};
use ft_server::{
    api::{self, AppState, cookies::CookieSettings},
    config::ServerConfig,
    logging,
    metrics::{self, MeteredSender},
};
use log::{info, warn};
use pico_args::Arguments;

const HELP: &str = "\
Run the FinTrack authentication server

USAGE:
  ft_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8000]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --redis-url  URL         Redis connection string     [default: env REDIS_URL or redis://127.0.0.1:6379]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  JWT_PRIVATE_KEY_PATH     PEM private key used to sign tokens (required)
  JWT_PUBLIC_KEY_PATH      PEM public key used to verify tokens (required)
  SMTP_HOST                SMTP relay; emails are only logged when unset
  ALLOWED_HOSTS            Frontend base URL (CORS and email links)
  (See .env.example for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        redis_url: pargs.opt_value_from_str("--redis-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url, args.redis_url)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics exposed at http://{}/metrics", addr);
    }

    // Storage
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected successfully");

    let kv = RedisStore::connect(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    kv.ping().await.context("Redis did not answer PING")?;
    info!("Redis connected successfully");
    let kv: Arc<dyn KeyValueStore> = Arc::new(kv);

    // Email delivery
    let sender: Arc<dyn EmailSender> = match &config.email.smtp {
        Some(smtp) => {
            info!("Delivering email through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpSender::new(smtp).context("Invalid SMTP configuration")?)
        }
        None => {
            warn!("SMTP_HOST not set, outgoing email will only be logged");
            Arc::new(LogSender)
        }
    };
    let (queue, worker) = EmailQueue::start(
        Arc::new(MeteredSender::new(sender)),
        config.email_retry_policy(),
        DEFAULT_QUEUE_CAPACITY,
    );
    let templates = match &config.email.templates_path {
        Some(dir) => TemplateRenderer::with_dir(dir),
        None => TemplateRenderer::builtin(),
    };

    // Auth core
    let tokens = TokenIssuer::from_files(
        config.jwt.algorithm,
        &config.jwt.private_key_path,
        &config.jwt.public_key_path,
        config.token_lifetimes(),
    )
    .context("Failed to load JWT keys")?;
    let passwords = PasswordHandler::new(config.password.hash_rounds, config.password.hash_memory_kib)
        .context("Invalid password hashing parameters")?;
    let validator = match &config.password.common_list_path {
        Some(path) => PasswordValidator::with_common_passwords_file(config.password.validation_level, path),
        None => PasswordValidator::new(config.password.validation_level),
    };

    let auth = AuthManager::new(
        Arc::new(PgUserRepository::new(db.pool().clone())),
        RefreshTokenStore::new(kv.clone()),
        Arc::new(tokens),
        passwords,
        Arc::new(validator),
        Mailer::new(templates, queue),
        config.auth_settings(),
    );

    let state = AppState {
        cookies: CookieSettings::new(config.http.cookie_secure, auth.token_lifetimes()),
        auth: Arc::new(auth),
        kv,
        database: Some(db.clone()),
    };

    let app = api::create_router(state, &config.http);

    info!("Starting HTTP server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down server...");
    worker.shutdown().await;
    db.close().await;
    info!("Shutdown complete");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
