use std::env;
use std::sync::Arc;

use authgate_auth::activity::ActivityClient;
use authgate_auth::audit::TracingAuditSink;
use authgate_auth::engine::AuthWorkflowService;
use authgate_auth::http::{AppState, router};
use authgate_auth::identity::IdentityResolver;
use authgate_auth::keycloak::{CachedTokenClient, IdpTokens, TokenClient, UserDirectory};
use authgate_auth::mailer::{ConfirmationMailer, NoopMailer, SmtpMailer};

mod config;
mod observability;

#[tokio::main]
async fn main() {
    // Load .env if present, before anything reads the environment.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    let config_path = env::var("AUTHGATE_CONFIG").ok();
    let cfg = match config::load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    observability::apply_logging_level(&cfg.server.log_level);

    let http = match reqwest::Client::builder()
        .timeout(cfg.gateway.keycloak.request_timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("HTTP client initialization failed: {e}");
            std::process::exit(2);
        }
    };

    let token_client = match TokenClient::new(http.clone(), &cfg.gateway.keycloak) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Invalid identity provider authority: {e}");
            std::process::exit(2);
        }
    };
    let tokens: Arc<dyn IdpTokens> = if cfg.gateway.token_cache.enabled {
        Arc::new(CachedTokenClient::new(token_client, &cfg.gateway.token_cache))
    } else {
        Arc::new(token_client)
    };

    let directory = UserDirectory::new(http.clone(), &cfg.gateway.keycloak);
    let resolver = IdentityResolver::new(cfg.gateway.keycloak.client_id.clone());
    let activity = ActivityClient::new(http, &cfg.gateway.activity);

    let mailer: Arc<dyn ConfirmationMailer> = if cfg.gateway.smtp.enabled {
        match SmtpMailer::new(&cfg.gateway.smtp) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                eprintln!("SMTP configuration error: {e}");
                std::process::exit(2);
            }
        }
    } else {
        Arc::new(NoopMailer)
    };

    let engine = AuthWorkflowService::new(
        tokens,
        directory,
        resolver,
        activity,
        Arc::new(TracingAuditSink),
        mailer,
    );
    let app = router(AppState {
        workflows: Arc::new(engine),
    });

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Cannot bind {addr}: {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(%addr, "authgate listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
