//! # Postline Binary
//!
//! Assembles the post engine from the adapters selected at compile time
//! (cargo features) and at start-up (configuration).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use api_adapters::{router, AppState, RouterOptions};
use configs::{LogSettings, MediaBackend, Settings};
use domains::{Mailer, MediaStorage, PostRepository, PrincipalResolver, UserDirectory};
use mail_adapters::LogMailer;
use services::{MediaLifecycle, NotificationDispatcher};
use storage_adapters::{InMemoryPostRepository, InMemoryUserDirectory};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(any(feature = "db-postgres", feature = "auth-jwt"))]
use secrecy::ExposeSecret;

/// Upper bound on flushing queued notification emails at shutdown.
const NOTIFICATION_DRAIN: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    init_tracing(&settings.log);

    // aws-sdk and lettre both link rustls; pick the provider once.
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    let (posts, users) = build_storage(&settings).await?;
    let media = build_media(&settings).await?;
    let mailer = build_mailer(&settings)?;
    let principals = build_principals(&settings);

    let (notifier, notification_worker) =
        NotificationDispatcher::spawn(mailer, posts.clone(), users.clone());
    let state = AppState::new(
        posts,
        users,
        MediaLifecycle::new(media, Duration::from_millis(settings.media.delete_timeout_ms)),
        notifier,
        principals,
    );

    let app = router(
        state,
        &RouterOptions {
            api_prefix: settings.server.api_prefix.clone(),
            cors_origin: settings.server.cors_origin.clone(),
            body_limit_bytes: settings.server.body_limit_bytes,
        },
    )
    .context("invalid server.cors_origin")?;
    let app = serve_local_uploads(app, &settings);

    let addr = settings.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, prefix = %settings.server.api_prefix, "postline listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // The router (and every dispatcher clone) is gone; let the worker drain.
    match tokio::time::timeout(NOTIFICATION_DRAIN, notification_worker).await {
        Ok(Ok(())) => info!("notification queue drained"),
        Ok(Err(e)) => warn!(error = %e, "notification worker panicked"),
        Err(_) => warn!("gave up waiting for pending notifications"),
    }
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if log.json {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

async fn build_storage(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn PostRepository>, Arc<dyn UserDirectory>)> {
    match &settings.database.url {
        #[cfg(feature = "db-postgres")]
        Some(url) => {
            use storage_adapters::{PgPostRepository, PgUserDirectory};
            let pool = storage_adapters::postgres::connect(
                url.expose_secret(),
                settings.database.max_connections,
            )
            .await?;
            info!("using postgres storage");
            Ok((
                Arc::new(PgPostRepository::new(pool.clone())),
                Arc::new(PgUserDirectory::new(pool)),
            ))
        }
        #[cfg(not(feature = "db-postgres"))]
        Some(_) => bail!("database.url is set but postline was built without db-postgres"),
        None => {
            warn!("no database.url configured, posts live in memory only");
            Ok((
                Arc::new(InMemoryPostRepository::new()),
                Arc::new(InMemoryUserDirectory::new()),
            ))
        }
    }
}

async fn build_media(settings: &Settings) -> anyhow::Result<Arc<dyn MediaStorage>> {
    let media = &settings.media;
    match media.backend {
        #[cfg(feature = "media-local")]
        MediaBackend::Local => {
            info!(root = %media.local_root, "using local media storage");
            Ok(Arc::new(storage_adapters::LocalMediaStore::new(
                media.local_root.clone().into(),
                media.local_url_prefix.clone(),
            )))
        }
        #[cfg(feature = "media-s3")]
        MediaBackend::S3 => {
            use storage_adapters::{S3MediaStore, S3Options};
            let (Some(bucket), Some(public_base_url)) =
                (media.s3_bucket.clone(), media.s3_public_base_url.clone())
            else {
                bail!("media.backend = s3 requires media.s3_bucket and media.s3_public_base_url");
            };
            info!(%bucket, "using s3 media storage");
            Ok(Arc::new(
                S3MediaStore::connect(S3Options {
                    bucket,
                    region: media.s3_region.clone(),
                    endpoint: media.s3_endpoint.clone(),
                    key_prefix: media.s3_key_prefix.clone(),
                    public_base_url,
                })
                .await,
            ))
        }
        #[allow(unreachable_patterns)]
        other => bail!("media backend {other:?} is not compiled into this binary"),
    }
}

fn build_mailer(settings: &Settings) -> anyhow::Result<Arc<dyn Mailer>> {
    let smtp = &settings.smtp;
    if smtp.host.is_empty() {
        warn!("no smtp.host configured, notification emails are only logged");
        return Ok(Arc::new(LogMailer));
    }

    #[cfg(feature = "mail-smtp")]
    {
        use mail_adapters::{SmtpMailer, SmtpOptions};
        let mailer = SmtpMailer::new(&SmtpOptions {
            host: smtp.host.clone(),
            port: smtp.port,
            username: smtp.username.clone(),
            password: smtp.password.clone(),
            from: smtp.from.clone(),
            starttls: smtp.starttls,
        })?;
        info!(host = %smtp.host, port = smtp.port, "using smtp mailer");
        Ok(Arc::new(mailer))
    }

    #[cfg(not(feature = "mail-smtp"))]
    bail!("smtp.host is set but postline was built without mail-smtp")
}

fn build_principals(settings: &Settings) -> Arc<dyn PrincipalResolver> {
    #[cfg(feature = "auth-jwt")]
    {
        if settings.auth.jwt_secret.expose_secret() == configs::DEV_JWT_SECRET {
            warn!("auth.jwt_secret is the development default");
        }
        Arc::new(auth_adapters::JwtPrincipalResolver::new(&settings.auth.jwt_secret))
    }

    #[cfg(not(feature = "auth-jwt"))]
    {
        let _ = settings;
        warn!("built without auth-jwt, every authenticated route will answer 401");
        Arc::new(auth_adapters::StaticPrincipalResolver::new())
    }
}

/// Mounts the local upload directory at its public URL prefix so stored
/// image URLs resolve against this server.
fn serve_local_uploads(app: axum::Router, settings: &Settings) -> axum::Router {
    if settings.media.backend != MediaBackend::Local {
        return app;
    }
    app.nest_service(
        &settings.media.local_url_prefix,
        tower_http::services::ServeDir::new(&settings.media.local_root),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}
