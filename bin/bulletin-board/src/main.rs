//! # Bulletin Board Binary
//!
//! The entry point that assembles the application from settings and
//! compile-time features.

use actix_files::Files;
use actix_web::{web, App, HttpServer};
use bb_api::handlers::{self, AppState};
use bb_api::{configure_routes, middleware};
use bb_configs::{LogSettings, Settings, StoreBackend, StoreSettings};
use bb_core::{AdRepository, KeyValueStore, MemoryStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "kv-redis")]
use bb_kv_redis::RedisStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log)?;

    // 1. Initialize the store; everything below borrows it through the repository
    let store = build_store(&settings.store)?;

    // 2. Wrap in AppState (one repository shared by every worker)
    let repo = AdRepository::new(store)
        .with_append_mode(settings.board.append_mode)
        .with_max_attempts(settings.board.max_append_attempts);
    let state = web::Data::new(AppState { repo });

    let static_dir = settings.server.static_dir.clone();
    let (host, port) = settings.bind_addr();
    info!(
        %host,
        port,
        backend = ?settings.store.backend,
        append_mode = ?settings.board.append_mode,
        "bulletin board starting"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::standard_middleware())
            .wrap(middleware::security_headers())
            .configure(configure_routes)
            .service(Files::new("/static", &static_dir))
            .default_service(web::to(handlers::not_found_page))
    })
    .bind((host, port))?
    .run()
    .await?;

    Ok(())
}

/// JSON or human-readable logs; `RUST_LOG` overrides the configured filter.
fn init_tracing(log: &LogSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    // Also installs the `log` bridge, so actix-web's access log lands here too.
    let installed = if log.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn build_store(settings: &StoreSettings) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            info!("using in-memory store; ads are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "kv-redis")]
        StoreBackend::Redis => {
            use secrecy::ExposeSecret;
            let store = RedisStore::connect(
                settings.redis_url.expose_secret(),
                settings.pool_size,
                std::time::Duration::from_millis(settings.wait_timeout_ms),
            )?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "kv-redis"))]
        StoreBackend::Redis => anyhow::bail!("store.backend = \"redis\" needs the kv-redis feature"),
    }
}
