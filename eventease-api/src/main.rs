use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use eventease_api::{app, metrics::Metrics, sale::SaleStatus, AppState};
use eventease_booking::{seed_pool, BookingEngine, ResetScheduler};
use eventease_core::{BucketStore, SeatStore};
use eventease_ratelimit::{RateLimitPolicy, RateLimiter};
use eventease_store::app_config::{AppConfig, RateLimitConfig};
use eventease_store::{DbClient, MemoryBucketStore, MemorySeatStore, PgSeatStore, RedisBucketStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn seat_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SeatStore>> {
    match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Ok(Arc::new(PgSeatStore::new(db.pool)))
        }
        None => {
            tracing::warn!("No database.url configured, seats live in memory only");
            Ok(Arc::new(MemorySeatStore::new()))
        }
    }
}

/// How long an untouched bucket is kept. An expired bucket comes back full,
/// so this must cover a complete refill from empty.
fn bucket_ttl(config: &AppConfig) -> Duration {
    let limits = &config.rate_limit;
    let intervals_to_full = limits.capacity.div_ceil(limits.refill_tokens.max(1)).max(1);
    let refill_secs = limits.refill_interval_secs.saturating_mul(u64::from(intervals_to_full));
    Duration::from_secs(config.redis.bucket_ttl_secs.max(refill_secs))
}

fn bucket_store(config: &AppConfig) -> anyhow::Result<Arc<dyn BucketStore>> {
    let ttl = bucket_ttl(config);
    match &config.redis.url {
        Some(url) => {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            let store = RedisBucketStore::new(url, ttl_ms).context("Invalid Redis URL")?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("No redis.url configured, rate limits are per instance");
            let store = Arc::new(MemoryBucketStore::with_idle_ttl(ttl));

            let sweeper = Arc::clone(&store);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(ttl);
                loop {
                    ticker.tick().await;
                    let purged = sweeper.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "Evicted idle rate-limit buckets");
                    }
                }
            });
            Ok(store)
        }
    }
}

fn policy(config: &RateLimitConfig) -> RateLimitPolicy {
    RateLimitPolicy {
        capacity: config.capacity,
        refill_tokens: config.refill_tokens,
        refill_interval: Duration::from_secs(config.refill_interval_secs),
        max_cas_attempts: config.max_cas_attempts,
        failure_backoff: Duration::from_secs(config.failure_backoff_secs),
        store_timeout: Duration::from_millis(config.store_timeout_ms),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventease_api=debug,eventease_booking=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load config")?;
    tracing::info!("Starting EventEase API on port {}", config.server.port);

    let seats = seat_store(&config).await?;
    seed_pool(
        seats.as_ref(),
        &config.booking.seat_prefix,
        config.booking.pool_size,
        Utc::now(),
    )
    .await
    .context("Failed to seed seat pool")?;

    let engine = Arc::new(
        BookingEngine::new(seats).with_store_timeout(Duration::from_millis(config.booking.store_timeout_ms)),
    );

    let policy = policy(&config.rate_limit);
    policy.validate().context("Invalid rate_limit settings")?;
    let limiter = Arc::new(RateLimiter::new(bucket_store(&config)?, policy));

    let metrics = Arc::new(
        Metrics::new().map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?,
    );

    let scheduler = if config.scheduler.enabled {
        anyhow::ensure!(config.scheduler.period_secs > 0, "scheduler.period_secs must be at least 1");
        let observer = Arc::clone(&metrics);
        let handle = ResetScheduler::new(Arc::clone(&engine), Duration::from_secs(config.scheduler.period_secs))
            .with_observer(move |outcome| observer.record_tick(outcome))
            .spawn();
        Some(handle)
    } else {
        tracing::info!("Reset scheduler disabled");
        None
    };

    let app_state = AppState {
        engine,
        limiter,
        sale: Arc::new(SaleStatus::new(config.sale.enabled_on_start)),
        metrics,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app(app_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    if let Some(handle) = scheduler {
        handle.shutdown().await;
    }
    Ok(())
}
