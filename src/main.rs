use std::sync::Arc;

use anyhow::Context;
use broadcaster::{
    application::{
        handlers::{broadcast_dispatcher::BroadcastDispatcher, reporter::ReportSinks},
        services::{job_queue::BroadcastQueue, job_state::JobStateStore},
        usecases::{
            cancel_broadcast::CancelBroadcastUseCase,
            start_broadcast::{StartBroadcastConfig, StartBroadcastUseCase},
        },
    },
    config::{Config, QueueBackend, StateBackend},
    domain::repositories::StateStore,
    infrastructure::{
        messaging::{telegram::TelegramClient, webhook::HttpWebhookSink},
        queue::{
            in_memory::InMemoryBroadcastQueue,
            redis::{DEFAULT_QUEUE_PREFIX, RedisBroadcastQueue},
            worker::QueueWorker,
        },
        recipients::http_api::HttpRecipientApi,
        repositories::{
            in_memory::InMemoryStateStore, postgres::PostgresStateStore, redis::RedisStateStore,
        },
    },
    presentation::http::endpoints::root::{ApiState, api_service},
};
use poem::{Route, Server, listener::TcpListener};
use redis::aio::ConnectionManager;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,broadcaster=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let config = Config::from_env()?;
    let server_url = config.server_url();

    let mut redis_conn = None;
    if config.state_backend == StateBackend::Redis || config.queue_backend == QueueBackend::Redis {
        let client = redis::Client::open(config.redis_url.as_str()).context("invalid REDIS_URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;
        redis_conn = Some(conn);
    }

    let store: Arc<dyn StateStore> = match (config.state_backend, redis_conn.clone()) {
        (StateBackend::Redis, Some(conn)) => RedisStateStore::from_connection(conn),
        (StateBackend::Redis, None) => RedisStateStore::connect(&config.redis_url).await?,
        (StateBackend::Postgres, _) => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;
            PostgresStateStore::connect(url).await?
        }
        (StateBackend::Memory, _) => {
            warn!("job state is kept in memory and lost on restart");
            Arc::new(InMemoryStateStore::new())
        }
    };
    let state = JobStateStore::new(store);

    let queue: Arc<dyn BroadcastQueue> = match (config.queue_backend, redis_conn) {
        (QueueBackend::Redis, Some(conn)) => {
            RedisBroadcastQueue::from_connection(conn, DEFAULT_QUEUE_PREFIX)
        }
        (QueueBackend::Redis, None) => {
            RedisBroadcastQueue::connect(&config.redis_url, DEFAULT_QUEUE_PREFIX).await?
        }
        (QueueBackend::Memory, _) => {
            warn!("job queue is kept in memory and lost on restart");
            Arc::new(InMemoryBroadcastQueue::new())
        }
    };

    let telegram = TelegramClient::new(&config.telegram_api_url, &config.bot_token)?;
    let recipients = HttpRecipientApi::new(&config.recipients_api_url, &config.recipients_api_key)?;
    let sinks = ReportSinks {
        chat: Some(telegram.clone()),
        webhook: Some(HttpWebhookSink::new()?),
    };

    let dispatcher = Arc::new(BroadcastDispatcher::new(
        state.clone(),
        recipients.clone(),
        telegram,
        sinks,
        config.dispatch.clone(),
    ));

    let shutdown = CancellationToken::new();
    let worker = QueueWorker::new(queue.clone(), dispatcher, config.queue_poll_interval)
        .with_lease(config.queue_lease)
        .spawn(shutdown.clone());

    let api_state = Arc::new(ApiState {
        start_broadcast_usecase: Arc::new(StartBroadcastUseCase::new(
            queue.clone(),
            recipients,
            StartBroadcastConfig {
                source_timezone: config.source_timezone,
            },
        )),
        cancel_broadcast_usecase: Arc::new(CancelBroadcastUseCase::new(queue, state)),
        api_key: config.api_key.clone(),
    });

    let api_service = api_service(api_state, &server_url);
    let ui = api_service.swagger_ui();
    let app = Route::new().nest("/api", api_service).nest("/", ui);

    info!(url = %server_url, "starting server");
    Server::new(TcpListener::bind(format!("{}:{}", config.host, config.port)))
        .run_with_graceful_shutdown(
            app,
            async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown signal received");
            },
            None,
        )
        .await?;

    shutdown.cancel();
    if let Err(err) = worker.await {
        warn!(error = %err, "queue worker did not stop cleanly");
    }
    info!("server stopped");
    Ok(())
}
