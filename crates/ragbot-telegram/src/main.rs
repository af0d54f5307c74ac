//! ragbot binary: wires storage, AI, CRM and the three bots together.
//!
//! ```bash
//! USER_TELEGRAM_TOKEN=xxx ADMIN_TELEGRAM_TOKEN=yyy cargo run -p ragbot-telegram
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ragbot_ai::provider_from_env;
use ragbot_core::{ChatEngine, Notifier, Settings};
use ragbot_crm::client_from_env;
use ragbot_ingest::{EmbeddingIndexer, FileSource, YmlFeedSource};
use ragbot_store::{ChunkStore, ConversationStore, MemStore, PgStore};
use ragbot_telegram::admin::AdminBot;
use ragbot_telegram::bot::UserBot;
use ragbot_telegram::http::{router, HttpState};
use ragbot_telegram::notify::{LogNotifier, NotifyBot};
use ragbot_telegram::AppConfig;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Knowledge source refresh interval.
const SOURCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Pause before a crashed task is respawned.
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Retrieval-augmented Telegram support bot
#[derive(Parser, Debug)]
#[command(name = "ragbot")]
#[command(about = "Retrieval-augmented Telegram support bot")]
struct Args {
    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Keep one independent loop alive for the process lifetime. A panic
/// or an unexpected exit is logged by task name and the loop is
/// respawned, so one misbehaving task cannot take the others down.
fn supervise<F, Fut>(name: &'static str, mut make: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match tokio::spawn(make()).await {
                Ok(()) => warn!(task = name, "Task exited, restarting"),
                Err(e) => error!(task = name, error = %e, "Task crashed, restarting"),
            }
            tokio::time::sleep(RESTART_DELAY).await;
        }
    })
}

async fn serve_http(state: HttpState, addr: String) {
    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            info!(addr = %addr, "HTTP server listening");
            if let Err(e) = axum::serve(listener, router(state)).await {
                error!(addr = %addr, error = %e, "HTTP server stopped");
            }
        }
        Err(e) => error!(addr = %addr, error = %e, "Failed to bind HTTP server"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let _ = dotenvy::dotenv();

    let filter = match args.verbose {
        0 => "ragbot=info,teloxide=warn,sqlx=warn",
        1 => "ragbot=debug,teloxide=info,sqlx=info",
        2 => "ragbot=trace,teloxide=debug,sqlx=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load()?;

    let (chunks, conversations): (Arc<dyn ChunkStore>, Arc<dyn ConversationStore>) =
        match &config.database_url {
            Some(url) => {
                let store = Arc::new(PgStore::connect(url).await?);
                (store.clone(), store)
            }
            None => {
                warn!("DATABASE_URL not set, falling back to in-memory storage");
                let store = Arc::new(MemStore::new());
                (store.clone(), store)
            }
        };

    let ai = provider_from_env()?;
    let crm = client_from_env()?;

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    let notifier: Arc<dyn Notifier> = match &config.notify_token {
        Some(token) => {
            let notify_bot = Arc::new(NotifyBot::new(token, config.notify_chat_ids.clone()));
            let inbound = Arc::clone(&notify_bot);
            tasks.push(supervise("notify-bot", move || {
                let bot = Arc::clone(&inbound);
                async move { bot.run().await }
            }));
            notify_bot
        }
        None => {
            warn!("NOTIFICATION_TELEGRAM_TOKEN not set, operator notifications go to the log");
            Arc::new(LogNotifier)
        }
    };

    let engine = Arc::new(ChatEngine::new(
        conversations.clone(),
        chunks.clone(),
        ai.clone(),
        crm,
        notifier,
        Settings::from_env(),
    ));

    let indexer = Arc::new(EmbeddingIndexer::new(chunks.clone(), ai.clone()));
    tasks.push(supervise("indexer", move || {
        let indexer = Arc::clone(&indexer);
        async move { indexer.run().await }
    }));

    if let Some(path) = &config.education_file_path {
        let source = Arc::new(FileSource::new(path, SOURCE_INTERVAL, chunks.clone()));
        tasks.push(supervise("file-source", move || {
            let source = Arc::clone(&source);
            async move { source.run().await }
        }));
    }
    if let Some(url) = &config.yml_feed_url {
        let source = Arc::new(YmlFeedSource::new(url, SOURCE_INTERVAL, chunks.clone()));
        tasks.push(supervise("yml-source", move || {
            let source = Arc::clone(&source);
            async move { source.run().await }
        }));
    }

    let user_bot = Arc::new(UserBot::new(
        &config.user_token,
        engine.clone(),
        conversations.clone(),
        ai.clone(),
    ));
    tasks.push(supervise("user-bot", move || Arc::clone(&user_bot).run()));

    let admin_bot = Arc::new(AdminBot::new(
        &config.admin_token,
        chunks.clone(),
        config.admin_chat_ids.clone(),
    ));
    tasks.push(supervise("admin-bot", move || Arc::clone(&admin_bot).run()));

    let http_state = HttpState {
        engine,
        conversations,
        bot_name: config.user_bot_name.clone(),
    };
    let addr = config.http_addr.clone();
    tasks.push(supervise("http", move || {
        serve_http(http_state.clone(), addr.clone())
    }));

    info!("ragbot is running");

    // Supervisors never return; this blocks for the process lifetime.
    futures::future::join_all(tasks).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn supervisor_respawns_after_panic() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let _supervisor = supervise("crasher", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("simulated task failure");
            }
        });

        tokio::time::sleep(RESTART_DELAY * 5).await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn supervisor_respawns_after_clean_exit() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let _supervisor = supervise("short-lived", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(RESTART_DELAY * 5).await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }
}
