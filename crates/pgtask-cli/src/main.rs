use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

use pgtask_core::app::ControllerBuilder;
use pgtask_core::config::ControllerConfig;
use pgtask_core::domain::{
    DELETE_DATA_STARTED, FAILOVER_STARTED, HandlerError, TaskResource, TaskType,
};
use pgtask_core::impls::{InMemoryTaskStore, Informer};
use pgtask_core::logging::init_logging;
use pgtask_core::ports::{HandlerContext, TaskHandler};

/// 開始マーカーを書いてから作業するハンドラ（failover / delete-data 用）
struct MarkerHandler {
    marker: &'static str,
    work: Duration,
}

#[async_trait]
impl TaskHandler for MarkerHandler {
    async fn handle(&self, ctx: &HandlerContext, task: &TaskResource) -> Result<(), HandlerError> {
        ctx.store
            .set_parameter(&ctx.namespace, &task.name, self.marker, "true")
            .await
            .map_err(|e| HandlerError::new(format!("write {}: {e}", self.marker)))?;
        tracing::info!(task = %task.name, marker = self.marker, "started");
        sleep(self.work).await;
        Ok(())
    }
}

/// 何もしないで完了するハンドラ（その他の task type 用）
struct LogHandler;

#[async_trait]
impl TaskHandler for LogHandler {
    async fn handle(&self, ctx: &HandlerContext, task: &TaskResource) -> Result<(), HandlerError> {
        tracing::info!(
            namespace = %ctx.namespace,
            task = %task.name,
            task_type = %task.spec.task_type,
            "handled"
        );
        Ok(())
    }
}

fn config_path() -> Option<PathBuf> {
    std::env::var_os("PGTASK_CONFIG")
        .map(PathBuf::from)
        .or_else(|| std::env::args_os().nth(1).map(PathBuf::from))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // (A) 設定とログ
    let config = ControllerConfig::load(config_path().as_deref())?;
    init_logging(&config.log);

    // (B) store とコントローラを用意
    let store = Arc::new(InMemoryTaskStore::new());
    let log_handler: Arc<dyn TaskHandler> = Arc::new(LogHandler);
    let controller = ControllerBuilder::from_config(store.clone(), &config)
        .register(
            TaskType::Failover,
            Arc::new(MarkerHandler {
                marker: FAILOVER_STARTED,
                work: Duration::from_millis(200),
            }),
        )?
        .register(
            TaskType::DeleteData,
            Arc::new(MarkerHandler {
                marker: DELETE_DATA_STARTED,
                work: Duration::from_millis(200),
            }),
        )?
        .register_all(
            &[TaskType::CloneStep1, TaskType::CloneStep2, TaskType::CloneStep3],
            Arc::clone(&log_handler),
        )?
        .register_all(
            &[
                TaskType::PgDump,
                TaskType::PgRestore,
                TaskType::BackrestBackup,
                TaskType::BackrestRestore,
                TaskType::DeleteBackups,
                TaskType::MinorUpgrade,
            ],
            log_handler,
        )?
        .expect_handlers(&[TaskType::Failover, TaskType::DeleteData])
        .build()?;
    let controller = Arc::new(controller);

    // (C) watch -> queue をつなぎ、workers を起動
    let (informer_stop, informer_rx) = watch::channel(false);
    let informer = tokio::spawn(
        Informer::new(store.clone()).run(controller.event_handler(), informer_rx),
    );
    let running = Arc::clone(&controller).start();

    // (D) サンプルの task を投入
    store
        .create(TaskResource::new("demo", "dump-1", TaskType::PgDump))
        .await?;
    store
        .create(TaskResource::new("demo", "failover-1", TaskType::Failover))
        .await?;
    store
        .create(
            TaskResource::new("demo", "delete-1", TaskType::DeleteData)
                .with_parameter(DELETE_DATA_STARTED, "true"),
        )
        .await?;
    store
        .create(TaskResource::new("demo", "clone-1", TaskType::CloneStep2))
        .await?;
    store
        .create(TaskResource::with_raw_type("demo", "mystery-1", "not-a-task"))
        .await?;

    // (E) Ctrl-C か一定時間で graceful shutdown
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received"),
        _ = sleep(Duration::from_secs(2)) => {}
    }
    let _ = informer_stop.send(true);
    informer.await?;
    running.shutdown_and_wait().await;

    println!("{}", serde_json::to_string_pretty(&controller.queue().counts())?);
    for task in store.list().await {
        println!(
            "{}/{}: state={:?} message={:?}",
            task.namespace,
            task.name,
            task.state(),
            task.status.message
        );
    }
    Ok(())
}
