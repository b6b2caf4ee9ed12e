use crate::api::{create_router, AppState};
use anyhow::{Context, Result};
use pulse_collector::Pipeline;
use pulse_config::PulseConfig;
use pulse_core::{ShutdownHandle, ShutdownListener};
use pulse_metrics::{
    default_checks, AlertEngine, DispatcherSet, LogDispatcher, PipelineMetrics, RegistrySnapshot,
    WebhookDispatcher,
};
use pulse_storage::{FileDeadLetter, JsonLinesSink};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 组装好的服务：采集管线、告警引擎和 HTTP 接口
pub struct App {
    config: PulseConfig,
    pipeline: Arc<Pipeline>,
    engine: Arc<AlertEngine>,
    metrics: Arc<PipelineMetrics>,
    shutdown: ShutdownHandle,
}

impl App {
    pub fn build(config: PulseConfig) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(
            PipelineMetrics::new(config.alerts.latency_window())
                .context("Failed to register pipeline metrics")?,
        );

        let sink = Arc::new(JsonLinesSink::new(&config.storage.data_dir));
        let dead_letter = Arc::new(FileDeadLetter::new(&config.storage.dead_letter_dir));

        let pipeline = Pipeline::builder(metrics.clone())
            .buffer(config.buffer.to_buffer_config())
            .event_retry(config.retry.events_policy())
            .metric_retry(config.retry.metrics_policy())
            .health_thresholds(
                config.alerts.buffer_high as usize,
                config.alerts.buffer_overflow as usize,
            )
            .event_sink(sink.clone())
            .metric_sink(sink)
            .event_dead_letter(dead_letter.clone())
            .metric_dead_letter(dead_letter)
            .build()?;

        let mut dispatchers =
            DispatcherSet::new().with(Arc::new(LogDispatcher::new(&config.alerts.service_name)));
        if let Some(url) = &config.notify.webhook_url {
            dispatchers.add(Arc::new(WebhookDispatcher::new(
                url.as_str(),
                config.alerts.service_name.as_str(),
            )?));
        }

        let engine = AlertEngine::new(
            default_checks(&config.alerts.thresholds()),
            Arc::new(RegistrySnapshot::new(metrics.clone())),
            Arc::new(dispatchers),
        )
        .with_label("service", config.alerts.service_name.clone());

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            engine: Arc::new(engine),
            metrics,
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    pub fn state(&self) -> AppState {
        AppState {
            pipeline: self.pipeline.clone(),
            engine: self.engine.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// 启动采集器、定时刷新和告警评估
    pub fn start_background(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = self.pipeline.start(self.shutdown.listener());
        tasks.push(
            self.engine
                .clone()
                .run(self.config.alerts.evaluation_interval(), self.shutdown.listener()),
        );
        tasks
    }

    /// 停止后台任务并刷新剩余数据
    pub async fn stop(&self, tasks: Vec<JoinHandle<()>>) {
        self.shutdown.trigger();
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Background task ended abnormally");
            }
        }
        self.pipeline.shutdown().await;
    }

    /// 运行 HTTP 服务直到收到 SIGINT/SIGTERM
    pub async fn run(self) -> Result<()> {
        let addr = self.config.server.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        let tasks = self.start_background();

        let signals = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = signals.wait_for_system_signal().await {
                error!(error = %e, "Failed to listen for shutdown signals");
                signals.trigger();
            }
        });

        info!(addr = %addr, "Pulse collector listening");
        axum::serve(listener, create_router(self.state()))
            .with_graceful_shutdown(wait_for(self.shutdown.listener()))
            .await
            .context("HTTP server error")?;

        info!("Shutting down");
        self.stop(tasks).await;
        Ok(())
    }
}

async fn wait_for(mut shutdown: ShutdownListener) {
    shutdown.recv().await;
}
