use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// 关闭信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM
    Term,

    /// SIGINT / Ctrl+C
    Interrupt,

    /// 手动触发
    Manual,
}

/// 关闭信号的发送端
///
/// 使用 watch 通道：晚订阅的监听者也能看到已经发出的信号。
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<Option<ShutdownSignal>>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// 订阅关闭信号
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// 手动触发关闭
    pub fn trigger(&self) {
        self.send(ShutdownSignal::Manual);
    }

    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    fn send(&self, signal: ShutdownSignal) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                info!(signal = ?signal, "Shutdown triggered");
                *current = Some(signal);
                true
            } else {
                false
            }
        });
    }

    /// 等待系统信号并广播
    #[cfg(unix)]
    pub async fn wait_for_system_signal(&self) -> std::io::Result<ShutdownSignal> {
        use signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let received = tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                ShutdownSignal::Term
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                ShutdownSignal::Interrupt
            }
        };

        self.send(received);
        Ok(received)
    }

    /// 等待系统信号（Windows 版本）
    #[cfg(not(unix))]
    pub async fn wait_for_system_signal(&self) -> std::io::Result<ShutdownSignal> {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C");
        self.send(ShutdownSignal::Interrupt);
        Ok(ShutdownSignal::Interrupt)
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// 关闭信号的接收端
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<Option<ShutdownSignal>>,
}

impl ShutdownListener {
    /// 等待关闭信号
    ///
    /// 发送端全部释放时视为手动关闭。
    pub async fn recv(&mut self) -> ShutdownSignal {
        loop {
            if let Some(signal) = *self.rx.borrow_and_update() {
                return signal;
            }
            if self.rx.changed().await.is_err() {
                return ShutdownSignal::Manual;
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_trigger() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.listener();

        handle.trigger();

        assert_eq!(listener.recv().await, ShutdownSignal::Manual);
        assert!(listener.is_triggered());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_signal() {
        let handle = ShutdownHandle::new();
        handle.trigger();

        let mut late = handle.listener();
        assert_eq!(late.recv().await, ShutdownSignal::Manual);
    }

    #[tokio::test]
    async fn test_multiple_listeners() {
        let handle = ShutdownHandle::new();
        let mut a = handle.listener();
        let mut b = a.clone();

        handle.trigger();

        assert_eq!(a.recv().await, ShutdownSignal::Manual);
        assert_eq!(b.recv().await, ShutdownSignal::Manual);
    }

    #[tokio::test]
    async fn test_dropped_handle_releases_listener() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.listener();
        drop(handle);

        assert_eq!(listener.recv().await, ShutdownSignal::Manual);
        assert!(!listener.is_triggered());
    }
}
