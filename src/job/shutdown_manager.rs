//! 优雅停止管理器
//!
//! 所有后台循环共享一个关闭标志，迭代之间与阻塞调用之前检查；
//! 在途的外部调用允许完成或超时，不强行中断（避免订单停在未知状态）。
//! 关闭回调按注册顺序执行，各自带超时。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// 关闭回调函数
pub type ShutdownHook = Box<
    dyn Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

/// 关闭配置
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// 总超时时间
    pub total_timeout: Duration,
    /// 每个钩子的超时时间
    pub hook_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            total_timeout: Duration::from_secs(30),
            hook_timeout: Duration::from_secs(10),
        }
    }
}

pub struct ShutdownManager {
    /// 是否正在关闭
    is_shutting_down: Arc<AtomicBool>,
    /// 关闭回调函数列表
    shutdown_hooks: RwLock<Vec<(String, ShutdownHook)>>,
    config: ShutdownConfig,
}

impl ShutdownManager {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            is_shutting_down: Arc::new(AtomicBool::new(false)),
            shutdown_hooks: RwLock::new(Vec::new()),
            config,
        }
    }

    pub fn new_default() -> Self {
        Self::new(ShutdownConfig::default())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::Acquire)
    }

    /// 获取关闭标志的原子引用，注入到各个后台循环
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.is_shutting_down)
    }

    /// 注册关闭回调
    pub async fn register_shutdown_hook<F, Fut>(&self, name: String, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let boxed_hook: ShutdownHook = Box::new(move || Box::pin(hook()));
        let mut hooks = self.shutdown_hooks.write().await;
        info!("注册关闭回调: {}", name);
        hooks.push((name, boxed_hook));
    }

    /// 执行优雅关闭
    pub async fn shutdown(&self) -> Result<()> {
        if self
            .is_shutting_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("关闭已在进行中");
            return Ok(());
        }

        info!("开始执行优雅关闭，总超时: {:?}", self.config.total_timeout);
        let start_time = std::time::Instant::now();

        let shutdown_result =
            tokio::time::timeout(self.config.total_timeout, self.execute_shutdown_hooks()).await;

        match shutdown_result {
            Ok(()) => {
                info!("优雅关闭完成，耗时: {:?}", start_time.elapsed());
                Ok(())
            }
            Err(_) => {
                error!("关闭超时 ({:?})", self.config.total_timeout);
                Err(anyhow::anyhow!("关闭超时"))
            }
        }
    }

    /// 执行所有关闭回调，单个失败不中断整体流程
    async fn execute_shutdown_hooks(&self) {
        let hooks = self.shutdown_hooks.read().await;
        if hooks.is_empty() {
            info!("没有注册的关闭回调");
            return;
        }

        info!("执行 {} 个关闭回调", hooks.len());
        for (name, hook) in hooks.iter() {
            match tokio::time::timeout(self.config.hook_timeout, hook()).await {
                Ok(Ok(())) => info!("关闭回调完成: {}", name),
                Ok(Err(e)) => error!("关闭回调失败: {}, error={:?}", name, e),
                Err(_) => error!("关闭回调超时: {} ({:?})", name, self.config.hook_timeout),
            }
        }
    }

    /// 等待关闭信号
    pub async fn wait_for_shutdown_signal() -> &'static str {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm =
                signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
            let mut sigint =
                signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");
            let mut sigquit = signal(SignalKind::quit()).expect("Failed to register SIGQUIT handler");

            tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
                _ = sigquit.recv() => "SIGQUIT",
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.expect("Failed to listen for ctrl-c");
            "CTRL+C"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_runs_hooks() {
        let manager = ShutdownManager::new(ShutdownConfig {
            total_timeout: Duration::from_secs(5),
            hook_timeout: Duration::from_secs(2),
        });

        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);
        manager
            .register_shutdown_hook("test_hook".to_string(), move || {
                let flag = Arc::clone(&flag_clone);
                async move {
                    flag.store(true, Ordering::Release);
                    Ok(())
                }
            })
            .await;

        manager.shutdown().await.unwrap();
        assert!(manager.is_shutting_down());
        assert!(flag.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_hook_failure_does_not_abort_shutdown() {
        let manager = ShutdownManager::new_default();
        manager
            .register_shutdown_hook("failing".to_string(), || async {
                anyhow::bail!("hook error")
            })
            .await;

        assert!(manager.shutdown().await.is_ok());
        assert!(manager.is_shutting_down());
    }
}
