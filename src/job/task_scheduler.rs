use std::collections::HashMap;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::info;

pub struct TaskScheduler {
    periodic_tasks: HashMap<String, JoinHandle<()>>,
    shutdown_sender: broadcast::Sender<()>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        let (shutdown_sender, _) = broadcast::channel(16);
        Self {
            periodic_tasks: HashMap::new(),
            shutdown_sender,
        }
    }

    pub fn add_periodic_task<F, Fut>(&mut self, name: String, every: Duration, task_fn: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        if every < Duration::from_millis(100) {
            panic!("Minimum interval is 100 milliseconds");
        }

        let mut interval_timer = interval(every);
        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        task_fn().await;
                    }
                    _ = shutdown_receiver.recv() => {
                        info!("Periodic task {} is shutting down", task_name);
                        break;
                    }
                }
            }
        });
        self.periodic_tasks.insert(name, handle);
    }

    pub async fn shutdown(self) {
        // 发送关闭信号
        let _ = self.shutdown_sender.send(());

        // 等待所有任务完成
        for handle in self.periodic_tasks.into_values() {
            let _ = handle.await;
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_periodic_task_runs_and_stops() {
        let mut scheduler = TaskScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        scheduler.add_periodic_task("tick".to_string(), Duration::from_millis(100), move || {
            let count = Arc::clone(&count_clone);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        scheduler.shutdown().await;

        let observed = count.load(Ordering::SeqCst);
        assert!(observed >= 2, "expected at least 2 runs, got {}", observed);
    }
}
