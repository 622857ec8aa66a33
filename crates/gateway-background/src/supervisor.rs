use std::sync::Arc;
use std::time::Duration;

use gateway_core::budget::BudgetCache;
use gateway_storage::Storage;
use tokio::task::JoinHandle;

use crate::alerts::{check_thresholds, recycle_closed_windows};
use crate::budget_maintainer::refresh_budgets;
use crate::log_consumer::drain_log_batch;
use crate::mail::dispatch_due_mail;
use crate::mailer::Mailer;
use crate::runner::run_periodic;

/// Spawns the five background loops named in the component design:
/// alert recycler, alert watchdog, mail dispatcher, budget maintainer,
/// and log-queue consumer. Dropping the returned handle aborts them.
pub struct BackgroundLoops {
    _handles: Vec<JoinHandle<()>>,
}

impl BackgroundLoops {
    pub fn spawn<S: Storage + 'static>(storage: Arc<S>, budget: Arc<BudgetCache>, mailer: Arc<dyn Mailer>) -> Self {
        let mut handles = Vec::new();

        let recycler_storage = storage.clone();
        handles.push(tokio::spawn(async move {
            run_periodic("alert_recycler", Duration::from_secs(60), move || {
                let storage = recycler_storage.clone();
                async move { recycle_closed_windows(&storage).await }
            })
            .await
        }));

        let watchdog_storage = storage.clone();
        handles.push(tokio::spawn(async move {
            run_periodic("alert_watchdog", Duration::from_secs(10), move || {
                let storage = watchdog_storage.clone();
                async move { check_thresholds(&storage).await }
            })
            .await
        }));

        let mail_storage = storage.clone();
        let mail_mailer = mailer.clone();
        handles.push(tokio::spawn(async move {
            run_periodic("mail_dispatcher", Duration::from_secs(10), move || {
                let storage = mail_storage.clone();
                let mailer = mail_mailer.clone();
                async move { dispatch_due_mail(&storage, &mailer).await }
            })
            .await
        }));

        let budget_storage = storage.clone();
        let budget_cache = budget.clone();
        handles.push(tokio::spawn(async move {
            run_periodic("budget_maintainer", Duration::from_secs(10), move || {
                let storage = budget_storage.clone();
                let budget = budget_cache.clone();
                async move { refresh_budgets(&storage, &budget).await }
            })
            .await
        }));

        let log_storage = storage.clone();
        handles.push(tokio::spawn(async move {
            run_periodic("log_queue_consumer", Duration::from_secs(2), move || {
                let storage = log_storage.clone();
                async move { drain_log_batch(&storage).await }
            })
            .await
        }));

        Self { _handles: handles }
    }
}

impl Drop for BackgroundLoops {
    fn drop(&mut self) {
        for handle in &self._handles {
            handle.abort();
        }
    }
}
