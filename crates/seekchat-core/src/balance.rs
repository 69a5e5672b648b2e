//! Account balance polling.
//!
//! The balance is fetched whenever the credential changes and every
//! [`POLL_INTERVAL`] while one is set. Failures are logged and simply clear the
//! display; nothing is surfaced to the user.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ai::{BalanceQuery, BalanceResponse};
use crate::settings::SettingsStore;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Where the balance display links to.
pub const USAGE_URL: &str = "https://platform.deepseek.com/usage";

/// The balance entry for the configured currency.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSummary {
    pub currency: String,
    pub total: f64,
    pub granted: f64,
    pub topped_up: f64,
}

impl BalanceSummary {
    fn money(&self, amount: f64) -> String {
        match self.currency.as_str() {
            "CNY" => format!("¥{:.2}", amount),
            "USD" => format!("${:.2}", amount),
            other => format!("{:.2} {}", amount, other),
        }
    }

    pub fn total_label(&self) -> String {
        self.money(self.total)
    }

    pub fn granted_label(&self) -> String {
        self.money(self.granted)
    }

    pub fn topped_up_label(&self) -> String {
        self.money(self.topped_up)
    }
}

/// `None` when the account is unavailable or has no entry for `currency`.
pub fn summarize(response: &BalanceResponse, currency: &str) -> Option<BalanceSummary> {
    if !response.is_available {
        return None;
    }
    response
        .balance_infos
        .iter()
        .find(|info| info.currency == currency)
        .map(|info| BalanceSummary {
            currency: info.currency.clone(),
            total: info.total_balance,
            granted: info.granted_balance,
            topped_up: info.topped_up_balance,
        })
}

/// Background poller bound to the credential in a [`SettingsStore`].
/// Dropping it stops polling.
pub struct BalanceMonitor {
    rx: watch::Receiver<Option<BalanceSummary>>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl BalanceMonitor {
    pub fn spawn(query: Arc<dyn BalanceQuery>, settings: SettingsStore) -> Self {
        let (tx, rx) = watch::channel(None);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(supervise(query, settings, Arc::new(tx), shutdown.clone()));
        Self { rx, shutdown, task }
    }

    pub fn current(&self) -> Option<BalanceSummary> {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<BalanceSummary>> {
        self.rx.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for BalanceMonitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Restarts the poll loop each time the credential changes.
async fn supervise(
    query: Arc<dyn BalanceQuery>,
    settings: SettingsStore,
    tx: Arc<watch::Sender<Option<BalanceSummary>>>,
    shutdown: CancellationToken,
) {
    let mut settings_rx = settings.subscribe();
    let mut credential = settings.credential();

    loop {
        let session = shutdown.child_token();
        match &credential {
            Some(key) => {
                tokio::spawn(poll(
                    Arc::clone(&query),
                    settings.clone(),
                    key.clone(),
                    Arc::clone(&tx),
                    session.clone(),
                ));
            }
            None => {
                tx.send_replace(None);
            }
        }

        let next = tokio::select! {
            _ = shutdown.cancelled() => None,
            next = next_credential(&mut settings_rx, &settings, &credential) => next,
        };
        session.cancel();

        match next {
            Some(changed) => {
                tracing::debug!(present = changed.is_some(), "credential changed, restarting balance poll");
                credential = changed;
            }
            None => break,
        }
    }
    tracing::debug!("balance monitor stopped");
}

/// Resolves with the new credential once it differs from `current`, or
/// `None` if the settings store went away.
async fn next_credential(
    rx: &mut watch::Receiver<u64>,
    settings: &SettingsStore,
    current: &Option<String>,
) -> Option<Option<String>> {
    loop {
        if rx.changed().await.is_err() {
            return None;
        }
        let credential = settings.credential();
        if credential != *current {
            return Some(credential);
        }
    }
}

async fn poll(
    query: Arc<dyn BalanceQuery>,
    settings: SettingsStore,
    api_key: String,
    tx: Arc<watch::Sender<Option<BalanceSummary>>>,
    session: CancellationToken,
) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = session.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let current = settings.get();
        let summary = tokio::select! {
            _ = session.cancelled() => return,
            result = query.balance(&current, &api_key) => match result {
                Ok(response) => summarize(&response, &current.currency),
                Err(e) => {
                    tracing::warn!(error = %e, "balance query failed");
                    None
                }
            },
        };
        tx.send_replace(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::BalanceInfo;
    use crate::config::Settings;
    use crate::settings::SettingsPatch;
    use crate::testing::FakeBalance;

    fn response(available: bool, currency: &str) -> BalanceResponse {
        BalanceResponse {
            is_available: available,
            balance_infos: vec![BalanceInfo {
                currency: currency.into(),
                total_balance: 110.0,
                granted_balance: 10.0,
                topped_up_balance: 100.0,
            }],
        }
    }

    fn keyed(key: Option<&str>) -> SettingsStore {
        SettingsStore::new(Settings {
            api_key: key.map(str::to_string),
            ..Settings::default()
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[test]
    fn test_summarize_matching_currency() {
        let summary = summarize(&response(true, "CNY"), "CNY").unwrap();
        assert_eq!(summary.total_label(), "¥110.00");
        assert_eq!(summary.granted_label(), "¥10.00");
        assert_eq!(summary.topped_up_label(), "¥100.00");
    }

    #[test]
    fn test_summarize_unavailable_or_missing_currency() {
        assert_eq!(summarize(&response(false, "CNY"), "CNY"), None);
        assert_eq!(summarize(&response(true, "USD"), "CNY"), None);
        assert_eq!(summarize(&response(true, "cny"), "CNY"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_immediately_and_every_interval() {
        let fake = Arc::new(FakeBalance::responding(Ok(response(true, "CNY"))));
        let monitor = BalanceMonitor::spawn(fake.clone(), keyed(Some("sk-1")));

        settle().await;
        assert_eq!(fake.calls(), 1);
        assert_eq!(monitor.current().map(|s| s.total), Some(110.0));

        tokio::time::sleep(POLL_INTERVAL).await;
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_credential_means_no_calls() {
        let fake = Arc::new(FakeBalance::responding(Ok(response(true, "CNY"))));
        let monitor = BalanceMonitor::spawn(fake.clone(), keyed(None));

        tokio::time::sleep(POLL_INTERVAL * 2).await;
        assert_eq!(fake.calls(), 0);
        assert_eq!(monitor.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_change_restarts_polling() {
        let fake = Arc::new(FakeBalance::responding(Ok(response(true, "CNY"))));
        let settings = keyed(None);
        let monitor = BalanceMonitor::spawn(fake.clone(), settings.clone());
        settle().await;

        settings
            .patch(SettingsPatch {
                api_key: Some(Some("sk-new".into())),
                ..SettingsPatch::default()
            })
            .unwrap();
        settle().await;
        assert_eq!(fake.keys(), vec!["sk-new".to_string()]);
        assert!(monitor.current().is_some());

        settings
            .patch(SettingsPatch {
                api_key: Some(None),
                ..SettingsPatch::default()
            })
            .unwrap();
        settle().await;
        assert_eq!(monitor.current(), None);

        tokio::time::sleep(POLL_INTERVAL * 2).await;
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_settings_change_does_not_refetch() {
        let fake = Arc::new(FakeBalance::responding(Ok(response(true, "CNY"))));
        let settings = keyed(Some("sk-1"));
        let _monitor = BalanceMonitor::spawn(fake.clone(), settings.clone());
        settle().await;

        settings
            .patch(SettingsPatch {
                model: Some("deepseek-reasoner".into()),
                ..SettingsPatch::default()
            })
            .unwrap();
        settle().await;
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_clear_silently() {
        let fake = Arc::new(FakeBalance::responding(Ok(response(true, "CNY"))));
        let monitor = BalanceMonitor::spawn(fake.clone(), keyed(Some("sk-1")));
        settle().await;
        assert!(monitor.current().is_some());

        fake.set_result(Err(None));
        tokio::time::sleep(POLL_INTERVAL).await;
        assert_eq!(monitor.current(), None);

        fake.set_result(Ok(response(false, "CNY")));
        tokio::time::sleep(POLL_INTERVAL).await;
        assert_eq!(monitor.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_polling() {
        let fake = Arc::new(FakeBalance::responding(Ok(response(true, "CNY"))));
        let monitor = BalanceMonitor::spawn(fake.clone(), keyed(Some("sk-1")));
        settle().await;

        monitor.shutdown();
        settle().await;
        assert!(monitor.is_finished());

        tokio::time::sleep(POLL_INTERVAL * 3).await;
        assert_eq!(fake.calls(), 1);
    }
}
