//! Natural language insights about a day of usage. [AnalysisService] writes one prompt per
//! interface language from the day's records, asks a [client::CompletionClient] for both at once
//! and publishes the outcome through a watch channel.

pub mod client;
pub mod prompt;

use std::sync::Arc;

use chrono::NaiveDate;
use client::CompletionClient;
use prompt::build_prompt;
use tokio::sync::watch;
use tracing::{error, info};

use crate::{config::AppLanguage, daemon::storage::entities::ActivityRecord};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisState {
    pub is_loading: bool,
    pub english: Option<String>,
    pub chinese: Option<String>,
    pub error: Option<String>,
}

impl AnalysisState {
    pub fn result(&self, language: AppLanguage) -> Option<&str> {
        match language {
            AppLanguage::English => self.english.as_deref(),
            AppLanguage::Chinese => self.chinese.as_deref(),
        }
    }
}

pub struct AnalysisService {
    client: Arc<dyn CompletionClient>,
    state: watch::Sender<AnalysisState>,
}

impl AnalysisService {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        let (state, _) = watch::channel(AnalysisState::default());
        Self { client, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AnalysisState {
        self.state.borrow().clone()
    }

    /// Requests both language variants for `day`. Does nothing while a previous request is still
    /// running. When either variant fails the previous results stay and only the error changes,
    /// the English failure taking precedence.
    pub async fn analyze(&self, records: &[ActivityRecord], day: NaiveDate) -> AnalysisState {
        let started = self.state.send_if_modified(|state| {
            if state.is_loading {
                return false;
            }
            state.is_loading = true;
            state.error = None;
            true
        });
        if !started {
            info!("Analysis is already running, ignoring request");
            return self.state();
        }

        let english = build_prompt(records, day, AppLanguage::English);
        let chinese = build_prompt(records, day, AppLanguage::Chinese);
        let (english, chinese) = tokio::join!(
            self.client.complete(&english),
            self.client.complete(&chinese)
        );

        self.state.send_modify(|state| {
            state.is_loading = false;
            match (english, chinese) {
                (Err(e), _) => {
                    error!("English analysis failed {e:?}");
                    state.error = Some(format!("English analysis failed: {e}"));
                }
                (_, Err(e)) => {
                    error!("Chinese analysis failed {e:?}");
                    state.error = Some(format!("Chinese analysis failed: {e}"));
                }
                (Ok(english), Ok(chinese)) => {
                    state.english = Some(english);
                    state.chinese = Some(chinese);
                }
            }
        });
        self.state()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::sync::Semaphore;

    use crate::config::AppLanguage;

    use super::{
        client::{CompletionClient, CompletionError, MockCompletionClient},
        AnalysisService,
    };

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 5).unwrap()
    }

    fn is_chinese(prompt: &str) -> bool {
        prompt.starts_with("请分析")
    }

    #[tokio::test]
    async fn stores_both_languages() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .times(2)
            .returning(|prompt| Ok(if is_chinese(prompt) { "中文" } else { "English" }.into()));
        let service = AnalysisService::new(Arc::new(client));
        let mut updates = service.subscribe();

        let state = service.analyze(&[], day()).await;
        assert!(!state.is_loading);
        assert_eq!(state.result(AppLanguage::English), Some("English"));
        assert_eq!(state.result(AppLanguage::Chinese), Some("中文"));
        assert_eq!(state.error, None);
        assert!(updates.has_changed().unwrap());
        assert_eq!(*updates.borrow_and_update(), state);
    }

    #[tokio::test]
    async fn english_error_wins_and_results_are_kept() {
        let mut client = MockCompletionClient::new();
        let mut round = 0;
        client.expect_complete().times(4).returning(move |prompt| {
            round += 1;
            match (round, is_chinese(prompt)) {
                (1 | 2, true) => Ok("旧".into()),
                (1 | 2, false) => Ok("old".into()),
                (_, true) => Err(CompletionError::NoChoices),
                (_, false) => Err(CompletionError::Status {
                    status: 500,
                    message: "boom".into(),
                }),
            }
        });
        let service = AnalysisService::new(Arc::new(client));

        service.analyze(&[], day()).await;
        let state = service.analyze(&[], day()).await;

        assert_eq!(state.english.as_deref(), Some("old"));
        assert_eq!(state.chinese.as_deref(), Some("旧"));
        assert_eq!(
            state.error.as_deref(),
            Some("English analysis failed: request rejected with status 500: boom")
        );
    }

    #[tokio::test]
    async fn chinese_error_is_reported() {
        let mut client = MockCompletionClient::new();
        client.expect_complete().returning(|prompt| {
            if is_chinese(prompt) {
                Err(CompletionError::NoChoices)
            } else {
                Ok("fine".into())
            }
        });
        let service = AnalysisService::new(Arc::new(client));

        let state = service.analyze(&[], day()).await;
        assert_eq!(state.english, None);
        assert_eq!(
            state.error.as_deref(),
            Some("Chinese analysis failed: no analysis result received")
        );
    }

    struct GatedClient {
        gate: Semaphore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for GatedClient {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate
                .acquire()
                .await
                .map_err(|e| CompletionError::Network(e.to_string()))?
                .forget();
            Ok("done".into())
        }
    }

    #[tokio::test]
    async fn requests_while_loading_are_ignored() {
        let client = Arc::new(GatedClient {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
        });
        let service = AnalysisService::new(client.clone());

        let (first, second) = tokio::join!(service.analyze(&[], day()), async {
            tokio::task::yield_now().await;
            let state = service.analyze(&[], day()).await;
            client.gate.add_permits(2);
            state
        });

        assert!(second.is_loading);
        assert!(!first.is_loading);
        assert_eq!(first.english.as_deref(), Some("done"));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }
}
