//! Verification status polling for the pending screen.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::OnboardingApi;

use super::model::OnboardingState;

/// Poll the profile endpoint every `interval` and forward each observed
/// state.
///
/// Stops once the receiver is dropped or a terminal state (verified or
/// rejected) has been sent. Failed polls are logged and skipped.
pub fn spawn_status_poller(
    api: Arc<dyn OnboardingApi>,
    interval: Duration,
) -> (JoinHandle<()>, mpsc::Receiver<OnboardingState>) {
    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tx.closed() => {
                    tracing::debug!("Status poller stopped: receiver dropped");
                    break;
                }
            }

            let state = match api.onboarding_status().await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("Onboarding status poll failed: {}", e);
                    continue;
                }
            };

            if tx.send(state).await.is_err() {
                break;
            }
            if state.is_terminal() {
                tracing::info!(status = %state, "Onboarding reached a final status");
                break;
            }
        }
    });
    (handle, rx)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::api::types::*;
    use crate::error::ApiError;
    use crate::onboarding::model::{FormationDocType, LocalFile};

    /// Replays a fixed sequence of statuses, then repeats the last one.
    struct ScriptedStatus {
        script: Mutex<Vec<Result<OnboardingState, ()>>>,
        polls: AtomicUsize,
    }

    impl ScriptedStatus {
        fn new(script: Vec<Result<OnboardingState, ()>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                polls: AtomicUsize::new(0),
            })
        }
    }

    fn unused() -> ApiError {
        ApiError::InvalidRequest("not used by the poller".into())
    }

    #[async_trait]
    impl OnboardingApi for ScriptedStatus {
        async fn current_onboarding(&self) -> SessionLookup {
            SessionLookup::NoSession
        }

        async fn save_draft(&self, _: &DraftRequest) -> Result<DraftResponse, ApiError> {
            Err(unused())
        }

        async fn reset_onboarding(&self) -> Result<(), ApiError> {
            Err(unused())
        }

        async fn upload_id_document(&self, _: &LocalFile) -> Result<UploadResponse, ApiError> {
            Err(unused())
        }

        async fn upload_formation_document(
            &self,
            _: &LocalFile,
            _: FormationDocType,
        ) -> Result<UploadResponse, ApiError> {
            Err(unused())
        }

        async fn complete_onboarding(
            &self,
            _: &CompletePayload,
            _: Option<&LocalFile>,
        ) -> Result<CompleteResponse, ApiError> {
            Err(unused())
        }

        async fn onboarding_status(&self) -> Result<OnboardingState, ApiError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0]
            };
            next.map_err(|_| ApiError::RequestFailed {
                endpoint: "/api/profile/details".into(),
                reason: "connection reset".into(),
            })
        }
    }

    #[tokio::test]
    async fn stops_after_terminal_state() {
        let api = ScriptedStatus::new(vec![
            Ok(OnboardingState::PendingReview),
            Err(()),
            Ok(OnboardingState::Verified),
        ]);
        let (handle, mut rx) = spawn_status_poller(api.clone(), Duration::from_millis(5));

        assert_eq!(rx.recv().await, Some(OnboardingState::PendingReview));
        assert_eq!(rx.recv().await, Some(OnboardingState::Verified));
        assert_eq!(rx.recv().await, None);

        handle.await.unwrap();
        assert_eq!(api.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_when_receiver_dropped() {
        let api = ScriptedStatus::new(vec![Ok(OnboardingState::PendingCall)]);
        let (handle, mut rx) = spawn_status_poller(api, Duration::from_millis(5));

        assert_eq!(rx.recv().await, Some(OnboardingState::PendingCall));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("poller should stop")
            .unwrap();
    }
}
