use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{error, warn};

use nyboard_db::BoardStore;
use nyboard_gateway::dispatcher::Dispatcher;

use crate::entries::{RankAssigner, RankPolicy};
use crate::error::BoardError;
use crate::leaderboard::Leaderboard;
use crate::messages::MessageBoard;
use crate::session::TokenKeys;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn BoardStore>,
    pub tokens: TokenKeys,
    pub dispatcher: Dispatcher,
    pub rank_policy: RankPolicy,
    pub request_timeout: Duration,
}

// Write task lifecycle, see `AppStateInner::write`.
const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const ABANDONED: u8 = 2;

impl AppStateInner {
    pub fn rank_assigner(&self) -> RankAssigner {
        RankAssigner::new(self.store.clone(), self.rank_policy)
    }

    pub fn leaderboard(&self) -> Leaderboard {
        Leaderboard::new(self.store.clone())
    }

    pub fn message_board(&self) -> MessageBoard {
        MessageBoard::new(self.store.clone())
    }

    /// Run a blocking read off the async runtime, bounded by the request
    /// timeout.
    pub async fn read<F, T>(&self, f: F) -> Result<T, BoardError>
    where
        F: FnOnce() -> Result<T, BoardError> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.request_timeout, task).await {
            Ok(joined) => joined_result(joined),
            Err(_) => {
                warn!("Store read exceeded {:?}", self.request_timeout);
                Err(BoardError::Timeout)
            }
        }
    }

    /// Run a blocking write off the async runtime.
    ///
    /// The request timeout only applies while the write is still queued for
    /// a blocking thread. A write that has started is always awaited, so a
    /// `Timeout` means nothing was written and the request can be repeated.
    pub async fn write<F, T>(&self, f: F) -> Result<T, BoardError>
    where
        F: FnOnce() -> Result<T, BoardError> + Send + 'static,
        T: Send + 'static,
    {
        let phase = Arc::new(AtomicU8::new(QUEUED));
        let task_phase = phase.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            if task_phase
                .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(BoardError::Timeout);
            }
            f()
        });

        match tokio::time::timeout(self.request_timeout, &mut task).await {
            Ok(joined) => joined_result(joined),
            Err(_) => {
                if phase
                    .compare_exchange(QUEUED, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    warn!("Store write not started within {:?}, abandoned", self.request_timeout);
                    return Err(BoardError::Timeout);
                }
                warn!(
                    "Store write still running after {:?}, waiting for it",
                    self.request_timeout
                );
                joined_result(task.await)
            }
        }
    }
}

fn joined_result<T>(joined: Result<Result<T, BoardError>, JoinError>) -> Result<T, BoardError> {
    joined.unwrap_or_else(|e| {
        error!("spawn_blocking join error: {}", e);
        Err(BoardError::RequestFailed(e.into()))
    })
}
