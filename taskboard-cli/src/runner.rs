//! Runs board requests against the remote store and feeds outcomes back.
//!
//! Each request becomes its own tokio task; several can be in flight and
//! they complete in whatever order the network decides. Outcomes are queued
//! on a channel and applied on the caller's thread, one at a time, so the
//! board itself is never touched concurrently.

use std::sync::Arc;
use taskboard_core::{Board, Outcome, Request, TaskCache, TaskRemote};
use tokio::sync::mpsc;

pub struct Runner<R: TaskRemote, C: TaskCache> {
    board: Board<C>,
    remote: Arc<R>,
    tx: mpsc::UnboundedSender<Outcome>,
    rx: mpsc::UnboundedReceiver<Outcome>,
    in_flight: usize,
}

impl<R: TaskRemote, C: TaskCache> Runner<R, C> {
    pub fn new(board: Board<C>, remote: Arc<R>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            board,
            remote,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn board(&self) -> &Board<C> {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board<C> {
        &mut self.board
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Kick off the initial fetch (cached tasks are already on the board).
    pub fn start(&mut self) {
        let req = self.board.initialize();
        self.submit(Some(req));
    }

    /// Send a request to the remote in the background. `None` (a rejected
    /// or no-op intent) is ignored; returns whether anything was sent.
    pub fn submit(&mut self, request: Option<Request>) -> bool {
        let Some(request) = request else {
            return false;
        };
        tracing::debug!(?request, "submitting");
        self.in_flight += 1;

        let remote = Arc::clone(&self.remote);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = request.execute(remote.as_ref()).await;
            // receiver gone means the board was torn down; nothing to update
            let _ = tx.send(outcome);
        });
        true
    }

    /// Apply every outcome that has already arrived. Never blocks.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.rx.try_recv() {
            self.apply(outcome);
            applied += 1;
        }
        applied
    }

    /// Wait until every submitted request has come back and been applied.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.rx.recv().await {
                Some(outcome) => self.apply(outcome),
                None => break,
            }
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.board.apply(outcome);
    }
}
