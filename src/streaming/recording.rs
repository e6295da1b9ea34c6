//! In-memory state for one in-progress Response Resumer recording
//! (§4.4.3): the open → closing → closed state machine, offsets, and the
//! reader/writer reference counts that gate spool deletion.

use std::{
    path::PathBuf,
    sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering},
};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::RecordingState;

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Tracks one recording's lifecycle. Shared between the writer (`RecordHandle`)
/// and any number of readers (`ReplayStream`) via `Arc`.
pub struct Recording {
    pub conversation_id: Uuid,
    pub spool_path: PathBuf,
    state: AtomicU8,
    last_offset: AtomicU64,
    final_offset: AtomicU64,
    cancel_requested: AtomicBool,
    reader_count: AtomicI64,
    writer_count: AtomicI64,
    /// Signalled whenever `last_offset` advances or the state changes, so
    /// readers blocked waiting for more bytes wake up.
    pub notify: Notify,
    /// Cooperative cancellation signal for the writer side; the shell
    /// owning the inbound stream selects on this to stop producing tokens.
    pub cancel_token: CancellationToken,
}

impl Recording {
    pub fn new(conversation_id: Uuid, spool_path: PathBuf) -> Self {
        Self {
            conversation_id,
            spool_path,
            state: AtomicU8::new(STATE_OPEN),
            last_offset: AtomicU64::new(0),
            final_offset: AtomicU64::new(0),
            cancel_requested: AtomicBool::new(false),
            reader_count: AtomicI64::new(0),
            writer_count: AtomicI64::new(1),
            notify: Notify::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> RecordingState {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => RecordingState::Open,
            STATE_CLOSING => RecordingState::Closing,
            _ => RecordingState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_OPEN
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_CLOSED
    }

    pub fn last_offset(&self) -> u64 {
        self.last_offset.load(Ordering::SeqCst)
    }

    pub fn final_offset(&self) -> u64 {
        self.final_offset.load(Ordering::SeqCst)
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
        self.cancel_token.cancel();
    }

    /// Appends `len` bytes to the tracked offset and wakes waiting readers.
    /// The actual file write happens in `RecordHandle`; this only updates
    /// the shared counter the replay side reads.
    pub fn advance(&self, len: u64) {
        self.last_offset.fetch_add(len, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Moves `open -> closing`, freezing `final_offset` at the current
    /// `last_offset` (§4.4.3). A no-op if already past `open`.
    pub fn begin_closing(&self) {
        if self
            .state
            .compare_exchange(STATE_OPEN, STATE_CLOSING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.final_offset.store(self.last_offset(), Ordering::SeqCst);
            self.notify.notify_waiters();
        }
    }

    /// Moves `closing -> closed` once both reference counts reach zero.
    /// Returns whether the transition happened on this call.
    pub fn try_close(&self) -> bool {
        if self.state.load(Ordering::SeqCst) != STATE_CLOSING {
            return false;
        }
        if self.reader_count.load(Ordering::SeqCst) != 0 || self.writer_count.load(Ordering::SeqCst) != 0 {
            return false;
        }
        let closed = self
            .state
            .compare_exchange(STATE_CLOSING, STATE_CLOSED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if closed {
            self.notify.notify_waiters();
        }
        closed
    }

    pub fn add_reader(&self) {
        self.reader_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Removes a reader and attempts the `closing -> closed` transition.
    pub fn remove_reader(&self) {
        self.reader_count.fetch_sub(1, Ordering::SeqCst);
        self.try_close();
        self.notify.notify_waiters();
    }

    pub fn remove_writer(&self) {
        self.writer_count.fetch_sub(1, Ordering::SeqCst);
        self.try_close();
        self.notify.notify_waiters();
    }

    pub fn reader_count(&self) -> i64 {
        self.reader_count.load(Ordering::SeqCst)
    }

    pub fn writer_count(&self) -> i64 {
        self.writer_count.load(Ordering::SeqCst)
    }
}
