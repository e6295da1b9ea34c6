//! Replay stream: reads a recording's spool file from offset zero up to
//! whatever has been written so far, then blocks on the recording's
//! notifier for more bytes until the recording closes (§4.4.3, §4.4.4).

use std::{io, sync::Arc};

use futures_util::Stream;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::recording::Recording;

const READ_CHUNK: usize = 64 * 1024;

struct ReplayState {
    recording: Arc<Recording>,
    file: Option<tokio::fs::File>,
    offset: u64,
    done: bool,
}

impl Drop for ReplayState {
    fn drop(&mut self) {
        self.recording.remove_reader();
    }
}

/// A stream of spool chunks for one reader of one recording. Dropping it
/// (whether exhausted or abandoned mid-read) releases the reader count
/// the recording needs to reach `closed`.
pub fn replay_stream(recording: Arc<Recording>) -> impl Stream<Item = io::Result<Vec<u8>>> {
    recording.add_reader();
    let state = ReplayState {
        recording,
        file: None,
        offset: 0,
        done: false,
    };
    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                return None;
            }

            let available = st.recording.last_offset();
            if st.offset < available {
                if st.file.is_none() {
                    match tokio::fs::File::open(&st.recording.spool_path).await {
                        Ok(f) => st.file = Some(f),
                        Err(e) => {
                            st.done = true;
                            return Some((Err(e), st));
                        }
                    }
                }
                let file = st.file.as_mut().expect("opened above");
                if let Err(e) = file.seek(io::SeekFrom::Start(st.offset)).await {
                    st.done = true;
                    return Some((Err(e), st));
                }

                let to_read = (available - st.offset).min(READ_CHUNK as u64) as usize;
                let mut buf = vec![0u8; to_read];
                match file.read_exact(&mut buf).await {
                    Ok(()) => {
                        st.offset += to_read as u64;
                        return Some((Ok(buf), st));
                    }
                    Err(e) => {
                        st.done = true;
                        return Some((Err(e), st));
                    }
                }
            }

            if st.recording.is_closed() && st.offset >= st.recording.final_offset() {
                st.done = true;
                return None;
            }

            st.recording.notify.notified().await;
        }
    })
}
