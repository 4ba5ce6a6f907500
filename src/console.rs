//! Line-oriented console: stdin lines in, conversation transcript out.

use crate::lock_or_recover;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::thread;

const PROMPT: &str = "you> ";

/// Read stdin on a detached thread and deliver each line on the returned channel.
///
/// The channel disconnects at end of input. The thread is never joined; a
/// blocking stdin read cannot be interrupted.
pub fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("voxlink-console".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            forward_lines(stdin.lock(), &tx);
        })?;
    Ok(rx)
}

fn forward_lines<R: BufRead>(input: R, tx: &Sender<String>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(%err, "console read failed");
                break;
            }
        };
        if tx.send(line).is_err() {
            break; // session is gone
        }
    }
}

struct TranscriptState {
    out: Box<dyn Write + Send>,
    model_line_open: bool,
    prompt_shown: bool,
}

/// Shared writer for the conversation transcript.
///
/// Model text streams out unbuffered as fragments arrive. The `you> ` prompt
/// is printed before each console read and again after each model turn.
#[derive(Clone)]
pub struct Transcript {
    state: Arc<Mutex<TranscriptState>>,
}

impl Transcript {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            state: Arc::new(Mutex::new(TranscriptState {
                out,
                model_line_open: false,
                prompt_shown: false,
            })),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn prompt(&self) {
        let mut state = lock_or_recover(&self.state, "transcript");
        if state.prompt_shown {
            return;
        }
        if state.model_line_open {
            let _ = state.out.write_all(b"\n");
            state.model_line_open = false;
        }
        let _ = state.out.write_all(PROMPT.as_bytes());
        let _ = state.out.flush();
        state.prompt_shown = true;
    }

    /// Mark the prompt as answered so the next `prompt` prints a fresh one.
    pub fn line_entered(&self) {
        lock_or_recover(&self.state, "transcript").prompt_shown = false;
    }

    pub fn model_text(&self, text: &str) {
        let mut state = lock_or_recover(&self.state, "transcript");
        if state.prompt_shown && !state.model_line_open {
            let _ = state.out.write_all(b"\n");
        }
        state.prompt_shown = false;
        state.model_line_open = true;
        let _ = state.out.write_all(text.as_bytes());
        let _ = state.out.flush();
    }

    pub fn end_turn(&self) {
        let open = lock_or_recover(&self.state, "transcript").model_line_open;
        if open {
            self.prompt();
        }
    }

    /// Terminate any open line before the process prints anything else.
    pub fn finish(&self) {
        let mut state = lock_or_recover(&self.state, "transcript");
        if state.model_line_open || state.prompt_shown {
            let _ = state.out.write_all(b"\n");
        }
        state.model_line_open = false;
        state.prompt_shown = false;
        let _ = state.out.flush();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    /// In-memory writer whose contents stay readable after the transcript takes it.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(pub(crate) Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn forwarded_lines_arrive_then_channel_disconnects() {
        let (tx, rx) = unbounded();
        let input = Cursor::new(b"hello\nworld\n".to_vec());
        let reader = thread::spawn(move || forward_lines(input, &tx));
        let timeout = Duration::from_secs(2);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), "hello");
        assert_eq!(rx.recv_timeout(timeout).unwrap(), "world");
        assert!(rx.recv_timeout(timeout).is_err());
        reader.join().unwrap();
    }

    #[test]
    fn forwarding_stops_once_the_session_is_gone() {
        let (tx, rx) = unbounded::<String>();
        drop(rx);
        forward_lines(Cursor::new(b"one\ntwo\n".to_vec()), &tx);
    }

    #[test]
    fn model_turn_streams_and_reprompts() {
        let buffer = SharedBuffer::default();
        let transcript = Transcript::new(Box::new(buffer.clone()));
        transcript.prompt();
        transcript.line_entered();
        transcript.model_text("Hel");
        transcript.model_text("lo");
        transcript.end_turn();
        transcript.prompt();
        assert_eq!(buffer.contents(), "you> Hello\nyou> ");
    }

    #[test]
    fn model_text_breaks_an_unanswered_prompt() {
        let buffer = SharedBuffer::default();
        let transcript = Transcript::new(Box::new(buffer.clone()));
        transcript.prompt();
        transcript.model_text("Hi");
        transcript.end_turn();
        transcript.finish();
        assert_eq!(buffer.contents(), "you> \nHi\nyou> \n");
    }

    #[test]
    fn boundary_without_text_prints_nothing() {
        let buffer = SharedBuffer::default();
        let transcript = Transcript::new(Box::new(buffer.clone()));
        transcript.end_turn();
        assert_eq!(buffer.contents(), "");
    }
}
