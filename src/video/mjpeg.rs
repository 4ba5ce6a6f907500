const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const MAX_PENDING_BYTES: usize = 16 * 1024 * 1024;

/// Splits a concatenated MJPEG byte stream (as written by `ffmpeg -f image2pipe`)
/// into individual JPEG images.
#[derive(Debug, Default)]
pub struct MjpegSplitter {
    pending: Vec<u8>,
}

impl MjpegSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes read from the pipe; returns every image completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);
        let mut frames = Vec::new();
        loop {
            let Some(start) = find(&self.pending, &SOI, 0) else {
                // Keep a lone trailing 0xFF: it may be the first half of the next SOI.
                let keep_last = self.pending.last() == Some(&0xFF);
                self.pending.clear();
                if keep_last {
                    self.pending.push(0xFF);
                }
                break;
            };
            if start > 0 {
                self.pending.drain(..start);
            }
            let Some(end) = find(&self.pending, &EOI, SOI.len()) else {
                break;
            };
            let frame: Vec<u8> = self.pending.drain(..end + EOI.len()).collect();
            frames.push(frame);
        }
        if self.pending.len() > MAX_PENDING_BYTES {
            tracing::warn!(bytes = self.pending.len(), "discarding oversized partial frame");
            self.pending.clear();
        }
        frames
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(body: &[u8]) -> Vec<u8> {
        let mut out = SOI.to_vec();
        out.extend_from_slice(body);
        out.extend_from_slice(&EOI);
        out
    }

    #[test]
    fn splits_back_to_back_frames() {
        let mut stream = jpeg(b"one");
        stream.extend(jpeg(b"two"));
        let mut splitter = MjpegSplitter::new();
        assert_eq!(splitter.push(&stream), vec![jpeg(b"one"), jpeg(b"two")]);
    }

    #[test]
    fn joins_frames_split_across_reads() {
        let frame = jpeg(b"payload");
        let mut splitter = MjpegSplitter::new();
        assert!(splitter.push(&frame[..1]).is_empty());
        assert!(splitter.push(&frame[1..5]).is_empty());
        assert_eq!(splitter.push(&frame[5..]), vec![frame]);
    }

    #[test]
    fn skips_garbage_before_start_marker() {
        let mut stream = b"noise".to_vec();
        stream.extend(jpeg(b"x"));
        let mut splitter = MjpegSplitter::new();
        assert_eq!(splitter.push(&stream), vec![jpeg(b"x")]);
    }
}
