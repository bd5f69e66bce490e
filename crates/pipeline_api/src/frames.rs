use pipeline_protocol::InboundFrame;
use tracing::debug;

/// Decoder for line-delimited JSON frames.
///
/// A transport message may carry one frame or several separated by newlines.
/// Lines that do not parse into a known [`InboundFrame`] are dropped; the
/// count is kept for diagnostics only.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    dropped: u64,
}

impl FrameDecoder {
    /// Decode every complete frame in `text`, in order.
    pub fn decode(&mut self, text: &str) -> Vec<InboundFrame> {
        let mut frames = Vec::new();

        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            match InboundFrame::parse(line) {
                Some(frame) => frames.push(frame),
                None => {
                    self.dropped += 1;
                    debug!(
                        dropped_total = self.dropped,
                        preview = %preview(line),
                        "dropping malformed stream frame"
                    );
                }
            }
        }

        frames
    }

    /// Decode a binary message, treating it as UTF-8 text.
    pub fn decode_bytes(&mut self, bytes: &[u8]) -> Vec<InboundFrame> {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.decode(text),
            Err(_) => {
                self.dropped += 1;
                debug!(len = bytes.len(), "dropping non-UTF-8 stream frame");
                Vec::new()
            }
        }
    }

    /// Number of malformed frames discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

fn preview(line: &str) -> &str {
    match line.char_indices().nth(80) {
        Some((index, _)) => &line[..index],
        None => line,
    }
}
