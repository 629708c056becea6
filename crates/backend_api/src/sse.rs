use serde_json::Value;

/// Incremental decoder for newline-delimited `data: <json>` event streams.
///
/// Feeding is chunk-boundary agnostic: partial trailing lines stay buffered
/// until the closing newline arrives. A line that fails to parse is logged
/// and skipped; one malformed frame never aborts the stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    /// Feed arbitrary bytes into the decoder and drain complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Value> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut frames = Vec::new();

        while let Some(split) = self.buffer.find('\n') {
            let line = self.buffer[..split].to_string();
            self.buffer.drain(0..=split);

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
                tracing::debug!(line, "skipping non-data stream line");
                continue;
            };
            if payload.is_empty() || payload == "[DONE]" {
                continue;
            }

            match serde_json::from_str::<Value>(payload) {
                Ok(value) => frames.push(value),
                Err(error) => {
                    tracing::warn!(error = %error, "skipping malformed stream frame");
                }
            }
        }

        frames
    }

    /// Decode a complete stream payload string in one shot.
    pub fn parse_lines(input: &str) -> Vec<Value> {
        let mut decoder = Self::default();
        decoder.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}
