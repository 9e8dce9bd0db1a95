/// Marker that starts every frame in the event stream.
pub const FRAME_DELIMITER: &str = "data: ";

/// Splits the SSE-like text stream into frame payloads.
///
/// The piece after the last delimiter is never returned by [`push`](Self::push):
/// it may still be growing. It is released by a later delimiter or by
/// [`finish`](Self::finish).
#[derive(Debug, Default, Clone)]
pub struct FrameSplitter {
    raw: String,
    saw_delimiter: bool,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text and returns the payloads that are now complete.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.raw.push_str(text);
        if !self.raw.contains(FRAME_DELIMITER) {
            return Vec::new();
        }
        // Text before the very first delimiter is not a frame.
        let skip_preamble = !self.saw_delimiter;
        self.saw_delimiter = true;

        // The last piece stays buffered even when empty: a trailing delimiter
        // means the next frame has started but carries no bytes yet.
        let mut pieces: Vec<&str> = self.raw.split(FRAME_DELIMITER).collect();
        let remainder = pieces.pop().unwrap_or_default().to_string();
        let frames = pieces
            .into_iter()
            .skip(usize::from(skip_preamble))
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        self.raw = remainder;
        frames
    }

    /// Whether a delimiter has been seen since the splitter was created.
    pub fn saw_delimiter(&self) -> bool {
        self.saw_delimiter
    }

    /// Buffered text not yet returned as a frame.
    pub fn pending(&self) -> &str {
        &self.raw
    }

    /// Drains the buffered remainder at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.raw);
        let trimmed = rest.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
