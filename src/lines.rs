/// Reassembles lines from arbitrarily split byte chunks.
///
/// Pipes deliver output in chunks that need not end on a line boundary;
/// diagnostics are line oriented, so chunks are buffered here and only
/// complete lines are handed out. A trailing `\r` is dropped with the
/// `\n`. Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Append `chunk` and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(newline) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + newline;
            lines.push(decode(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Whether a partial line is buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take the unterminated tail, if any. Called once the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode(&self.pending);
        self.pending.clear();
        Some(line)
    }
}

fn decode(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
