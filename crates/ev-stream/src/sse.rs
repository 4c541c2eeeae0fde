//! SSE line decoding — buffers bytes across chunk boundaries and yields
//! the payload of every complete `data:` line.

const DATA_PREFIX: &str = "data:";

/// Incremental decoder. Splits on `\n` at the byte level so a multi-byte
/// UTF-8 sequence cut by a chunk boundary is reassembled before decoding.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the payloads of all lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(payload) = decode_line(&self.pending[start..end]) {
                payloads.push(payload);
            }
            start = end + 1;
        }
        self.pending.drain(..start);
        payloads
    }

    /// Flush a trailing line the server never terminated.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.strip_suffix('\r').unwrap_or(&line);
    let payload = data_payload(line)?.trim();
    (!payload.is_empty()).then(|| payload.to_string())
}

/// `id:`, `event:`, `retry:` and `:` comments are not payloads.
pub fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(DATA_PREFIX)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
