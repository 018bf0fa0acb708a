//! Newline-delimited framing for streamed response bodies.

/// Accumulates body chunks and hands back complete, non-empty lines.
///
/// Bytes are buffered raw and decoded one line at a time, so a multi-byte
/// character split across chunks survives intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

fn decode_line(bytes: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(bytes);
    let line = line.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(line) = decode_line(&line[..newline_pos]) {
                lines.push(line);
            }
        }
        lines
    }

    /// Whatever trailing text never saw a newline.
    pub fn finish(self) -> Option<String> {
        decode_line(&self.buffer)
    }
}
