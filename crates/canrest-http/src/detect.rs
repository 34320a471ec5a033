const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Incremental detector for the end of a request header.
///
/// The buffer is only ever borrowed, checking never changes its length. Consecutive checks
/// resume where the previous one stopped, so the buffer given must only grow between calls.
#[derive(Debug, Default)]
pub struct HeaderDetector {
    scanned: usize,
}

impl HeaderDetector {
    /// Find the header terminator, returning the header length including it.
    pub fn check(&mut self, buffer: &[u8]) -> Option<usize> {
        // A terminator can straddle the previous scan boundary
        let start = self
            .scanned
            .saturating_sub(TERMINATOR.len() - 1)
            .min(buffer.len());
        self.scanned = buffer.len();

        find_terminator(&buffer[start..]).map(|end| start + end)
    }
}

/// Find the end of the first `\r\n\r\n` in `data`.
pub(crate) fn find_terminator(data: &[u8]) -> Option<usize> {
    data.windows(TERMINATOR.len())
        .position(|window| window == TERMINATOR)
        .map(|position| position + TERMINATOR.len())
}
