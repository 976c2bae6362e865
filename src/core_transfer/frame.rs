//! Incremental scanner for sentinel-terminated payloads.
//!
//! The data connection carries raw bytes followed by an end-of-data marker.
//! The scanner hands back every byte that can no longer be part of the
//! marker as soon as it arrives, and only retains a tail shorter than the
//! marker between chunks. A marker split across any number of reads is
//! still found.

/// Result of feeding one received chunk into the scanner.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// Marker not seen yet. The bytes are payload that is safe to flush.
    Partial(Vec<u8>),
    /// Marker found. The bytes are the remaining payload before it.
    Complete(Vec<u8>),
}

#[derive(Debug)]
pub struct SentinelScanner {
    sentinel: Vec<u8>,
    buffer: Vec<u8>,
    payload_len: u64,
    complete: bool,
}

impl SentinelScanner {
    pub fn new(sentinel: &[u8]) -> Self {
        assert!(!sentinel.is_empty(), "sentinel must not be empty");
        Self {
            sentinel: sentinel.to_vec(),
            buffer: Vec::new(),
            payload_len: 0,
            complete: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Frame {
        if self.complete {
            // Anything after the marker is not payload.
            return Frame::Complete(Vec::new());
        }

        self.buffer.extend_from_slice(chunk);

        if let Some(pos) = find_subsequence(&self.buffer, &self.sentinel) {
            let payload = self.buffer[..pos].to_vec();
            self.buffer.clear();
            self.complete = true;
            self.payload_len += payload.len() as u64;
            return Frame::Complete(payload);
        }

        let keep = self.buffer.len().min(self.sentinel.len() - 1);
        let flushable = self.buffer.len() - keep;
        let flushed: Vec<u8> = self.buffer.drain(..flushable).collect();
        self.payload_len += flushed.len() as u64;
        Frame::Partial(flushed)
    }

    /// Payload bytes handed out so far.
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }
}

pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const END: &[u8] = b"@@END_DATA";

    fn collect(scanner: &mut SentinelScanner, chunks: &[&[u8]]) -> (Vec<u8>, bool) {
        let mut out = Vec::new();
        let mut done = false;
        for chunk in chunks {
            match scanner.push(chunk) {
                Frame::Partial(bytes) => out.extend(bytes),
                Frame::Complete(bytes) => {
                    out.extend(bytes);
                    done = true;
                }
            }
        }
        (out, done)
    }

    #[test]
    fn test_single_chunk() {
        let mut scanner = SentinelScanner::new(END);
        assert_eq!(
            scanner.push(b"hello world@@END_DATA"),
            Frame::Complete(b"hello world".to_vec())
        );
        assert!(scanner.complete);
        assert_eq!(scanner.payload_len(), 11);
    }

    #[test]
    fn test_empty_payload() {
        let mut scanner = SentinelScanner::new(END);
        assert_eq!(scanner.push(b"@@END_DATA"), Frame::Complete(Vec::new()));
        assert_eq!(scanner.payload_len(), 0);
    }

    #[test]
    fn test_payload_spanning_chunks() {
        let mut scanner = SentinelScanner::new(END);
        let (out, done) = collect(
            &mut scanner,
            &[b"first line\n", b"second line\n", b"third@@END_DATA"],
        );
        assert!(done);
        assert_eq!(out, b"first line\nsecond line\nthird");
    }

    #[test]
    fn test_sentinel_straddling_chunks() {
        let mut scanner = SentinelScanner::new(END);
        let (out, done) = collect(&mut scanner, &[b"abc@@EN", b"D_DA", b"TA"]);
        assert!(done);
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_byte_at_a_time() {
        let stream = b"some payload with @@ signs @@END_DATA";
        let mut scanner = SentinelScanner::new(END);
        let chunks: Vec<&[u8]> = stream.chunks(1).collect();
        let (out, done) = collect(&mut scanner, &chunks);
        assert!(done);
        assert_eq!(out, b"some payload with @@ signs ");
    }

    #[test]
    fn test_retains_only_a_short_tail() {
        let mut scanner = SentinelScanner::new(END);
        let big = vec![b'x'; 10_000];
        match scanner.push(&big) {
            Frame::Partial(bytes) => assert_eq!(bytes.len(), 10_000 - (END.len() - 1)),
            other => panic!("unexpected frame {:?}", other),
        }
        assert_eq!(scanner.buffer.len(), END.len() - 1);
    }

    #[test]
    fn test_bytes_after_sentinel_are_dropped() {
        let mut scanner = SentinelScanner::new(END);
        assert_eq!(
            scanner.push(b"data@@END_DATAtrailing"),
            Frame::Complete(b"data".to_vec())
        );
        assert_eq!(scanner.push(b"more"), Frame::Complete(Vec::new()));
        assert_eq!(scanner.payload_len(), 4);
    }

    #[test]
    fn test_find_subsequence() {
        assert_eq!(find_subsequence(b"abc@@END_DATA", END), Some(3));
        assert_eq!(find_subsequence(b"@@END", END), None);
        assert_eq!(find_subsequence(b"", END), None);
    }
}
