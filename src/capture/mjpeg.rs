//! MJPEG pipe framing.
//!
//! A camera backend streaming `image2pipe` MJPEG writes back-to-back JPEG
//! images with no container. Each frame runs from an SOI marker (FF D8)
//! through the next EOI marker (FF D9). Entropy-coded data byte-stuffs
//! 0xFF, so EOI never appears inside a scan.

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;

/// Frames larger than this are treated as a corrupt stream and dropped.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Incremental splitter: feed arbitrary chunks, get complete frames back.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buf: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find_marker(&self.buf, 0, SOI) else {
                // Keep a trailing 0xFF: it may be the first half of an SOI.
                let keep_last = self.buf.last() == Some(&0xFF);
                self.buf.clear();
                if keep_last {
                    self.buf.push(0xFF);
                }
                break;
            };

            if start > 0 {
                self.buf.drain(..start);
            }

            match find_marker(&self.buf, 2, EOI) {
                Some(end) => {
                    let frame: Vec<u8> = self.buf.drain(..end + 2).collect();
                    frames.push(frame);
                }
                None => {
                    if self.buf.len() > MAX_FRAME_BYTES {
                        log::warn!(
                            "[CAMERA] Dropping {} bytes without an end-of-image marker",
                            self.buf.len()
                        );
                        self.buf.clear();
                    }
                    break;
                }
            }
        }

        frames
    }

    /// Bytes held back waiting for the rest of a frame.
    #[cfg(test)]
    fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Position of the first `FF <second>` pair at or after `from`.
fn find_marker(hay: &[u8], from: usize, second: u8) -> Option<usize> {
    if hay.len() < from + 2 {
        return None;
    }
    hay[from..]
        .windows(2)
        .position(|w| w[0] == 0xFF && w[1] == second)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut f = vec![0xFF, SOI];
        f.extend_from_slice(body);
        f.extend_from_slice(&[0xFF, EOI]);
        f
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let mut splitter = FrameSplitter::new();
        let mut chunk = frame(b"one");
        chunk.extend(frame(b"two"));
        let frames = splitter.push(&chunk);
        assert_eq!(frames, vec![frame(b"one"), frame(b"two")]);
        assert_eq!(splitter.pending(), 0);
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut splitter = FrameSplitter::new();
        let whole = frame(b"leafy");
        let (a, b) = whole.split_at(4);
        assert!(splitter.push(a).is_empty());
        assert_eq!(splitter.push(b), vec![whole.clone()]);
    }

    #[test]
    fn marker_split_between_chunks() {
        let mut splitter = FrameSplitter::new();
        let whole = frame(b"stem");
        // Split right after the 0xFF of the end marker.
        let cut = whole.len() - 1;
        assert!(splitter.push(&whole[..cut]).is_empty());
        assert_eq!(splitter.push(&whole[cut..]), vec![whole.clone()]);

        // Split between the two bytes of the start marker.
        assert!(splitter.push(&[0x00, 0xFF]).is_empty());
        let mut rest = vec![SOI];
        rest.extend_from_slice(b"root");
        rest.extend_from_slice(&[0xFF, EOI]);
        assert_eq!(splitter.push(&rest), vec![frame(b"root")]);
    }

    #[test]
    fn garbage_before_frame_is_skipped() {
        let mut splitter = FrameSplitter::new();
        let mut chunk = b"noise".to_vec();
        chunk.extend(frame(b"petal"));
        assert_eq!(splitter.push(&chunk), vec![frame(b"petal")]);
    }
}
