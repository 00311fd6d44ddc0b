// Splits a raw MJPEG byte stream into complete JPEG frames.

const JPEG_START: [u8; 2] = [0xFF, 0xD8];
const JPEG_END: [u8; 2] = [0xFF, 0xD9];

/// Frames larger than this are treated as a corrupt stream and dropped.
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct MjpegSplitter {
    buffer: Vec<u8>,
}

impl MjpegSplitter {
    pub fn new() -> Self {
        MjpegSplitter {
            buffer: Vec::with_capacity(1024 * 1024),
        }
    }

    /// Feed a chunk read from the stream; returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find(&self.buffer, &JPEG_START, 0) else {
                // Keep a trailing 0xFF, it may be the first half of a marker.
                let keep = usize::from(self.buffer.last() == Some(&0xFF));
                self.buffer.drain(..self.buffer.len() - keep);
                break;
            };
            if start > 0 {
                self.buffer.drain(..start);
            }

            match find(&self.buffer, &JPEG_END, JPEG_START.len()) {
                Some(end) => {
                    let frame: Vec<u8> = self.buffer.drain(..end + JPEG_END.len()).collect();
                    frames.push(frame);
                }
                None => {
                    if self.buffer.len() > MAX_FRAME_BYTES {
                        self.buffer.clear();
                    }
                    break;
                }
            }
        }

        frames
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut f = JPEG_START.to_vec();
        f.extend_from_slice(body);
        f.extend_from_slice(&JPEG_END);
        f
    }

    #[test]
    fn test_whole_frames_in_one_chunk() {
        let mut stream = b"junk".to_vec();
        stream.extend(frame(&[1, 2, 3]));
        stream.extend(frame(&[4]));

        let mut splitter = MjpegSplitter::new();
        let frames = splitter.push(&stream);
        assert_eq!(frames, vec![frame(&[1, 2, 3]), frame(&[4])]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let full = frame(&[7, 8, 9, 10]);
        let mut splitter = MjpegSplitter::new();

        for byte in &full[..full.len() - 1] {
            assert!(splitter.push(&[*byte]).is_empty());
        }
        assert_eq!(splitter.push(&full[full.len() - 1..]), vec![full]);
    }

    #[test]
    fn test_start_marker_split_across_chunks() {
        let full = frame(&[5]);
        let mut splitter = MjpegSplitter::new();
        assert!(splitter.push(&[0x00, 0xFF]).is_empty());
        assert_eq!(splitter.push(&full[1..]), vec![full]);
    }
}
