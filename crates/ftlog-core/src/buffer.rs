use std::mem;

/// Fixed-capacity staging buffer for formatted log lines.
///
/// Lines are appended whole. Once the buffer holds at least `page_size`
/// bytes it reports that a flush is due, and the owner swaps the contents
/// out with [`LogBuffer::take`]. A line is therefore never split across two
/// flushed pages; a single line longer than a page is flushed as one
/// oversized page.
#[derive(Debug)]
pub struct LogBuffer {
    data: Vec<u8>,
    page_size: usize,
    /// Largest number of bytes ever held at once.
    high_water: usize,
    pages_taken: u64,
}

impl LogBuffer {
    pub fn new(page_size: usize) -> Self {
        Self {
            data: Vec::with_capacity(page_size),
            page_size,
            high_water: 0,
            pages_taken: 0,
        }
    }

    /// Append one whole line. Returns `true` if a flush is now due.
    pub fn append(&mut self, line: &[u8]) -> bool {
        self.data.extend_from_slice(line);
        self.high_water = self.high_water.max(self.data.len());
        self.is_full()
    }

    /// Whether the buffer has reached its page size.
    pub fn is_full(&self) -> bool {
        self.data.len() >= self.page_size
    }

    /// Swap out the buffered bytes, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        if !self.data.is_empty() {
            self.pages_taken += 1;
        }
        mem::replace(&mut self.data, Vec::with_capacity(self.page_size))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Number of non-empty pages handed out by [`LogBuffer::take`].
    pub fn pages_taken(&self) -> u64 {
        self.pages_taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn flush_due_at_page_size() {
        let mut buf = LogBuffer::new(8);
        assert!(!buf.append(b"abc\n"));
        assert!(buf.append(b"defg\n"));
        assert_eq!(buf.len(), 9);
        assert_eq!(buf.take(), b"abc\ndefg\n");
        assert!(buf.is_empty());
        assert_eq!(buf.pages_taken(), 1);
    }

    #[test]
    fn oversized_line_stays_whole() {
        let mut buf = LogBuffer::new(4);
        let line = b"a line much longer than one page\n";
        assert!(buf.append(line));
        assert_eq!(buf.take(), line.to_vec());
        assert_eq!(buf.high_water(), line.len());
    }

    #[test]
    fn taking_empty_buffer_counts_nothing() {
        let mut buf = LogBuffer::new(64);
        assert!(buf.take().is_empty());
        assert_eq!(buf.pages_taken(), 0);
    }

    #[test]
    fn high_water_survives_take() {
        let mut buf = LogBuffer::new(64);
        buf.append(b"0123456789\n");
        buf.take();
        buf.append(b"x\n");
        assert_eq!(buf.high_water(), 11);
    }

    proptest! {
        #[test]
        fn pages_concatenate_to_input_and_hold_whole_lines(
            page_size in 1usize..128,
            lines in proptest::collection::vec("[ -~]{0,80}", 0..40),
        ) {
            let lines: Vec<String> = lines.into_iter().map(|l| l + "\n").collect();
            let mut buf = LogBuffer::new(page_size);
            let mut pages = Vec::new();
            for line in &lines {
                if buf.append(line.as_bytes()) {
                    pages.push(buf.take());
                }
            }
            pages.push(buf.take());

            let written: Vec<u8> = pages.concat();
            prop_assert_eq!(written, lines.concat().into_bytes());
            for page in pages.iter().filter(|p| !p.is_empty()) {
                prop_assert_eq!(page.last(), Some(&b'\n'));
            }
        }
    }
}
