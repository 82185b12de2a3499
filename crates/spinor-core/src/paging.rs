//! Page-write splitting
//!
//! Page-programmed memories wrap writes inside the current page instead of
//! carrying into the next one, so a write has to be cut at every page
//! boundary. [`PageChunks`] plans those cuts; it performs no I/O and is shared
//! by the SPI-NOR driver, the programming algorithm and the EEPROM driver.

/// One page-bounded piece of a larger write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageChunk {
    /// Device address of the first byte
    pub addr: u32,
    /// Offset of the first byte within the caller's buffer
    pub offset: usize,
    /// Number of bytes, never past the end of the page containing `addr`
    pub len: usize,
}

impl PageChunk {
    /// The slice of `data` this chunk covers
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.offset + self.len]
    }
}

/// Iterator over the page-bounded chunks of a write
///
/// The first chunk fills the rest of the page containing `addr`, the middle
/// chunks are full pages, and the last chunk holds the remainder. A write
/// that fits in the first page yields a single chunk; an empty write yields
/// nothing.
#[derive(Debug, Clone)]
pub struct PageChunks {
    addr: u32,
    offset: usize,
    remaining: usize,
    page_size: u32,
}

impl PageChunks {
    /// Plan a write of `len` bytes starting at `addr`
    ///
    /// `page_size` must be non-zero.
    pub fn new(addr: u32, len: usize, page_size: u32) -> Self {
        debug_assert!(page_size > 0, "page size must be non-zero");
        Self {
            addr,
            offset: 0,
            remaining: len,
            page_size,
        }
    }

    /// Number of chunks still to be yielded
    pub fn count_remaining(&self) -> usize {
        self.clone().count()
    }
}

impl Iterator for PageChunks {
    type Item = PageChunk;

    fn next(&mut self) -> Option<PageChunk> {
        if self.remaining == 0 {
            return None;
        }

        let page_remain = (self.page_size - self.addr % self.page_size) as usize;
        let len = core::cmp::min(page_remain, self.remaining);
        let chunk = PageChunk {
            addr: self.addr,
            offset: self.offset,
            len,
        };

        self.addr = self.addr.wrapping_add(len as u32);
        self.offset += len;
        self.remaining -= len;

        Some(chunk)
    }
}
