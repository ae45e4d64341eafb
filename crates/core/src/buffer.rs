//! Pooled packet buffers.
//!
//! `PacketBuffer` is the currency exchanged between the receive loop and a
//! `Session`: the loop checks one out of the pool, fills it from the socket,
//! classifies/decrypts/decompresses in place, and hands ownership to the
//! session. The loop never touches a buffer again after delivery — it checks
//! out a fresh one for the next datagram instead.

use parking_lot::Mutex;

/// An owned, fixed-capacity byte buffer with a cursor, logical size, and a
/// "was this payload compressed" flag.
///
/// Invariants: `size <= data.len()` (the buffer's capacity) and
/// `cursor <= size`.
#[derive(Debug)]
pub struct PacketBuffer {
    data: Box<[u8]>,
    size: usize,
    cursor: usize,
    is_compressed: bool,
}

impl PacketBuffer {
    fn new(max_payload: usize) -> Self {
        Self {
            data: vec![0u8; max_payload].into_boxed_slice(),
            size: 0,
            cursor: 0,
            is_compressed: false,
        }
    }

    /// Maximum number of bytes this buffer can hold.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current logical length of the buffer's contents.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the payload delivered to the session was decompressed by the
    /// receive core before delivery.
    pub fn is_compressed(&self) -> bool {
        self.is_compressed
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.size);
        self.cursor = cursor.min(self.size);
    }

    /// The logical contents, `data[..size]`.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.size]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.size]
    }

    /// Raw backing storage, for filling from a `recv_from` call.
    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Reset size/cursor/compressed flag and set a new logical size.
    ///
    /// Used both on checkout (size reset to 0) and after a successful
    /// `recv_from` (size set to the number of bytes read).
    pub fn set_size(&mut self, size: usize) {
        assert!(size <= self.data.len(), "size exceeds buffer capacity");
        self.size = size;
        self.cursor = 0;
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        self.is_compressed = compressed;
    }

    /// Replace the logical contents with `bytes`, truncated/rejected if it
    /// would exceed capacity.
    ///
    /// Used when building the post-decompression buffer: the opcode header
    /// is copied verbatim and the decompressed payload appended.
    pub fn fill_from(&mut self, bytes: &[u8]) {
        assert!(bytes.len() <= self.data.len(), "payload exceeds buffer capacity");
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.size = bytes.len();
        self.cursor = 0;
    }
}

/// Recycles [`PacketBuffer`]s to avoid a heap allocation per datagram.
///
/// Thread-safe: the receive loop checks buffers out, and whichever thread
/// last holds a handed-off buffer is responsible for returning it via
/// [`PacketBufferPool::release`] once it is truly done (the receive core
/// itself releases a buffer only when a datagram is dropped before
/// delivery — once delivered to a session, the pool never sees that buffer
/// again, matching the ownership-transfer invariant in spec.md §3).
pub struct PacketBufferPool {
    max_payload: usize,
    free: Mutex<Vec<PacketBuffer>>,
}

impl PacketBufferPool {
    pub fn new(max_payload: usize) -> Self {
        Self {
            max_payload,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Check out a buffer, reusing a freed one if available. Size/cursor are
    /// always reset to 0; `data` is not zeroed (the pool's policy does not
    /// require it — see spec.md §3).
    pub fn checkout(&self) -> PacketBuffer {
        let mut free = self.free.lock();
        if let Some(mut buf) = free.pop() {
            buf.size = 0;
            buf.cursor = 0;
            buf.is_compressed = false;
            buf
        } else {
            PacketBuffer::new(self.max_payload)
        }
    }

    /// Return a buffer to the free list for reuse.
    pub fn release(&self, buf: PacketBuffer) {
        let mut free = self.free.lock();
        free.push(buf);
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}
