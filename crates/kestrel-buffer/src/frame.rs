//! Buffer frame management.

use kestrel_common::page::{PageId, PAGE_SIZE};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Sentinel value indicating no page is loaded in the frame.
const NO_PAGE: u32 = u32::MAX;

/// Unique identifier for a frame in the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Invalid frame ID.
    pub const INVALID: FrameId = FrameId(u32::MAX);

    /// Returns true if this is a valid frame ID.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// A frame in the buffer pool holding a single page.
///
/// Page bytes sit behind a reader-writer latch; the metadata (page id, pin
/// count, dirty flag) is atomic so it can be read without the latch. The
/// pool writes metadata only while holding its global mutex, which is the
/// lock that actually serializes pin accounting.
pub struct BufferFrame {
    /// Frame identifier.
    frame_id: FrameId,
    /// The page currently stored in this frame (NO_PAGE = none).
    page_id: AtomicU32,
    /// Page data buffer.
    data: RwLock<Box<[u8; PAGE_SIZE]>>,
    /// Number of users currently accessing this page.
    pin_count: AtomicU32,
    /// Whether the page has been modified since it was loaded or flushed.
    is_dirty: AtomicBool,
}

impl BufferFrame {
    /// Creates a new empty buffer frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicU32::new(NO_PAGE),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page ID currently stored in this frame.
    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        let raw = self.page_id.load(Ordering::Acquire);
        if raw == NO_PAGE {
            None
        } else {
            Some(PageId(raw))
        }
    }

    /// Sets the page ID for this frame.
    #[inline]
    pub fn set_page_id(&self, page_id: Option<PageId>) {
        let raw = match page_id {
            Some(pid) => pid.0,
            None => NO_PAGE,
        };
        self.page_id.store(raw, Ordering::Release);
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the previous value.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel)
    }

    /// Decrements the pin count and returns the new value.
    ///
    /// A decrement at zero is clamped back to zero; callers detect that
    /// case through `pin_count` before unpinning.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let prev = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            self.pin_count.store(0, Ordering::Release);
            return 0;
        }
        prev - 1
    }

    /// Returns true if this frame is pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count.load(Ordering::Acquire) > 0
    }

    /// Returns true if this frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// Marks this frame dirty or clean.
    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Returns true if this frame holds no page.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_id.load(Ordering::Acquire) == NO_PAGE
    }

    /// Reads the page data.
    #[inline]
    pub fn read_data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Writes to the page data.
    #[inline]
    pub fn write_data(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }

    /// Resets the frame to the empty state: no page, pin count zero, clean,
    /// zeroed bytes.
    pub fn reset(&self) {
        self.page_id.store(NO_PAGE, Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        let mut data = self.data.write();
        data.fill(0);
    }
}

impl std::fmt::Debug for BufferFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFrame")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id())
            .field("pin_count", &self.pin_count())
            .field("is_dirty", &self.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_validity() {
        assert!(FrameId(0).is_valid());
        assert!(!FrameId::INVALID.is_valid());
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(FrameId(42).to_string(), "frame:42");
    }

    #[test]
    fn test_buffer_frame_new() {
        let frame = BufferFrame::new(FrameId(0));

        assert_eq!(frame.frame_id(), FrameId(0));
        assert!(frame.page_id().is_none());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert!(frame.is_empty());
    }

    #[test]
    fn test_buffer_frame_pin_unpin() {
        let frame = BufferFrame::new(FrameId(0));

        assert!(!frame.is_pinned());

        assert_eq!(frame.pin(), 0);
        assert!(frame.is_pinned());
        assert_eq!(frame.pin_count(), 1);

        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin_count(), 2);

        assert_eq!(frame.unpin(), 1);
        assert!(frame.is_pinned());

        assert_eq!(frame.unpin(), 0);
        assert!(!frame.is_pinned());
    }

    #[test]
    fn test_buffer_frame_unpin_underflow() {
        let frame = BufferFrame::new(FrameId(0));

        // Unpin when already at 0 stays at 0.
        assert_eq!(frame.unpin(), 0);
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_buffer_frame_dirty() {
        let frame = BufferFrame::new(FrameId(0));

        assert!(!frame.is_dirty());
        frame.set_dirty(true);
        assert!(frame.is_dirty());
        frame.set_dirty(false);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_buffer_frame_page_id() {
        let frame = BufferFrame::new(FrameId(0));
        let page_id = PageId::new(100);

        assert!(frame.page_id().is_none());

        frame.set_page_id(Some(page_id));
        assert_eq!(frame.page_id(), Some(page_id));
        assert!(!frame.is_empty());

        frame.set_page_id(None);
        assert!(frame.page_id().is_none());
        assert!(frame.is_empty());
    }

    #[test]
    fn test_buffer_frame_data_access() {
        let frame = BufferFrame::new(FrameId(0));

        {
            let mut data = frame.write_data();
            data[0] = 0xAB;
            data[1] = 0xCD;
        }

        {
            let data = frame.read_data();
            assert_eq!(data[0], 0xAB);
            assert_eq!(data[1], 0xCD);
        }
    }

    #[test]
    fn test_buffer_frame_reset() {
        let frame = BufferFrame::new(FrameId(0));

        frame.set_page_id(Some(PageId::new(1)));
        frame.pin();
        frame.set_dirty(true);
        {
            let mut data = frame.write_data();
            data[0] = 0xFF;
        }

        frame.reset();

        assert!(frame.page_id().is_none());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert!(frame.is_empty());
        assert_eq!(frame.read_data()[0], 0);
    }

    #[test]
    fn test_buffer_frame_debug() {
        let frame = BufferFrame::new(FrameId(5));
        frame.set_page_id(Some(PageId::new(10)));
        frame.pin();

        let debug_str = format!("{:?}", frame);
        assert!(debug_str.contains("BufferFrame"));
        assert!(debug_str.contains("frame_id"));
        assert!(debug_str.contains("pin_count"));
    }
}
