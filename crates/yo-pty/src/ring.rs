//! Shared-memory circular byte buffer backing terminal scrollback.
//!
//! Laid out as a fixed [`RingHeader`] (holding a process-shared mutex and the
//! circular-write bookkeeping) immediately followed by `capacity` bytes of
//! data, all inside one `MAP_SHARED | MAP_ANON` mapping allocated before
//! `fork()`. Because the mapping is shared (not copy-on-write), both the pump
//! and the shell process observe the same bytes after every append.

use std::mem;

use memmap2::MmapMut;

#[repr(C)]
struct RingHeader {
    mutex: libc::pthread_mutex_t,
    capacity: usize,
    write_pos: usize,
    data_size: usize,
}

/// A scrollback ring allocated in shared anonymous memory. Cheap to `Clone`
/// in the sense that every clone refers to the same underlying mapping
/// (`Arc`-like), since the whole point is cross-process aliasing.
pub struct ScrollbackRing {
    // Kept alive only for its `Drop` impl (munmap on last drop in a given
    // process); the actual reads/writes go through `base`.
    _mmap: MmapMut,
    base: *mut u8,
    capacity: usize,
}

// SAFETY: all access goes through the process-shared pthread mutex; the raw
// pointer only ever refers to memory mapped MAP_SHARED, which is valid from
// any thread that can see this value.
unsafe impl Send for ScrollbackRing {}
unsafe impl Sync for ScrollbackRing {}

impl ScrollbackRing {
    /// Allocates a new ring with the given capacity. Must be called before
    /// `fork()` for the mapping to end up shared between the pump and shell
    /// processes.
    pub fn create(capacity: usize) -> std::io::Result<Self> {
        let total = mem::size_of::<RingHeader>() + capacity;
        let mut mmap = MmapMut::map_anon(total)?;
        let base = mmap.as_mut_ptr();

        // SAFETY: `base` points at `total` freshly mapped, writable bytes;
        // `RingHeader` fits within the first `size_of::<RingHeader>()` of
        // them by construction of `total`.
        unsafe {
            let header = base as *mut RingHeader;
            header.write(RingHeader { mutex: mem::zeroed(), capacity, write_pos: 0, data_size: 0 });
            init_process_shared_mutex(&mut (*header).mutex);
        }

        Ok(ScrollbackRing { _mmap: mmap, base, capacity })
    }

    fn header(&self) -> *mut RingHeader {
        self.base as *mut RingHeader
    }

    fn buffer(&self) -> *mut u8 {
        // SAFETY: within the mapping's `total` bytes, right after the header.
        unsafe { self.base.add(mem::size_of::<RingHeader>()) }
    }

    fn lock(&self) {
        unsafe {
            libc::pthread_mutex_lock(&mut (*self.header()).mutex);
        }
    }

    fn unlock(&self) {
        unsafe {
            libc::pthread_mutex_unlock(&mut (*self.header()).mutex);
        }
    }

    /// Appends `data` to the ring under the process-shared mutex. Capacity
    /// saturates: once full, the oldest bytes are overwritten.
    pub fn append(&self, data: &[u8]) {
        if data.is_empty() || self.capacity == 0 {
            return;
        }
        self.lock();
        unsafe {
            let header = &mut *self.header();
            let buf = self.buffer();
            for &b in data {
                *buf.add(header.write_pos) = b;
                header.write_pos = (header.write_pos + 1) % header.capacity;
                if header.data_size < header.capacity {
                    header.data_size += 1;
                }
            }
        }
        self.unlock();
    }

    /// Copies out the most recent `data_size` bytes in write order, then
    /// keeps only the tail containing at most `max_lines` newlines, with
    /// ANSI escape sequences stripped. Best-effort: never panics.
    pub fn read(&self, max_lines: usize) -> String {
        let raw = self.snapshot();
        let cursor = backward_newline_cursor(&raw, max_lines);
        strip_ansi(&String::from_utf8_lossy(&raw[cursor..]))
    }

    /// Zeros the write position and data size under the lock. Does not wipe
    /// the underlying bytes, only the bookkeeping that makes them visible.
    pub fn clear(&self) {
        self.lock();
        unsafe {
            let header = &mut *self.header();
            header.write_pos = 0;
            header.data_size = 0;
        }
        self.unlock();
    }

    fn snapshot(&self) -> Vec<u8> {
        self.lock();
        let (capacity, data_size, write_pos) = unsafe {
            let header = &*self.header();
            (header.capacity, header.data_size, header.write_pos)
        };
        let start = if capacity == 0 { 0 } else { (write_pos + capacity - data_size) % capacity };
        let mut out = Vec::with_capacity(data_size);
        unsafe {
            let buf = self.buffer();
            for i in 0..data_size {
                out.push(*buf.add((start + i) % capacity));
            }
        }
        self.unlock();
        out
    }
}

fn init_process_shared_mutex(mutex: &mut libc::pthread_mutex_t) {
    unsafe {
        let mut attr: libc::pthread_mutexattr_t = mem::zeroed();
        libc::pthread_mutexattr_init(&mut attr);
        libc::pthread_mutexattr_setpshared(&mut attr, libc::PTHREAD_PROCESS_SHARED);
        libc::pthread_mutex_init(mutex, &attr);
        libc::pthread_mutexattr_destroy(&mut attr);
    }
}

/// Index into `data` at which at most `max_lines` trailing newlines begin.
fn backward_newline_cursor(data: &[u8], max_lines: usize) -> usize {
    if max_lines == 0 || data.is_empty() {
        return data.len();
    }
    let mut seen = 0usize;
    let mut i = data.len();
    while i > 0 {
        i -= 1;
        if data[i] == b'\n' {
            seen += 1;
            if seen > max_lines {
                return i + 1;
            }
        }
    }
    0
}

/// Strips ANSI CSI sequences (`ESC [ ... final-byte`) and lone `ESC x`
/// two-byte escapes.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('[') => {
                chars.next();
                for c2 in chars.by_ref() {
                    if ('@'..='~').contains(&c2) {
                        break;
                    }
                }
            }
            Some(_) => {
                chars.next();
            }
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_round_trip_within_capacity() {
        let ring = ScrollbackRing::create(1024).unwrap();
        ring.append(b"ls\nno such file\n");
        assert_eq!(ring.read(50), "ls\nno such file\n");
    }

    #[test]
    fn ring_saturates_and_keeps_most_recent_bytes() {
        let ring = ScrollbackRing::create(8).unwrap();
        ring.append(b"0123456789"); // 10 bytes into an 8-byte ring
        let got = ring.snapshot();
        assert_eq!(got, b"23456789");
    }

    #[test]
    fn read_clamps_to_max_lines() {
        let ring = ScrollbackRing::create(256).unwrap();
        ring.append(b"one\ntwo\nthree\nfour\n");
        assert_eq!(ring.read(2), "three\nfour\n");
        assert_eq!(ring.read(100), "one\ntwo\nthree\nfour\n");
    }

    #[test]
    fn strip_ansi_removes_csi_and_lone_escapes() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(strip_ansi("a\x1bcb"), "ab");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn strip_ansi_is_idempotent() {
        let once = strip_ansi("\x1b[1;32mhi\x1b[0m\nthere");
        let twice = strip_ansi(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_ring_read_is_empty_string() {
        let ring = ScrollbackRing::create(64).unwrap();
        assert_eq!(ring.read(50), "");
    }

    #[test]
    fn clear_empties_subsequent_reads() {
        let ring = ScrollbackRing::create(64).unwrap();
        ring.append(b"leftover output\n");
        ring.clear();
        assert_eq!(ring.read(50), "");
    }
}
