use core::mem::MaybeUninit;

/// The host refused a read from the frame's backing memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFault;

/// Content of the record bytes that lie past the end of a short frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPolicy {
    /// Copy the frame's own bytes and zero the remainder of the record.
    ZeroFill,
    /// Copy a fixed `RECORD_LEN` window from the start of the frame,
    /// including whatever memory the host maps after the frame's end.
    RawWindow,
}

/// Read-only, bounds-checked access to one received frame.
///
/// Implementations must never read past `len()` in [`Frame::load`]; the
/// window copies are the only reads that are checked by the host instead.
///
/// Copy destinations are ring buffer memory that has not been initialized,
/// hence `MaybeUninit<u8>`. On `Ok` every byte of `dst` has been written.
pub trait Frame {
    /// Declared length of the frame in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the `N` bytes starting at `offset`, or `None` when
    /// `offset + N` runs past the end of the frame.
    fn load<const N: usize>(&self, offset: usize) -> Option<[u8; N]>;

    /// Fills `dst` from the start of the frame's backing memory, ignoring the
    /// declared length.
    fn read_window(&self, dst: &mut [MaybeUninit<u8>]) -> Result<(), ReadFault>;

    /// Copies `min(len, dst.len())` frame bytes into the head of `dst` and
    /// zeroes the rest.
    fn read_zero_filled(&self, dst: &mut [MaybeUninit<u8>]) -> Result<(), ReadFault>;
}

/// A frame over ordinary memory.
///
/// `memory` may extend past the frame: those trailing bytes stand in for
/// whatever the host maps after the packet, and are only reachable through
/// [`Frame::read_window`]. Reading past `memory` faults.
#[derive(Debug, Clone, Copy)]
pub struct SliceFrame<'a> {
    memory: &'a [u8],
    len: usize,
}

impl<'a> SliceFrame<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            memory: bytes,
            len: bytes.len(),
        }
    }

    /// A frame of `len` bytes at the start of a larger `memory` region.
    pub fn within(memory: &'a [u8], len: usize) -> Self {
        Self {
            memory,
            len: len.min(memory.len()),
        }
    }
}

impl Frame for SliceFrame<'_> {
    fn len(&self) -> usize {
        self.len
    }

    fn load<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        let end = offset.checked_add(N)?;
        if end > self.len {
            return None;
        }
        self.memory.get(offset..end)?.try_into().ok()
    }

    fn read_window(&self, dst: &mut [MaybeUninit<u8>]) -> Result<(), ReadFault> {
        let src = self.memory.get(..dst.len()).ok_or(ReadFault)?;
        write_bytes(dst, src);
        Ok(())
    }

    fn read_zero_filled(&self, dst: &mut [MaybeUninit<u8>]) -> Result<(), ReadFault> {
        let n = self.len.min(dst.len());
        let src = self.memory.get(..n).ok_or(ReadFault)?;
        let (head, tail) = dst.split_at_mut(n);
        write_bytes(head, src);
        for byte in tail {
            byte.write(0);
        }
        Ok(())
    }
}

fn write_bytes(dst: &mut [MaybeUninit<u8>], src: &[u8]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        d.write(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uninit<const N: usize>(fill: u8) -> [MaybeUninit<u8>; N] {
        [MaybeUninit::new(fill); N]
    }

    fn bytes<const N: usize>(buf: &[MaybeUninit<u8>; N]) -> [u8; N] {
        // every element was created with `MaybeUninit::new`
        buf.map(|b| unsafe { b.assume_init() })
    }

    #[test]
    fn test_load_respects_declared_len() {
        let memory = [1u8, 2, 3, 4, 5, 6];
        let frame = SliceFrame::within(&memory, 4);

        assert_eq!(frame.load::<2>(2), Some([3, 4]));
        assert_eq!(frame.load::<2>(3), None);
        assert_eq!(frame.load::<1>(usize::MAX), None);
    }

    #[test]
    fn test_read_window_reads_past_len() {
        let memory = [9u8, 8, 7, 6];
        let frame = SliceFrame::within(&memory, 2);

        let mut dst = uninit::<4>(0);
        assert_eq!(frame.read_window(&mut dst), Ok(()));
        assert_eq!(bytes(&dst), [9, 8, 7, 6]);

        let mut too_big = uninit::<5>(0);
        assert_eq!(frame.read_window(&mut too_big), Err(ReadFault));
    }

    #[test]
    fn test_read_zero_filled_clears_tail() {
        let memory = [9u8, 8, 7, 6];
        let frame = SliceFrame::within(&memory, 2);

        let mut dst = uninit::<5>(0xff);
        assert_eq!(frame.read_zero_filled(&mut dst), Ok(()));
        assert_eq!(bytes(&dst), [9, 8, 0, 0, 0]);
    }
}
