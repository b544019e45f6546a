#![no_std]

//! Frame admission logic shared by the XDP program and the user-space agent.
//!
//! Everything here is target-agnostic: the pipeline in [`filter`] only talks
//! to a [`Frame`] and a [`RingBuffer`], so it runs unchanged inside the BPF
//! program and in host unit tests.

#[cfg(test)]
extern crate std;

pub mod filter;
pub mod frame;
pub mod headers;
pub mod ring;

pub use filter::{process, process_with_policy, Outcome, Rejection, Verdict};
pub use frame::{Frame, ReadFault, SliceFrame, TailPolicy};
pub use ring::{RecordSlot, RingBuffer, Staged};

/// Largest frame, in bytes, that is admitted for capture (one Ethernet MTU).
pub const MAX_FRAME_LEN: usize = 1500;

/// Size of every record written to the ring buffer.
///
/// Records are fixed-size regardless of the captured frame's length; the
/// consumer gets no length prefix.
pub const RECORD_LEN: usize = MAX_FRAME_LEN;

/// Default ring buffer capacity (16 MiB). The agent may override it at load time.
pub const RING_BUF_BYTES: u32 = 1 << 24;

/// How the bytes of a record past the end of a short frame are produced.
pub const TAIL_POLICY: TailPolicy = TailPolicy::ZeroFill;

/// License string the kernel loader requires in the `license` section.
pub const LICENSE: [u8; 4] = *b"GPL\0";

/// Name of the ring buffer map in the BPF object.
pub const RING_BUF_MAP: &str = "FRAMES";

/// Name of the XDP program in the BPF object.
pub const PROGRAM_NAME: &str = "xdptap";
