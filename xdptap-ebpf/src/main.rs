#![no_std]
#![no_main]

use aya_ebpf::{
    bindings::xdp_action,
    cty::c_void,
    helpers::gen::bpf_probe_read_kernel,
    macros::{map, xdp},
    maps::{ring_buf::RingBufEntry, RingBuf},
    programs::XdpContext,
};
use core::{mem::MaybeUninit, ptr};
use xdptap_common::{
    filter::{self, Verdict},
    Frame, ReadFault, RecordSlot, RingBuffer, LICENSE, RECORD_LEN, RING_BUF_BYTES,
};

#[no_mangle]
#[link_section = "license"]
pub static _license: [u8; 4] = LICENSE;

#[map]
static FRAMES: RingBuf = RingBuf::with_byte_size(RING_BUF_BYTES, 0);

/// Source of the zero tail for records of short frames. Copied with a single
/// helper call so no `memset` lands in `.text`.
static ZEROES: [u8; RECORD_LEN] = [0; RECORD_LEN];

/// XDP entry point.
///
/// The frame is only ever observed; every outcome except a faulted copy is
/// `XDP_PASS`.
#[xdp]
pub fn xdptap(ctx: XdpContext) -> u32 {
    match filter::process(&XdpFrame(&ctx), &FrameRing(&FRAMES)) {
        Verdict::Pass => xdp_action::XDP_PASS,
        Verdict::Aborted => xdp_action::XDP_ABORTED,
    }
}

/// Packet bytes between `data` and `data_end`.
struct XdpFrame<'a>(&'a XdpContext);

impl Frame for XdpFrame<'_> {
    #[inline(always)]
    fn len(&self) -> usize {
        self.0.data_end().saturating_sub(self.0.data())
    }

    #[inline(always)]
    fn load<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        let start = self.0.data() + offset;
        if start + N > self.0.data_end() {
            return None;
        }
        Some(unsafe { ptr::read_unaligned(start as *const [u8; N]) })
    }

    #[inline(always)]
    fn read_window(&self, dst: &mut [MaybeUninit<u8>]) -> Result<(), ReadFault> {
        copy_into(dst, self.0.data() as *const u8)
    }

    #[inline(always)]
    fn read_zero_filled(&self, dst: &mut [MaybeUninit<u8>]) -> Result<(), ReadFault> {
        let len = self.len();
        if len == 0 || len > dst.len() || dst.len() > ZEROES.len() {
            return Err(ReadFault);
        }
        copy_into(dst, ZEROES.as_ptr())?;
        let head = dst.get_mut(..len).ok_or(ReadFault)?;
        copy_into(head, self.0.data() as *const u8)
    }
}

/// Copies `dst.len()` bytes from `src` with the kernel read helper, writing
/// through a raw pointer so the uninitialized destination is never borrowed
/// as `&mut [u8]`.
#[inline(always)]
fn copy_into(dst: &mut [MaybeUninit<u8>], src: *const u8) -> Result<(), ReadFault> {
    let ret = unsafe {
        bpf_probe_read_kernel(
            dst.as_mut_ptr() as *mut c_void,
            dst.len() as u32,
            src as *const c_void,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(ReadFault)
    }
}

struct FrameRing(&'static RingBuf);

impl RingBuffer for FrameRing {
    type Slot = FrameSlot;

    #[inline(always)]
    fn reserve(&self) -> Option<FrameSlot> {
        self.0.reserve::<[u8; RECORD_LEN]>(0).map(FrameSlot)
    }
}

struct FrameSlot(RingBufEntry<[u8; RECORD_LEN]>);

impl RecordSlot for FrameSlot {
    #[inline(always)]
    fn bytes_mut(&mut self) -> &mut MaybeUninit<[u8; RECORD_LEN]> {
        &mut *self.0
    }

    #[inline(always)]
    fn submit(self) {
        self.0.submit(0);
    }

    #[inline(always)]
    fn discard(self) {
        self.0.discard(0);
    }
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
