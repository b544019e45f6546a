//! Frame admission filter.
//!
//! One linear pass per frame: size bound, Ethernet, EtherType, IPv4,
//! transport header presence, then staging into the ring buffer. The first
//! failing check ends the pass. Nothing here blocks, loops over untrusted
//! lengths, or keeps state between frames.

use crate::frame::{Frame, ReadFault, TailPolicy};
use crate::headers::{EthernetView, Ipv4View, Transport};
use crate::ring::RingBuffer;
use crate::{MAX_FRAME_LEN, TAIL_POLICY};

/// What the host should do with the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Let the frame continue through the normal stack.
    Pass,
    /// The copy into the ring buffer faulted.
    Aborted,
}

/// Why a frame was not staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    Oversized,
    TruncatedEthernet,
    NotIpv4,
    TruncatedIpv4,
    TruncatedTcp,
    TruncatedUdp,
    RingFull,
}

/// Terminal state of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Staged,
    Rejected(Rejection),
    Aborted,
}

impl Outcome {
    pub fn verdict(self) -> Verdict {
        match self {
            Outcome::Aborted => Verdict::Aborted,
            Outcome::Staged | Outcome::Rejected(_) => Verdict::Pass,
        }
    }
}

/// Runs the admission pipeline with the default [`TAIL_POLICY`].
#[inline(always)]
pub fn process<F: Frame, R: RingBuffer>(frame: &F, ring: &R) -> Verdict {
    process_with_policy(frame, ring, TAIL_POLICY).verdict()
}

#[inline(always)]
pub fn process_with_policy<F: Frame, R: RingBuffer>(
    frame: &F,
    ring: &R,
    policy: TailPolicy,
) -> Outcome {
    if let Err(rejection) = admit(frame) {
        return Outcome::Rejected(rejection);
    }
    stage(frame, ring, policy)
}

/// Structural checks only; does not touch the ring buffer.
#[inline(always)]
pub fn admit<F: Frame>(frame: &F) -> Result<Transport, Rejection> {
    let len = frame.len();
    if len == 0 {
        return Err(Rejection::Empty);
    }
    if len > MAX_FRAME_LEN {
        return Err(Rejection::Oversized);
    }

    let eth = EthernetView::parse(frame).ok_or(Rejection::TruncatedEthernet)?;
    if !eth.is_ipv4() {
        return Err(Rejection::NotIpv4);
    }

    let ip = Ipv4View::parse(frame).ok_or(Rejection::TruncatedIpv4)?;
    let transport = ip.transport();
    match transport {
        Transport::Tcp if !transport.is_present(frame) => return Err(Rejection::TruncatedTcp),
        Transport::Udp if !transport.is_present(frame) => return Err(Rejection::TruncatedUdp),
        // other protocols only need the IPv4 header, checked above
        Transport::Tcp | Transport::Udp | Transport::Other(_) => {}
    }

    Ok(transport)
}

#[inline(always)]
fn stage<F: Frame, R: RingBuffer>(frame: &F, ring: &R, policy: TailPolicy) -> Outcome {
    let Some(mut staged) = ring.stage() else {
        return Outcome::Rejected(Rejection::RingFull);
    };

    let copied = staged.write_with(|record| match policy {
        TailPolicy::ZeroFill => frame.read_zero_filled(record),
        TailPolicy::RawWindow => frame.read_window(record),
    });

    match copied {
        Ok(()) => {
            staged.submit();
            Outcome::Staged
        }
        Err(ReadFault) => {
            staged.discard();
            Outcome::Aborted
        }
    }
}
