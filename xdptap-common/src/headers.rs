//! Header presence checks at fixed offsets.
//!
//! Views are computed from the first bytes of a [`Frame`] and only exist when
//! the whole header lies inside the frame. IPv4 options are never accounted
//! for: the transport header is always assumed to start at `14 + 20`.

use network_types::{
    eth::EthHdr,
    ip::{IpProto, Ipv4Hdr},
    tcp::TcpHdr,
    udp::UdpHdr,
};

use crate::frame::Frame;

/// EtherType of IPv4, host byte order.
pub const ETHER_TYPE_IPV4: u16 = 0x0800;

const IPPROTO_TCP: u8 = IpProto::Tcp as u8;
const IPPROTO_UDP: u8 = IpProto::Udp as u8;

/// True when `len` bytes starting at `offset` lie inside the frame.
#[inline(always)]
fn contains<F: Frame>(frame: &F, offset: usize, len: usize) -> bool {
    match offset.checked_add(len) {
        Some(end) => end <= frame.len(),
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetView {
    /// EtherType, converted from network byte order.
    pub ether_type: u16,
}

impl EthernetView {
    pub const LEN: usize = EthHdr::LEN;
    const ETHER_TYPE_OFFSET: usize = 12;

    #[inline(always)]
    pub fn parse<F: Frame>(frame: &F) -> Option<Self> {
        if !contains(frame, 0, Self::LEN) {
            return None;
        }
        let raw = frame.load::<2>(Self::ETHER_TYPE_OFFSET)?;
        Some(Self {
            ether_type: u16::from_be_bytes(raw),
        })
    }

    pub fn is_ipv4(&self) -> bool {
        self.ether_type == ETHER_TYPE_IPV4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4View {
    pub protocol: u8,
}

impl Ipv4View {
    pub const OFFSET: usize = EthernetView::LEN;
    pub const LEN: usize = Ipv4Hdr::LEN;
    const PROTOCOL_OFFSET: usize = 9;

    #[inline(always)]
    pub fn parse<F: Frame>(frame: &F) -> Option<Self> {
        if !contains(frame, Self::OFFSET, Self::LEN) {
            return None;
        }
        let [protocol] = frame.load::<1>(Self::OFFSET + Self::PROTOCOL_OFFSET)?;
        Some(Self { protocol })
    }

    pub fn transport(&self) -> Transport {
        Transport::from_protocol(self.protocol)
    }
}

/// Transport carried by an IPv4 packet, as far as header sizing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
    Other(u8),
}

impl Transport {
    pub const OFFSET: usize = Ipv4View::OFFSET + Ipv4View::LEN;

    pub fn from_protocol(protocol: u8) -> Self {
        match protocol {
            IPPROTO_TCP => Transport::Tcp,
            IPPROTO_UDP => Transport::Udp,
            other => Transport::Other(other),
        }
    }

    /// Bytes that must follow the IPv4 header. Zero for protocols whose
    /// header is not checked.
    pub fn header_len(self) -> usize {
        match self {
            Transport::Tcp => TcpHdr::LEN,
            Transport::Udp => UdpHdr::LEN,
            Transport::Other(_) => 0,
        }
    }

    #[inline(always)]
    pub fn is_present<F: Frame>(self, frame: &F) -> bool {
        contains(frame, Self::OFFSET, self.header_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::SliceFrame;

    #[test]
    fn test_header_lengths() {
        assert_eq!(EthernetView::LEN, 14);
        assert_eq!(Ipv4View::LEN, 20);
        assert_eq!(Transport::OFFSET, 34);
        assert_eq!(Transport::Tcp.header_len(), 20);
        assert_eq!(Transport::Udp.header_len(), 8);
        assert_eq!(Transport::Other(1).header_len(), 0);
    }

    #[test]
    fn test_ethernet_view_reads_network_order() {
        let mut bytes = [0u8; 14];
        bytes[12] = 0x08;
        bytes[13] = 0x00;
        let view = EthernetView::parse(&SliceFrame::new(&bytes)).unwrap();
        assert_eq!(view.ether_type, 0x0800);
        assert!(view.is_ipv4());

        bytes[12] = 0x86;
        bytes[13] = 0xdd;
        let view = EthernetView::parse(&SliceFrame::new(&bytes)).unwrap();
        assert!(!view.is_ipv4());
    }

    #[test]
    fn test_ethernet_view_needs_full_header() {
        let bytes = [0u8; 13];
        assert_eq!(EthernetView::parse(&SliceFrame::new(&bytes)), None);
    }

    #[test]
    fn test_ipv4_view_needs_full_header() {
        let mut bytes = [0u8; 34];
        bytes[23] = 17;
        let view = Ipv4View::parse(&SliceFrame::new(&bytes)).unwrap();
        assert_eq!(view.transport(), Transport::Udp);

        assert_eq!(Ipv4View::parse(&SliceFrame::new(&bytes[..33])), None);
    }

    #[test]
    fn test_transport_presence() {
        let bytes = [0u8; 42];
        let frame = SliceFrame::new(&bytes);
        assert!(Transport::Udp.is_present(&frame));
        assert!(!Transport::Tcp.is_present(&frame));
        assert!(Transport::Other(47).is_present(&frame));
    }
}
