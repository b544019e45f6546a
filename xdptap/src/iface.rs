use anyhow::Context as _;
use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::process::Command;

/// XDP attachment state of one interface, as reported by `ip link show`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XdpStatus {
    Detached,
    Attached { prog_id: Option<u32> },
}

/// Interprets the output of `ip link show <iface>`.
///
/// iproute2 prints an `xdp`/`xdpgeneric`/`xdpdrv`/`xdpoffload` attribute on
/// the link line and a `prog/xdp id N` line when a program is attached.
pub fn parse_xdp_status(output: &str) -> XdpStatus {
    let prog_id = output
        .split("prog/xdp id ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|id| id.parse().ok());

    let attached = prog_id.is_some()
        || output.split_whitespace().any(|word| {
            matches!(word, "xdp" | "xdpgeneric" | "xdpdrv" | "xdpoffload" | "xdpmulti")
        });

    if attached {
        XdpStatus::Attached { prog_id }
    } else {
        XdpStatus::Detached
    }
}

pub fn xdp_status(iface: &str) -> anyhow::Result<XdpStatus> {
    let output = Command::new("ip")
        .args(["link", "show", iface])
        .output()
        .context("failed to run `ip link show`")?;
    anyhow::ensure!(
        output.status.success(),
        "`ip link show {}` failed: {}",
        iface,
        String::from_utf8_lossy(&output.stderr).trim()
    );
    Ok(parse_xdp_status(&String::from_utf8_lossy(&output.stdout)))
}

pub fn print_status(iface: &str) -> anyhow::Result<()> {
    match xdp_status(iface)? {
        XdpStatus::Attached { prog_id: Some(id) } => {
            println!("An XDP program is attached to {iface} (program id {id})");
        }
        XdpStatus::Attached { prog_id: None } => {
            println!("An XDP program is attached to {iface} (program id unknown)");
        }
        XdpStatus::Detached => println!("No XDP program is attached to {iface}"),
    }
    Ok(())
}

/// One line group of the `interfaces` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSummary {
    pub name: String,
    pub index: u32,
    pub mtu: Option<u32>,
    pub mac: Option<String>,
    pub up: bool,
    pub addrs: Vec<IpAddr>,
}

impl fmt::Display for InterfaceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addrs: Vec<String> = self.addrs.iter().map(IpAddr::to_string).collect();
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "   Index: {}", self.index)?;
        match self.mtu {
            Some(mtu) => writeln!(f, "   MTU: {mtu}")?,
            None => writeln!(f, "   MTU: -")?,
        }
        writeln!(f, "   HardwareAddr: {}", self.mac.as_deref().unwrap_or("-"))?;
        writeln!(f, "   Status: {}", if self.up { "up" } else { "down" })?;
        writeln!(f, "   IPs: {}", addrs.join(", "))
    }
}

/// Parses the contents of `/sys/class/net/<iface>/mtu`.
pub fn parse_mtu(contents: &str) -> Option<u32> {
    contents.trim().parse().ok()
}

fn read_mtu(iface: &str) -> Option<u32> {
    let path = Path::new("/sys/class/net").join(iface).join("mtu");
    match fs::read_to_string(&path) {
        Ok(contents) => parse_mtu(&contents),
        Err(e) => {
            tracing::debug!("Could not read {}: {}", path.display(), e);
            None
        }
    }
}

/// Names of the interfaces with `IFF_UP` set.
fn up_interfaces() -> anyhow::Result<HashSet<String>> {
    let addrs = getifaddrs().context("getifaddrs failed")?;
    Ok(addrs
        .filter(|addr| addr.flags.contains(InterfaceFlags::IFF_UP))
        .map(|addr| addr.interface_name)
        .collect())
}

pub fn interface_summaries() -> anyhow::Result<Vec<InterfaceSummary>> {
    let interfaces = NetworkInterface::show().context("failed to list network interfaces")?;
    let up = up_interfaces()?;

    // network-interface yields one entry per address family; fold them by name
    let mut summaries: Vec<InterfaceSummary> = Vec::new();
    for iface in interfaces {
        let ips = iface.addr.iter().map(|addr| addr.ip());
        if let Some(existing) = summaries.iter_mut().find(|s| s.name == iface.name) {
            existing.addrs.extend(ips);
            if existing.mac.is_none() {
                existing.mac = iface.mac_addr;
            }
            continue;
        }
        summaries.push(InterfaceSummary {
            mtu: read_mtu(&iface.name),
            up: up.contains(&iface.name),
            index: iface.index,
            mac: iface.mac_addr,
            addrs: ips.collect(),
            name: iface.name,
        });
    }
    summaries.sort_by_key(|s| s.index);
    Ok(summaries)
}

pub fn print_interfaces() -> anyhow::Result<()> {
    println!("Available network interfaces:");
    for summary in interface_summaries()? {
        println!("{summary}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attached_generic() {
        let output = "2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 xdpgeneric qdisc fq_codel state UP mode DEFAULT group default qlen 1000\n    link/ether 52:54:00:12:34:56 brd ff:ff:ff:ff:ff:ff\n    prog/xdp id 87 tag 3b185187f1855c4c jited \n";
        assert_eq!(
            parse_xdp_status(output),
            XdpStatus::Attached { prog_id: Some(87) }
        );
    }

    #[test]
    fn test_parse_attached_without_id() {
        let output = "3: ens5: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 xdp qdisc mq state UP\n";
        assert_eq!(
            parse_xdp_status(output),
            XdpStatus::Attached { prog_id: None }
        );
    }

    #[test]
    fn test_parse_detached() {
        let output = "4: xdpbr0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP\n    link/ether 02:42:ac:11:00:02 brd ff:ff:ff:ff:ff:ff\n";
        assert_eq!(parse_xdp_status(output), XdpStatus::Detached);
    }

    #[test]
    fn test_parse_mtu() {
        assert_eq!(parse_mtu("1500\n"), Some(1500));
        assert_eq!(parse_mtu(" 9000 "), Some(9000));
        assert_eq!(parse_mtu(""), None);
        assert_eq!(parse_mtu("jumbo"), None);
    }

    #[test]
    fn test_summary_lists_mtu_and_status() {
        let summary = InterfaceSummary {
            name: "eth0".to_string(),
            index: 2,
            mtu: Some(1500),
            mac: Some("52:54:00:12:34:56".to_string()),
            up: true,
            addrs: vec!["10.0.0.2".parse().unwrap(), "fe80::1".parse().unwrap()],
        };
        assert_eq!(
            summary.to_string(),
            "Name: eth0\n   Index: 2\n   MTU: 1500\n   HardwareAddr: 52:54:00:12:34:56\n   Status: up\n   IPs: 10.0.0.2, fe80::1\n"
        );
    }

    #[test]
    fn test_summary_of_down_interface_without_details() {
        let summary = InterfaceSummary {
            name: "dummy0".to_string(),
            index: 7,
            mtu: None,
            mac: None,
            up: false,
            addrs: Vec::new(),
        };
        let text = summary.to_string();
        assert!(text.contains("   MTU: -\n"));
        assert!(text.contains("   HardwareAddr: -\n"));
        assert!(text.contains("   Status: down\n"));
        assert!(text.ends_with("   IPs: \n"));
    }
}
