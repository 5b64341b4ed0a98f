//! Router address discovery.
//!
//! The router is assumed to be the default gateway. Only gateways in private
//! IPv4 ranges are considered so a VPN or tethered uplink is not mistaken for
//! the device being configured.

use std::net::Ipv4Addr;

use tracing::debug;

/// Linux IPv4 routing table.
pub const ROUTE_TABLE_PATH: &str = "/proc/net/route";

/// One row of the IPv4 routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub interface: String,
    pub destination: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub mask: Ipv4Addr,
}

impl Route {
    pub fn is_default(&self) -> bool {
        self.destination.is_unspecified() && self.mask.is_unspecified()
    }
}

/// Parses `/proc/net/route` text. Rows that do not parse are skipped.
///
/// Addresses are hex-encoded 32-bit values in host byte order.
pub fn parse_route_table(text: &str) -> Vec<Route> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 8 {
                return None;
            }
            Some(Route {
                interface: fields[0].to_string(),
                destination: parse_hex_addr(fields[1])?,
                gateway: parse_hex_addr(fields[2])?,
                mask: parse_hex_addr(fields[7])?,
            })
        })
        .collect()
}

fn parse_hex_addr(field: &str) -> Option<Ipv4Addr> {
    let raw = u32::from_str_radix(field, 16).ok()?;
    Some(Ipv4Addr::from(raw.to_ne_bytes()))
}

/// Returns `true` for 10/8, 172.16/12 and 192.168/16.
pub fn is_private_address(address: Ipv4Addr) -> bool {
    address.is_private()
}

/// First default route whose gateway is a private address.
pub fn private_default_gateway(routes: &[Route]) -> Option<Ipv4Addr> {
    routes
        .iter()
        .filter(|route| route.is_default())
        .map(|route| route.gateway)
        .find(|gateway| is_private_address(*gateway))
}

/// Detects the router address from the host routing table.
///
/// Returns `None` when the table is unavailable on this platform or has no
/// private default gateway.
pub fn detect_router_address() -> Option<Ipv4Addr> {
    let text = match std::fs::read_to_string(ROUTE_TABLE_PATH) {
        Ok(text) => text,
        Err(e) => {
            debug!(path = ROUTE_TABLE_PATH, error = %e, "routing table unavailable");
            return None;
        }
    };
    let gateway = private_default_gateway(&parse_route_table(&text));
    debug!(gateway = ?gateway, "gateway detection finished");
    gateway
}
