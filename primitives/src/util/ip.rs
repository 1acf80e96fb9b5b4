use std::net::Ipv4Addr;

/// Converts a dotted quad into its big-endian integer value.
///
/// Anything that is not a valid IPv4 address yields `0`.
pub fn ip_to_i64(ip: &str) -> i64 {
    ip.trim()
        .parse::<Ipv4Addr>()
        .map(|addr| i64::from(u32::from(addr)))
        .unwrap_or_default()
}
