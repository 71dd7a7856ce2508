//! IPv4 allowlist matching: exact addresses or CIDR ranges (spec §4.4 step 2).

/// Parse a dotted-quad IPv4 address into a big-endian `u32`.
fn parse_ipv4(addr: &str) -> Option<u32> {
    let mut octets = [0u8; 4];
    let mut parts = addr.split('.');
    for octet in &mut octets {
        *octet = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(u32::from_be_bytes(octets))
}

/// Whether `client_ip` matches `entry`, which is either an exact IPv4
/// address or a CIDR range `a.b.c.d/p` with `p` in `[0, 32]`.
///
/// Malformed entries never match; they are not errors, just duds (an admin
/// typo should not make the allowlist vacuously permissive or crash the
/// evaluator).
#[must_use]
pub fn matches(entry: &str, client_ip: &str) -> bool {
    let Some(client) = parse_ipv4(client_ip) else {
        return false;
    };

    match entry.split_once('/') {
        Some((network, prefix_str)) => {
            let Some(network) = parse_ipv4(network) else {
                return false;
            };
            let Ok(prefix) = prefix_str.parse::<u32>() else {
                return false;
            };
            if prefix > 32 {
                return false;
            }
            let mask: u32 = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
            (client & mask) == (network & mask)
        }
        None => parse_ipv4(entry).is_some_and(|exact| exact == client),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(matches("10.0.0.1", "10.0.0.1"));
        assert!(!matches("10.0.0.1", "10.0.0.2"));
    }

    #[test]
    fn cidr_range_match() {
        assert!(matches("10.0.0.0/24", "10.0.0.200"));
        assert!(!matches("10.0.0.0/24", "10.0.1.1"));
    }

    #[test]
    fn prefix_zero_matches_everything() {
        assert!(matches("0.0.0.0/0", "8.8.8.8"));
    }

    #[test]
    fn prefix_32_is_exact() {
        assert!(matches("10.0.0.1/32", "10.0.0.1"));
        assert!(!matches("10.0.0.1/32", "10.0.0.2"));
    }

    #[test]
    fn malformed_entry_never_matches() {
        assert!(!matches("not-an-ip", "10.0.0.1"));
        assert!(!matches("10.0.0.0/99", "10.0.0.1"));
        assert!(!matches("10.0.0.0/abc", "10.0.0.1"));
    }

    #[test]
    fn malformed_client_ip_never_matches() {
        assert!(!matches("10.0.0.0/24", "not-an-ip"));
    }
}
