//! Address and CIDR text parser.
//!
//! Recognition is a single forward pass over the input that classifies the
//! family and records two marks: where the bare address ends and where the
//! optional prefix digits start. Conversion of the bare address to binary is
//! left to the standard library parsers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::Address;
use crate::error::{Error, Result};
use crate::Family;

/// Longest possible address text: six hextets plus an embedded dotted quad.
pub(crate) const MAX_ADDR_LEN: usize = 45;

/// Marks recorded while recognizing an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Marks {
    family: Family,
    /// End of the bare address
    addr_end: usize,
    /// Start of the prefix digits, after the slash
    prefix_start: Option<usize>,
}

/// Parse `addr` or `addr/prefix` into an [`Address`].
pub(crate) fn parse(input: &str) -> Result<Address> {
    let marks = scan(input.as_bytes()).ok_or_else(|| Error::parse(input, "malformed address"))?;

    if marks.addr_end > MAX_ADDR_LEN {
        return Err(Error::parse(input, "address too long"));
    }

    let bare = &input[..marks.addr_end];
    let ip = match marks.family {
        Family::Ipv4 => bare.parse::<Ipv4Addr>().map(IpAddr::V4),
        Family::Ipv6 => bare.parse::<Ipv6Addr>().map(IpAddr::V6),
    }
    .map_err(|_| Error::parse(input, "malformed address"))?;

    let prefix_len = match marks.prefix_start {
        Some(start) => {
            let bits: u16 = input[start..]
                .parse()
                .map_err(|_| Error::parse(input, "malformed prefix length"))?;
            if bits > u16::from(marks.family.bits()) {
                return Err(Error::parse(input, "prefix length out of range"));
            }
            bits as u8
        }
        None => marks.family.bits(),
    };

    Ok(Address::from_parts(ip, prefix_len))
}

/// Recognize a complete input, including the optional prefix.
fn scan(input: &[u8]) -> Option<Marks> {
    let (family, addr_end) = match scan_ipv4(input, 0) {
        Some(end) => (Family::Ipv4, end),
        None => (Family::Ipv6, scan_ipv6(input)?),
    };

    let prefix_start = match input.get(addr_end) {
        None => None,
        Some(b'/') => {
            let digits = &input[addr_end + 1..];
            if !(1..=3).contains(&digits.len()) || !digits.iter().all(u8::is_ascii_digit) {
                return None;
            }
            Some(addr_end + 1)
        }
        Some(_) => return None,
    };

    Some(Marks {
        family,
        addr_end,
        prefix_start,
    })
}

/// Recognize a dotted quad starting at `start`, returning its end.
fn scan_ipv4(input: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;
    for octet in 0..4 {
        if octet > 0 {
            if input.get(pos) != Some(&b'.') {
                return None;
            }
            pos += 1;
        }
        pos = scan_dec_octet(input, pos)?;
    }
    Some(pos)
}

/// 0-255 with no leading zeros.
fn scan_dec_octet(input: &[u8], start: usize) -> Option<usize> {
    let len = input[start.min(input.len())..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let digits = &input[start..start + len];
    let valid = match digits {
        [_] => true,
        [b'1'..=b'9', _] => true,
        [b'1', _, _] => true,
        [b'2', b'0'..=b'4', _] => true,
        [b'2', b'5', b'0'..=b'5'] => true,
        _ => false,
    };
    valid.then_some(start + len)
}

/// Recognize RFC 3986 IPv6 text at the start of `input`, returning its end.
fn scan_ipv6(input: &[u8]) -> Option<usize> {
    let at_end = |pos: usize| matches!(input.get(pos), None | Some(b'/'));

    let mut pos = 0;
    let mut units = 0;
    let mut elided = false;

    if input.starts_with(b"::") {
        elided = true;
        pos = 2;
        if at_end(pos) {
            return Some(pos);
        }
    }

    loop {
        let run = input[pos..]
            .iter()
            .take_while(|b| b.is_ascii_hexdigit())
            .count();

        // A dotted quad is only allowed as the trailing 32 bits
        if input.get(pos + run) == Some(&b'.') {
            pos = scan_ipv4(input, pos)?;
            units += 2;
            break;
        }

        if run == 0 || run > 4 {
            return None;
        }
        pos += run;
        units += 1;

        if units > 8 || input.get(pos) != Some(&b':') {
            break;
        }
        if input.get(pos + 1) == Some(&b':') {
            if elided {
                return None;
            }
            elided = true;
            pos += 2;
            if at_end(pos) {
                break;
            }
        } else {
            pos += 1;
        }
    }

    let complete = if elided { units <= 7 } else { units == 8 };
    complete.then_some(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks(s: &str) -> Option<(Family, usize, Option<usize>)> {
        scan(s.as_bytes()).map(|m| (m.family, m.addr_end, m.prefix_start))
    }

    #[test]
    fn test_scan_ipv4_marks() {
        assert_eq!(marks("10.0.0.1"), Some((Family::Ipv4, 8, None)));
        assert_eq!(marks("10.0.0.0/8"), Some((Family::Ipv4, 8, Some(9))));
        assert_eq!(marks("255.255.255.255/032"), Some((Family::Ipv4, 15, Some(16))));
    }

    #[test]
    fn test_scan_ipv6_marks() {
        assert_eq!(marks("::"), Some((Family::Ipv6, 2, None)));
        assert_eq!(marks("::/0"), Some((Family::Ipv6, 2, Some(3))));
        assert_eq!(marks("2001:db8::/32"), Some((Family::Ipv6, 10, Some(11))));
        assert_eq!(marks("1:2:3:4:5:6:7:8"), Some((Family::Ipv6, 15, None)));
        assert_eq!(marks("1:2:3:4:5:6:7::"), Some((Family::Ipv6, 15, None)));
        assert_eq!(marks("::ffff:1.2.3.4/128"), Some((Family::Ipv6, 14, Some(15))));
        assert_eq!(marks("1:2:3:4:5:6:1.2.3.4"), Some((Family::Ipv6, 19, None)));
        assert_eq!(marks("fe80::1:2"), Some((Family::Ipv6, 9, None)));
    }

    #[test]
    fn test_scan_rejects_malformed_ipv4() {
        for s in [
            "", "1.2.3", "1.2.3.4.5", "01.2.3.4", "1.2.3.256", "999.1.1.1", "1.2.3.4/",
            "1.2.3.4/1234", "1.2.3.4/a", "1.2.3.4 ", " 1.2.3.4", "1..2.3", "1.2.3.4x",
        ] {
            assert_eq!(marks(s), None, "{:?} should not scan", s);
        }
    }

    #[test]
    fn test_scan_rejects_malformed_ipv6() {
        for s in [
            ":", ":::", "1::2::3", "1:2:3:4:5:6:7", "1:2:3:4:5:6:7:8:9", "1:2:3:4:5:6:7::8",
            "12345::", ":1::", "1:", "g::1", "::1.2.3", "1.2.3.4::", "::1.2.3.4:5",
            "1:2:3:4:5:6:7:1.2.3.4", "::ffff:01.2.3.4", "fe80::1%eth0",
        ] {
            assert_eq!(marks(s), None, "{:?} should not scan", s);
        }
    }

    #[test]
    fn test_parse_defaults_to_host_prefix() {
        assert_eq!(parse("192.0.2.1").unwrap().prefix_len(), 32);
        assert_eq!(parse("2001:db8::1").unwrap().prefix_len(), 128);
    }

    #[test]
    fn test_parse_prefix_range() {
        assert_eq!(parse("10.0.0.0/0").unwrap().prefix_len(), 0);
        assert_eq!(parse("10.0.0.0/32").unwrap().prefix_len(), 32);
        assert!(parse("10.0.0.0/33").is_err());
        assert_eq!(parse("2001:db8::/128").unwrap().prefix_len(), 128);
        assert!(parse("2001:db8::/129").is_err());
        assert!(parse("2001:db8::/999").is_err());
    }

    #[test]
    fn test_parse_error_carries_input() {
        match parse("not-an-ip") {
            Err(Error::Parse { input, .. }) => assert_eq!(input, "not-an-ip"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_longest_address_fits() {
        let longest = "ffff:ffff:ffff:ffff:ffff:ffff:255.255.255.255";
        assert_eq!(longest.len(), MAX_ADDR_LEN);
        assert!(parse(longest).is_ok());
    }
}
