// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Incremental checksum adjustments
//!
//! When the coprocessor rewrites a private address and port into a public one, it patches the
//! IP and TCP/UDP checksums with a precomputed ones'-complement difference instead of
//! recomputing them. The difference is accumulated 16 bits at a time with the end-around carry
//! folded after every addition; the fold order is part of the hardware contract.

use std::fmt::Display;

/// A 16-bit ones'-complement checksum difference.
///
/// Ones'-complement arithmetic has two zeroes, `0x0000` and `0xffff`; [`ChecksumDelta::is_zero`]
/// and [`ChecksumDelta::equivalent`] account for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChecksumDelta(u16);

impl ChecksumDelta {
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn negate(self) -> Self {
        Self(!self.0)
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0 || self.0 == 0xffff
    }

    /// Whether both deltas denote the same ones'-complement value.
    #[must_use]
    pub const fn equivalent(self, other: Self) -> bool {
        self.0 % 0xffff == other.0 % 0xffff
    }
}

impl Display for ChecksumDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

struct Accumulator(u32);

impl Accumulator {
    fn add(mut self, value: u16) -> Self {
        self.0 += u32::from(value);
        self
    }

    fn add_folded(self, value: u16) -> Self {
        let mut acc = self.add(value);
        if acc.0 >> 16 != 0 {
            acc.0 = (acc.0 & 0xffff) + 1;
        }
        acc
    }

    #[allow(clippy::cast_possible_truncation)]
    fn finish(self) -> ChecksumDelta {
        ChecksumDelta(self.0 as u16)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn halves(value: u32) -> (u16, u16) {
    (value as u16, (value >> 16) as u16)
}

/// IP header checksum difference for rewriting `private_ip` into `public_ip`.
#[must_use]
pub fn ip_checksum_delta(public_ip: u32, private_ip: u32) -> ChecksumDelta {
    let (pub_lo, pub_hi) = halves(public_ip);
    let (priv_lo, priv_hi) = halves(!private_ip);
    Accumulator(0)
        .add(pub_lo)
        .add_folded(pub_hi)
        .add_folded(priv_lo)
        .add_folded(priv_hi)
        .finish()
}

/// TCP/UDP checksum difference for rewriting `private_ip:private_port` into
/// `public_ip:public_port`. Covers the pseudo-header address and the port.
#[must_use]
pub fn tcp_udp_checksum_delta(
    public_ip: u32,
    public_port: u16,
    private_ip: u32,
    private_port: u16,
) -> ChecksumDelta {
    let (pub_lo, pub_hi) = halves(public_ip);
    let (priv_lo, priv_hi) = halves(!private_ip);
    Accumulator(0)
        .add(pub_lo)
        .add_folded(pub_hi)
        .add_folded(public_port)
        .add_folded(priv_lo)
        .add_folded(priv_hi)
        .add_folded(!private_port)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_deltas() {
        // 10.0.0.1 - 192.168.0.1
        let delta = ip_checksum_delta(0x0a00_0001, 0xc0a8_0001);
        // 0x0001 + 0x0a00 = 0x0a01; + 0xfffe = 0x109ff -> 0x0a00; + 0x3f57 = 0x4957
        assert_eq!(delta.as_u16(), 0x4957);

        let delta = tcp_udp_checksum_delta(0x0a00_0001, 40000, 0xc0a8_0001, 1234);
        let expected = {
            let mut sum = 0x0a01_u32 + 40000;
            sum = (sum & 0xffff) + (sum >> 16);
            sum += 0xfffe;
            sum = (sum & 0xffff) + (sum >> 16);
            sum += 0x3f57;
            sum = (sum & 0xffff) + (sum >> 16);
            sum += 0xfb2d;
            sum = (sum & 0xffff) + (sum >> 16);
            sum
        };
        assert_eq!(u32::from(delta.as_u16()), expected);
    }

    #[test]
    fn same_address_is_zero() {
        bolero::check!().with_type().for_each(|(ip, port): &(u32, u16)| {
            assert!(ip_checksum_delta(*ip, *ip).is_zero());
            assert!(tcp_udp_checksum_delta(*ip, *port, *ip, *port).is_zero());
        });
    }

    #[test]
    fn delta_is_antisymmetric() {
        bolero::check!()
            .with_type()
            .for_each(|(a, b, pa, pb): &(u32, u32, u16, u16)| {
                let forward = ip_checksum_delta(*a, *b);
                let backward = ip_checksum_delta(*b, *a);
                assert!(forward.equivalent(backward.negate()));

                let forward = tcp_udp_checksum_delta(*a, *pa, *b, *pb);
                let backward = tcp_udp_checksum_delta(*b, *pb, *a, *pa);
                assert!(forward.equivalent(backward.negate()));
            });
    }

    #[test]
    fn zero_equivalence() {
        assert!(ChecksumDelta::new(0).equivalent(ChecksumDelta::new(0xffff)));
        assert!(!ChecksumDelta::new(1).equivalent(ChecksumDelta::new(0xffff)));
        assert_eq!(ChecksumDelta::new(0x1234).to_string(), "0x1234");
    }
}
