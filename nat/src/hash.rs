// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Bucket selection for the translation and index tables
//!
//! Both hashes XOR the 16-bit halves of their inputs together and mask the result with
//! `size - 1`. Bucket 0 is reserved, so a masked value of 0 selects bucket `size`: buckets are
//! numbered `1..=size` and stored at row `bucket - 1`.

use crate::hw::HwVersion;

#[allow(clippy::cast_possible_truncation)]
fn fold_ip(ip: u32) -> u16 {
    (ip as u16) ^ ((ip >> 16) as u16)
}

fn bucket(hash: u16, size: u16) -> u16 {
    debug_assert!(size.is_power_of_two() && size >= 2);
    match hash & (size - 1) {
        0 => size,
        bucket => bucket,
    }
}

/// Bucket of a rule in the base translation table, keyed on the destination side of the
/// connection. From IPA v4.0 on, the hardware also mixes the public address in.
#[must_use]
pub fn dst_hash(
    public_ip: u32,
    target_ip: u32,
    target_port: u16,
    public_port: u16,
    protocol: u8,
    size: u16,
    version: HwVersion,
) -> u16 {
    let mut hash = fold_ip(target_ip) ^ target_port ^ public_port ^ u16::from(protocol);
    if version >= HwVersion::V4_0 {
        hash ^= fold_ip(public_ip);
    }
    bucket(hash, size)
}

/// Bucket of a rule in the index table, keyed on the source side of the connection.
#[must_use]
pub fn src_hash(
    private_ip: u32,
    private_port: u16,
    target_ip: u32,
    target_port: u16,
    protocol: u8,
    size: u16,
) -> u16 {
    let hash = fold_ip(private_ip)
        ^ private_port
        ^ fold_ip(target_ip)
        ^ target_port
        ^ u16::from(protocol);
    bucket(hash, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_maps_to_size() {
        // all terms cancel out
        assert_eq!(dst_hash(0, 0x0050_0050, 0, 0, 0, 8, HwVersion::V3_5_1), 8);
        assert_eq!(src_hash(0x1234_1234, 0, 0, 0, 0, 16), 16);
        assert_eq!(src_hash(0, 0, 0, 0, 3, 16), 3);
    }

    #[test]
    fn public_ip_only_counts_from_v4() {
        let hash = |version| dst_hash(0x0a00_0001, 0x0808_0808, 80, 40000, 6, 1024, version);
        assert_eq!(hash(HwVersion::V3_5_1), (80 ^ 40000 ^ 6) & 1023);
        assert_eq!(hash(HwVersion::V4_0), (80 ^ 40000 ^ 6 ^ 0x0a01) & 1023);
    }

    #[test]
    fn hashes_in_range() {
        bolero::check!().with_type().for_each(
            |(exp, a, b, p1, p2, proto, v4): &(u8, u32, u32, u16, u16, u8, bool)| {
                let size = 2u16 << (exp % 15);
                let version = if *v4 {
                    HwVersion::V4_0
                } else {
                    HwVersion::V3_5_1
                };
                let dst = dst_hash(*a, *b, *p1, *p2, *proto, size, version);
                assert!((1..=size).contains(&dst));
                let src = src_hash(*a, *p1, *b, *p2, *proto, size);
                assert!((1..=size).contains(&src));
            },
        );
    }
}
