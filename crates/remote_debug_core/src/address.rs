//! Target address-space locations.
//!
//! An [`Address`] is an opaque 64-bit location in the target, never a local
//! pointer. The zero bit pattern is not representable: every operation that
//! would produce it yields `None` instead, so "no address" is always spelled
//! `Option<Address>`.

use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroU64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    value: NonZeroU64,
}

impl Address {
    /// Wraps a raw bit pattern. Zero maps to `None`.
    pub fn new(value: u64) -> Option<Self> {
        NonZeroU64::new(value).map(|value| Self { value })
    }

    pub fn from_raw_value(value: i64) -> Option<Self> {
        Self::new(value as u64)
    }

    /// The signed bit pattern, as carried by the RPC layer.
    pub fn as_raw_value(&self) -> i64 {
        self.value.get() as i64
    }

    pub fn as_u64(&self) -> u64 {
        self.value.get()
    }

    pub fn add_offset(&self, delta: i64) -> Option<Self> {
        Self::new(self.as_u64().wrapping_add_signed(delta))
    }

    /// Pointer distance. Wraps on overflow.
    pub fn minus(&self, other: &Address) -> i64 {
        self.as_u64().wrapping_sub(other.as_u64()) as i64
    }

    pub fn and_with_mask(&self, mask: u64) -> Option<Self> {
        Self::new(self.as_u64() & mask)
    }

    pub fn or_with_mask(&self, mask: u64) -> Option<Self> {
        Self::new(self.as_u64() | mask)
    }

    pub fn xor_with_mask(&self, mask: u64) -> Option<Self> {
        Self::new(self.as_u64() ^ mask)
    }

    /// An alignment of zero never matches.
    pub fn is_aligned(&self, alignment: u64) -> bool {
        alignment != 0 && self.as_u64() % alignment == 0
    }

    /// `alignment` must be a power of two; anything else yields `None`.
    pub fn align_down(&self, alignment: u64) -> Option<Self> {
        if !alignment.is_power_of_two() {
            return None;
        }
        self.and_with_mask(!(alignment - 1))
    }

    // The relational methods below keep the reference truth table for a
    // missing right-hand side: lt/lte answer false, gt/gte answer true.

    pub fn less_than(&self, other: Option<&Address>) -> bool {
        match other {
            Some(other) => self < other,
            None => false,
        }
    }

    pub fn less_than_or_equal(&self, other: Option<&Address>) -> bool {
        match other {
            Some(other) => self <= other,
            None => false,
        }
    }

    pub fn greater_than(&self, other: Option<&Address>) -> bool {
        match other {
            Some(other) => self > other,
            None => true,
        }
    }

    pub fn greater_than_or_equal(&self, other: Option<&Address>) -> bool {
        match other {
            Some(other) => self >= other,
            None => true,
        }
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_u64().cmp(&other.as_u64())
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.as_u64())
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.as_u64(), f)
    }
}

impl From<Address> for u64 {
    fn from(addr: Address) -> Self {
        addr.as_u64()
    }
}

/// Raw value of an optional address, zero standing in for `None`.
pub fn raw_or_zero(address: Option<&Address>) -> u64 {
    address.map(Address::as_u64).unwrap_or(0)
}

/// Unsigned `a < b` where either side may be absent.
pub fn lt(a: Option<&Address>, b: Option<&Address>) -> bool {
    match (a, b) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(a), Some(b)) => a.less_than(Some(b)),
    }
}

pub fn lte(a: Option<&Address>, b: Option<&Address>) -> bool {
    match (a, b) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(a), Some(b)) => a.less_than_or_equal(Some(b)),
    }
}

pub fn gt(a: Option<&Address>, b: Option<&Address>) -> bool {
    match (a, b) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(a), Some(b)) => a.greater_than(Some(b)),
    }
}

pub fn gte(a: Option<&Address>, b: Option<&Address>) -> bool {
    match (a, b) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(a), Some(b)) => a.greater_than_or_equal(Some(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(value: u64) -> Address {
        Address::new(value).unwrap()
    }

    #[test]
    fn ordering_across_the_sign_boundary() {
        let base = addr(0x7FFF_FFFF_FFFF_FFF0);
        let addrs: Vec<Address> = [0x0, 0x10, 0x20, 0x30]
            .iter()
            .map(|off| base.add_offset(*off).unwrap())
            .collect();

        assert!(addrs[0].as_raw_value() > 0);
        assert!(addrs[1..].iter().all(|a| a.as_raw_value() < 0));

        for (i, a) in addrs.iter().enumerate() {
            assert!(!a.less_than(Some(a)));
            assert!(a.less_than_or_equal(Some(a)));
            assert!(a.greater_than_or_equal(Some(a)));
            assert!(!a.greater_than(Some(a)));

            for (j, b) in addrs.iter().enumerate() {
                assert_eq!(a.less_than(Some(b)), i < j, "{a} < {b}");
                assert_eq!(a.less_than_or_equal(Some(b)), i <= j, "{a} <= {b}");
                assert_eq!(a.greater_than(Some(b)), i > j, "{a} > {b}");
                assert_eq!(a.greater_than_or_equal(Some(b)), i >= j, "{a} >= {b}");
            }
        }

        for a in &addrs {
            for b in &addrs {
                for c in &addrs {
                    if a.less_than(Some(b)) && b.less_than(Some(c)) {
                        assert!(a.less_than(Some(c)));
                    }
                }
            }
        }
    }

    #[test]
    fn absent_right_hand_side_truth_table() {
        let a = addr(0x1000);
        assert!(!a.less_than(None));
        assert!(!a.less_than_or_equal(None));
        assert!(a.greater_than(None));
        assert!(a.greater_than_or_equal(None));
    }

    #[test]
    fn free_functions_treat_absent_as_lowest() {
        let a = addr(0xFFFF_FFFF_0000_0000);

        assert!(lt(None, Some(&a)));
        assert!(lte(None, Some(&a)));
        assert!(!gt(None, Some(&a)));
        assert!(!gte(None, Some(&a)));

        assert!(!lt(None, None));
        assert!(lte(None, None));
        assert!(!gt(None, None));
        assert!(gte(None, None));

        assert!(!lt(Some(&a), None));
        assert!(gt(Some(&a), None));
    }

    #[test]
    fn arithmetic_yielding_zero_is_absent() {
        let a = addr(0x10);
        assert_eq!(a.add_offset(-0x10), None);
        assert_eq!(a.and_with_mask(0x0F), None);
        assert_eq!(a.xor_with_mask(0x10), None);
        assert_eq!(addr(u64::MAX).add_offset(1), None);

        assert_eq!(a.add_offset(8), Address::new(0x18));
        assert_eq!(a.or_with_mask(0x1), Address::new(0x11));
    }

    #[test]
    fn minus_wraps() {
        let low = addr(0x10);
        let high = addr(0xFFFF_FFFF_FFFF_FFF0);
        assert_eq!(high.minus(&low), -0x20);
        assert_eq!(low.minus(&high), 0x20);
        assert_eq!(addr(0x30).minus(&low), 0x20);
    }

    #[test]
    fn display_is_zero_padded_hex() {
        assert_eq!(addr(0xdead).to_string(), "0x000000000000dead");
        assert_eq!(format!("{:x}", addr(0xdead)), "dead");
    }

    #[test]
    fn alignment_helpers() {
        let a = addr(0x1234);
        assert!(a.is_aligned(4));
        assert!(!a.is_aligned(8));
        assert_eq!(a.align_down(0x1000), Address::new(0x1000));
        assert_eq!(addr(0x10).align_down(0x1000), None);
    }

    #[test]
    fn degenerate_alignments() {
        let a = addr(0x1234);
        assert!(!a.is_aligned(0));
        assert_eq!(a.align_down(0), None);
        assert_eq!(a.align_down(3), None);
        assert_eq!(a.align_down(1), Some(a));
    }
}
