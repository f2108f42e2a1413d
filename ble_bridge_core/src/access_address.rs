//! Random LL access address generation (spec §4.4).

use crate::frame::ADVERTISING_ACCESS_ADDRESS;
use rand::Rng;

/// Draws a 32-bit access address by rejection sampling until it satisfies
/// all of the validity constraints in spec §4.4:
///
/// - not equal to the advertising access address
/// - not all-zero and not all-one
/// - at least two bit transitions among the most-significant 6 bits
pub fn generate(rng: &mut impl Rng) -> u32 {
    loop {
        let candidate: u32 = rng.gen();
        if is_valid(candidate) {
            return candidate;
        }
    }
}

pub fn is_valid(candidate: u32) -> bool {
    if candidate == ADVERTISING_ACCESS_ADDRESS || candidate == 0 || candidate == u32::MAX {
        return false;
    }
    let msb6 = (candidate >> 26) & 0x3F;
    (msb6 ^ (msb6 >> 1)).count_ones() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn rejects_advertising_access_address() {
        assert!(!is_valid(ADVERTISING_ACCESS_ADDRESS));
    }

    #[test]
    fn rejects_all_zero_and_all_one() {
        assert!(!is_valid(0x0000_0000));
        assert!(!is_valid(0xFFFF_FFFF));
    }

    #[test]
    fn rejects_too_few_msb6_transitions() {
        // msb6 = 000000 -> zero transitions.
        assert!(!is_valid(0x0000_0001));
    }

    #[test]
    fn accepts_value_with_enough_transitions() {
        // msb6 = 101010 -> transitions at every boundary.
        let candidate = 0b101010u32 << 26;
        assert!(is_valid(candidate));
    }

    #[test]
    fn generated_addresses_always_satisfy_invariants() {
        let mut rng = thread_rng();
        for _ in 0..1000 {
            let aa = generate(&mut rng);
            assert!(is_valid(aa));
            assert_ne!(aa, ADVERTISING_ACCESS_ADDRESS);
            assert_ne!(aa, 0);
            assert_ne!(aa, u32::MAX);
        }
    }
}
