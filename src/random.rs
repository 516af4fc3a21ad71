// Randomness for serial numbers, stream keys and secrets, all from the
// thread-local CSPRNG.

use num::{BigUint, Zero};
use rand::RngCore;
use zeroize::Zeroizing;

pub const SERIAL_BYTES: usize = 20;

// A positive, non-zero 160-bit certificate serial number.
pub fn serial_number() -> BigUint {
    serial_number_from(&mut rand::rng())
}

pub fn serial_number_from<R: RngCore + ?Sized>(rng: &mut R) -> BigUint {
    let mut buf = [0u8; SERIAL_BYTES];
    loop {
        rng.fill_bytes(&mut buf);
        let serial = BigUint::from_bytes_be(&buf);
        if !serial.is_zero() {
            return serial;
        }
    }
}

pub fn random_bytes(len: usize) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(vec![0u8; len]);
    rand::rng().fill_bytes(&mut out);
    out
}

// len random bytes, hex encoded.
pub fn random_hex(len: usize) -> Zeroizing<String> {
    Zeroizing::new(hex::encode(random_bytes(len).as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Yields all-zero output for the first `zeros` fills, then the constant.
    struct ConstRngCore {
        c: u8,
        zeros: usize,
    }

    impl RngCore for ConstRngCore {
        fn next_u32(&mut self) -> u32 {
            u32::from_le_bytes([self.c; 4])
        }

        fn next_u64(&mut self) -> u64 {
            u64::from_le_bytes([self.c; 8])
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            let v = if self.zeros > 0 {
                self.zeros -= 1;
                0
            } else {
                self.c
            };
            dest.fill(v);
        }
    }

    #[test]
    fn test_serial_skips_zero() {
        let mut rng = ConstRngCore { c: 0xff, zeros: 2 };
        let serial = serial_number_from(&mut rng);
        assert_eq!(serial.bits(), 160);
        assert_eq!(rng.zeros, 0);
    }

    #[test]
    fn test_serials_differ() {
        let a = serial_number();
        let b = serial_number();
        assert_ne!(a, b);
        assert!(a.bits() <= 160);
    }

    #[test]
    fn test_random_hex() {
        let h = random_hex(32);
        assert_eq!(h.len(), 64);
        assert!(h.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(random_hex(16), random_hex(16));
    }
}
