// ============================================
// File: crates/decada-transport/src/entropy.rs
// ============================================
//! OS entropy source.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Result, TransportError};
use crate::traits::EntropySource;

/// Reads from the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_random(&self, buf: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(buf).map_err(|e| TransportError::Entropy {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_distinct_buffers() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        OsEntropy.fill_random(&mut a).unwrap();
        OsEntropy.fill_random(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
