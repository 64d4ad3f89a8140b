//! 32-bit FNV-1a

const OFFSET_BASIS: u32 = 0x811c_9dc5;
const PRIME: u32 = 0x0100_0193;

/// Streaming 32-bit FNV-1a hasher
///
/// Order-sensitive and non-cryptographic; fast enough to hash every policy
/// set on every reconcile pass.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a32(u32);

impl Fnv1a32 {
    /// Fresh hasher at the offset basis
    pub fn new() -> Self {
        Self(OFFSET_BASIS)
    }

    /// Feed bytes
    pub fn update(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u32::from(*byte);
            self.0 = self.0.wrapping_mul(PRIME);
        }
    }

    /// Current hash value
    pub fn sum32(&self) -> u32 {
        self.0
    }
}

impl Default for Fnv1a32 {
    fn default() -> Self {
        Self::new()
    }
}
