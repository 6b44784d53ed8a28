//! Unique id generation.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64;
use uuid::Uuid;

/// Seeded source of individual ids.
///
/// Ids are random (version 4) UUIDs rendered as 32 upper-case hex digits. The
/// random bytes come from a seeded generator so that a run with a fixed seed
/// assigns the same ids every time.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    rng: Pcg64,
}

impl IdGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    pub fn new_id(&mut self) -> String {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        uuid.simple()
            .encode_upper(&mut Uuid::encode_buffer())
            .to_owned()
    }
}
