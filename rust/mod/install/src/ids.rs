use invent_core::new_id;

/// Mints opaque installation codes for fresh, top-level scans.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random 128-bit codes.
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        new_id()
    }
}
