//! Identifier generation for newly created quiz entities.
//!
//! The generator is owned by `AppState` and handed to the transform, import and
//! builder code explicitly, so tests can swap in a deterministic sequence.

use uuid::Uuid;

pub trait IdGen: Send + Sync {
  fn fresh_id(&self) -> String;
}

/// Random v4 UUIDs. Used everywhere outside of tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIds;

impl IdGen for UuidIds {
  fn fresh_id(&self) -> String {
    Uuid::new_v4().to_string()
  }
}

/// Predictable ids (`id-1`, `id-2`, ...) for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct SequentialIds {
  next: std::sync::atomic::AtomicU64,
}

#[cfg(test)]
impl IdGen for SequentialIds {
  fn fresh_id(&self) -> String {
    let n = self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
    format!("id-{n}")
  }
}
