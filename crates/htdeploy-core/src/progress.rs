//! Progress reporting capability, abstracted away from any particular
//! rendering (the CLI renders an `indicatif` bar; tests use `NoProgress`).

/// Reports scan/upload/delete progress to whatever is watching.
pub trait Progress: Send + Sync {
    /// A discrete step completed, e.g. "uploaded file 3 of 12".
    fn step(&self, n: u64, total: u64, label: &str);
    /// Byte-level progress within a single file transfer, 0-100.
    fn bytes(&self, percent: u8);
}

/// A `Progress` implementation that does nothing. Used by library tests
/// and as the default when no progress sink is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn step(&self, _n: u64, _total: u64, _label: &str) {}
    fn bytes(&self, _percent: u8) {}
}
