//! Scoped attachment with automatic detach

use crate::core::types::{Address, MemoryResult, ProcessId, TypedValue, ValueWidth};
use crate::memory::reader::{self, PeekBytes};
use crate::memory::{writer, MemoryAccess};
use crate::process::TargetProcess;
use tracing::{debug, warn};

/// RAII guard for a stopped target.
///
/// Reads and writes are only reachable through the guard, and the target is
/// resumed when the guard goes away, including on early returns and errors.
pub struct AttachmentGuard<'a, P: TargetProcess> {
    access: &'a mut MemoryAccess<P>,
    pid: ProcessId,
    detached: bool,
}

impl<'a, P: TargetProcess> AttachmentGuard<'a, P> {
    /// Stops `pid` and wraps the attachment; the read cache starts empty
    pub(crate) fn attach(access: &'a mut MemoryAccess<P>, pid: ProcessId) -> MemoryResult<Self> {
        access.cache.clear();
        access.process.attach(pid)?;
        debug!(pid, "attached");
        Ok(AttachmentGuard {
            access,
            pid,
            detached: false,
        })
    }

    /// Get the process ID
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Reads up to one word at `address` through the cache
    pub fn peek(&mut self, address: Address) -> MemoryResult<PeekBytes> {
        let access = &mut *self.access;
        reader::peek(&mut access.process, &mut access.cache, self.pid, address)
    }

    /// Writes `value` at `address` using `width` bytes
    pub fn poke(
        &mut self,
        address: Address,
        value: &TypedValue,
        width: ValueWidth,
    ) -> MemoryResult<()> {
        let access = &mut *self.access;
        writer::poke(
            &mut access.process,
            &mut access.cache,
            self.pid,
            address,
            value,
            width,
        )
    }

    /// Resumes the target, reporting a failed detach
    pub fn detach(mut self) -> MemoryResult<()> {
        self.detached = true;
        self.access.cache.clear();
        self.access.process.detach(self.pid)?;
        debug!(pid = self.pid, "detached");
        Ok(())
    }
}

impl<P: TargetProcess> Drop for AttachmentGuard<'_, P> {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        self.access.cache.clear();
        match self.access.process.detach(self.pid) {
            Ok(()) => debug!(pid = self.pid, "detached"),
            Err(err) => warn!(pid = self.pid, %err, "detach failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MemoryError;
    use crate::process::MockProcess;

    #[test]
    fn test_drop_detaches() {
        let mock = MockProcess::new(11);
        mock.map(0x1000, vec![1; 16]);
        let mut access = MemoryAccess::new(mock.clone());

        {
            let mut guard = access.attach(11).unwrap();
            assert!(mock.is_attached());
            guard.peek(Address::new(0x1000)).unwrap();
        }
        assert!(!mock.is_attached());
        assert_eq!(mock.detaches(), 1);
    }

    #[test]
    fn test_detach_on_error_path() {
        fn failing_read(access: &mut MemoryAccess<MockProcess>) -> MemoryResult<PeekBytes> {
            let mut guard = access.attach(11)?;
            guard.peek(Address::new(0x9000))
        }

        let mock = MockProcess::new(11);
        mock.map(0x1000, vec![1; 16]);
        let mut access = MemoryAccess::new(mock.clone());

        assert!(matches!(
            failing_read(&mut access),
            Err(MemoryError::PeekFailed { .. })
        ));
        assert!(!mock.is_attached());
    }

    #[test]
    fn test_explicit_detach_runs_once() {
        let mock = MockProcess::new(11);
        let mut access = MemoryAccess::new(mock.clone());

        let guard = access.attach(11).unwrap();
        guard.detach().unwrap();
        assert_eq!(mock.detaches(), 1);
        assert!(access.cache().is_empty());
    }

    #[test]
    fn test_failed_attach_leaves_state() {
        let mock = MockProcess::new(11);
        mock.refuse_attach(true);
        let mut access = MemoryAccess::new(mock.clone());

        assert!(access.attach(11).is_err());
        assert_eq!(mock.detaches(), 0);
    }

    #[test]
    fn test_poke_through_guard() {
        let mock = MockProcess::new(11);
        mock.map(0x1000, vec![0; 16]);
        let mut access = MemoryAccess::new(mock.clone());

        let mut guard = access.attach(11).unwrap();
        let value = TypedValue::from_literal("42").unwrap();
        guard.poke(Address::new(0x1004), &value, ValueWidth::U32).unwrap();
        drop(guard);

        assert_eq!(mock.peek_bytes(0x1004, 4), Some(vec![42, 0, 0, 0]));
    }
}
