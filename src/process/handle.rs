//! ptrace-backed access to a live process

use super::{TargetProcess, Word};
use crate::core::types::{Address, MemoryError, MemoryResult, ProcessId};
use nix::libc::{c_long, c_void};
use nix::sys::ptrace;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// Talks to the kernel through `PTRACE_ATTACH`/`PEEKDATA`/`POKEDATA`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PtraceProcess;

impl PtraceProcess {
    pub fn new() -> Self {
        PtraceProcess
    }

    fn raw_address(address: Address) -> ptrace::AddressType {
        address.as_usize() as *mut c_void
    }
}

impl TargetProcess for PtraceProcess {
    fn attach(&mut self, pid: ProcessId) -> MemoryResult<()> {
        let target = Pid::from_raw(pid);

        ptrace::attach(target).map_err(|errno| MemoryError::attach_failed(pid, errno.desc()))?;

        // the attach delivers SIGSTOP; nothing may be read until it lands
        match waitpid(target, None) {
            Ok(WaitStatus::Stopped(_, signal)) => {
                debug!(pid, ?signal, "target stopped");
                Ok(())
            }
            Ok(status) => {
                if let Err(errno) = ptrace::detach(target, None) {
                    warn!(pid, %errno, "detach after failed stop also failed");
                }
                Err(MemoryError::attach_failed(
                    pid,
                    format!("target did not stop: {:?}", status),
                ))
            }
            Err(errno) => {
                if let Err(errno) = ptrace::detach(target, None) {
                    warn!(pid, %errno, "detach after failed wait also failed");
                }
                Err(MemoryError::attach_failed(pid, errno.desc()))
            }
        }
    }

    fn detach(&mut self, pid: ProcessId) -> MemoryResult<()> {
        ptrace::detach(Pid::from_raw(pid), None)
            .map_err(|errno| MemoryError::detach_failed(pid, errno.desc()))
    }

    fn read_word(&mut self, pid: ProcessId, address: Address) -> MemoryResult<Word> {
        let word = ptrace::read(Pid::from_raw(pid), Self::raw_address(address))
            .map_err(|errno| MemoryError::peek_failed(address, errno.desc()))?;
        Ok(word.to_ne_bytes())
    }

    fn write_word(&mut self, pid: ProcessId, address: Address, word: Word) -> MemoryResult<()> {
        ptrace::write(
            Pid::from_raw(pid),
            Self::raw_address(address),
            c_long::from_ne_bytes(word),
        )
        .map_err(|errno| MemoryError::write_failed(address, errno.desc()))
    }
}
