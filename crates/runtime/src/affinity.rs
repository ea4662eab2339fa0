//! CPU affinity for worker threads.
//!
//! Logical processors are advisory-pinned to CPUs: on Linux the pool repins
//! a worker's native thread whenever its LP assignment changes, and every
//! failure degrades to a warning. Other platforms compile to no-ops.

use tracing::warn;

/// A native (OS-level) thread identifier, as returned by `gettid`.
///
/// [`UNKNOWN_TID`] is used on platforms without a usable thread id.
pub type NativeTid = i64;

/// Sentinel for platforms where native thread ids are unavailable.
pub const UNKNOWN_TID: NativeTid = -1;

/// The calling thread's native id.
#[cfg(target_os = "linux")]
pub fn native_thread_id() -> NativeTid {
    // SAFETY: gettid takes no arguments and cannot fail.
    unsafe { libc::syscall(libc::SYS_gettid) as NativeTid }
}

#[cfg(not(target_os = "linux"))]
pub fn native_thread_id() -> NativeTid {
    UNKNOWN_TID
}

/// Number of CPUs available to this process.
pub fn online_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

/// The CPU a logical processor should pin to, or `None` when pinning is
/// disabled. LPs map round-robin onto the online CPUs.
pub fn cpu_for_logical_processor(lp_index: usize, pin_cpus: bool) -> Option<u32> {
    pin_cpus.then(|| (lp_index % online_cpu_count()) as u32)
}

/// Pin `tid` to `new_cpu`, skipping the syscall when nothing would change.
///
/// `old_cpu` is the CPU the thread was previously pinned to (if any) so
/// no-op updates can be skipped. Failures are logged and ignored: pinning
/// is an optimization, not a correctness requirement.
pub fn set_native_thread_affinity(tid: NativeTid, new_cpu: Option<u32>, old_cpu: Option<u32>) {
    let Some(cpu) = new_cpu else {
        return;
    };
    if new_cpu == old_cpu || tid == UNKNOWN_TID {
        return;
    }
    pin_tid_to_cpu(tid, cpu);
}

#[cfg(target_os = "linux")]
fn pin_tid_to_cpu(tid: NativeTid, cpu: u32) {
    use std::mem;

    // SAFETY: cpuset is zeroed before use and CPU_SET writes within its
    // bounds for any cpu < CPU_SETSIZE.
    unsafe {
        let mut cpuset: libc::cpu_set_t = mem::zeroed();
        libc::CPU_ZERO(&mut cpuset);
        libc::CPU_SET(cpu as usize, &mut cpuset);

        let rv = libc::sched_setaffinity(
            tid as libc::pid_t,
            mem::size_of::<libc::cpu_set_t>(),
            &cpuset,
        );
        if rv != 0 {
            warn!(
                tid,
                cpu,
                errno = *libc::__errno_location(),
                "sched_setaffinity failed; leaving thread unpinned"
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_tid_to_cpu(tid: NativeTid, cpu: u32) {
    warn!(tid, cpu, "cpu pinning not supported on this platform");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_mapping_round_robin() {
        let n = online_cpu_count();
        assert!(n >= 1);
        assert_eq!(cpu_for_logical_processor(0, true), Some(0));
        assert_eq!(cpu_for_logical_processor(n, true), Some(0));
        assert_eq!(
            cpu_for_logical_processor(1, true),
            Some((1 % n) as u32)
        );
    }

    #[test]
    fn test_pinning_disabled_maps_to_none() {
        assert_eq!(cpu_for_logical_processor(0, false), None);
        assert_eq!(cpu_for_logical_processor(7, false), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_native_thread_id_is_real() {
        assert!(native_thread_id() > 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_self_pin_and_unpinned_noops() {
        let tid = native_thread_id();
        // Pinning to the CPU we are already on must not fail.
        set_native_thread_affinity(tid, Some(0), None);
        // No-op paths.
        set_native_thread_affinity(tid, Some(0), Some(0));
        set_native_thread_affinity(tid, None, Some(0));
        set_native_thread_affinity(UNKNOWN_TID, Some(0), None);
    }
}
