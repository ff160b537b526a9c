//! Core pinning for Linux.
use std::{mem::MaybeUninit, os::raw::c_int};

/// Restrict the calling thread to the CPU `cpu`.
pub fn pin_current_thread(cpu: usize) -> Result<(), errno::Errno> {
    if cpu >= libc::CPU_SETSIZE as usize {
        return Err(errno::Errno(libc::EINVAL));
    }

    unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed().assume_init();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        ok_or_errno(libc::sched_setaffinity(
            0,
            std::mem::size_of::<libc::cpu_set_t>(),
            &set,
        ))?;
    }

    Ok(())
}

fn ok_or_errno(x: c_int) -> Result<c_int, errno::Errno> {
    if x >= 0 {
        Ok(x)
    } else {
        Err(errno::errno())
    }
}
