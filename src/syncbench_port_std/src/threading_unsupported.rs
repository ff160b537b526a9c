/// Core pinning isn't available on this platform. Threads float freely.
pub fn pin_current_thread(_cpu: usize) -> Result<(), &'static str> {
    Err("thread affinity is not supported on this platform")
}
