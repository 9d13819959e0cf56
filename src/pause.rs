/// Architecture busy-cycle hint (`CPU_BUSY_CYCLE()` in the original C
/// harness's `atomic.h`): an `x86` `pause`, or whatever the target
/// architecture uses to relax the pipeline inside a spin loop. Every
/// algorithm's inner spin loops go through this, not through a
/// scheduler yield — backing off to the scheduler is a per-algorithm
/// decision (see `algorithms::backoff`), not something this hint does
/// on its own.
#[inline(always)]
pub(crate) fn pause() {
    core::hint::spin_loop();
}
