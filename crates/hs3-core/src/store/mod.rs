// ── Device store ──
//
// Lock-free device storage with push-based change notification.

mod refresh;
mod registry;

pub use registry::DeviceRegistry;
