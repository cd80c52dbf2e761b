// The transformation pipeline and its state machines.

pub mod engine;
pub mod held;
pub mod multipurpose;
pub mod scheduler;

pub use engine::{Engine, Flow};
pub use held::{HeldKey, HeldKeys};
pub use multipurpose::{PendingKey, PendingMultipurpose};
pub use scheduler::{Scheduler, Timer};
