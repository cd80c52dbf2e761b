// Output side: sink abstraction, pressed-state tracking, combo planning,
// and the uinput device.

pub mod plan;
pub mod sequencer;
pub mod sink;
pub mod tracker;
pub mod uinput;

pub use plan::{plan_combo, ComboPlan};
pub use sequencer::Sequencer;
pub use sink::{MemorySink, OutputError, Sink, SinkEvent};
pub use tracker::OutputTracker;
pub use uinput::{VirtualKeyboard, VIRTUAL_DEVICE_NAME};
