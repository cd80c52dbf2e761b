// keyflux core: the event transformation engine.
//
// Raw key events come in from grabbed evdev devices, flow through the
// modmap / multipurpose / suspend / combo pipeline, and leave through a
// synthetic uinput keyboard.

pub mod combo;
pub mod config;
pub mod event;
pub mod input;
pub mod key;
pub mod mapping;
pub mod modifier;
pub mod output;
pub mod predicate;
pub mod transform;
pub mod window;

pub use combo::Combo;
pub use config::{parse_combo, ComboParseError, Config, ConfigError};
pub use event::{KeyAction, KeyEvent};
pub use input::{DeviceError, DeviceInfo, DeviceSource};
pub use key::Key;
pub use mapping::{
    Binding, CustomHook, CustomHookError, Keymap, Modmap, MultiModmap, RuleSet, TapHold,
    ThrottleDelays, Timeouts,
};
pub use modifier::{Modifier, ModifierError};
pub use output::{MemorySink, OutputError, Sink, SinkEvent, VirtualKeyboard};
pub use predicate::{Predicate, PredicateError};
pub use transform::{Engine, Flow};
pub use window::{
    select_provider, Context, ContextError, ContextProvider, DesktopEnv, SessionType,
    WindowSnapshot,
};
