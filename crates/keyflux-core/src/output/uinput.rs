// uinput-backed virtual keyboard.

use std::collections::HashSet;

use evdev::uinput::{VirtualDevice as UinputDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent};

use crate::output::sink::{OutputError, Sink};
use crate::Key;

/// Name prefix of the synthetic device, also used by the input layer to
/// keep the remapper from grabbing its own output.
pub const VIRTUAL_DEVICE_NAME: &str = "keyflux (virtual) keyboard";

const SYN_REPORT: u16 = 0;

/// The synthetic keyboard. Registered with the full key range so any
/// remap target can be emitted; the kernel provides auto-repeat.
pub struct VirtualKeyboard {
    device: UinputDevice,
    pressed: HashSet<Key>,
}

impl VirtualKeyboard {
    pub fn new() -> Result<Self, OutputError> {
        let mut keys = AttributeSet::new();
        for code in 0..0x2ffu16 {
            keys.insert(evdev::Key::new(code));
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(|e| OutputError::Create(e.to_string()))?
            .name(VIRTUAL_DEVICE_NAME)
            .with_keys(&keys)
            .map_err(|e| OutputError::Create(e.to_string()))?
            .build()
            .map_err(|e| OutputError::Create(e.to_string()))?;

        Ok(Self {
            device,
            pressed: HashSet::new(),
        })
    }

    fn emit(&mut self, key: Key, value: i32) -> Result<(), OutputError> {
        let event = InputEvent::new(EventType::KEY, key.code(), value);
        self.device
            .emit(&[event])
            .map_err(|e| OutputError::Write(e.to_string()))
    }

    /// Release every key still held. Called on every shutdown path so the
    /// synthetic device never leaves keys stuck down.
    pub fn release_pressed(&mut self) -> Result<(), OutputError> {
        let pressed: Vec<Key> = self.pressed.iter().copied().collect();
        if pressed.is_empty() {
            return Ok(());
        }
        for key in pressed {
            self.release(key)?;
        }
        self.sync()
    }
}

impl Sink for VirtualKeyboard {
    fn press(&mut self, key: Key) -> Result<(), OutputError> {
        self.emit(key, 1)?;
        self.pressed.insert(key);
        Ok(())
    }

    fn release(&mut self, key: Key) -> Result<(), OutputError> {
        self.emit(key, 0)?;
        self.pressed.remove(&key);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), OutputError> {
        let event = InputEvent::new(EventType::SYNCHRONIZATION, SYN_REPORT, 0);
        self.device
            .emit(&[event])
            .map_err(|e| OutputError::Write(e.to_string()))
    }
}

impl Drop for VirtualKeyboard {
    fn drop(&mut self) {
        let _ = self.release_pressed();
    }
}
