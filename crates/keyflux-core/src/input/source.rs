// Exclusive-grab reader over kernel input devices.
//
// Multiplexes the selected event devices (plus an optional udev hotplug
// monitor) through poll(2) and yields decoded key events in arrival
// order. Repeats never leave this layer; the kernel re-synthesizes them
// from output presses.

use std::os::unix::io::AsRawFd;
use std::time::Instant;

use evdev::{Device, EventType};
use udev::MonitorSocket;

use crate::event::{KeyAction, KeyEvent};
use crate::input::filter::{is_virtual_device, matches_device_filter};
use crate::output::uinput::VIRTUAL_DEVICE_NAME;
use crate::Key;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no input devices to remap")]
    NoDevices,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A selectable input device, for `--list-devices`.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub path: String,
}

/// Grabbed multi-device event source.
pub struct DeviceSource {
    devices: Vec<Device>,
    paths: Vec<String>,
    poll_fds: Vec<libc::pollfd>,
    grabbed: bool,
    monitor: Option<MonitorSocket>,
    filter: Vec<String>,
}

const DISCONNECT_FLAGS: libc::c_short = libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;

impl DeviceSource {
    /// Open and exclusively grab the selected devices. `watch` adds a
    /// udev monitor so hotplugged keyboards join the set.
    pub fn open(filter: &[String], watch: bool) -> Result<Self, DeviceError> {
        let mut selected = Vec::new();
        for (path, mut device) in Self::find_devices(filter)? {
            // A crashed predecessor may have left the device grabbed.
            let _ = device.ungrab();
            match device.grab() {
                Ok(()) => selected.push((path, device)),
                Err(e) => {
                    // One refusing device is dropped; only an empty set is
                    // fatal.
                    log::warn!(
                        "cannot grab {} ({path}): {e}",
                        device.name().unwrap_or("Unknown")
                    );
                }
            }
        }
        if selected.is_empty() {
            return Err(DeviceError::NoDevices);
        }

        let monitor = if watch { Some(Self::udev_monitor()?) } else { None };

        let mut source = Self {
            devices: Vec::new(),
            paths: Vec::new(),
            poll_fds: Vec::new(),
            grabbed: true,
            monitor,
            filter: filter.to_vec(),
        };
        if let Some(monitor) = &source.monitor {
            source.poll_fds.push(libc::pollfd {
                fd: monitor.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });
        }
        for (path, device) in selected {
            source.poll_fds.push(libc::pollfd {
                fd: device.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });
            source.paths.push(path);
            source.devices.push(device);
        }
        Ok(source)
    }

    /// Enumerate keyboards for `--list-devices`.
    pub fn list_devices() -> Vec<DeviceInfo> {
        evdev::enumerate()
            .filter(|(_, d)| Self::is_keyboard(d))
            .map(|(path, d)| DeviceInfo {
                name: d.name().unwrap_or("Unknown").to_string(),
                path: path.to_string_lossy().into_owned(),
            })
            .collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn device_names(&self) -> Vec<String> {
        self.devices
            .iter()
            .map(|d| d.name().unwrap_or("Unknown").to_string())
            .collect()
    }

    /// Wait up to `timeout_ms` for key events. An empty vector means
    /// timeout or interruption; `NoDevices` means every device is gone.
    pub fn poll(&mut self, timeout_ms: i32) -> Result<Vec<KeyEvent>, DeviceError> {
        if self.devices.is_empty() {
            return Err(DeviceError::NoDevices);
        }

        let mut events = Vec::new();
        let rc = unsafe {
            libc::poll(
                self.poll_fds.as_mut_ptr(),
                self.poll_fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            // Signal delivery looks like EINTR; the caller re-checks its
            // running flag and polls again.
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(events);
            }
            return Err(DeviceError::Io(err));
        }
        if rc == 0 {
            return Ok(events);
        }

        let udev_offset = usize::from(self.monitor.is_some());
        if udev_offset == 1 && self.poll_fds[0].revents & libc::POLLIN != 0 {
            self.absorb_hotplug();
        }

        let now = Instant::now();
        let mut disconnected = Vec::new();
        for (i, device) in self.devices.iter_mut().enumerate() {
            let revents = self.poll_fds[i + udev_offset].revents;
            if revents & DISCONNECT_FLAGS != 0 {
                log::warn!(
                    "input device disconnected: {}",
                    device.name().unwrap_or("Unknown")
                );
                disconnected.push(i);
                continue;
            }
            if revents & libc::POLLIN == 0 {
                continue;
            }
            let device_name = device.name().unwrap_or("Unknown").to_string();
            let Ok(batch) = device.fetch_events() else {
                continue;
            };
            for raw in batch {
                if raw.event_type() != EventType::KEY {
                    continue;
                }
                let Some(action) = KeyAction::from_event_value(raw.value()) else {
                    continue;
                };
                if action.is_repeat() {
                    continue;
                }
                events.push(KeyEvent::new(
                    Key(raw.code()),
                    action,
                    now,
                    device_name.clone(),
                ));
            }
        }

        for i in disconnected.into_iter().rev() {
            self.devices.remove(i);
            self.paths.remove(i);
            self.poll_fds.remove(i + udev_offset);
        }
        if self.devices.is_empty() {
            return Err(DeviceError::NoDevices);
        }

        Ok(events)
    }

    pub fn ungrab_all(&mut self) {
        if self.grabbed {
            for device in &mut self.devices {
                let _ = device.ungrab();
            }
            self.grabbed = false;
        }
    }

    fn udev_monitor() -> Result<MonitorSocket, DeviceError> {
        udev::MonitorBuilder::new()
            .and_then(|b| b.match_subsystem("input"))
            .and_then(|b| b.listen())
            .map_err(DeviceError::Io)
    }

    fn absorb_hotplug(&mut self) {
        let Some(monitor) = &self.monitor else { return };
        let added: Vec<String> = monitor
            .iter()
            .filter(|event| event.event_type() == udev::EventType::Add)
            .filter_map(|event| {
                event
                    .devnode()
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .filter(|path| path.starts_with("/dev/input/event"))
            .collect();
        for path in added {
            self.try_add(&path);
        }
    }

    fn try_add(&mut self, path: &str) {
        if self.paths.iter().any(|p| p == path) {
            return;
        }
        let mut device = match Device::open(path) {
            Ok(d) => d,
            Err(e) => {
                log::debug!("cannot open hotplugged device {path}: {e}");
                return;
            }
        };
        let name = device.name().unwrap_or("Unknown").to_string();
        let keep = matches_device_filter(
            &name,
            path,
            &self.filter,
            Self::is_keyboard(&device),
            is_virtual_device(&name, VIRTUAL_DEVICE_NAME),
        );
        if !keep {
            return;
        }
        if self.grabbed {
            if let Err(e) = device.grab() {
                log::warn!("cannot grab hotplugged device {name}: {e}");
                return;
            }
        }
        log::info!("input device connected: {name} ({path})");
        self.poll_fds.push(libc::pollfd {
            fd: device.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        });
        self.paths.push(path.to_string());
        self.devices.push(device);
    }

    fn find_devices(filter: &[String]) -> Result<Vec<(String, Device)>, DeviceError> {
        let mut selected = Vec::new();
        for (path, device) in evdev::enumerate() {
            let name = device.name().unwrap_or("Unknown");
            let path = path.to_string_lossy().into_owned();
            let keep = matches_device_filter(
                name,
                &path,
                filter,
                Self::is_keyboard(&device),
                is_virtual_device(name, VIRTUAL_DEVICE_NAME),
            );
            if keep {
                selected.push((path, device));
            }
        }
        if selected.is_empty() {
            return Err(DeviceError::NoDevices);
        }
        Ok(selected)
    }

    /// A keyboard advertises the QWERTY row plus A, Z and SPACE. This
    /// keeps mice with a few extra buttons out of the autodetected set.
    fn is_keyboard(device: &Device) -> bool {
        if !device.supported_events().contains(EventType::KEY) {
            return false;
        }
        let name = device.name().unwrap_or("");
        if is_virtual_device(name, VIRTUAL_DEVICE_NAME) {
            return false;
        }
        let Some(keys) = device.supported_keys() else {
            return false;
        };
        const REQUIRED: &[u16] = &[16, 17, 18, 19, 20, 21, 30, 44, 57];
        REQUIRED.iter().all(|&code| keys.contains(evdev::Key::new(code)))
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        // Devices must never stay grabbed past the source's lifetime,
        // including on panic; the keyboard would be dead otherwise.
        self.ungrab_all();
    }
}
