// Device selection predicates.

/// Whether a device's name marks it as a synthetic output device that
/// must never be grabbed (feedback loop).
pub fn is_virtual_device(device_name: &str, virtual_prefix: &str) -> bool {
    device_name.starts_with(virtual_prefix)
}

/// Decide whether a device should be remapped.
///
/// With an explicit filter, only exact path or name matches are taken
/// (including virtual devices, if the user insists). Without one,
/// autodetection takes keyboards and skips virtual devices.
pub fn matches_device_filter(
    device_name: &str,
    device_path: &str,
    filter: &[String],
    is_keyboard: bool,
    is_virtual: bool,
) -> bool {
    if !filter.is_empty() {
        return filter
            .iter()
            .any(|wanted| wanted == device_path || wanted == device_name);
    }
    !is_virtual && is_keyboard
}
