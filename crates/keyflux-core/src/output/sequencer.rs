// Renders combo emissions into sink event streams with modifier
// bracketing: lift unwanted held modifiers, press missing ones, tap the
// key, then restore the previous modifier state.

use std::time::Duration;

use crate::mapping::ThrottleDelays;
use crate::output::plan::plan_combo;
use crate::output::sink::{OutputError, Sink};
use crate::output::tracker::OutputTracker;
use crate::{Combo, Key};

#[derive(Debug, Default)]
pub struct Sequencer {
    delays: ThrottleDelays,
}

impl Sequencer {
    pub fn new(delays: ThrottleDelays) -> Self {
        Self { delays }
    }

    /// Emit a combo. When `retain_added` is set (a Bind trigger), the
    /// modifiers pressed for this combo stay held and are returned so the
    /// caller can release them when the trigger key is released; otherwise
    /// modifier state is fully restored.
    pub fn emit_combo(
        &self,
        combo: &Combo,
        out: &mut OutputTracker,
        sink: &mut dyn Sink,
        retain_added: bool,
    ) -> Result<Vec<Key>, OutputError> {
        let plan = plan_combo(combo, &out.pressed_mods());

        if !plan.lift.is_empty() {
            for &key in &plan.lift {
                out.release(sink, key)?;
            }
            sink.sync()?;
        }
        if !plan.press.is_empty() {
            for &key in &plan.press {
                out.press(sink, key)?;
            }
            sink.sync()?;
        }

        pause(self.delays.key_pre_delay);
        out.press(sink, plan.key)?;
        sink.sync()?;
        out.release(sink, plan.key)?;
        sink.sync()?;
        pause(self.delays.key_post_delay);

        let mut restored = false;
        if !retain_added {
            for &key in plan.press.iter().rev() {
                out.release(sink, key)?;
                restored = true;
            }
        }
        for key in plan.restore() {
            out.press(sink, key)?;
            restored = true;
        }
        if restored {
            sink.sync()?;
        }

        Ok(if retain_added { plan.press } else { Vec::new() })
    }

    /// Press and release a single key as an atomic pair.
    pub fn tap(
        &self,
        key: Key,
        out: &mut OutputTracker,
        sink: &mut dyn Sink,
    ) -> Result<(), OutputError> {
        pause(self.delays.key_pre_delay);
        out.press(sink, key)?;
        sink.sync()?;
        out.release(sink, key)?;
        sink.sync()?;
        pause(self.delays.key_post_delay);
        Ok(())
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::sink::{MemorySink, SinkEvent};
    use crate::Modifier;

    fn modifier(alias: &str) -> Modifier {
        Modifier::from_alias(alias).unwrap()
    }

    #[test]
    fn plain_combo_brackets_modifiers() {
        let mut sink = MemorySink::new();
        let mut out = OutputTracker::new();
        let seq = Sequencer::default();

        let combo = Combo::new([modifier("Ctrl")], Key(31)); // Ctrl-S
        let added = seq.emit_combo(&combo, &mut out, &mut sink, false).unwrap();

        assert!(added.is_empty());
        assert_eq!(
            sink.key_events(),
            vec![
                SinkEvent::Press(Key(29)),
                SinkEvent::Press(Key(31)),
                SinkEvent::Release(Key(31)),
                SinkEvent::Release(Key(29)),
            ]
        );
        assert!(out.is_empty());
    }

    #[test]
    fn held_combo_modifier_is_reused_not_repressed() {
        let mut sink = MemorySink::new();
        let mut out = OutputTracker::new();
        let seq = Sequencer::default();

        out.press(&mut sink, Key(29)).unwrap();
        sink.clear();

        let combo = Combo::new([modifier("Ctrl")], Key(31));
        seq.emit_combo(&combo, &mut out, &mut sink, false).unwrap();

        assert_eq!(
            sink.key_events(),
            vec![SinkEvent::Press(Key(31)), SinkEvent::Release(Key(31))]
        );
        assert!(out.is_pressed(Key(29)));
    }

    #[test]
    fn conflicting_modifier_is_lifted_and_restored() {
        let mut sink = MemorySink::new();
        let mut out = OutputTracker::new();
        let seq = Sequencer::default();

        out.press(&mut sink, Key(42)).unwrap(); // shift held
        sink.clear();

        let combo = Combo::new([modifier("Ctrl")], Key(31));
        seq.emit_combo(&combo, &mut out, &mut sink, false).unwrap();

        assert_eq!(
            sink.key_events(),
            vec![
                SinkEvent::Release(Key(42)),
                SinkEvent::Press(Key(29)),
                SinkEvent::Press(Key(31)),
                SinkEvent::Release(Key(31)),
                SinkEvent::Release(Key(29)),
                SinkEvent::Press(Key(42)),
            ]
        );
        assert!(out.is_pressed(Key(42)));
        assert!(!out.is_pressed(Key(29)));
    }

    #[test]
    fn bind_retains_added_modifiers() {
        let mut sink = MemorySink::new();
        let mut out = OutputTracker::new();
        let seq = Sequencer::default();

        let combo = Combo::new([modifier("Alt")], Key(15)); // Alt-Tab
        let added = seq.emit_combo(&combo, &mut out, &mut sink, true).unwrap();

        assert_eq!(added, vec![Key(56)]);
        assert!(out.is_pressed(Key(56)));
        assert_eq!(
            sink.key_events(),
            vec![
                SinkEvent::Press(Key(56)),
                SinkEvent::Press(Key(15)),
                SinkEvent::Release(Key(15)),
            ]
        );
    }

    #[test]
    fn sync_follows_every_group() {
        let mut sink = MemorySink::new();
        let mut out = OutputTracker::new();
        let seq = Sequencer::default();

        let combo = Combo::new([modifier("Ctrl")], Key(31));
        seq.emit_combo(&combo, &mut out, &mut sink, false).unwrap();

        // press-mods / key-press / key-release / restore, each synced.
        assert_eq!(
            sink.events
                .iter()
                .filter(|e| matches!(e, SinkEvent::Sync))
                .count(),
            4
        );
        assert_eq!(sink.events.last(), Some(&SinkEvent::Sync));
    }

    #[test]
    fn tap_is_press_release_pair() {
        let mut sink = MemorySink::new();
        let mut out = OutputTracker::new();
        let seq = Sequencer::default();

        seq.tap(Key(28), &mut out, &mut sink).unwrap();
        assert_eq!(
            sink.events,
            vec![
                SinkEvent::Press(Key(28)),
                SinkEvent::Sync,
                SinkEvent::Release(Key(28)),
                SinkEvent::Sync,
            ]
        );
        assert!(out.is_empty());
    }
}
