// The event transformation pipeline.
//
// Input events flow through: modmap substitution, the multipurpose
// tap/hold machine, the modifier suspend buffer, combo resolution against
// the context-scoped keymap stack (submap first), and finally the output
// sequencer. All state mutation happens on the caller's single loop;
// timers are fed back in through the same entry points.

use std::time::Instant;

use crate::event::{KeyAction, KeyEvent};
use crate::mapping::{Binding, RuleSet};
use crate::output::sequencer::Sequencer;
use crate::output::sink::{OutputError, Sink};
use crate::output::tracker::OutputTracker;
use crate::transform::held::HeldKeys;
use crate::transform::multipurpose::PendingMultipurpose;
use crate::transform::scheduler::{Scheduler, Timer};
use crate::window::{Context, ContextProvider};
use crate::{Key, Keymap, Modifier};

/// What the loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Emergency eject: all output released, terminate.
    Eject,
}

/// Disposition of the next key-down, set by EscapeNext / IgnoreNext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum NextKeyMode {
    #[default]
    Normal,
    Escape,
    Ignore,
}

pub struct Engine {
    rules: RuleSet,
    provider: Option<Box<dyn ContextProvider>>,
    sequencer: Sequencer,
    held: HeldKeys,
    out: OutputTracker,
    pending_mp: PendingMultipurpose,
    scheduler: Scheduler,
    submap: Option<Keymap>,
    next_key_mode: NextKeyMode,
    capslock_on: bool,
    numlock_on: bool,
    device_name: String,
}

impl Engine {
    pub fn new(rules: RuleSet) -> Self {
        let sequencer = Sequencer::new(rules.delays);
        Self {
            rules,
            provider: None,
            sequencer,
            held: HeldKeys::new(),
            out: OutputTracker::new(),
            pending_mp: PendingMultipurpose::new(),
            scheduler: Scheduler::new(),
            submap: None,
            next_key_mode: NextKeyMode::default(),
            capslock_on: false,
            numlock_on: false,
            device_name: String::new(),
        }
    }

    pub fn with_provider(mut self, provider: Box<dyn ContextProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Earliest pending timer, for the loop's poll timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Fire timers that came due while the loop was idle.
    pub fn tick(&mut self, now: Instant, sink: &mut dyn Sink) -> Result<(), OutputError> {
        self.fire_due(now, sink)
    }

    /// Process one input event. Repeats are discarded here as well as at
    /// the source; the kernel re-synthesizes them from output presses.
    pub fn handle(&mut self, ev: &KeyEvent, sink: &mut dyn Sink) -> Result<Flow, OutputError> {
        if ev.action.is_repeat() {
            return Ok(Flow::Continue);
        }

        self.fire_due(ev.time, sink)?;
        self.device_name = ev.device.clone();

        if ev.key == self.rules.emergency_eject_key && ev.action.is_press() {
            log::warn!("emergency eject: releasing all output keys");
            self.eject(sink)?;
            return Ok(Flow::Eject);
        }
        if ev.key == self.rules.diagnostics_key && ev.action.is_press() {
            self.dump_state();
            return Ok(Flow::Continue);
        }

        match ev.action {
            KeyAction::Press => self.on_press(ev, sink)?,
            KeyAction::Release => self.on_release(ev, sink)?,
            KeyAction::Repeat => unreachable!("repeats filtered above"),
        }
        Ok(Flow::Continue)
    }

    /// Release everything and reset. Used for emergency eject and on
    /// every shutdown path.
    pub fn shutdown(&mut self, sink: &mut dyn Sink) -> Result<(), OutputError> {
        self.eject(sink)
    }

    /// True when nothing is held on either side.
    pub fn is_quiescent(&self) -> bool {
        self.held.is_empty() && self.out.is_empty() && self.pending_mp.is_empty()
    }

    pub fn output_is_empty(&self) -> bool {
        self.out.is_empty()
    }

    fn on_press(&mut self, ev: &KeyEvent, sink: &mut dyn Sink) -> Result<(), OutputError> {
        // Any other physical key press decides pending multipurpose keys
        // as their modifier role, before the new key is processed.
        self.decide_pending_as_hold(ev.time, sink)?;

        match self.next_key_mode {
            NextKeyMode::Escape => {
                self.next_key_mode = NextKeyMode::Normal;
                let entry = self.held.insert(ev.key, ev.key, ev.time);
                entry.on_output = true;
                self.out.press(sink, ev.key)?;
                return sink.sync();
            }
            NextKeyMode::Ignore => {
                self.next_key_mode = NextKeyMode::Normal;
                self.held.insert(ev.key, ev.key, ev.time).spent = true;
                return Ok(());
            }
            NextKeyMode::Normal => {}
        }

        let ctx = self.snapshot_context();
        let eff = self.rules.effective_key(&ctx, ev.key);
        self.track_locks(eff);

        // Dual-role keys enter the tap/hold machine, unless a modifier is
        // already down, in which case combo handling must win.
        if self.held.mod_keys().is_empty() {
            if let Some(th) = self.rules.tap_hold(&ctx, ev.key) {
                let deadline = ev.time + self.rules.timeouts.multipurpose;
                self.pending_mp.arm(ev.key, th.tap, th.hold, deadline);
                self.scheduler.arm(deadline, Timer::Multipurpose(ev.key));
                return Ok(());
            }
        }

        // Modifier presses are withheld until their role is known.
        if Modifier::is_modifier_key(eff) {
            self.held.insert(ev.key, eff, ev.time).suspended = true;
            let deadline = ev.time + self.rules.timeouts.suspend;
            self.scheduler.arm(deadline, Timer::SuspendCommit(ev.key));
            return Ok(());
        }

        self.held.insert(ev.key, eff, ev.time);
        let mask = self.held.mod_keys();

        // The submap from a previous stroke gets the first lookup and is
        // consumed by it either way.
        if let Some(active) = self.submap.take() {
            self.scheduler.cancel(Timer::SubmapExpiry);
            if let Some(binding) = active.lookup(&mask, eff).cloned() {
                self.consume_remap(ev.key);
                return self.execute(&binding, ev.key, ev.time, &ctx, sink);
            }
        }

        if let Some(binding) = self.rules.resolve(&ctx, &mask, eff).cloned() {
            self.consume_remap(ev.key);
            return self.execute(&binding, ev.key, ev.time, &ctx, sink);
        }

        // Unmapped: the withheld modifiers were real after all.
        self.commit_suspended(sink)?;
        if let Some(entry) = self.held.get_mut(ev.key) {
            entry.on_output = true;
        }
        self.out.press(sink, eff)?;
        sink.sync()
    }

    fn on_release(&mut self, ev: &KeyEvent, sink: &mut dyn Sink) -> Result<(), OutputError> {
        // An undecided multipurpose key released in time is a tap. The tap
        // emission counts as a key press for any other undecided key.
        if let Some(p) = self.pending_mp.take(ev.key) {
            self.scheduler.cancel(Timer::Multipurpose(ev.key));
            self.decide_pending_as_hold(ev.time, sink)?;
            return self.sequencer.tap(p.tap, &mut self.out, sink);
        }

        // A still-suspended modifier released now is a bare tap. Earlier
        // suspended presses commit first so commits stay in input order.
        if self.held.get(ev.key).is_some_and(|e| e.suspended) {
            let earlier: Vec<Key> = self
                .held
                .suspended_keys()
                .into_iter()
                .take_while(|&k| k != ev.key)
                .collect();
            for key in earlier {
                self.commit_one(key, sink)?;
            }
            self.scheduler.cancel(Timer::SuspendCommit(ev.key));
            let entry = self.held.remove(ev.key).expect("checked above");
            return self.sequencer.tap(entry.out, &mut self.out, sink);
        }

        let Some(entry) = self.held.remove(ev.key) else {
            log::debug!("release of untracked key {}", ev.key);
            return Ok(());
        };

        if !entry.bound_mods.is_empty() {
            for &key in entry.bound_mods.iter().rev() {
                self.out.release(sink, key)?;
            }
            sink.sync()?;
        }

        if entry.spent || !entry.on_output {
            return Ok(());
        }
        self.out.release(sink, entry.out)?;
        sink.sync()
    }

    fn fire_due(&mut self, now: Instant, sink: &mut dyn Sink) -> Result<(), OutputError> {
        while let Some(timer) = self.scheduler.pop_due(now) {
            match timer {
                Timer::Multipurpose(key) => {
                    if let Some(p) = self.pending_mp.take(key) {
                        self.held.insert(p.key, p.hold, now).on_output = true;
                        self.out.press(sink, p.hold)?;
                        sink.sync()?;
                    }
                }
                Timer::SuspendCommit(key) => self.commit_one(key, sink)?,
                Timer::SubmapExpiry => self.submap = None,
            }
        }
        Ok(())
    }

    /// Decide every pending multipurpose key as its hold modifier, in
    /// press order, emitting the modifier presses.
    fn decide_pending_as_hold(
        &mut self,
        now: Instant,
        sink: &mut dyn Sink,
    ) -> Result<(), OutputError> {
        for p in self.pending_mp.drain() {
            self.scheduler.cancel(Timer::Multipurpose(p.key));
            self.held.insert(p.key, p.hold, now).on_output = true;
            self.out.press(sink, p.hold)?;
            sink.sync()?;
        }
        Ok(())
    }

    /// Commit one withheld modifier press, if it is still withheld.
    fn commit_one(&mut self, key: Key, sink: &mut dyn Sink) -> Result<(), OutputError> {
        self.scheduler.cancel(Timer::SuspendCommit(key));
        let Some(entry) = self.held.get_mut(key) else {
            return Ok(());
        };
        if !entry.suspended {
            return Ok(());
        }
        entry.suspended = false;
        entry.on_output = true;
        let out_key = entry.out;
        self.out.press(sink, out_key)?;
        sink.sync()
    }

    /// Commit every withheld modifier press, in input order.
    fn commit_suspended(&mut self, sink: &mut dyn Sink) -> Result<(), OutputError> {
        for key in self.held.suspended_keys() {
            self.commit_one(key, sink)?;
        }
        Ok(())
    }

    /// A remap hit: the trigger key and every withheld modifier press are
    /// consumed together; none of them reaches the output.
    fn consume_remap(&mut self, trigger: Key) {
        for key in self.held.suspended_keys() {
            self.scheduler.cancel(Timer::SuspendCommit(key));
            if let Some(entry) = self.held.get_mut(key) {
                entry.suspended = false;
                entry.spent = true;
            }
        }
        if let Some(entry) = self.held.get_mut(trigger) {
            entry.spent = true;
        }
    }

    fn execute(
        &mut self,
        binding: &Binding,
        trigger: Key,
        now: Instant,
        ctx: &Context,
        sink: &mut dyn Sink,
    ) -> Result<(), OutputError> {
        match binding {
            Binding::Combo(combo) => {
                self.sequencer.emit_combo(combo, &mut self.out, sink, false)?;
            }
            Binding::Bind(combo) => {
                let added = self.sequencer.emit_combo(combo, &mut self.out, sink, true)?;
                match self.held.get_mut(trigger) {
                    Some(entry) => entry.bound_mods.extend(added),
                    None => {
                        // Trigger vanished; do not leave modifiers stuck.
                        for &key in added.iter().rev() {
                            self.out.release(sink, key)?;
                        }
                        sink.sync()?;
                    }
                }
            }
            Binding::Sequence(children) => {
                for child in children {
                    self.execute(child, trigger, now, ctx, sink)?;
                }
            }
            Binding::Submap { keymap, on_entry } => {
                self.submap = Some(keymap.clone());
                if let Some(timeout) = self.rules.submap_timeout {
                    self.scheduler.arm(now + timeout, Timer::SubmapExpiry);
                }
                if let Some(entry_binding) = on_entry {
                    self.execute(entry_binding, trigger, now, ctx, sink)?;
                }
            }
            Binding::EscapeNext => self.next_key_mode = NextKeyMode::Escape,
            Binding::IgnoreNext => self.next_key_mode = NextKeyMode::Ignore,
            Binding::Custom(hook) => match hook.call(ctx) {
                Ok(Some(result)) => self.execute(&result, trigger, now, ctx, sink)?,
                Ok(None) => {}
                Err(e) => log::warn!("custom hook '{}' failed: {}", hook.name(), e),
            },
        }
        Ok(())
    }

    fn eject(&mut self, sink: &mut dyn Sink) -> Result<(), OutputError> {
        self.scheduler.clear();
        self.pending_mp.clear();
        self.held.clear();
        self.submap = None;
        self.next_key_mode = NextKeyMode::Normal;
        self.out.release_all(sink)
    }

    fn snapshot_context(&mut self) -> Context {
        let window = match self.provider.as_mut() {
            Some(provider) => {
                let name = provider.name();
                provider.snapshot().unwrap_or_else(|e| {
                    log::debug!("context provider '{name}' failed: {e}");
                    Default::default()
                })
            }
            None => Default::default(),
        };
        Context {
            wm_class: window.wm_class,
            wm_name: window.wm_name,
            device_name: self.device_name.clone(),
            capslock_on: self.capslock_on,
            numlock_on: self.numlock_on,
        }
    }

    fn track_locks(&mut self, effective_key: Key) {
        match effective_key.code() {
            58 => self.capslock_on = !self.capslock_on,
            69 => self.numlock_on = !self.numlock_on,
            _ => {}
        }
    }

    fn dump_state(&self) {
        log::info!(
            "state: held={} suspended={:?} pending_mp={} submap={} output_held={} caps={} num={}",
            self.held.len(),
            self.held
                .suspended_keys()
                .iter()
                .map(|k| k.name())
                .collect::<Vec<_>>(),
            !self.pending_mp.is_empty(),
            self.submap.as_ref().map(|k| k.name()).unwrap_or("-"),
            self.out.len(),
            self.capslock_on,
            self.numlock_on,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::sink::{MemorySink, SinkEvent};
    use crate::Combo;
    use std::time::Duration;

    fn modifier(alias: &str) -> Modifier {
        Modifier::from_alias(alias).unwrap()
    }

    fn press(key: Key, at: Instant) -> KeyEvent {
        KeyEvent::new(key, KeyAction::Press, at, "test-kbd")
    }

    fn release(key: Key, at: Instant) -> KeyEvent {
        KeyEvent::new(key, KeyAction::Release, at, "test-kbd")
    }

    #[test]
    fn empty_rules_pass_keys_through() {
        let mut engine = Engine::new(RuleSet::default());
        let mut sink = MemorySink::new();
        let t0 = Instant::now();

        engine.handle(&press(Key(30), t0), &mut sink).unwrap();
        engine
            .handle(&release(Key(30), t0 + Duration::from_millis(10)), &mut sink)
            .unwrap();

        assert_eq!(
            sink.events,
            vec![
                SinkEvent::Press(Key(30)),
                SinkEvent::Sync,
                SinkEvent::Release(Key(30)),
                SinkEvent::Sync,
            ]
        );
        assert!(engine.is_quiescent());
    }

    #[test]
    fn repeats_are_discarded() {
        let mut engine = Engine::new(RuleSet::default());
        let mut sink = MemorySink::new();
        let t0 = Instant::now();

        engine.handle(&press(Key(30), t0), &mut sink).unwrap();
        let repeat = KeyEvent::new(Key(30), KeyAction::Repeat, t0, "test-kbd");
        engine.handle(&repeat, &mut sink).unwrap();

        assert_eq!(sink.key_events(), vec![SinkEvent::Press(Key(30))]);
    }

    #[test]
    fn escape_next_bypasses_rules() {
        let mut keymap = Keymap::new("k");
        keymap.insert(Combo::bare(Key(33)), Binding::EscapeNext); // F
        keymap.insert(
            Combo::bare(Key(34)),
            Binding::Combo(Combo::bare(Key(59))), // G would remap to F1
        );
        let rules = RuleSet {
            keymaps: vec![keymap],
            ..RuleSet::default()
        };
        let mut engine = Engine::new(rules);
        let mut sink = MemorySink::new();
        let t0 = Instant::now();

        engine.handle(&press(Key(33), t0), &mut sink).unwrap();
        engine.handle(&release(Key(33), t0), &mut sink).unwrap();
        // G is escaped: emitted verbatim instead of remapping to F1.
        engine.handle(&press(Key(34), t0), &mut sink).unwrap();
        engine.handle(&release(Key(34), t0), &mut sink).unwrap();

        assert_eq!(
            sink.key_events(),
            vec![SinkEvent::Press(Key(34)), SinkEvent::Release(Key(34))]
        );

        // Consumed: the next G goes through the rules again.
        sink.clear();
        engine.handle(&press(Key(34), t0), &mut sink).unwrap();
        assert_eq!(
            sink.key_events(),
            vec![SinkEvent::Press(Key(59)), SinkEvent::Release(Key(59))]
        );
    }

    #[test]
    fn ignore_next_drops_one_key() {
        let mut keymap = Keymap::new("k");
        keymap.insert(Combo::bare(Key(33)), Binding::IgnoreNext);
        let rules = RuleSet {
            keymaps: vec![keymap],
            ..RuleSet::default()
        };
        let mut engine = Engine::new(rules);
        let mut sink = MemorySink::new();
        let t0 = Instant::now();

        engine.handle(&press(Key(33), t0), &mut sink).unwrap();
        engine.handle(&release(Key(33), t0), &mut sink).unwrap();
        engine.handle(&press(Key(30), t0), &mut sink).unwrap();
        engine.handle(&release(Key(30), t0), &mut sink).unwrap();
        assert!(sink.key_events().is_empty());

        engine.handle(&press(Key(30), t0), &mut sink).unwrap();
        assert_eq!(sink.key_events(), vec![SinkEvent::Press(Key(30))]);
    }

    #[test]
    fn custom_hook_result_is_executed() {
        use crate::mapping::CustomHook;
        let mut keymap = Keymap::new("k");
        keymap.insert(
            Combo::bare(Key(33)),
            Binding::Custom(CustomHook::new("to-f1", |_| {
                Ok(Some(Binding::Combo(Combo::bare(Key(59)))))
            })),
        );
        let rules = RuleSet {
            keymaps: vec![keymap],
            ..RuleSet::default()
        };
        let mut engine = Engine::new(rules);
        let mut sink = MemorySink::new();
        let t0 = Instant::now();

        engine.handle(&press(Key(33), t0), &mut sink).unwrap();
        assert_eq!(
            sink.key_events(),
            vec![SinkEvent::Press(Key(59)), SinkEvent::Release(Key(59))]
        );
    }

    #[test]
    fn failing_custom_hook_is_a_noop() {
        use crate::mapping::{CustomHook, CustomHookError};
        let mut keymap = Keymap::new("k");
        keymap.insert(
            Combo::bare(Key(33)),
            Binding::Custom(CustomHook::new("broken", |_| {
                Err(CustomHookError("boom".to_string()))
            })),
        );
        let rules = RuleSet {
            keymaps: vec![keymap],
            ..RuleSet::default()
        };
        let mut engine = Engine::new(rules);
        let mut sink = MemorySink::new();
        let t0 = Instant::now();

        engine.handle(&press(Key(33), t0), &mut sink).unwrap();
        engine.handle(&release(Key(33), t0), &mut sink).unwrap();
        assert!(sink.key_events().is_empty());
        assert!(engine.output_is_empty());
    }

    #[test]
    fn eject_key_releases_everything() {
        let mut engine = Engine::new(RuleSet::default());
        let mut sink = MemorySink::new();
        let t0 = Instant::now();

        engine.handle(&press(Key(30), t0), &mut sink).unwrap();
        engine.handle(&press(Key(48), t0), &mut sink).unwrap();
        sink.clear();

        // F16 is the default eject key.
        let flow = engine.handle(&press(Key(186), t0), &mut sink).unwrap();
        assert_eq!(flow, Flow::Eject);
        assert_eq!(
            sink.key_events(),
            vec![SinkEvent::Release(Key(48)), SinkEvent::Release(Key(30))]
        );
        assert!(engine.output_is_empty());
    }

    #[test]
    fn sequence_binding_runs_in_order() {
        let ctrl = modifier("Ctrl");
        let mut keymap = Keymap::new("k");
        keymap.insert(
            Combo::bare(Key(33)),
            Binding::Sequence(vec![
                Binding::Combo(Combo::new([ctrl.clone()], Key(47))), // Ctrl-V
                Binding::Combo(Combo::bare(Key(28))),                // ENTER
            ]),
        );
        let rules = RuleSet {
            keymaps: vec![keymap],
            ..RuleSet::default()
        };
        let mut engine = Engine::new(rules);
        let mut sink = MemorySink::new();
        let t0 = Instant::now();

        engine.handle(&press(Key(33), t0), &mut sink).unwrap();
        assert_eq!(
            sink.key_events(),
            vec![
                SinkEvent::Press(Key(29)),
                SinkEvent::Press(Key(47)),
                SinkEvent::Release(Key(47)),
                SinkEvent::Release(Key(29)),
                SinkEvent::Press(Key(28)),
                SinkEvent::Release(Key(28)),
            ]
        );
    }

    #[test]
    fn bind_retains_modifiers_until_trigger_release() {
        let mut keymap = Keymap::new("k");
        keymap.insert(
            Combo::new([modifier("Super")], Key(15)), // Super-Tab
            Binding::Bind(Combo::new([modifier("Alt")], Key(15))),
        );
        let rules = RuleSet {
            keymaps: vec![keymap],
            ..RuleSet::default()
        };
        let mut engine = Engine::new(rules);
        let mut sink = MemorySink::new();
        let t0 = Instant::now();

        engine.handle(&press(Key(125), t0), &mut sink).unwrap(); // Super suspends
        engine.handle(&press(Key(15), t0), &mut sink).unwrap(); // Tab fires the bind
        assert_eq!(
            sink.key_events(),
            vec![
                SinkEvent::Press(Key(56)),
                SinkEvent::Press(Key(15)),
                SinkEvent::Release(Key(15)),
            ]
        );

        sink.clear();
        engine.handle(&release(Key(15), t0), &mut sink).unwrap();
        assert_eq!(sink.key_events(), vec![SinkEvent::Release(Key(56))]);

        sink.clear();
        engine.handle(&release(Key(125), t0), &mut sink).unwrap();
        assert!(sink.key_events().is_empty());
        assert!(engine.output_is_empty());
    }
}
