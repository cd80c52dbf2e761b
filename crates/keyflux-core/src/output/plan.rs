// Modifier arithmetic for combo emission: which held output modifiers to
// lift, which missing ones to press, before tapping the combo key.

use crate::{Combo, Key};

/// The computed emission steps for one combo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboPlan {
    /// Held output modifiers the combo does not want, most recent first.
    pub lift: Vec<Key>,
    /// Modifier keys to press for the combo, in combo order.
    pub press: Vec<Key>,
    /// The combo's base key.
    pub key: Key,
}

impl ComboPlan {
    /// Lifted modifiers in re-press order (original press order).
    pub fn restore(&self) -> Vec<Key> {
        self.lift.iter().rev().copied().collect()
    }
}

/// Diff a combo's modifier requirements against the modifiers currently
/// held on the output.
///
/// A held key satisfies a combo modifier when it belongs to that role's
/// key set, so a held LEFT_CTRL satisfies an unsided Ctrl requirement.
/// Each held key can satisfy at most one requirement.
pub fn plan_combo(combo: &Combo, held_output_mods: &[Key]) -> ComboPlan {
    let mut lift: Vec<Key> = held_output_mods.to_vec();
    let mut wanted = combo.modifiers().to_vec();

    for &held in held_output_mods {
        if let Some(pos) = wanted.iter().position(|m| m.accepts(held)) {
            wanted.remove(pos);
            lift.retain(|&k| k != held);
        }
    }

    ComboPlan {
        lift: lift.into_iter().rev().collect(),
        press: wanted.iter().map(|m| m.output_key()).collect(),
        key: combo.key(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Modifier;

    fn modifier(alias: &str) -> Modifier {
        Modifier::from_alias(alias).unwrap()
    }

    #[test]
    fn bare_key_needs_nothing() {
        let plan = plan_combo(&Combo::bare(Key(30)), &[]);
        assert!(plan.lift.is_empty());
        assert!(plan.press.is_empty());
        assert_eq!(plan.key, Key(30));
    }

    #[test]
    fn missing_modifier_is_pressed() {
        let combo = Combo::new([modifier("Ctrl")], Key(30));
        let plan = plan_combo(&combo, &[]);
        assert!(plan.lift.is_empty());
        assert_eq!(plan.press, vec![Key(29)]);
    }

    #[test]
    fn held_modifier_satisfies_requirement() {
        let combo = Combo::new([modifier("Ctrl")], Key(30));
        let plan = plan_combo(&combo, &[Key(29)]);
        assert!(plan.lift.is_empty());
        assert!(plan.press.is_empty());

        // Right control satisfies the unsided role just as well.
        let plan = plan_combo(&combo, &[Key(97)]);
        assert!(plan.press.is_empty());
    }

    #[test]
    fn unwanted_modifier_is_lifted() {
        let combo = Combo::new([modifier("Ctrl")], Key(30));
        let plan = plan_combo(&combo, &[Key(42)]); // shift held
        assert_eq!(plan.lift, vec![Key(42)]);
        assert_eq!(plan.press, vec![Key(29)]);
        assert_eq!(plan.restore(), vec![Key(42)]);
    }

    #[test]
    fn partial_overlap_lifts_and_presses() {
        // Ctrl-A wanted while Ctrl+Shift held: lift shift, keep ctrl.
        let combo = Combo::new([modifier("Ctrl")], Key(30));
        let plan = plan_combo(&combo, &[Key(29), Key(42)]);
        assert_eq!(plan.lift, vec![Key(42)]);
        assert!(plan.press.is_empty());
        assert_eq!(plan.restore(), vec![Key(42)]);
    }

    #[test]
    fn lift_order_is_most_recent_first() {
        let combo = Combo::bare(Key(30));
        let plan = plan_combo(&combo, &[Key(29), Key(42)]);
        assert_eq!(plan.lift, vec![Key(42), Key(29)]);
        assert_eq!(plan.restore(), vec![Key(29), Key(42)]);
    }

    #[test]
    fn sided_requirement_rejects_wrong_side() {
        let combo = Combo::new([modifier("LCtrl")], Key(30));
        let plan = plan_combo(&combo, &[Key(97)]); // right ctrl held
        assert_eq!(plan.lift, vec![Key(97)]);
        assert_eq!(plan.press, vec![Key(29)]);
    }

    #[test]
    fn multiple_requirements() {
        let combo = Combo::new([modifier("Ctrl"), modifier("Shift")], Key(30));
        let plan = plan_combo(&combo, &[Key(42)]);
        assert!(plan.lift.is_empty());
        assert_eq!(plan.press, vec![Key(29)]);
    }

    #[test]
    fn held_key_satisfies_only_one_requirement() {
        // Both controls required, one held: the held one covers a single
        // requirement and the other is still pressed.
        let combo = Combo::new([modifier("LCtrl"), modifier("RCtrl")], Key(30));
        let plan = plan_combo(&combo, &[Key(29)]);
        assert!(plan.lift.is_empty());
        assert_eq!(plan.press, vec![Key(97)]);
    }
}
