// Configuration loading driven end-to-end: TOML text in, a working
// engine out.

use std::time::{Duration, Instant};

use keyflux_core::{Config, Engine, Key, KeyAction, KeyEvent, MemorySink, SinkEvent};

fn feed(engine: &mut Engine, sink: &mut MemorySink, key: Key, action: KeyAction, at: Instant) {
    engine
        .handle(&KeyEvent::new(key, action, at, "cfg-kbd"), sink)
        .unwrap();
}

#[test]
fn full_config_drives_the_engine() {
    let config = Config::from_toml_str(
        r#"
        [timeouts]
        multipurpose = 0.2
        suspend = 0.5

        [[modmap]]
        name = "caps"
        [modmap.map]
        CAPSLOCK = "LEFT_CTRL"

        [[keymap]]
        name = "mac-like"
        [keymap.map]
        "Super-s" = "Ctrl-s"
        "#,
    )
    .unwrap();

    assert_eq!(config.rules.timeouts.multipurpose, Duration::from_millis(200));

    let mut engine = Engine::new(config.rules);
    let mut sink = MemorySink::new();
    let t0 = Instant::now();
    let ms = Duration::from_millis;

    // The modmap makes CAPSLOCK a control key end to end.
    feed(&mut engine, &mut sink, Key(58), KeyAction::Press, t0);
    feed(&mut engine, &mut sink, Key(46), KeyAction::Press, t0 + ms(10));
    feed(&mut engine, &mut sink, Key(46), KeyAction::Release, t0 + ms(20));
    feed(&mut engine, &mut sink, Key(58), KeyAction::Release, t0 + ms(30));

    assert_eq!(
        sink.key_events(),
        vec![
            SinkEvent::Press(Key(29)),
            SinkEvent::Press(Key(46)),
            SinkEvent::Release(Key(46)),
            SinkEvent::Release(Key(29)),
        ]
    );

    // The keymap remaps Super-S to Ctrl-S.
    sink.clear();
    feed(&mut engine, &mut sink, Key(125), KeyAction::Press, t0 + ms(100));
    feed(&mut engine, &mut sink, Key(31), KeyAction::Press, t0 + ms(110));
    feed(&mut engine, &mut sink, Key(31), KeyAction::Release, t0 + ms(120));
    feed(&mut engine, &mut sink, Key(125), KeyAction::Release, t0 + ms(130));

    assert_eq!(
        sink.key_events(),
        vec![
            SinkEvent::Press(Key(29)),
            SinkEvent::Press(Key(31)),
            SinkEvent::Release(Key(31)),
            SinkEvent::Release(Key(29)),
        ]
    );
    assert!(engine.is_quiescent());
}

#[test]
fn configured_multipurpose_timeout_applies() {
    let config = Config::from_toml_str(
        r#"
        [timeouts]
        multipurpose = 0.2

        [[multipurpose_modmap]]
        [multipurpose_modmap.map]
        ENTER = ["ENTER", "RIGHT_CTRL"]
        "#,
    )
    .unwrap();

    let mut engine = Engine::new(config.rules);
    let mut sink = MemorySink::new();
    let t0 = Instant::now();

    // Released after the configured 200ms window: hold role.
    feed(&mut engine, &mut sink, Key(28), KeyAction::Press, t0);
    feed(
        &mut engine,
        &mut sink,
        Key(28),
        KeyAction::Release,
        t0 + Duration::from_millis(250),
    );

    assert_eq!(
        sink.key_events(),
        vec![SinkEvent::Press(Key(97)), SinkEvent::Release(Key(97))]
    );
}

#[test]
fn configured_submap_runs_multi_stroke() {
    let config = Config::from_toml_str(
        r#"
        [[keymap]]
        [keymap.map]
        "Ctrl-x" = { submap = { "Ctrl-c" = "Ctrl-q" } }
        "#,
    )
    .unwrap();

    let mut engine = Engine::new(config.rules);
    let mut sink = MemorySink::new();
    let t0 = Instant::now();
    let ms = Duration::from_millis;

    feed(&mut engine, &mut sink, Key(29), KeyAction::Press, t0);
    feed(&mut engine, &mut sink, Key(45), KeyAction::Press, t0 + ms(10));
    feed(&mut engine, &mut sink, Key(45), KeyAction::Release, t0 + ms(20));
    feed(&mut engine, &mut sink, Key(46), KeyAction::Press, t0 + ms(30));
    feed(&mut engine, &mut sink, Key(46), KeyAction::Release, t0 + ms(40));
    feed(&mut engine, &mut sink, Key(29), KeyAction::Release, t0 + ms(50));

    assert_eq!(
        sink.key_events(),
        vec![
            SinkEvent::Press(Key(29)),
            SinkEvent::Press(Key(16)),
            SinkEvent::Release(Key(16)),
            SinkEvent::Release(Key(29)),
        ]
    );
}

#[test]
fn window_scoped_keymap_needs_matching_context() {
    // Without a provider the context is empty, so the conditional keymap
    // never applies and the combo passes through.
    let config = Config::from_toml_str(
        r#"
        [[keymap]]
        condition = "wm_class =~ 'kitty'"
        [keymap.map]
        "Ctrl-a" = "Ctrl-q"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new(config.rules);
    let mut sink = MemorySink::new();
    let t0 = Instant::now();
    let ms = Duration::from_millis;

    feed(&mut engine, &mut sink, Key(29), KeyAction::Press, t0);
    feed(&mut engine, &mut sink, Key(30), KeyAction::Press, t0 + ms(10));
    feed(&mut engine, &mut sink, Key(30), KeyAction::Release, t0 + ms(20));
    feed(&mut engine, &mut sink, Key(29), KeyAction::Release, t0 + ms(30));

    assert_eq!(
        sink.key_events(),
        vec![
            SinkEvent::Press(Key(29)),
            SinkEvent::Press(Key(30)),
            SinkEvent::Release(Key(30)),
            SinkEvent::Release(Key(29)),
        ]
    );
}

#[test]
fn malformed_toml_is_rejected() {
    assert!(Config::from_toml_str("not toml [").is_err());
    assert!(Config::from_toml_str("[unknown_section]\nx = 1").is_err());
}
