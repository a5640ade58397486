use super::*;

#[test]
fn defaults_match_original_deployment() {
    let cfg = WidgetConfig::new("https://example.org");
    assert_eq!(cfg.bootstrap_path, "/chat/api/bootstrap/");
    assert_eq!(cfg.messages_path, "/chat/api/messages/");
    assert_eq!(cfg.system_path, "/chat/api/system/");
    assert_eq!(cfg.send_path, "/chat/api/send/");
    assert_eq!(cfg.new_thread_path, "/chat/api/new-thread/");
    assert_eq!(cfg.poll_timeout_secs, 20);
    assert_eq!(cfg.backoff_floor, Duration::from_millis(500));
    assert_eq!(cfg.backoff_ceiling, Duration::from_millis(8_000));
}

#[test]
fn env_parse_falls_back_on_garbage() {
    // Unset variable.
    assert_eq!(env_parse("LIVECHAT_TEST_UNSET_KNOB", 7_u64), 7);
}

#[test]
fn from_env_overrides_paths_and_knobs() {
    // SAFETY: these keys are read by this test alone.
    unsafe {
        std::env::set_var("LIVECHAT_SYSTEM_PATH", "/alt/system/");
        std::env::set_var("LIVECHAT_POLL_TIMEOUT_SECS", "5");
    }
    let cfg = WidgetConfig::from_env("https://example.org");
    unsafe {
        std::env::remove_var("LIVECHAT_SYSTEM_PATH");
        std::env::remove_var("LIVECHAT_POLL_TIMEOUT_SECS");
    }

    assert_eq!(cfg.system_path, "/alt/system/");
    assert_eq!(cfg.poll_timeout_secs, 5);
    // Untouched keys keep their defaults.
    assert_eq!(cfg.send_path, "/chat/api/send/");
    assert_eq!(cfg.backoff_floor, Duration::from_millis(500));
}

#[test]
fn floor_never_exceeds_ceiling_in_defaults() {
    let cfg = WidgetConfig::new("https://example.org");
    assert!(cfg.backoff_floor <= cfg.backoff_ceiling);
}
