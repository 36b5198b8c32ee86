use exercise_iframe::{Error, HostConfig, RetryPolicy};

#[test]
fn empty_document_uses_defaults() {
    let config = HostConfig::from_toml("").unwrap();

    assert_eq!(config, HostConfig::default());
    assert!(!config.sandbox.allow_same_origin);
    assert_eq!(config.handshake.target_origin, "*");
    assert!(config.recovery.enabled);
    assert_eq!(config.recovery.window_ms, 5000);
    assert_eq!(config.recovery.max_attempts, 3);
    assert_eq!(config.guest.initial_retry_ms, 1000);
    assert_eq!(config.guest.max_retry_ms, 10_000);
}

#[test]
fn parses_full_document() {
    let text = r#"
[sandbox]
allow_same_origin = true

[handshake]
target_origin = "https://exercises.example.com"

[recovery]
enabled = false
window_ms = 2500
max_attempts = 1

[guest]
initial_retry_ms = 250
max_retry_ms = 4000
"#;

    let config = HostConfig::from_toml(text).unwrap();

    assert!(config.sandbox.allow_same_origin);
    assert_eq!(config.handshake.target_origin, "https://exercises.example.com");
    assert!(!config.recovery.enabled);
    assert_eq!(config.recovery.window_ms, 2500);
    assert_eq!(config.recovery.max_attempts, 1);
    assert_eq!(config.guest.delay_ms(0), 250);
    assert_eq!(config.guest.delay_ms(5), 4000);
}

#[test]
fn partial_tables_keep_other_defaults() {
    let config = HostConfig::from_toml("[recovery]\nmax_attempts = 5\n").unwrap();

    assert_eq!(config.recovery.max_attempts, 5);
    assert!(config.recovery.enabled);
    assert_eq!(config.recovery.window_ms, 5000);
    assert_eq!(config.guest, RetryPolicy::default());
}

#[test]
fn rejects_empty_target_origin() {
    let err = HostConfig::from_toml("[handshake]\ntarget_origin = \" \"\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn rejects_inconsistent_retry_bounds() {
    let zero = HostConfig::from_toml("[guest]\ninitial_retry_ms = 0\n").unwrap_err();
    assert!(matches!(zero, Error::Config(_)));

    let inverted =
        HostConfig::from_toml("[guest]\ninitial_retry_ms = 5000\nmax_retry_ms = 100\n").unwrap_err();
    assert!(inverted.to_string().contains("below guest.initial_retry_ms"));
}

#[test]
fn rejects_malformed_toml() {
    let err = HostConfig::from_toml("[recovery\nenabled = true").unwrap_err();
    assert!(matches!(err, Error::Toml(_)));

    let err = HostConfig::from_toml("[recovery]\nwindow_ms = \"soon\"\n").unwrap_err();
    assert!(matches!(err, Error::Toml(_)));
}

#[test]
fn retry_policy_reads_guest_table() {
    let policy = RetryPolicy::from_toml("[guest]\ninitial_retry_ms = 500\n").unwrap();

    assert_eq!(policy.initial_retry_ms, 500);
    assert_eq!(policy.max_retry_ms, 10_000);
    assert_eq!(policy.delay_ms(1), 1000);
}

#[test]
fn config_round_trips_through_toml() {
    let mut config = HostConfig::default();
    config.recovery.window_ms = 1234;

    let text = toml::to_string(&config).unwrap();

    assert_eq!(HostConfig::from_toml(&text).unwrap(), config);
}
