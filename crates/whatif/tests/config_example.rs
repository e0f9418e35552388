use whatif::config::{load_config_from_str, LogFormat, ProviderKind};

const EXAMPLE: &str = include_str!("../../../whatif.example.yaml");

#[test]
fn test_example_config_loads() {
    let config = load_config_from_str(EXAMPLE).unwrap();

    assert_eq!(config.server.bind, "127.0.0.1:8080");
    assert_eq!(config.provider.kind, ProviderKind::Stub);
    assert_eq!(config.planner.max_attempts, 3);
    assert!(config.policy.block_high_severity);
    assert_eq!(config.runner.video_max_poll_attempts, 120);
    assert_eq!(config.logging.format, LogFormat::Text);
    assert!(config.database.resolved_path().is_some());
}
