use serial_test::serial;
use wards::config::{load_from_env, PolicyConfig};

#[test]
#[serial]
fn unset_env_yields_defaults() {
    std::env::remove_var("WARDS_EXTRA_BLOCKED");
    assert_eq!(load_from_env(), PolicyConfig::default());
}

#[test]
#[serial]
fn comma_list_extends_block_set() {
    std::env::set_var("WARDS_EXTRA_BLOCKED", "curl, wget ,");
    let cfg = load_from_env();
    std::env::remove_var("WARDS_EXTRA_BLOCKED");

    assert!(cfg.blocked_commands.contains("curl"));
    assert!(cfg.blocked_commands.contains("wget"));
    assert!(cfg.blocked_commands.contains("sudo"));
}

#[test]
#[serial]
fn json_list_extends_block_set() {
    std::env::set_var("WARDS_EXTRA_BLOCKED", r#"["ssh", "scp"]"#);
    let cfg = load_from_env();
    std::env::remove_var("WARDS_EXTRA_BLOCKED");

    assert!(cfg.blocked_commands.contains("ssh"));
    assert!(cfg.blocked_commands.contains("scp"));
}

#[test]
#[serial]
fn malformed_json_keeps_defaults() {
    std::env::set_var("WARDS_EXTRA_BLOCKED", "[not json");
    let cfg = load_from_env();
    std::env::remove_var("WARDS_EXTRA_BLOCKED");

    assert_eq!(cfg, PolicyConfig::default());
}
