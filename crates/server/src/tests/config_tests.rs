use super::*;

fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    }
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
bind_addr = "0.0.0.0:9000"
assets_dir = "GUI/assets"
"#,
    );
    assert_eq!(settings.bind_addr, "0.0.0.0:9000");
    assert_eq!(settings.assets_dir, PathBuf::from("GUI/assets"));
}

#[test]
fn malformed_file_is_ignored() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "bind_addr = [");
    assert_eq!(settings, Settings::default());
}

#[test]
fn app_prefixed_env_wins_over_short_name() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env(&[
            ("PREVIEW_BIND", "127.0.0.1:7000"),
            ("APP__BIND_ADDR", "127.0.0.1:7100"),
            ("APP__ASSETS_DIR", "/srv/preview"),
        ]),
    );
    assert_eq!(settings.bind_addr, "127.0.0.1:7100");
    assert_eq!(settings.assets_dir, PathBuf::from("/srv/preview"));
}

#[test]
fn env_overrides_file() {
    let mut settings = Settings::default();
    apply_file(&mut settings, r#"bind_addr = "0.0.0.0:9000""#);
    apply_env(&mut settings, env(&[("PREVIEW_BIND", "127.0.0.1:7000")]));
    assert_eq!(settings.bind_addr, "127.0.0.1:7000");
    assert_eq!(settings.assets_dir, Settings::default().assets_dir);
}
