use super::*;

#[test]
fn field_names_round_trip() {
    for field in Field::ALL {
        assert_eq!(field.name().parse::<Field>().unwrap(), field);
        assert_eq!(field.to_string(), field.name());
    }
}

#[test]
fn value_aliases_select_value() {
    for alias in ["values", "hash", "members", "entries", "VALUE"] {
        assert_eq!(alias.parse::<Field>().unwrap(), Field::Value);
    }
}

#[test]
fn parse_list_keeps_order_and_drops_duplicates() {
    assert_eq!(
        Field::parse_list(" key, size ,key,type").unwrap(),
        vec![Field::Key, Field::Size, Field::Type]
    );
}

#[test]
fn parse_list_rejects_unknown_and_empty() {
    assert_eq!(
        Field::parse_list("key,colour"),
        Err(ConfigError::UnknownField("colour".to_string()))
    );
    assert_eq!(Field::parse_list(" , "), Err(ConfigError::EmptyFieldList));
}

#[test]
fn default_config_accepts_everything() {
    let config = DecodeConfig::default();
    assert!(config.key_patterns.is_empty());
    assert!(!config.exclude_expired);
    assert!(!config.key_only);
    for field in Field::ALL {
        assert!(config.includes(field));
    }
    assert!(config.now_ms > 0);
}

#[test]
fn builders_set_each_option() {
    let config = DecodeConfig::new()
        .with_now_ms(42)
        .with_key_pattern("^user:")
        .with_key_patterns(["^order:"])
        .with_exclude_expired(true)
        .with_fields(Some(vec![Field::Key, Field::Size]))
        .with_key_only(false);
    assert_eq!(config.now_ms, 42);
    assert_eq!(config.key_patterns, vec!["^user:", "^order:"]);
    assert!(config.exclude_expired);
    assert!(config.includes(Field::Key));
    assert!(!config.includes(Field::Value));
    assert!(!config.key_only);
}

#[test]
fn key_only_is_independent_of_projection() {
    let config = DecodeConfig::new().with_key_only(true);
    assert!(config.key_only);
    assert!(config.includes(Field::Value));
}
