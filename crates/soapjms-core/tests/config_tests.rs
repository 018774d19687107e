//! Configuration view tests

use soapjms_core::{CacheConfig, Configuration, Error};

#[test]
fn test_typed_getters() {
    let config = Configuration::from_pairs([
        ("flag", "yes"),
        ("off", "OFF"),
        ("size", " 12 "),
        ("broken", "twelve"),
        ("blank", "   "),
    ]);

    assert!(config.get_bool("flag", false).unwrap());
    assert!(!config.get_bool("off", true).unwrap());
    assert!(config.get_bool("missing", true).unwrap());
    assert_eq!(config.get_usize("size", 0).unwrap(), 12);
    assert_eq!(config.get_u64("missing", 9).unwrap(), 9);
    assert!(config.get_string("blank").is_none());

    match config.get_usize("broken", 0) {
        Err(Error::InvalidConfig { key, value }) => {
            assert_eq!(key, "broken");
            assert_eq!(value, "twelve");
        }
        other => panic!("expected InvalidConfig, got {:?}", other),
    }
    assert!(config.get_bool("broken", false).is_err());
}

#[test]
fn test_subset_strips_prefix() {
    let config = Configuration::from_pairs([
        ("endpoint.a.selector", "x"),
        ("endpoint.a.poller", "simple"),
        ("endpoint.ab.selector", "y"),
        ("endpoint.a", "not-a-child"),
    ]);
    let subset = config.subset("endpoint.a");
    assert_eq!(subset.len(), 2);
    assert_eq!(subset.get("selector"), Some("x"));
    assert_eq!(subset.get("poller"), Some("simple"));
}

#[test]
fn test_overlay_does_not_mutate() {
    let base = Configuration::from_pairs([("a", "1"), ("b", "2")]);
    let top = Configuration::from_pairs([("b", "3"), ("c", "4")]);
    let merged = base.overlay(&top);

    assert_eq!(merged.get("a"), Some("1"));
    assert_eq!(merged.get("b"), Some("3"));
    assert_eq!(merged.get("c"), Some("4"));
    assert_eq!(base.get("b"), Some("2"));
    assert!(!base.contains_key("c"));
    assert_eq!(top.len(), 2);
}

#[test]
fn test_with_sets_single_key() {
    let config = Configuration::new().with("transactional", "false");
    assert!(!config.get_bool("transactional", true).unwrap());
}

#[test]
fn test_cache_config_defaults() {
    let cache = CacheConfig::from_configuration(&Configuration::new()).unwrap();
    assert_eq!(cache.max_size, 16);
    assert_eq!(cache.initial_capacity, 4);
    assert_eq!(cache.concurrency, 4);
    assert_eq!(cache, CacheConfig::default());
}

#[test]
fn test_cache_config_from_keys() {
    let config = Configuration::from_toml_str(
        r#"
        [transport-cache]
        max-size = 40
        concurrency = 2
        "#,
    )
    .unwrap();
    let cache = CacheConfig::from_configuration(&config).unwrap();
    assert_eq!(cache.max_size, 40);
    assert_eq!(cache.initial_capacity, 10);
    assert_eq!(cache.concurrency, 2);
}

#[test]
fn test_cache_config_rejects_zero() {
    let config = Configuration::from_pairs([("transport-cache.max-size", "0")]);
    assert!(CacheConfig::from_configuration(&config).is_err());

    let config = Configuration::from_pairs([("transport-cache.concurrency", "0")]);
    assert!(CacheConfig::from_configuration(&config).is_err());
}
