use fsprites::renderer::quad_batch::{DEFAULT_BATCH_QUADS, MAX_BATCH_QUADS};
use fsprites::{BatchConfig, MAX_SUPPORTED_TEXTURES, SpriteError, SpritePool};

#[test]
fn empty_json_gives_defaults() {
    let config = BatchConfig::from_json("{}").unwrap();
    assert_eq!(config.capacity, BatchConfig::default().capacity);
    assert_eq!(config.max_quads, DEFAULT_BATCH_QUADS);
    assert_eq!(config.max_textures, MAX_SUPPORTED_TEXTURES);
}

#[test]
fn partial_json_overrides_only_named_fields() {
    let config = BatchConfig::from_json(r#"{ "capacity": 100, "checked_handles": true }"#).unwrap();
    assert_eq!(config.capacity, 100);
    assert!(config.checked_handles);
    assert_eq!(config.max_quads, DEFAULT_BATCH_QUADS);
}

#[test]
fn malformed_json_is_a_config_error() {
    assert!(matches!(BatchConfig::from_json("{ capacity: "), Err(SpriteError::Config(_))));
}

#[test]
fn zero_capacity_is_rejected() {
    assert!(matches!(
        BatchConfig::from_json(r#"{ "capacity": 0 }"#),
        Err(SpriteError::InvalidConfig(_))
    ));
}

#[test]
fn oversized_quad_batch_is_rejected() {
    let json = format!(r#"{{ "max_quads": {} }}"#, MAX_BATCH_QUADS + 1);
    assert!(matches!(BatchConfig::from_json(&json), Err(SpriteError::InvalidConfig(_))));
}

#[test]
fn too_many_textures_is_rejected() {
    let config = BatchConfig { max_textures: MAX_SUPPORTED_TEXTURES + 1, ..Default::default() };
    assert!(matches!(config.validate(), Err(SpriteError::TooManyTextures { .. })));
}

#[test]
fn pool_uses_configured_capacity() {
    let config = BatchConfig { capacity: 3, ..Default::default() };
    let pool = SpritePool::with_config(&config).unwrap();
    assert_eq!(pool.capacity(), 3);
    assert_eq!(pool.available(), 3);
}
