use fsprites::renderer::shader_gen::shader_source;
use fsprites::{MAX_SUPPORTED_TEXTURES, ShaderVariantCache, SpriteError};

// ── Variant cache ────────────────────────────────────────────────────────────

#[test]
fn cache_builds_one_variant_per_texture_count() {
    let cache = ShaderVariantCache::build(|count, _src| Ok(count)).unwrap();
    assert_eq!(cache.len(), MAX_SUPPORTED_TEXTURES + 1);
    for n in 0..=MAX_SUPPORTED_TEXTURES {
        assert_eq!(*cache.get(n).unwrap(), n);
    }
}

#[test]
fn cache_rejects_counts_past_the_maximum() {
    let cache = ShaderVariantCache::build(|count, _src| Ok(count)).unwrap();
    let err = cache.get(MAX_SUPPORTED_TEXTURES + 1).unwrap_err();
    assert!(matches!(
        err,
        SpriteError::TooManyTextures { requested, max } if requested == MAX_SUPPORTED_TEXTURES + 1
            && max == MAX_SUPPORTED_TEXTURES
    ));
}

#[test]
fn builder_sees_the_generated_source() {
    let cache = ShaderVariantCache::build(|_count, src| Ok(src.to_owned())).unwrap();
    for (n, src) in cache.iter().enumerate() {
        assert_eq!(src, &shader_source(n).unwrap());
    }
}

#[test]
fn builder_failure_aborts_the_cache() {
    let mut calls = 0;
    let result = ShaderVariantCache::<()>::build(|count, _src| {
        calls += 1;
        Err(SpriteError::ShaderBuild { count, reason: "rejected".into() })
    });
    assert!(matches!(result, Err(SpriteError::ShaderBuild { count: 0, .. })));
    assert_eq!(calls, 1);
}

// ── Generated WGSL ───────────────────────────────────────────────────────────

#[test]
fn each_variant_binds_exactly_its_textures() {
    for n in 0..=MAX_SUPPORTED_TEXTURES {
        let src = shader_source(n).unwrap();
        assert_eq!(src.matches("texture_2d<f32>").count(), n, "variant {n}");
        assert_eq!(src.matches("textureSampleGrad(").count(), n, "variant {n}");
        assert_eq!(src.contains("var tex_sampler: sampler;"), n > 0);
    }
}

#[test]
fn variants_never_index_dynamically() {
    for n in 0..=MAX_SUPPORTED_TEXTURES {
        let src = shader_source(n).unwrap();
        assert!(!src.contains('['), "variant {n} uses indexing");
    }
}

#[test]
fn uniform_layout_is_shared_by_all_variants() {
    for n in 0..=MAX_SUPPORTED_TEXTURES {
        let src = shader_source(n).unwrap();
        for i in 0..MAX_SUPPORTED_TEXTURES {
            assert!(src.contains(&format!("tex_size{i}: vec4<f32>,")));
        }
    }
}

#[test]
fn derivatives_precede_the_branches() {
    let src = shader_source(3).unwrap();
    let fs = &src[src.find("fn fs_main").unwrap()..];
    let ddx = fs.find("dpdx(").unwrap();
    let first_branch = fs.find("if (id <").unwrap();
    assert!(ddx < first_branch);
}

#[test]
fn too_many_textures_has_no_source() {
    assert!(matches!(
        shader_source(MAX_SUPPORTED_TEXTURES + 1),
        Err(SpriteError::TooManyTextures { .. })
    ));
}
