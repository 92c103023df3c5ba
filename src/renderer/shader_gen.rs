// ── Instanced sprite WGSL generation ──────────────────────────────────────────
//
// One shader per bound-texture count. The per-instance texture slot picks a
// texture and its size uniform through an unrolled binary split over
// `[0, n)`, never through array indexing, so the same source is valid on
// backends without dynamic sampler indexing.

use std::fmt::Write;

use crate::error::SpriteError;
use crate::sprites::MAX_SUPPORTED_TEXTURES;

/// Shared prologue: the uniform block always carries every size slot so the
/// uniform buffer layout does not depend on the variant.
fn write_globals(out: &mut String) {
    out.push_str("struct Globals {\n    view_proj: mat4x4<f32>,\n");
    for i in 0..MAX_SUPPORTED_TEXTURES {
        let _ = writeln!(out, "    tex_size{i}: vec4<f32>,");
    }
    out.push_str("};\n\n@group(0) @binding(0) var<uniform> globals: Globals;\n");
}

fn write_bindings(out: &mut String, count: usize) {
    if count == 0 {
        return;
    }
    for i in 0..count {
        let _ = writeln!(out, "@group(1) @binding({i}) var tex{i}: texture_2d<f32>;");
    }
    let _ = writeln!(out, "@group(1) @binding({count}) var tex_sampler: sampler;");
}

/// Emit a branch tree selecting on `id` over `[lo, hi)`. Ids outside the
/// range land in the nearest edge leaf.
fn write_select(
    out: &mut String,
    lo: usize,
    hi: usize,
    depth: usize,
    leaf: &dyn Fn(usize) -> String,
) {
    let pad = "    ".repeat(depth);
    if hi - lo <= 1 {
        let _ = writeln!(out, "{pad}{}", leaf(lo));
        return;
    }
    let mid = (lo + hi) / 2;
    let _ = writeln!(out, "{pad}if (id < {mid}u) {{");
    write_select(out, lo, mid, depth + 1, leaf);
    let _ = writeln!(out, "{pad}}} else {{");
    write_select(out, mid, hi, depth + 1, leaf);
    let _ = writeln!(out, "{pad}}}");
}

const IO_STRUCTS: &str = r#"
struct VertexInput {
    @location(0) corner: vec2<f32>,
    @location(1) pos: vec2<f32>,
    @location(2) scale: vec2<f32>,
    @location(3) angle: f32,
    @location(4) anchor: vec2<f32>,
    @location(5) rect: vec4<u32>,
    @location(6) color: vec4<f32>,
    @location(7) tex_id: u32,
};

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) @interpolate(flat) tex_id: u32,
};
"#;

/// WGSL source for the variant sampling `count` textures.
pub fn shader_source(count: usize) -> Result<String, SpriteError> {
    if count > MAX_SUPPORTED_TEXTURES {
        return Err(SpriteError::TooManyTextures {
            requested: count,
            max: MAX_SUPPORTED_TEXTURES,
        });
    }

    let mut out = String::with_capacity(4096);
    let _ = writeln!(out, "// sprite variant: {count} texture(s)");
    write_globals(&mut out);
    write_bindings(&mut out, count);
    out.push_str(IO_STRUCTS);

    // ── Vertex stage ──────────────────────────────────────────────────────────
    out.push_str(
        "
@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var tex_size = vec4<f32>(1.0, 1.0, 1.0, 1.0);
",
    );
    if count > 0 {
        out.push_str("    let id = input.tex_id;\n");
        write_select(&mut out, 0, count, 1, &|i| format!("tex_size = globals.tex_size{i};"));
    }
    out.push_str(
        "    let uv0 = vec2<f32>(f32(input.rect.x), f32(input.rect.y));
    let uv1 = vec2<f32>(f32(input.rect.z), f32(input.rect.w));
    let size = uv1 - uv0;
    let c = cos(input.angle);
    let s = sin(input.angle);
    let rot = mat2x2<f32>(c, s, -s, c);
    let offset = rot * ((input.corner - input.anchor) * (size * input.scale));

    var output: VertexOutput;
    output.clip = globals.view_proj * vec4<f32>(offset + input.pos, 0.0, 1.0);
    output.uv = mix(uv0, uv1, input.corner) * tex_size.zw;
    output.color = input.color;
    output.tex_id = input.tex_id;
    return output;
}
",
    );

    // ── Fragment stage ────────────────────────────────────────────────────────
    out.push_str(
        "
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var texel = vec4<f32>(1.0, 1.0, 1.0, 1.0);
",
    );
    if count > 0 {
        // Derivatives must be taken in uniform control flow.
        out.push_str(
            "    let ddx = dpdx(input.uv);
    let ddy = dpdy(input.uv);
    let id = input.tex_id;
",
        );
        write_select(&mut out, 0, count, 1, &|i| {
            format!("texel = textureSampleGrad(tex{i}, tex_sampler, input.uv, ddx, ddy);")
        });
    }
    out.push_str(
        "    let color = texel * input.color;
    if (color.a <= 0.0) {
        discard;
    }
    return color;
}
",
    );

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_variant_has_no_texture_group() {
        let src = shader_source(0).unwrap();
        assert!(!src.contains("@group(1)"));
        assert!(!src.contains("textureSample"));
        assert!(src.contains("discard"));
    }

    #[test]
    fn single_texture_needs_no_branch() {
        let src = shader_source(1).unwrap();
        assert!(!src.contains("if (id <"));
        assert!(src.contains("tex_size = globals.tex_size0;"));
    }

    #[test]
    fn four_textures_split_in_halves() {
        let src = shader_source(4).unwrap();
        assert!(src.contains("if (id < 2u)"));
        assert!(src.contains("if (id < 1u)"));
        assert!(src.contains("if (id < 3u)"));
        assert!(src.contains("@group(1) @binding(4) var tex_sampler: sampler;"));
    }
}
