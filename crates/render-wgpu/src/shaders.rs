/// WGSL shader for the textured cubes.
///
/// The base map is sampled at the material's explicit mip level so the
/// stepped refinement shows even when the hardware would pick a finer level.
pub const CUBE_SHADER: &str = r#"
struct FrameUniforms {
    view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

struct MaterialUniforms {
    lod: f32,
    uv_offset: f32,
    opacity: f32,
    roughness: f32,
    metalness: f32,
    has_normal: f32,
    has_roughness: f32,
    textured: f32,
};

@group(1) @binding(0)
var<uniform> material: MaterialUniforms;
@group(1) @binding(1)
var base_map: texture_2d<f32>;
@group(1) @binding(2)
var normal_map: texture_2d<f32>;
@group(1) @binding(3)
var roughness_map: texture_2d<f32>;
@group(1) @binding(4)
var map_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tangent: vec3<f32>,
    @location(3) uv: vec2<f32>,
};

struct InstanceInput {
    @location(4) model_0: vec4<f32>,
    @location(5) model_1: vec4<f32>,
    @location(6) model_2: vec4<f32>,
    @location(7) model_3: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) world_tangent: vec3<f32>,
    @location(3) uv: vec2<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = frame.view_proj * world_pos;
    out.world_pos = world_pos.xyz;
    out.world_normal = normalize((model * vec4<f32>(vertex.normal, 0.0)).xyz);
    out.world_tangent = normalize((model * vec4<f32>(vertex.tangent, 0.0)).xyz);
    out.uv = vertex.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let uv = in.uv + vec2<f32>(material.uv_offset, 0.0);

    var base = vec4<f32>(0.8, 0.8, 0.8, 1.0);
    if (material.textured > 0.5) {
        base = textureSampleLevel(base_map, map_sampler, uv, material.lod);
    }

    var n = normalize(in.world_normal);
    if (material.has_normal > 0.5) {
        let t = normalize(in.world_tangent);
        let b = cross(n, t);
        let tn = textureSampleLevel(normal_map, map_sampler, uv, 0.0).xyz * 2.0 - 1.0;
        n = normalize(mat3x3<f32>(t, b, n) * tn);
    }

    var rough = material.roughness;
    if (material.has_roughness > 0.5) {
        rough = rough * textureSampleLevel(roughness_map, map_sampler, uv, 0.0).g;
    }
    rough = clamp(rough, 0.0, 1.0);

    let light_dir = normalize(vec3<f32>(0.3, 1.0, 0.5));
    let view_dir = normalize(frame.camera_pos.xyz - in.world_pos);
    let half_dir = normalize(light_dir + view_dir);
    let diffuse = max(dot(n, light_dir), 0.0);
    let shininess = mix(128.0, 4.0, rough);
    let spec_strength = mix(0.04, 1.0, material.metalness) * (1.0 - rough);
    let specular = pow(max(dot(n, half_dir), 0.0), shininess) * spec_strength;

    let albedo = base.rgb * (1.0 - 0.5 * material.metalness);
    let color = albedo * (0.35 + 0.65 * diffuse) + vec3<f32>(specular);
    return vec4<f32>(color, base.a * material.opacity);
}
"#;

/// WGSL shader for the grid floor.
pub const GRID_SHADER: &str = r#"
struct FrameUniforms {
    view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

struct GridVertex {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
};

struct GridOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_grid(vertex: GridVertex) -> GridOutput {
    var out: GridOutput;
    out.clip_position = frame.view_proj * vec4<f32>(vertex.position, 1.0);
    out.color = vertex.color;
    return out;
}

@fragment
fn fs_grid(in: GridOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;
