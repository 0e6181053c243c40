use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::compile::CompiledShader;
use super::error::{ShaderError, ShaderStage};

/// Kind of a bound shader resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResourceKind {
    Uniform,
    Storage,
    Texture,
    Sampler,
    Other,
}

/// One `@group(g) @binding(b)` resource declared by either stage.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResourceSlot {
    pub group: u32,
    pub binding: u32,
    pub kind: ResourceKind,
    pub name: Option<String>,
}

/// A vertex/fragment pair whose stage interface matches.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    vertex: CompiledShader,
    fragment: CompiledShader,
    vertex_inputs: Vec<u32>,
    resources: Vec<ResourceSlot>,
}

impl LinkedProgram {
    pub fn vertex(&self) -> &CompiledShader {
        &self.vertex
    }

    pub fn fragment(&self) -> &CompiledShader {
        &self.fragment
    }

    /// `@location`s the vertex stage reads, ascending.
    pub fn vertex_inputs(&self) -> &[u32] {
        &self.vertex_inputs
    }

    /// Resources declared by either stage, sorted by `(group, binding)`.
    pub fn resources(&self) -> &[ResourceSlot] {
        &self.resources
    }

    pub fn resource(&self, group: u32, binding: u32) -> Option<&ResourceSlot> {
        self.resources
            .iter()
            .find(|r| r.group == group && r.binding == binding)
    }
}

// ── interface extraction ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Varying {
    name: Option<String>,
    ty: naga::TypeInner,
    interpolation: Option<naga::Interpolation>,
    sampling: Option<naga::Sampling>,
}

type Interface = BTreeMap<u32, Varying>;

fn collect(
    module: &naga::Module,
    name: Option<&String>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Interface,
) {
    match binding {
        Some(naga::Binding::Location {
            location,
            interpolation,
            sampling,
            ..
        }) => {
            out.insert(
                *location,
                Varying {
                    name: name.cloned(),
                    ty: module.types[ty].inner.clone(),
                    interpolation: *interpolation,
                    sampling: *sampling,
                },
            );
        }
        // Built-ins (position, vertex_index, ...) are not part of the user interface.
        Some(_) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect(module, m.name.as_ref(), m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

fn inputs(shader: &CompiledShader) -> Interface {
    let mut out = Interface::new();
    if let Some(ep) = shader.entry() {
        for arg in &ep.function.arguments {
            collect(shader.module(), arg.name.as_ref(), arg.ty, arg.binding.as_ref(), &mut out);
        }
    }
    out
}

fn outputs(shader: &CompiledShader) -> Interface {
    let mut out = Interface::new();
    if let Some(result) = shader.entry().and_then(|ep| ep.function.result.as_ref()) {
        collect(shader.module(), None, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

fn resources(shader: &CompiledShader, out: &mut Vec<ResourceSlot>) {
    let module = shader.module();
    for (_, var) in module.global_variables.iter() {
        let Some(rb) = &var.binding else { continue };
        let kind = match var.space {
            naga::AddressSpace::Uniform => ResourceKind::Uniform,
            naga::AddressSpace::Storage { .. } => ResourceKind::Storage,
            naga::AddressSpace::Handle => match module.types[var.ty].inner {
                naga::TypeInner::Image { .. } => ResourceKind::Texture,
                naga::TypeInner::Sampler { .. } => ResourceKind::Sampler,
                _ => ResourceKind::Other,
            },
            _ => ResourceKind::Other,
        };
        out.push(ResourceSlot {
            group: rb.group,
            binding: rb.binding,
            kind,
            name: var.name.clone(),
        });
    }
}

// ── link ──────────────────────────────────────────────────────────────────

/// Links a vertex and a fragment shader.
///
/// Every fragment `@location` input must be written by the vertex stage with
/// the same type and interpolation. Extra vertex outputs are allowed. A
/// `(group, binding)` declared by both stages must agree on its kind.
pub fn link(vertex: CompiledShader, fragment: CompiledShader) -> Result<LinkedProgram, ShaderError> {
    let mut log = String::new();

    if vertex.stage() != ShaderStage::Vertex {
        let _ = writeln!(log, "`{}` is a {} shader, expected vertex", vertex.label(), vertex.stage());
    }
    if fragment.stage() != ShaderStage::Fragment {
        let _ = writeln!(log, "`{}` is a {} shader, expected fragment", fragment.label(), fragment.stage());
    }
    if !log.is_empty() {
        return Err(ShaderError::Link { log });
    }

    let produced = outputs(&vertex);
    for (location, wanted) in inputs(&fragment) {
        let what = wanted
            .name
            .as_deref()
            .map_or_else(|| format!("@location({location})"), |n| format!("@location({location}) `{n}`"));
        match produced.get(&location) {
            None => {
                let _ = writeln!(log, "fragment input {what} is not written by the vertex stage");
            }
            Some(have) if have.ty != wanted.ty => {
                let _ = writeln!(
                    log,
                    "fragment input {what} has type {:?}, vertex output has {:?}",
                    wanted.ty, have.ty
                );
            }
            Some(have) if have.interpolation != wanted.interpolation || have.sampling != wanted.sampling => {
                let _ = writeln!(
                    log,
                    "fragment input {what} interpolation {:?}/{:?} differs from vertex output {:?}/{:?}",
                    wanted.interpolation, wanted.sampling, have.interpolation, have.sampling
                );
            }
            Some(_) => {}
        }
    }

    let mut slots = Vec::new();
    resources(&vertex, &mut slots);
    resources(&fragment, &mut slots);
    slots.sort_by_key(|r| (r.group, r.binding));

    let mut merged: Vec<ResourceSlot> = Vec::with_capacity(slots.len());
    for slot in slots {
        match merged.last() {
            Some(prev) if prev.group == slot.group && prev.binding == slot.binding => {
                if prev.kind != slot.kind {
                    let _ = writeln!(
                        log,
                        "@group({}) @binding({}) is {:?} in one stage and {:?} in the other",
                        slot.group, slot.binding, prev.kind, slot.kind
                    );
                }
            }
            _ => merged.push(slot),
        }
    }

    if !log.is_empty() {
        return Err(ShaderError::Link { log: log.trim_end().to_string() });
    }

    let vertex_inputs = inputs(&vertex).into_keys().collect();

    log::debug!("linked `{}` + `{}`", vertex.label(), fragment.label());

    Ok(LinkedProgram {
        vertex,
        fragment,
        vertex_inputs,
        resources: merged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::compile;

    const VS: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) @interpolate(flat) layer: u32,
};

@group(0) @binding(0) var<uniform> scale: vec4<f32>;

@vertex
fn vs_main(@location(0) corner: vec2<f32>, @location(3) layer: u32) -> VsOut {
    var out: VsOut;
    out.pos = vec4<f32>(corner * scale.xy, 0.0, 1.0);
    out.uv = corner;
    out.layer = layer;
    return out;
}
"#;

    fn fs(inputs: &str, body: &str) -> String {
        format!(
            r#"
@group(0) @binding(1) var tex: texture_2d_array<f32>;
@group(0) @binding(2) var samp: sampler;

@fragment
fn fs_main({inputs}) -> @location(0) vec4<f32> {{
    {body}
}}
"#
        )
    }

    fn vertex() -> CompiledShader {
        compile(VS, ShaderStage::Vertex, "vs").unwrap()
    }

    #[test]
    fn matching_interface_links() {
        let frag = fs(
            "@location(0) uv: vec2<f32>, @location(1) @interpolate(flat) layer: u32",
            "return textureSample(tex, samp, uv, layer);",
        );
        let frag = compile(frag, ShaderStage::Fragment, "fs").unwrap();
        let program = link(vertex(), frag).unwrap();

        assert_eq!(program.vertex_inputs(), [0, 3]);
        let kinds: Vec<_> = program.resources().iter().map(|r| (r.binding, r.kind)).collect();
        assert_eq!(
            kinds,
            [
                (0, ResourceKind::Uniform),
                (1, ResourceKind::Texture),
                (2, ResourceKind::Sampler)
            ]
        );
        assert_eq!(program.vertex().entry_point(), "vs_main");
        assert_eq!(program.fragment().entry_point(), "fs_main");
    }

    #[test]
    fn unwritten_location_fails() {
        let frag = fs(
            "@location(2) tint: vec4<f32>",
            "return tint;",
        );
        let frag = compile(frag, ShaderStage::Fragment, "fs").unwrap();
        let ShaderError::Link { log } = link(vertex(), frag).unwrap_err() else {
            panic!("expected link error")
        };
        assert!(log.contains("@location(2)"), "{log}");
        assert!(log.contains("not written"), "{log}");
    }

    #[test]
    fn type_mismatch_fails() {
        let frag = fs(
            "@location(0) uv: vec4<f32>",
            "return uv;",
        );
        let frag = compile(frag, ShaderStage::Fragment, "fs").unwrap();
        let ShaderError::Link { log } = link(vertex(), frag).unwrap_err() else {
            panic!("expected link error")
        };
        assert!(log.contains("`uv`"), "{log}");
        assert!(log.contains("type"), "{log}");
    }

    #[test]
    fn swapped_stages_fail() {
        let frag = compile(fs("", "return vec4<f32>(1.0);"), ShaderStage::Fragment, "fs").unwrap();
        assert!(matches!(link(frag, vertex()), Err(ShaderError::Link { .. })));
    }

    #[test]
    fn conflicting_binding_kinds_fail() {
        let frag = r#"
@group(0) @binding(0) var samp: sampler;
@group(0) @binding(1) var tex: texture_2d<f32>;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(tex, samp, uv);
}
"#;
        let frag = compile(frag, ShaderStage::Fragment, "fs").unwrap();
        let ShaderError::Link { log } = link(vertex(), frag).unwrap_err() else {
            panic!("expected link error")
        };
        assert!(log.contains("@binding(0)"), "{log}");
    }
}
