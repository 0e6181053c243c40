use std::borrow::Cow;
use std::path::Path;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::error::{ShaderError, ShaderStage};

/// A WGSL source that parsed, validated, and exposes an entry point for its stage.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    stage: ShaderStage,
    label: String,
    source: String,
    module: naga::Module,
    entry_point: String,
}

impl CompiledShader {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Entry point name used when building the pipeline (e.g. `vs_main`).
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    /// Uploads the source to the device.
    ///
    /// The source already validated, so wgpu's own front end accepts it.
    pub fn create_module(&self, device: &wgpu::Device) -> wgpu::ShaderModule {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&self.label),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(&self.source)),
        })
    }

    pub(super) fn entry(&self) -> Option<&naga::EntryPoint> {
        self.module
            .entry_points
            .iter()
            .find(|ep| ep.name == self.entry_point)
    }
}

/// Parses and validates `source` as a shader for `stage`.
///
/// Fails with [`ShaderError::Compile`] carrying naga's rendered diagnostic on a
/// syntax or validation error, or when the module has no entry point for
/// `stage`.
pub fn compile(
    source: impl Into<String>,
    stage: ShaderStage,
    label: impl Into<String>,
) -> Result<CompiledShader, ShaderError> {
    let source = source.into();
    let label = label.into();
    let fail = |log: String| ShaderError::Compile {
        stage,
        label: label.clone(),
        log,
    };

    let module = naga::front::wgsl::parse_str(&source)
        .map_err(|e| fail(e.emit_to_string(&source)))?;

    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| fail(e.emit_to_string(&source)))?;

    let mut entries = module
        .entry_points
        .iter()
        .filter(|ep| ep.stage == stage.naga());
    let Some(entry) = entries.next() else {
        return Err(fail(format!("no @{stage} entry point")));
    };
    let entry_point = entry.name.clone();
    if entries.next().is_some() {
        log::debug!("{label}: several @{stage} entry points; using `{entry_point}`");
    }

    log::debug!("compiled {stage} shader {label} (entry `{entry_point}`)");

    Ok(CompiledShader {
        stage,
        label,
        source,
        module,
        entry_point,
    })
}

/// Reads `path` (relative to the working directory) and compiles it.
pub fn read_shader(path: impl AsRef<Path>, stage: ShaderStage) -> Result<CompiledShader, ShaderError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
        stage,
        path: path.to_path_buf(),
        source,
    })?;
    compile(source, stage, path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
@vertex
fn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 0.0, 1.0);
}
"#;

    #[test]
    fn valid_source_compiles() {
        let shader = compile(VS, ShaderStage::Vertex, "vs").unwrap();
        assert_eq!(shader.entry_point(), "vs_main");
        assert_eq!(shader.stage(), ShaderStage::Vertex);
        assert!(shader.entry().is_some());
    }

    #[test]
    fn syntax_error_carries_diagnostic() {
        let err = compile("fn broken( {", ShaderStage::Vertex, "broken.wgsl").unwrap_err();
        let ShaderError::Compile { stage, label, log } = err else { panic!("expected compile error") };
        assert_eq!(stage, ShaderStage::Vertex);
        assert_eq!(label, "broken.wgsl");
        assert!(log.contains("error"), "{log}");
    }

    #[test]
    fn validation_error_is_a_compile_error() {
        // Returns a vec3 where vec4 is declared.
        let src = r#"
@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    return vec3<f32>(0.0, 0.0, 0.0);
}
"#;
        assert!(matches!(
            compile(src, ShaderStage::Vertex, "bad"),
            Err(ShaderError::Compile { .. })
        ));
    }

    #[test]
    fn wrong_stage_is_rejected() {
        let err = compile(VS, ShaderStage::Fragment, "vs").unwrap_err();
        let ShaderError::Compile { log, .. } = err else { panic!("expected compile error") };
        assert!(log.contains("@fragment"), "{log}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_shader("does/not/exist.wgsl", ShaderStage::Fragment).unwrap_err();
        assert!(matches!(err, ShaderError::Io { stage: ShaderStage::Fragment, .. }));
        assert!(err.to_string().contains("does/not/exist.wgsl"));
    }
}
