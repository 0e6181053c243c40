use solitaire_atlas::{AtlasError, LayerBackend, LayerDesc};

/// Texture format holding `channels` 8-bit channels per texel.
///
/// wgpu has no three-channel 8-bit format, so RGB data has no direct upload.
pub fn layer_format(channels: u32) -> Option<wgpu::TextureFormat> {
    match channels {
        1 => Some(wgpu::TextureFormat::R8Unorm),
        2 => Some(wgpu::TextureFormat::Rg8Unorm),
        4 => Some(wgpu::TextureFormat::Rgba8UnormSrgb),
        _ => None,
    }
}

/// Rejects a texture the device could not create.
///
/// wgpu reports oversized textures through its error handler rather than a
/// return value, so the check happens against the device limits first.
pub fn check_limits(desc: &LayerDesc, limits: &wgpu::Limits) -> Result<(), AtlasError> {
    let fail = |msg: String| Err(AtlasError::ResourceAllocationFailed(msg));

    if desc.width == 0 || desc.height == 0 || desc.layers == 0 {
        return fail(format!(
            "degenerate texture {}x{}x{}",
            desc.width, desc.height, desc.layers
        ));
    }
    if layer_format(desc.channels).is_none() {
        return fail(format!("no texture format for {} channels", desc.channels));
    }
    let max_dim = limits.max_texture_dimension_2d;
    if desc.width > max_dim || desc.height > max_dim {
        return fail(format!(
            "cell {}x{} exceeds the device limit of {max_dim}",
            desc.width, desc.height
        ));
    }
    if desc.layers > limits.max_texture_array_layers {
        return fail(format!(
            "{} layers exceed the device limit of {}",
            desc.layers, limits.max_texture_array_layers
        ));
    }
    Ok(())
}

/// Turns the errors popped off the allocation's error scopes into a result.
///
/// The first captured error wins.
fn scope_result(popped: impl IntoIterator<Item = Option<String>>) -> Result<(), AtlasError> {
    match popped.into_iter().flatten().next() {
        Some(msg) => Err(AtlasError::ResourceAllocationFailed(msg)),
        None => Ok(()),
    }
}

/// A 2D array texture and the view the card pipeline samples.
#[derive(Debug)]
pub struct GpuLayerTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl GpuLayerTexture {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}

/// [`LayerBackend`] that uploads layers into a wgpu texture array.
///
/// Requests beyond `limits` fail before reaching the device. Anything the
/// device still refuses is caught by an error scope around the allocation.
pub struct GpuLayerBackend<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    limits: wgpu::Limits,
}

impl<'a> GpuLayerBackend<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue, limits: wgpu::Limits) -> Self {
        Self { device, queue, limits }
    }
}

impl LayerBackend for GpuLayerBackend<'_> {
    type Texture = GpuLayerTexture;

    fn allocate(&mut self, desc: &LayerDesc) -> Result<GpuLayerTexture, AtlasError> {
        check_limits(desc, &self.limits)?;
        let format = layer_format(desc.channels).ok_or_else(|| {
            AtlasError::ResourceAllocationFailed(format!("no texture format for {} channels", desc.channels))
        })?;

        let oom = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("solitaire card array"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // A one-layer texture would default to a D2 view; the shader wants an array.
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("solitaire card array view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            array_layer_count: Some(desc.layers),
            ..Default::default()
        });

        // Scopes pop innermost first.
        let popped = [
            pollster::block_on(validation.pop()),
            pollster::block_on(oom.pop()),
        ];
        scope_result(popped.iter().map(|e| e.as_ref().map(ToString::to_string)))?;

        log::debug!(
            "allocated {}x{}x{} {format:?} texture array",
            desc.width, desc.height, desc.layers
        );

        Ok(GpuLayerTexture { texture, view })
    }

    fn write_layer(
        &mut self,
        texture: &mut GpuLayerTexture,
        layer: u32,
        pixels: &[u8],
    ) -> Result<(), AtlasError> {
        let size = texture.texture.size();
        let bytes_per_row = size.width * texture.format().block_copy_size(None).unwrap_or(4);
        if layer >= size.depth_or_array_layers {
            return Err(AtlasError::ResourceAllocationFailed(format!(
                "layer {layer} out of range (texture has {})",
                size.depth_or_array_layers
            )));
        }
        let expected = bytes_per_row as usize * size.height as usize;
        if pixels.len() != expected {
            return Err(AtlasError::ResourceAllocationFailed(format!(
                "layer {layer} upload is {} bytes, expected {expected}",
                pixels.len()
            )));
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(size.height),
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(width: u32, height: u32, layers: u32, channels: u32) -> LayerDesc {
        LayerDesc { width, height, layers, channels }
    }

    #[test]
    fn formats_by_channel_count() {
        assert_eq!(layer_format(1), Some(wgpu::TextureFormat::R8Unorm));
        assert_eq!(layer_format(2), Some(wgpu::TextureFormat::Rg8Unorm));
        assert_eq!(layer_format(4), Some(wgpu::TextureFormat::Rgba8UnormSrgb));
        assert_eq!(layer_format(3), None);
    }

    #[test]
    fn card_deck_fits_default_limits() {
        let limits = wgpu::Limits::default();
        assert!(check_limits(&desc(140, 190, 53, 4), &limits).is_ok());
    }

    #[test]
    fn too_many_layers_is_an_allocation_failure() {
        let limits = wgpu::Limits::default();
        let layers = limits.max_texture_array_layers + 1;
        let err = check_limits(&desc(32, 32, layers, 4), &limits).unwrap_err();
        assert!(matches!(err, AtlasError::ResourceAllocationFailed(_)));
    }

    #[test]
    fn oversized_cell_and_rgb_are_rejected() {
        let limits = wgpu::Limits::downlevel_webgl2_defaults();
        let big = limits.max_texture_dimension_2d + 1;
        assert!(check_limits(&desc(big, 32, 1, 4), &limits).is_err());
        assert!(check_limits(&desc(32, 32, 1, 3), &limits).is_err());
        assert!(check_limits(&desc(32, 0, 1, 4), &limits).is_err());
    }

    #[test]
    fn captured_device_error_fails_the_allocation() {
        assert!(scope_result([None, None]).is_ok());

        let err = scope_result([None, Some("out of memory".to_string())]).unwrap_err();
        let AtlasError::ResourceAllocationFailed(msg) = err else {
            panic!("expected allocation failure")
        };
        assert_eq!(msg, "out of memory");
    }
}
