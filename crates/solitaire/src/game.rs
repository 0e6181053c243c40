use anyhow::{Context, Result};

use solitaire_atlas::load_atlas;
use solitaire_engine::core::{App, AppControl, FrameCtx, StartCtx};
use solitaire_engine::input::Key;
use solitaire_engine::render::{CardDrawRequest, CardRenderer, CardRendererConfig, GpuLayerBackend};
use solitaire_engine::shader::{link, read_shader, ShaderStage};

use crate::config::RunArgs;

const FELT: wgpu::Color = wgpu::Color {
    r: 0.2,
    g: 0.3,
    b: 0.3,
    a: 1.0,
};

/// Fixed table layout: a face-down stock pile and a few face-up cards.
pub fn table() -> Vec<CardDrawRequest> {
    let mut cards = vec![
        CardDrawRequest::named(40.0, 40.0, "back").face_down(),
        CardDrawRequest::named(46.0, 46.0, "back").face_down(),
    ];

    let faces = ["hearts_01", "spades_13", "diamonds_07", "clubs_10"];
    for (i, name) in faces.into_iter().enumerate() {
        cards.push(CardDrawRequest::named(260.0 + 180.0 * i as f32, 40.0, name));
    }

    // A fanned column addressed by layer.
    for (i, layer) in (1..5).enumerate() {
        cards.push(CardDrawRequest::layer(260.0, 300.0 + 40.0 * i as f32, layer));
    }

    cards
}

/// The demo: loads shaders and the card atlas at startup, then draws
/// [`table`] every frame until escape is pressed.
pub struct Solitaire {
    args: RunArgs,
    table: Vec<CardDrawRequest>,
    renderer: Option<CardRenderer>,
}

impl Solitaire {
    pub fn new(args: RunArgs) -> Self {
        Self {
            args,
            table: table(),
            renderer: None,
        }
    }
}

impl App for Solitaire {
    fn on_start(&mut self, ctx: &mut StartCtx<'_, '_>) -> Result<()> {
        let vertex = read_shader(&self.args.vertex_shader, ShaderStage::Vertex)?;
        let fragment = read_shader(&self.args.fragment_shader, ShaderStage::Fragment)?;
        let program = link(vertex, fragment)?;

        let sheet = self.args.sheet_path();
        let metadata = self.args.metadata_path();
        let mut backend = GpuLayerBackend::new(ctx.gpu.device(), ctx.gpu.queue(), ctx.gpu.limits());
        let atlas = load_atlas(&mut backend, &sheet, &metadata)
            .with_context(|| format!("failed to load card atlas {}", sheet.display()))?;

        let renderer = CardRenderer::new(
            ctx.gpu.device(),
            ctx.gpu.surface_format(),
            program,
            atlas,
            CardRendererConfig {
                card_size: None,
                back_sprite: Some(self.args.back.clone()),
            },
        )?;

        let size = renderer.card_size();
        log::info!(
            "table ready: {} cards at {}x{}",
            self.table.len(),
            size.x,
            size.y
        );
        self.renderer = Some(renderer);
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input_frame.pressed(Key::Escape) {
            return AppControl::Exit;
        }

        let (renderer, table) = (&mut self.renderer, &self.table);
        let Some(renderer) = renderer.as_mut() else {
            return AppControl::Continue;
        };

        ctx.render(FELT, |rctx, target| renderer.draw(rctx, target, table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solitaire_atlas::parse_metadata;
    use solitaire_engine::render::CardFace;
    use solitaire_engine::shader::compile;

    const VERTEX: &str = include_str!("../../../Shaders/card.vert.wgsl");
    const FRAGMENT: &str = include_str!("../../../Shaders/card.frag.wgsl");
    const METADATA: &str = include_str!("../../../Assets/cards.json");

    #[test]
    fn bundled_shaders_link() {
        let program = link(
            compile(VERTEX, ShaderStage::Vertex, "card.vert.wgsl").unwrap(),
            compile(FRAGMENT, ShaderStage::Fragment, "card.frag.wgsl").unwrap(),
        )
        .unwrap();
        assert_eq!(program.vertex_inputs(), [0, 1, 2, 3]);
    }

    #[test]
    fn table_names_exist_in_bundled_metadata() {
        let sprites = parse_metadata(METADATA).unwrap();
        let known = |name: &str| sprites.iter().any(|s| s.name == name);

        assert!(known("back"));
        for card in table() {
            match card.face {
                CardFace::Name(name) => assert!(known(&name), "`{name}` missing from cards.json"),
                CardFace::Layer(layer) => assert!((layer as usize) < sprites.len()),
            }
        }
    }

    #[test]
    fn table_has_both_faces() {
        let cards = table();
        assert!(cards.iter().any(|c| c.face_up));
        assert!(cards.iter().any(|c| !c.face_up));
    }
}
