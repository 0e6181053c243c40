use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use winit::dpi::LogicalSize;

use solitaire_atlas::PackOptions;
use solitaire_engine::window::RuntimeConfig;

#[derive(Parser, Debug)]
#[command(name = "solitaire", version, about = "Draws a card table from a sprite sheet")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,

    /// Log filter in env_logger syntax (overrides RUST_LOG).
    #[arg(long, global = true, value_name = "FILTER")]
    pub log: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pack a folder of card PNGs into a sprite sheet and its metadata.
    Pack(PackArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory holding the sprite sheet and metadata.
    #[arg(long, default_value = "Assets")]
    pub assets: PathBuf,

    /// Sprite sheet file name inside the assets directory.
    #[arg(long, default_value = "cards.png")]
    pub sheet: PathBuf,

    /// Atlas metadata file name inside the assets directory.
    #[arg(long, default_value = "cards.json")]
    pub metadata: PathBuf,

    #[arg(long, default_value = "Shaders/card.vert.wgsl")]
    pub vertex_shader: PathBuf,

    #[arg(long, default_value = "Shaders/card.frag.wgsl")]
    pub fragment_shader: PathBuf,

    #[arg(long, default_value_t = 1400)]
    pub width: u32,

    #[arg(long, default_value_t = 1000)]
    pub height: u32,

    #[arg(long, default_value = "Solitaire")]
    pub title: String,

    /// Sprite shown for face-down cards.
    #[arg(long, default_value = "back")]
    pub back: String,
}

impl RunArgs {
    pub fn sheet_path(&self) -> PathBuf {
        self.assets.join(&self.sheet)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.assets.join(&self.metadata)
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            title: self.title.clone(),
            initial_size: LogicalSize::new(f64::from(self.width), f64::from(self.height)),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PackArgs {
    /// Directory of card images; each file stem becomes a sprite name.
    pub dir: PathBuf,

    /// Output path without extension; writes `<out>.png` and `<out>.json`.
    #[arg(long, short, default_value = "Assets/cards")]
    pub out: PathBuf,

    /// Transparent pixels between and around cells.
    #[arg(long, default_value_t = PackOptions::default().padding)]
    pub padding: u32,

    /// Largest allowed sheet width or height.
    #[arg(long, default_value_t = PackOptions::default().max_size)]
    pub max_size: u32,
}

impl PackArgs {
    pub fn options(&self) -> PackOptions {
        PackOptions {
            padding: self.padding,
            max_size: self.max_size,
        }
    }

    pub fn sheet_path(&self) -> PathBuf {
        self.out.with_extension("png")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.out.with_extension("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_asset_layout() {
        let cli = Cli::try_parse_from(["solitaire"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.sheet_path(), PathBuf::from("Assets/cards.png"));
        assert_eq!(cli.run.metadata_path(), PathBuf::from("Assets/cards.json"));
        assert_eq!(cli.run.vertex_shader, PathBuf::from("Shaders/card.vert.wgsl"));

        let rc = cli.run.runtime_config();
        assert_eq!(rc.title, "Solitaire");
        assert_eq!(rc.initial_size, LogicalSize::new(1400.0, 1000.0));
    }

    #[test]
    fn pack_subcommand() {
        let cli = Cli::try_parse_from(["solitaire", "pack", "cards/", "--out", "build/deck", "--log", "debug"])
            .unwrap();
        let Some(Command::Pack(args)) = cli.command else { panic!("expected pack") };
        assert_eq!(args.dir, PathBuf::from("cards/"));
        assert_eq!(args.sheet_path(), PathBuf::from("build/deck.png"));
        assert_eq!(args.metadata_path(), PathBuf::from("build/deck.json"));
        assert_eq!(args.options().padding, 2);
        assert_eq!(cli.log.as_deref(), Some("debug"));
    }
}
