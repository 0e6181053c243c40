use anyhow::{Context, Result};

use solitaire_atlas::pack::load_sprite_dir;
use solitaire_atlas::{load_atlas, pack_sprites, MemoryBackend};

use crate::config::PackArgs;

/// `solitaire pack`: builds a sheet from a folder of PNGs, writes it, and
/// reloads the written files through the ingestion pipeline to verify them.
pub fn run(args: &PackArgs) -> Result<()> {
    let images = load_sprite_dir(&args.dir)
        .with_context(|| format!("failed to read card images from {}", args.dir.display()))?;
    log::info!("read {} images from {}", images.len(), args.dir.display());

    let packed = pack_sprites(&images, &args.options())?;

    let sheet = args.sheet_path();
    let metadata = args.metadata_path();
    if let Some(parent) = sheet.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    packed.save(&sheet, &metadata)?;

    let atlas = load_atlas(&mut MemoryBackend::new(), &sheet, &metadata)
        .context("packed atlas does not load back")?;
    log::info!(
        "wrote {} and {} ({} layers of {}x{})",
        sheet.display(),
        metadata.display(),
        atlas.layer_count(),
        atlas.layer_width(),
        atlas.layer_height()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use solitaire_atlas::DecodedImage;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("solitaire-pack-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn mixed_sizes_write_nothing() {
        let dir = scratch_dir("mixed");
        let cards = dir.join("cards");
        std::fs::create_dir_all(&cards).unwrap();
        DecodedImage::filled(4, 6, &[1, 2, 3, 255]).unwrap().save_png(cards.join("a.png")).unwrap();
        DecodedImage::filled(5, 6, &[4, 5, 6, 255]).unwrap().save_png(cards.join("b.png")).unwrap();

        let args = PackArgs {
            dir: cards,
            out: dir.join("out/sheet"),
            padding: 2,
            max_size: 4096,
        };
        assert!(run(&args).is_err());
        assert!(!args.sheet_path().exists());
        assert!(!args.metadata_path().exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
