//! Atlas metadata (`cards.json`).
//!
//! Two layouts are accepted:
//!
//! ```json
//! { "ace_of_spades": { "x": 2, "y": 2, "w": 256, "h": 356 } }
//! { "frames": { "ace_of_spades": { "x": 2, "y": 2, "w": 256, "h": 356 } } }
//! ```
//!
//! Entry order in the document is preserved and becomes layer order.
//! Duplicate names are kept so ingestion can reject them instead of one
//! silently shadowing the other.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::value::RawValue;

use crate::error::{AtlasError, Result};
use crate::sprite::SpriteRect;

const FRAMES_KEY: &str = "frames";

#[derive(Debug, Copy, Clone, serde::Deserialize, serde::Serialize)]
struct FrameRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// JSON object read as an ordered list of entries, duplicates included.
struct Ordered<V>(Vec<(String, V)>);

impl<'de, V> Deserialize<'de> for Ordered<V>
where
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V> Visitor<'de> for OrderedVisitor<V>
        where
            V: Deserialize<'de>,
        {
            type Value = Ordered<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object keyed by sprite name")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Parses atlas metadata from JSON text.
pub fn parse_metadata(text: &str) -> Result<Vec<SpriteRect>> {
    let top: Ordered<Box<RawValue>> =
        serde_json::from_str(text).map_err(|e| AtlasError::Metadata(e.to_string()))?;

    let mut entries = top.0;
    if is_frames_wrapper(&entries) {
        if let Some((_, raw)) = entries.pop() {
            entries = serde_json::from_str::<Ordered<Box<RawValue>>>(raw.get())
                .map_err(|e| AtlasError::Metadata(format!("`{FRAMES_KEY}`: {e}")))?
                .0;
        }
    }

    let mut sprites = Vec::with_capacity(entries.len());
    for (name, raw) in entries {
        let rect: FrameRect = serde_json::from_str(raw.get())
            .map_err(|e| AtlasError::Metadata(format!("sprite `{name}`: {e}")))?;
        sprites.push(SpriteRect::new(name, rect.x, rect.y, rect.w, rect.h));
    }
    Ok(sprites)
}

/// Reads and parses a metadata file.
pub fn load_metadata(path: impl AsRef<Path>) -> Result<Vec<SpriteRect>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| AtlasError::io(path, e))?;
    parse_metadata(&text).map_err(|e| match e {
        AtlasError::Metadata(msg) => AtlasError::Metadata(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Serializes sprites in the `{"frames": {...}}` layout, keeping their order.
pub fn metadata_to_json(sprites: &[SpriteRect]) -> Result<String> {
    struct Frames<'a>(&'a [SpriteRect]);

    impl Serialize for Frames<'_> {
        fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for s in self.0 {
                map.serialize_entry(&s.name, &FrameRect { x: s.x, y: s.y, w: s.w, h: s.h })?;
            }
            map.end()
        }
    }

    #[derive(serde::Serialize)]
    struct Document<'a> {
        frames: Frames<'a>,
    }

    serde_json::to_string_pretty(&Document { frames: Frames(sprites) })
        .map_err(|e| AtlasError::Metadata(e.to_string()))
}

/// A lone `"frames"` entry whose value is not itself a rect.
fn is_frames_wrapper(entries: &[(String, Box<RawValue>)]) -> bool {
    match entries {
        [(key, raw)] => {
            key == FRAMES_KEY && serde_json::from_str::<FrameRect>(raw.get()).is_err()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(sprites: &[SpriteRect]) -> Vec<&str> {
        sprites.iter().map(|s| s.name.as_str()).collect()
    }

    // ── layouts ───────────────────────────────────────────────────────────

    #[test]
    fn bare_object_keeps_document_order() {
        let sprites = parse_metadata(
            r#"{
                "zeta":  { "x": 0,  "y": 0, "w": 8, "h": 8 },
                "alpha": { "x": 8,  "y": 0, "w": 8, "h": 8 },
                "mid":   { "x": 16, "y": 0, "w": 8, "h": 8 }
            }"#,
        )
        .unwrap();

        assert_eq!(names(&sprites), ["zeta", "alpha", "mid"]);
        assert_eq!(sprites[1], SpriteRect::new("alpha", 8, 0, 8, 8));
    }

    #[test]
    fn frames_wrapper_is_unwrapped() {
        let sprites = parse_metadata(
            r#"{ "frames": {
                "b.png": { "x": 2, "y": 2, "w": 4, "h": 6 },
                "a.png": { "x": 8, "y": 2, "w": 4, "h": 6 }
            } }"#,
        )
        .unwrap();

        assert_eq!(names(&sprites), ["b.png", "a.png"]);
    }

    #[test]
    fn sprite_named_frames_is_not_a_wrapper() {
        let sprites = parse_metadata(r#"{ "frames": { "x": 1, "y": 2, "w": 3, "h": 4 } }"#).unwrap();
        assert_eq!(sprites, [SpriteRect::new("frames", 1, 2, 3, 4)]);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let sprites =
            parse_metadata(r#"{ "a": { "x": 0, "y": 0, "w": 1, "h": 1, "rotated": false } }"#)
                .unwrap();
        assert_eq!(sprites.len(), 1);
    }

    #[test]
    fn duplicates_survive_parsing() {
        let sprites = parse_metadata(
            r#"{ "a": { "x": 0, "y": 0, "w": 1, "h": 1 }, "a": { "x": 1, "y": 0, "w": 1, "h": 1 } }"#,
        )
        .unwrap();
        assert_eq!(names(&sprites), ["a", "a"]);
    }

    #[test]
    fn empty_object_parses_to_nothing() {
        assert!(parse_metadata("{}").unwrap().is_empty());
    }

    // ── errors ────────────────────────────────────────────────────────────

    #[test]
    fn missing_field_names_the_sprite() {
        let err = parse_metadata(r#"{ "ace": { "x": 0, "y": 0, "w": 1 } }"#).unwrap_err();
        let AtlasError::Metadata(msg) = err else { panic!("wrong error kind") };
        assert!(msg.contains("ace"), "{msg}");
    }

    #[test]
    fn negative_coordinate_is_rejected() {
        assert!(parse_metadata(r#"{ "a": { "x": -1, "y": 0, "w": 1, "h": 1 } }"#).is_err());
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(matches!(parse_metadata("[1, 2]"), Err(AtlasError::Metadata(_))));
        assert!(matches!(parse_metadata("{ not json"), Err(AtlasError::Metadata(_))));
    }

    // ── writing ───────────────────────────────────────────────────────────

    #[test]
    fn written_metadata_reads_back_in_order() {
        let sprites = vec![
            SpriteRect::new("two", 10, 2, 8, 8),
            SpriteRect::new("one", 2, 2, 8, 8),
        ];
        let json = metadata_to_json(&sprites).unwrap();
        assert!(json.contains("\"frames\""));
        assert_eq!(parse_metadata(&json).unwrap(), sprites);
    }
}
