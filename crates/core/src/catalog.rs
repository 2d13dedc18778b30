//! Animation catalog: the named specs a batch run is built from.
//!
//! The catalog is an ordered, duplicate-free collection of
//! [`AnimationSpec`] records. Batch runs either process the whole
//! catalog in declaration order or a caller-selected subset of names.

use thiserror::Error;

/// One named animation to generate.
///
/// `name` doubles as the output stem: the service-side artifact prefix,
/// the frame staging directory, and the final `{name}.mp4` all derive
/// from it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSpec {
    /// Unique identifier, e.g. `"desire-black-hole"`.
    pub name: String,
    /// Positive conditioning text. The loop-closure suffix is appended
    /// at graph-build time, not stored here.
    pub prompt: String,
    /// Negative conditioning text. May be empty; the graph builder
    /// substitutes a stock fallback for empty values.
    pub negative_prompt: String,
    /// Number of frames to generate (latent batch size).
    pub frame_count: u32,
    /// Playback rate of the assembled video.
    pub fps: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

/// Validation and lookup failures for catalog construction and selection.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("animation name must not be empty")]
    EmptyName,
    #[error("duplicate animation name: {0:?}")]
    DuplicateName(String),
    #[error("animation {name:?}: {field} must be greater than zero")]
    ZeroField { name: String, field: &'static str },
    #[error("unknown animation name: {0:?}")]
    UnknownName(String),
}

/// Ordered, validated collection of animation specs.
///
/// Construction rejects empty or duplicate names and zero-valued
/// numeric fields, so every spec handed to the pipeline is usable
/// as-is.
#[derive(Debug, Clone)]
pub struct AnimationCatalog {
    specs: Vec<AnimationSpec>,
}

impl AnimationCatalog {
    /// Build a catalog from caller-supplied specs, validating as it goes.
    pub fn new(specs: Vec<AnimationSpec>) -> Result<Self, CatalogError> {
        let mut seen: Vec<&str> = Vec::with_capacity(specs.len());
        for spec in &specs {
            if spec.name.is_empty() {
                return Err(CatalogError::EmptyName);
            }
            if seen.contains(&spec.name.as_str()) {
                return Err(CatalogError::DuplicateName(spec.name.clone()));
            }
            seen.push(&spec.name);
            for (field, value) in [
                ("frame_count", spec.frame_count),
                ("fps", spec.fps),
                ("width", spec.width),
                ("height", spec.height),
            ] {
                if value == 0 {
                    return Err(CatalogError::ZeroField {
                        name: spec.name.clone(),
                        field,
                    });
                }
            }
        }
        Ok(Self { specs })
    }

    /// The built-in catalog of seamless-loop visualizations.
    ///
    /// The data is static and kept valid by construction; a test
    /// re-runs it through [`AnimationCatalog::new`].
    pub fn builtin() -> Self {
        Self {
            specs: builtin_specs(),
        }
    }

    /// Resolve an ordered subset by name, preserving the caller's order.
    ///
    /// Duplicate requested names yield duplicate entries. Any unknown
    /// name fails the whole selection.
    pub fn select(&self, names: &[String]) -> Result<Vec<AnimationSpec>, CatalogError> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| CatalogError::UnknownName(name.clone()))
            })
            .collect()
    }

    /// Look up a single spec by name.
    pub fn get(&self, name: &str) -> Option<&AnimationSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// All specs in declaration order.
    pub fn specs(&self) -> &[AnimationSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn spec(
    name: &str,
    prompt: &str,
    negative_prompt: &str,
    frame_count: u32,
    width: u32,
    height: u32,
) -> AnimationSpec {
    AnimationSpec {
        name: name.to_string(),
        prompt: prompt.to_string(),
        negative_prompt: negative_prompt.to_string(),
        frame_count,
        fps: 24,
        width,
        height,
    }
}

fn builtin_specs() -> Vec<AnimationSpec> {
    vec![
        spec(
            "desire-black-hole",
            "A mesmerizing black hole in deep space, purple and dark blue accretion disk rotating around a dark center, particles spiraling inward in a vortex, glowing energy trails, cosmic dust, ethereal purple and blue light, smooth rotation, loop animation, spiritual and mystical atmosphere, high contrast, vibrant colors",
            "static image, still frame, low quality, blurry, pixelated, distorted, choppy animation",
            120,
            512,
            512,
        ),
        spec(
            "power-vs-force",
            "Two contrasting energy flows side by side: left side shows chaotic red force energy pushing against a wall, particles bouncing and scattering, exhausting movement. Right side shows smooth blue power energy flowing effortlessly like water, gentle waves, harmonious motion, peaceful and effortless, smooth transitions, loop animation",
            "static, still, low quality, blurry, choppy animation, abrupt transitions",
            90,
            512,
            256,
        ),
        spec(
            "natural-happiness",
            "A beautiful sky scene with fluffy white clouds drifting slowly, bright sun shining through, warm golden light, peaceful blue sky, clouds moving gently, sun pulsing softly with warm glow, serene and calming atmosphere, smooth cloud movement, loop animation, spiritual and peaceful",
            "dark, stormy, chaotic, low quality, blurry, static, harsh lighting",
            100,
            512,
            384,
        ),
        spec(
            "energy-leak",
            "Energy flowing upward like a fountain, blocked by gray emotional barriers, energy leaking out in curved streams, glowing green energy particles escaping, barriers dissolving when energy flows through, smooth particle trails, loop animation, spiritual energy visualization",
            "static, choppy, low quality, blurry, pixelated, straight lines",
            110,
            512,
            512,
        ),
        spec(
            "knowledge-vs-practice",
            "Left side: static books stacked, knowledge represented as still books. Right side: dynamic circle pulsing with energy, ripples expanding outward, particles radiating, active and alive, smooth pulsing motion, loop animation, contrasting static vs dynamic",
            "static, still, low quality, blurry, choppy, synchronized movement",
            80,
            512,
            256,
        ),
        spec(
            "levels-of-truth",
            "Four independent glowing circles arranged in space, each pulsing at different rhythms, connected by subtle energy lines, purple and blue glowing orbs, each representing a different level of truth, smooth pulsing animations, independent but connected, loop animation, spiritual and mystical",
            "static, synchronized, low quality, blurry, uniform pulsing",
            100,
            512,
            512,
        ),
        spec(
            "reprogramming-transition",
            "Old programming represented as fading gray box shrinking, new programming as glowing purple box growing and expanding, particles transitioning between them, smooth morphing transition, transformation animation, loop animation, spiritual reprogramming visualization",
            "static, abrupt transition, low quality, blurry, choppy morphing",
            90,
            512,
            256,
        ),
        spec(
            "resistance-flow",
            "Two energy bars side by side: left shows red resistance block pushing against wall with squash and stretch, exhausting movement. Right shows blue flow block moving smoothly, glowing with energy, effortless motion, smooth transitions, loop animation, contrasting resistance vs flow",
            "static, choppy, low quality, blurry, rigid movement",
            85,
            512,
            256,
        ),
        spec(
            "intention-ripple",
            "Center point pulsing with purple glow, expanding ripple waves radiating outward, awareness indicators appearing around the ripples, smooth expanding circles, glowing particles, spiritual intention visualization, loop animation, peaceful and focused",
            "static, choppy, low quality, blurry, chaotic ripples",
            95,
            512,
            512,
        ),
        spec(
            "music-vibration",
            "Two sets of audio waves: left side shows chaotic red high-frequency waves, irregular and jarring. Right side shows smooth blue harmonious waves, flowing and peaceful, contrasting anger-based vs classical music, smooth wave animations, loop animation",
            "static, still, low quality, blurry, synchronized waves",
            100,
            512,
            256,
        ),
        spec(
            "spiritual-progress-spiral",
            "Spiral path traced through space, glowing dot moving along the spiral with vertical oscillation showing ups and downs, purple energy trail, non-linear spiritual progress visualization, smooth spiral motion, loop animation, mystical and spiritual",
            "linear, straight, static, low quality, blurry, uniform motion",
            120,
            512,
            512,
        ),
        spec(
            "addiction-cloud",
            "Sky scene with sun always shining, clouds appearing and disappearing, drug effect temporarily clears clouds, withdrawal brings thicker clouds back, sun pulsing gently, smooth cloud transitions, loop animation, spiritual metaphor for addiction",
            "static, choppy, low quality, blurry, harsh transitions",
            110,
            512,
            384,
        ),
        spec(
            "reaction-vs-power",
            "Two circles: left shows red reaction circle bouncing when triggered, losing power and fading. Right shows blue power circle stable and radiating energy outward, maintaining power, smooth animations, loop animation, contrasting reaction vs power",
            "static, choppy, low quality, blurry, synchronized movement",
            90,
            512,
            256,
        ),
        spec(
            "body-mind-spirit-layers",
            "Three horizontal layers stacked: body layer (red tension transitioning to green relaxation), mind layer (red tension to green relaxation), spirit layer (red tension to green relaxation), letting go indicator appearing, smooth layer-by-layer relaxation, loop animation, spiritual healing visualization",
            "static, choppy, low quality, blurry, abrupt transitions",
            100,
            512,
            384,
        ),
        spec(
            "shadow-illumination",
            "Dark shadow circle in center, acknowledgment indicator appears, then golden light expands and illuminates the shadow, shadow shrinks and fades as light grows, smooth illumination transition, loop animation, spiritual shadow work visualization",
            "static, abrupt, low quality, blurry, harsh lighting",
            95,
            512,
            512,
        ),
        spec(
            "fear-grief-spill",
            "Container filling with accumulated fear/grief energy (red/orange), energy spilling out into life experiences, spill effect flowing, life experience indicators appearing, smooth filling and spilling animation, loop animation, spiritual emotional processing",
            "static, choppy, low quality, blurry, abrupt flow",
            105,
            512,
            384,
        ),
        spec(
            "emotional-stack-collapse",
            "Stack of emotional layers collapsing from bottom up, energy release from bottom, layers dissolving as they collapse, smooth collapse animation, loop animation, spiritual emotional release visualization",
            "static, choppy, low quality, blurry, abrupt collapse",
            100,
            512,
            384,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample(name: &str) -> AnimationSpec {
        spec(name, "a prompt", "a negative", 10, 64, 64)
    }

    #[test]
    fn builtin_catalog_passes_validation() {
        let catalog = AnimationCatalog::new(builtin_specs()).unwrap();
        assert_eq!(catalog.len(), 17);
    }

    #[test]
    fn builtin_catalog_preserves_declaration_order() {
        let catalog = AnimationCatalog::builtin();
        assert_eq!(catalog.specs()[0].name, "desire-black-hole");
        assert_eq!(catalog.specs()[16].name, "emotional-stack-collapse");
    }

    #[test]
    fn rejects_duplicate_names() {
        let result = AnimationCatalog::new(vec![sample("a"), sample("b"), sample("a")]);
        assert_matches!(result, Err(CatalogError::DuplicateName(name)) if name == "a");
    }

    #[test]
    fn rejects_empty_name() {
        let result = AnimationCatalog::new(vec![sample("")]);
        assert_matches!(result, Err(CatalogError::EmptyName));
    }

    #[test]
    fn rejects_zero_numeric_fields() {
        let mut bad = sample("a");
        bad.frame_count = 0;
        let result = AnimationCatalog::new(vec![bad]);
        assert_matches!(
            result,
            Err(CatalogError::ZeroField { field: "frame_count", .. })
        );

        let mut bad = sample("b");
        bad.fps = 0;
        let result = AnimationCatalog::new(vec![bad]);
        assert_matches!(result, Err(CatalogError::ZeroField { field: "fps", .. }));
    }

    #[test]
    fn select_preserves_request_order() {
        let catalog = AnimationCatalog::builtin();
        let names = vec!["energy-leak".to_string(), "desire-black-hole".to_string()];
        let selected = catalog.select(&names).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].name, "energy-leak");
        assert_eq!(selected[1].name, "desire-black-hole");
    }

    #[test]
    fn select_with_unknown_name_fails() {
        let catalog = AnimationCatalog::builtin();
        let names = vec!["energy-leak".to_string(), "no-such-spec".to_string()];
        let result = catalog.select(&names);
        assert_matches!(result, Err(CatalogError::UnknownName(name)) if name == "no-such-spec");
    }

    #[test]
    fn get_finds_specs_by_name() {
        let catalog = AnimationCatalog::builtin();
        let found = catalog.get("power-vs-force").unwrap();
        assert_eq!(found.frame_count, 90);
        assert_eq!(found.width, 512);
        assert_eq!(found.height, 256);
        assert!(catalog.get("missing").is_none());
    }
}
