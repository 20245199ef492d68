//! Color palette extraction from album art.
//!
//! The image is downsampled, clustered with k-means, and the most prominent
//! colorful cluster becomes the seed. Every role is then derived from the
//! seed's hue by fixing lightness per variant and clamping saturation per
//! role kind.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Longest edge of the thumbnail that gets clustered.
const SAMPLE_EDGE: u32 = 64;
const CLUSTER_COUNT: usize = 5;
const MAX_ITERATIONS: usize = 12;
/// Pixels more transparent than this are ignored.
const MIN_ALPHA: u8 = 16;

/// Dark or light palette variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Dark,
    Light,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Dark => "dark",
            Variant::Light => "light",
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Variant::Dark),
            "light" => Ok(Variant::Light),
            other => Err(format!("unknown palette variant '{other}'")),
        }
    }
}

/// Mapping of color roles (and echoed metadata) to string values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    entries: BTreeMap<String, String>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Derive every color role from a seed color.
    pub fn from_seed(seed: (u8, u8, u8), variant: Variant) -> Self {
        let (h, s, _) = rgb_to_hsl(seed);
        let mut palette = Palette::new();
        palette.insert("source_color", to_hex(seed));
        palette.insert("variant", variant.as_str());

        for role in ROLES {
            let saturation = role.kind.saturation(s);
            let lightness = match variant {
                Variant::Dark => role.dark_lightness,
                Variant::Light => role.light_lightness,
            };
            let hue = (h + role.hue_shift).rem_euclid(360.0);
            palette.insert(role.name, to_hex(hsl_to_rgb(hue, saturation, lightness)));
        }

        palette
    }
}

/// Turns an image file into a palette.
pub trait PaletteExtractor {
    fn extract(&self, image: &Path, variant: Variant) -> Result<Palette>;
}

/// k-means based extractor backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePaletteExtractor;

impl PaletteExtractor for ImagePaletteExtractor {
    fn extract(&self, image: &Path, variant: Variant) -> Result<Palette> {
        // Cached downloads and some player temp files have no extension, so
        // the format comes from the file's magic bytes.
        let decoded = image::ImageReader::open(image)?
            .with_guessed_format()?
            .decode()
            .map_err(|source| Error::Image {
                path: image.to_path_buf(),
                source,
            })?;
        let thumbnail = decoded.thumbnail(SAMPLE_EDGE, SAMPLE_EDGE).to_rgba8();

        let samples: Vec<[f32; 3]> = thumbnail
            .pixels()
            .filter(|p| p[3] >= MIN_ALPHA)
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();

        let seed = seed_color(&samples).ok_or_else(|| Error::EmptyImage(image.to_path_buf()))?;
        tracing::trace!(
            "Palette seed for {}: {}",
            image.display(),
            to_hex(seed)
        );
        Ok(Palette::from_seed(seed, variant))
    }
}

#[derive(Debug, Clone, Copy)]
enum RoleKind {
    /// Vivid colors: keep the seed's chroma within a readable band.
    Accent,
    /// Toned-down companion colors.
    Muted,
    /// Backgrounds and text: barely tinted.
    Neutral,
}

impl RoleKind {
    fn saturation(self, seed: f64) -> f64 {
        match self {
            RoleKind::Accent => seed.clamp(0.35, 0.9),
            RoleKind::Muted => (seed * 0.45).clamp(0.1, 0.5),
            RoleKind::Neutral => seed.min(0.18),
        }
    }
}

struct Role {
    name: &'static str,
    kind: RoleKind,
    hue_shift: f64,
    dark_lightness: f64,
    light_lightness: f64,
}

const fn role(
    name: &'static str,
    kind: RoleKind,
    hue_shift: f64,
    dark_lightness: f64,
    light_lightness: f64,
) -> Role {
    Role {
        name,
        kind,
        hue_shift,
        dark_lightness,
        light_lightness,
    }
}

const ROLES: &[Role] = &[
    role("primary", RoleKind::Accent, 0.0, 0.72, 0.38),
    role("on_primary", RoleKind::Accent, 0.0, 0.18, 0.98),
    role("primary_container", RoleKind::Accent, 0.0, 0.30, 0.88),
    role("on_primary_container", RoleKind::Accent, 0.0, 0.90, 0.12),
    role("secondary", RoleKind::Muted, 0.0, 0.70, 0.40),
    role("on_secondary", RoleKind::Muted, 0.0, 0.20, 0.98),
    role("tertiary", RoleKind::Accent, 60.0, 0.72, 0.40),
    role("surface", RoleKind::Neutral, 0.0, 0.10, 0.97),
    role("surface_container", RoleKind::Neutral, 0.0, 0.16, 0.92),
    role("on_surface", RoleKind::Neutral, 0.0, 0.90, 0.10),
    role("on_surface_variant", RoleKind::Neutral, 0.0, 0.75, 0.30),
    role("outline", RoleKind::Neutral, 0.0, 0.50, 0.50),
];

/// Pick the seed color from RGB samples.
///
/// Clusters are scored by size weighted towards saturated, mid-lightness
/// colors, so a small vivid cluster can beat a large grey one.
fn seed_color(samples: &[[f32; 3]]) -> Option<(u8, u8, u8)> {
    if samples.is_empty() {
        return None;
    }

    let k = CLUSTER_COUNT.min(samples.len());
    let clusters = kmeans_clusters(samples, k, MAX_ITERATIONS);

    clusters
        .into_iter()
        .filter(|c| c.count > 0)
        .map(|c| {
            let rgb = color_from_centroid(c.centroid);
            let (_, s, l) = rgb_to_hsl(rgb);
            let lightness_weight = if !(0.08..=0.92).contains(&l) { 0.2 } else { 1.0 };
            let score = c.count as f64 * (0.3 + s) * lightness_weight;
            (rgb, score)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(rgb, _)| rgb)
}

#[derive(Debug, Clone, Copy)]
struct Cluster {
    centroid: [f32; 3],
    count: usize,
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn kmeans_clusters(samples: &[[f32; 3]], k: usize, max_iter: usize) -> Vec<Cluster> {
    if samples.is_empty() || k == 0 {
        return Vec::new();
    }

    // Deterministic seeding: evenly spaced samples.
    let mut centroids: Vec<[f32; 3]> = (0..k)
        .map(|i| samples[((i * samples.len()) / k).min(samples.len() - 1)])
        .collect();
    let mut assignments = vec![0usize; samples.len()];

    for iter in 0..max_iter {
        let mut sums = vec![[0f32; 3]; k];
        let mut counts = vec![0usize; k];

        for (sample_idx, sample) in samples.iter().enumerate() {
            let best = centroids
                .iter()
                .enumerate()
                .map(|(idx, c)| (idx, squared_distance(sample, c)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(idx, _)| idx)
                .unwrap_or(0);

            assignments[sample_idx] = best;
            for channel in 0..3 {
                sums[best][channel] += sample[channel];
            }
            counts[best] += 1;
        }

        let mut changed = false;
        for i in 0..k {
            if counts[i] == 0 {
                centroids[i] = samples[(i + iter) % samples.len()];
                changed = true;
                continue;
            }
            let n = counts[i] as f32;
            let updated = [sums[i][0] / n, sums[i][1] / n, sums[i][2] / n];
            if squared_distance(&centroids[i], &updated) > 1e-2 {
                changed = true;
            }
            centroids[i] = updated;
        }

        if !changed {
            break;
        }
    }

    let mut counts = vec![0usize; k];
    for &assignment in &assignments {
        counts[assignment] += 1;
    }

    centroids
        .into_iter()
        .zip(counts)
        .map(|(centroid, count)| Cluster { centroid, count })
        .collect()
}

fn color_from_centroid(centroid: [f32; 3]) -> (u8, u8, u8) {
    let channel = |v: f32| v.clamp(0.0, 255.0).round() as u8;
    (channel(centroid[0]), channel(centroid[1]), channel(centroid[2]))
}

/// Format an RGB triple as `#rrggbb`.
pub fn to_hex((r, g, b): (u8, u8, u8)) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Convert RGB to HSL (hue in degrees, saturation and lightness in 0..=1).
pub fn rgb_to_hsl((r, g, b): (u8, u8, u8)) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;

    if delta.abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let s = if l > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let h = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    (h * 60.0, s, l)
}

/// Convert HSL (hue in degrees) back to RGB.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h_prime = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (h_prime.rem_euclid(2.0) - 1.0).abs());

    let (r1, g1, b1) = match h_prime as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let m = l - c / 2.0;
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (channel(r1), channel(g1), channel(b1))
}
