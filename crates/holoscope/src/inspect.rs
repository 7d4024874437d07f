use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use hologram::{load_field, Category, ParticleField};
use serde::Serialize;

use crate::cli::InspectArgs;
use crate::config::load_config;
use crate::run::{field_params, resolve_assets};

#[derive(Debug, Serialize)]
pub struct FieldReport {
    pub particles: usize,
    pub stride: u32,
    pub source_width: u32,
    pub source_height: u32,
    pub categories: BTreeMap<&'static str, usize>,
    pub depth_min: Option<f32>,
    pub depth_max: Option<f32>,
    pub centroid: [f32; 3],
}

impl FieldReport {
    pub fn from_field(field: &ParticleField) -> Self {
        let histogram = field.category_histogram();
        let categories = (0..histogram.len() as u32)
            .map(|index| {
                let category = Category::from_index(index);
                (category_label(category), histogram[index as usize])
            })
            .collect();
        let (source_width, source_height) = field.source_size();
        let bounds = field.depth_bounds();
        Self {
            particles: field.len(),
            stride: field.stride(),
            source_width,
            source_height,
            categories,
            depth_min: bounds.map(|(min, _)| min),
            depth_max: bounds.map(|(_, max)| max),
            centroid: field.centroid().to_array(),
        }
    }
}

fn category_label(category: Category) -> &'static str {
    match category {
        Category::Dark => "dark",
        Category::Dim => "dim",
        Category::Bright => "bright",
        Category::Highlight => "highlight",
    }
}

pub fn inspect(config_path: Option<&Path>, args: InspectArgs) -> Result<()> {
    let loaded = load_config(config_path)?;
    let Some((color, depth)) = resolve_assets(&loaded, &args.assets)? else {
        bail!("nothing to inspect; pass --color and --depth or set [assets] in the config");
    };
    let params = field_params(&loaded, &args.assets)?;
    let field = load_field(&color, &depth, &params)
        .with_context(|| format!("failed to build field from {}", color.display()))?;
    let report = FieldReport::from_field(&field);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", color.display());
    println!(
        "  particles: {} (stride {}, source {}x{})",
        report.particles, report.stride, report.source_width, report.source_height
    );
    for (label, count) in &report.categories {
        println!("  {label:<10} {count}");
    }
    match (report.depth_min, report.depth_max) {
        (Some(min), Some(max)) => println!("  depth:     {min:.1} ..= {max:.1}"),
        _ => println!("  depth:     (empty field)"),
    }
    let [x, y, z] = report.centroid;
    println!("  centroid:  ({x:.1}, {y:.1}, {z:.1})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hologram::{build_field, FieldParams};
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn report_counts_every_category() {
        let color = RgbImage::from_fn(4, 1, |x, _| {
            let level = [10u8, 90, 160, 240][x as usize];
            Rgb([level, level, level])
        });
        let depth = GrayImage::from_pixel(4, 1, Luma([255]));
        let field = build_field(&color, &depth, &FieldParams::default()).unwrap();

        let report = FieldReport::from_field(&field);
        assert_eq!(report.particles, 4);
        assert_eq!(report.stride, 1);
        assert_eq!((report.source_width, report.source_height), (4, 1));
        for label in ["dark", "dim", "bright", "highlight"] {
            assert_eq!(report.categories[label], 1, "{label}");
        }
        assert_eq!(report.depth_min, report.depth_max);
    }

    #[test]
    fn empty_field_has_no_depth_bounds() {
        let report = FieldReport::from_field(&ParticleField::empty());
        assert_eq!(report.particles, 0);
        assert!(report.depth_min.is_none());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["depth_min"].is_null());
    }
}
