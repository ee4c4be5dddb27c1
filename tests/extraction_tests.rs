//! Integration tests for ColorExtractor

mod common;
use common::*;

use rgb_dispenser::{
    ClusterSettings, ColorExtractor, DominantColor, ExtractError, RasterError, RasterImage, Srgb,
    extract_dominant,
};

fn extractor(k: usize, seed: Option<u64>) -> ColorExtractor {
    ColorExtractor::new(ClusterSettings {
        k,
        seed,
        ..ClusterSettings::default()
    })
}

#[test]
fn single_color_image_yields_that_color_for_any_k_and_seed() {
    let color = Srgb::new(37u8, 142, 201);
    let image = RasterImage::filled(8, 8, color).unwrap();

    for k in 1..=4 {
        for seed in [None, Some(0), Some(1), Some(99), Some(u64::MAX)] {
            let dominant = extractor(k, seed).extract(&image).unwrap();
            assert_eq!(dominant, DominantColor::new(37, 142, 201), "k={k} seed={seed:?}");
        }
    }
}

#[test]
fn dominant_region_wins_with_strictly_more_members() {
    let image = mostly_red_image();

    for seed in [1, 2, 3, 42] {
        let clustering = extractor(4, Some(seed)).cluster(&image).unwrap();
        let dominant_index = clustering.dominant_index();
        let dominant = clustering.clusters()[dominant_index];

        assert!(dominant.member_count >= 90, "seed={seed}");
        for (index, cluster) in clustering.clusters().iter().enumerate() {
            if index != dominant_index {
                assert!(cluster.member_count < dominant.member_count);
            }
        }

        let color = clustering.dominant();
        assert!(color.red >= 230 && color.green <= 25 && color.blue <= 25, "{color}");
    }
}

#[test]
fn well_separated_colors_are_recovered_exactly() {
    // four distinct colors and k = 4: the best attempt has zero compactness
    let clustering = extractor(4, Some(7)).cluster(&mostly_red_image()).unwrap();

    assert_eq!(clustering.compactness(), 0.0);
    assert_eq!(clustering.dominant(), DominantColor::new(255, 0, 0));

    let mut counts: Vec<usize> = clustering
        .clusters()
        .iter()
        .map(|cluster| cluster.member_count)
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![3, 3, 4, 90]);
}

#[test]
fn every_pixel_belongs_to_exactly_one_cluster() {
    let image = mostly_red_image();
    let clustering = extractor(3, Some(5)).cluster(&image).unwrap();

    assert_eq!(clustering.labels().len(), image.pixel_count());
    assert!(clustering.labels().iter().all(|&label| label < 3));

    let total: usize = clustering.clusters().iter().map(|c| c.member_count).sum();
    assert_eq!(total, image.pixel_count());

    for (index, cluster) in clustering.clusters().iter().enumerate() {
        let labelled = clustering.labels().iter().filter(|&&l| l == index).count();
        assert_eq!(labelled, cluster.member_count);
    }
}

#[test]
fn fixed_seed_is_reproducible() {
    let image = mostly_red_image();
    let first = extractor(3, Some(1234)).cluster(&image).unwrap();
    let second = extractor(3, Some(1234)).cluster(&image).unwrap();

    assert_eq!(first.labels(), second.labels());
    assert_eq!(first.clusters(), second.clusters());
    assert_eq!(first.seed(), second.seed());
}

#[test]
fn more_attempts_never_worsen_compactness() {
    // attempt 0 uses the base seed in both runs, so the best of many is at least as good
    let mut pixels = Vec::new();
    for i in 0..64u8 {
        pixels.push(Srgb::new(i.wrapping_mul(37), i.wrapping_mul(11), 255 - i * 3));
    }
    let image = RasterImage::new(8, 8, pixels).unwrap();

    let single = ColorExtractor::new(ClusterSettings {
        k: 4,
        attempts: 1,
        seed: Some(9),
        ..ClusterSettings::default()
    })
    .cluster(&image)
    .unwrap();
    let many = extractor(4, Some(9)).cluster(&image).unwrap();

    assert!(many.compactness() <= single.compactness());
}

#[test]
fn iteration_cap_is_an_absolute_stop() {
    let image = mostly_red_image();
    let clustering = ColorExtractor::new(ClusterSettings {
        k: 4,
        max_iterations: 1,
        epsilon: 0.0,
        seed: Some(3),
        ..ClusterSettings::default()
    })
    .cluster(&image)
    .unwrap();

    assert_eq!(clustering.iterations(), 1);
}

#[test]
fn too_many_clusters_fails() {
    let image = RasterImage::filled(2, 1, Srgb::new(1, 2, 3)).unwrap();
    assert_eq!(
        extract_dominant(&image, 3, Some(0)),
        Err(ExtractError::ClusteringFailed { k: 3, pixels: 2 })
    );
    assert!(extract_dominant(&image, 2, Some(0)).is_ok());
}

#[test]
fn empty_or_malformed_buffers_are_rejected() {
    let extractor = ColorExtractor::default();

    assert_eq!(
        extractor.extract_bytes(0, 0, &[]),
        Err(ExtractError::ImageInvalid(RasterError::Empty {
            width: 0,
            height: 0
        }))
    );
    assert!(matches!(
        extractor.extract_bytes(2, 2, &[0; 9]),
        Err(ExtractError::ImageInvalid(RasterError::DimensionMismatch { .. }))
    ));
}

#[test]
fn extract_bytes_matches_extract() {
    let bytes: Vec<u8> = [[10u8, 20, 30]; 6].concat();
    let dominant = ColorExtractor::default().extract_bytes(3, 2, &bytes).unwrap();
    assert_eq!(dominant, DominantColor::new(10, 20, 30));
}
