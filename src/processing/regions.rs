use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::HashMap;

use crate::models::{BoundingBox, ChangeRegion, DifferenceMap};

/// Group changed pixels of a difference map into 8-connected regions.
/// Regions smaller than `min_area` pixels are dropped; the rest are sorted by
/// descending area.
pub fn find_change_regions(map: &DifferenceMap, min_area: u32) -> Vec<ChangeRegion> {
    let image = map.as_image();
    // Labelling splits on pixel value, so group on the binary change mask
    let binary = change_mask(map);
    let labeled = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

    // label -> (min_x, min_y, max_x, max_y, count, peak)
    let mut regions: HashMap<u32, (u32, u32, u32, u32, u32, u8)> = HashMap::new();

    for (x, y, label) in labeled.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue;
        }
        let value = image.get_pixel(x, y)[0];

        regions
            .entry(label_val)
            .and_modify(|(min_x, min_y, max_x, max_y, count, peak)| {
                *min_x = (*min_x).min(x);
                *min_y = (*min_y).min(y);
                *max_x = (*max_x).max(x);
                *max_y = (*max_y).max(y);
                *count += 1;
                *peak = (*peak).max(value);
            })
            .or_insert((x, y, x, y, 1, value));
    }

    let mut result: Vec<ChangeRegion> = regions
        .into_iter()
        .map(|(label, (min_x, min_y, max_x, max_y, count, peak))| ChangeRegion {
            label,
            bbox: BoundingBox {
                x: min_x,
                y: min_y,
                width: max_x - min_x + 1,
                height: max_y - min_y + 1,
            },
            pixel_count: count,
            peak,
        })
        .filter(|r| r.pixel_count >= min_area)
        .collect();

    result.sort_by(|a, b| {
        b.pixel_count
            .cmp(&a.pixel_count)
            .then(a.bbox.y.cmp(&b.bbox.y))
            .then(a.bbox.x.cmp(&b.bbox.x))
    });
    result
}

/// Binary image of the pixels that changed at all
pub fn change_mask(map: &DifferenceMap) -> GrayImage {
    let (width, height) = map.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if map.value(x, y) > 0 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}
