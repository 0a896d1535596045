//! Static partition of the archipelago into load regions, and the
//! zoom-dependent plan for which regions to load now and which to prefetch.

use foundation::bounds::BoundingBox;
use serde::Serialize;

/// Below this zoom every visible region loads immediately.
pub const REGION_FOCUS_ZOOM: f64 = 8.0;
/// Growth applied to the focused region's bbox when looking for neighbors.
pub const NEIGHBOR_EXPANSION: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub id: &'static str,
    pub name: &'static str,
    /// `(lon, lat)`
    pub center: (f64, f64),
    pub bbox: BoundingBox,
    pub provinces: &'static [&'static str],
}

/// Declaration order matters: where bboxes overlap, the first match wins.
pub const REGIONS: &[Region] = &[
    Region {
        id: "sumatra-north",
        name: "Northern Sumatra",
        center: (98.0, 3.5),
        bbox: BoundingBox::new(95.0, 0.5, 100.5, 6.0),
        provinces: &["Aceh", "Sumatera Utara"],
    },
    Region {
        id: "sumatra-central",
        name: "Central Sumatra",
        center: (101.5, 0.0),
        bbox: BoundingBox::new(98.5, -2.5, 104.5, 2.5),
        provinces: &["Sumatera Barat", "Riau", "Kepulauan Riau", "Jambi"],
    },
    Region {
        id: "sumatra-south",
        name: "Southern Sumatra",
        center: (103.5, -3.75),
        bbox: BoundingBox::new(100.5, -6.0, 106.5, -1.5),
        provinces: &[
            "Sumatera Selatan",
            "Bengkulu",
            "Lampung",
            "Kepulauan Bangka Belitung",
        ],
    },
    Region {
        id: "java-west",
        name: "Western Java",
        center: (106.95, -6.85),
        bbox: BoundingBox::new(105.0, -7.9, 108.9, -5.8),
        provinces: &["Banten", "DKI Jakarta", "Jawa Barat"],
    },
    Region {
        id: "java-central-east",
        name: "Central and Eastern Java",
        center: (111.6, -7.6),
        bbox: BoundingBox::new(108.5, -8.9, 114.7, -6.3),
        provinces: &["Jawa Tengah", "DI Yogyakarta", "Jawa Timur"],
    },
    Region {
        id: "bali-nusa-tenggara",
        name: "Bali and Nusa Tenggara",
        center: (119.8, -9.5),
        bbox: BoundingBox::new(114.4, -11.0, 125.2, -8.0),
        provinces: &["Bali", "Nusa Tenggara Barat", "Nusa Tenggara Timur"],
    },
    Region {
        id: "kalimantan-west",
        name: "Western Kalimantan",
        center: (111.5, -0.5),
        bbox: BoundingBox::new(108.5, -3.5, 114.5, 2.5),
        provinces: &["Kalimantan Barat", "Kalimantan Tengah"],
    },
    Region {
        id: "kalimantan-east",
        name: "Eastern Kalimantan",
        center: (116.75, 0.0),
        bbox: BoundingBox::new(114.0, -4.5, 119.5, 4.5),
        provinces: &["Kalimantan Selatan", "Kalimantan Timur", "Kalimantan Utara"],
    },
    Region {
        id: "sulawesi-north",
        name: "Northern Sulawesi",
        center: (122.75, 1.4),
        bbox: BoundingBox::new(118.5, -2.0, 127.0, 4.8),
        provinces: &["Sulawesi Utara", "Gorontalo", "Sulawesi Tengah"],
    },
    Region {
        id: "sulawesi-south",
        name: "Southern Sulawesi",
        center: (121.5, -4.75),
        bbox: BoundingBox::new(118.5, -7.5, 124.5, -2.0),
        provinces: &["Sulawesi Barat", "Sulawesi Selatan", "Sulawesi Tenggara"],
    },
    Region {
        id: "maluku",
        name: "Maluku Islands",
        center: (129.5, -2.75),
        bbox: BoundingBox::new(124.0, -8.5, 135.0, 3.0),
        provinces: &["Maluku", "Maluku Utara"],
    },
    Region {
        id: "papua",
        name: "Papua",
        center: (135.8, -4.1),
        bbox: BoundingBox::new(130.5, -9.2, 141.1, 1.0),
        provinces: &["Papua Barat", "Papua"],
    },
];

pub fn region(id: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.id == id)
}

/// First region, in declaration order, whose bbox contains the point.
///
/// Regions overlap along shared borders; a point there resolves to whichever
/// region is declared first.
pub fn region_from_point(lon: f64, lat: f64) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.bbox.contains_point(lon, lat))
}

/// Ids of every region whose bbox overlaps `bbox`, in declaration order.
pub fn regions_in_bbox(bbox: &BoundingBox) -> Vec<&'static str> {
    REGIONS
        .iter()
        .filter(|r| r.bbox.intersects(bbox))
        .map(|r| r.id)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadPlan {
    pub immediate: Vec<&'static str>,
    pub prefetch: Vec<&'static str>,
    pub visible: Vec<&'static str>,
}

pub fn load_strategy(viewport: &BoundingBox, zoom: f64) -> LoadPlan {
    let visible = regions_in_bbox(viewport);

    if zoom < REGION_FOCUS_ZOOM {
        return LoadPlan {
            immediate: visible.clone(),
            prefetch: Vec::new(),
            visible,
        };
    }

    let (lon, lat) = viewport.center();
    let Some(focus) = region_from_point(lon, lat) else {
        return LoadPlan {
            immediate: Vec::new(),
            prefetch: visible.clone(),
            visible,
        };
    };

    let neighbors = regions_in_bbox(&focus.bbox.expand(NEIGHBOR_EXPANSION));
    let prefetch = visible
        .iter()
        .copied()
        .filter(|id| *id != focus.id && neighbors.contains(id))
        .collect();

    LoadPlan {
        immediate: vec![focus.id],
        prefetch,
        visible,
    }
}
