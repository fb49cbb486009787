// Min-area checks over a hierarchical layout fixture
use delta_merge_drc::drc::{run_min_area_drc, CheckParameters, DesignRules, MinAreaRule};
use delta_merge_drc::geometry::{Point, Rect};
use delta_merge_drc::layout::Library;
use std::time::Instant;

const FIXTURE: &str = "tests/fixtures/hierarchy.json";

fn rules() -> DesignRules {
    DesignRules {
        default_min_area: 50,
        min_area_rules: vec![MinAreaRule {
            layer: "M2".to_string(),
            min_area: 801,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_loads() {
        let library = Library::load(FIXTURE).unwrap();
        assert_eq!(library.name, "hierarchy_demo");
        assert_eq!(library.top_cells(), vec!["TOP"]);
        assert_eq!(
            library.layer_names(),
            vec!["M1".to_string(), "V1".to_string(), "M2".to_string()]
        );
    }

    #[test]
    fn test_hierarchical_min_area() {
        let library = Library::load(FIXTURE).unwrap();
        let start = Instant::now();
        let reports = run_min_area_drc(&library, "TOP", &rules(), &CheckParameters::default(), None).unwrap();
        println!("Hierarchy check: {:.3}ms", start.elapsed().as_secs_f64() * 1000.0);
        assert_eq!(reports.len(), 3);

        // M1: bar 1000, mirrored pad 800, two 4x4 vias (one rotated)
        let m1 = &reports[0];
        assert_eq!(m1.layer, "M1");
        assert_eq!(m1.summary.polygons, 4);
        assert_eq!(m1.summary.total_area, 1832);
        let locations: Vec<Point> = m1.violations.iter().map(|v| v.location).collect();
        assert_eq!(locations, vec![Point::new(200, 0), Point::new(296, 0)]);
        assert_eq!(m1.violations[1].bounds, Rect::new(296, 0, 300, 4));
        assert!(m1.violations.iter().all(|v| v.area == 16 && v.min_area == 50));

        // V1: both via cuts are tiny
        let v1 = &reports[1];
        assert_eq!(v1.violations.len(), 2);
        assert_eq!(v1.violations[0].area, 4);

        // M2: donut of 900 minus a 100 hole, against a per-layer rule of 801
        let m2 = &reports[2];
        assert_eq!(m2.min_area, 801);
        assert_eq!(m2.violations.len(), 1);
        assert_eq!(m2.violations[0].area, 800);
        assert_eq!(m2.violations[0].location, Point::new(500, 500));
        let shape = m2.violations[0].shape.as_ref().unwrap();
        assert_eq!(shape.holes.len(), 1);
        let tiles = m2.violations[0].tiles.as_ref().unwrap();
        assert_eq!(tiles.vertex_count, 8);
        assert_eq!(tiles.triangle_count, 8);
    }

    #[test]
    fn test_pad_cell_alone() {
        let library = Library::load(FIXTURE).unwrap();
        let reports = run_min_area_drc(&library, "PAD", &DesignRules::uniform(801), &CheckParameters::default(), None)
            .unwrap();
        let m1 = &reports[0];
        assert_eq!(m1.violations.len(), 1);
        assert_eq!(m1.violations[0].area, 800);
        assert_eq!(m1.violations[0].location, Point::new(0, 0));
    }

    #[test]
    fn test_msgpack_copy_gives_same_results() {
        let library = Library::load(FIXTURE).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hierarchy.mpk");
        std::fs::write(&path, rmp_serde::to_vec_named(&library).unwrap()).unwrap();

        let copy = Library::load(&path).unwrap();
        assert_eq!(copy, library);

        let params = CheckParameters {
            report_tiles: false,
            ..CheckParameters::default()
        };
        let a = run_min_area_drc(&library, "TOP", &rules(), &params, None).unwrap();
        let b = run_min_area_drc(&copy, "TOP", &rules(), &params, None).unwrap();
        let counts = |r: &[delta_merge_drc::drc::LayerReport]| -> Vec<usize> {
            r.iter().map(|l| l.violations.len()).collect()
        };
        assert_eq!(counts(&a), counts(&b));
        assert!(a.iter().flat_map(|r| &r.violations).all(|v| v.shape.is_none()));
    }
}
