#![no_main]
use libfuzzer_sys::fuzz_target;
use microdoser_core::{PlateFormat, PlateGeometry, Well};

fuzz_target!(|data: &str| {
    let Ok(geometry) = PlateGeometry::new((0.0, 0.0), 9.0) else {
        return;
    };
    let strict = geometry.with_strict_bounds(true);
    if let Ok(well) = Well::parse(data) {
        // Display must round-trip whatever parse accepted.
        let again = Well::parse(&well.to_string()).expect("display of a parsed well parses");
        assert_eq!(well, again);
        let (x, y) = geometry.coords_of(well);
        assert!(x.is_finite() && y.is_finite());
    }
    for format in [PlateFormat::Well96, PlateFormat::Well384] {
        let _ = geometry.well_to_coords(data, format);
        let _ = strict.well_to_coords(data, format);
    }
});
