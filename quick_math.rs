use std::f64::consts::TAU;

// Angle of a vector measured from the +X axis
pub fn angle_of(dx: f64, dy: f64) -> f64 {
    dy.atan2(dx)
}

// Bring a raw angular difference into (0, 2π]
pub fn normalize_sweep(raw: f64) -> f64 {
    let sweep = raw % TAU;
    if sweep <= 0.0 {
        sweep + TAU
    } else {
        sweep
    }
}

// Calculate distance between two points in the XY plane
pub fn distance_2d(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

// Number of straight steps for a path length, never less than one
pub fn segment_count(length: f64, step: f64) -> usize {
    ((length / step).ceil() as usize).max(1)
}
