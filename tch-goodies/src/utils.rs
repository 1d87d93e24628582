/// Guards the denominators of IoU-like ratios.
pub const EPSILON: f64 = 1e-16;
