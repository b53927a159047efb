//! Component E: per-part Shapley attribution over a fitted partition (spec
//! §4.E), grounded on `KIShapleyTable.{h,cpp}`.

pub mod valuator;

pub use valuator::{ShapleyTable, ShapleyValuator};
