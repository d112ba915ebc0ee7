pub mod color_predicate;
pub mod face_tracker;
pub mod frame;
pub mod mask_engine;
pub mod pixel;
pub mod point_sampler;
pub mod utils;
