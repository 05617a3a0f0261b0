pub mod observation;
pub mod sampler;
pub mod title_cache;
