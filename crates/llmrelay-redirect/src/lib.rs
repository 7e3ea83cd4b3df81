mod engine;
mod gemini_path;
mod json_body;
mod list_transform;

pub use engine::{default_weighted_select, RedirectEngine, Resolution, WeightedSelectFn};
pub use gemini_path::apply_model_redirect_path;
pub use json_body::apply_model_redirect_body;
pub use list_transform::{listing_source_models, transform_model_list};
