mod handler;
mod model;

pub use handler::{create_occasion, gift_recommendations, upcoming_occasions};
pub use model::Occasion;
