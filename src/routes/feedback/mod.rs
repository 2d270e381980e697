mod handler;
mod model;

pub use handler::{list_feedback, submit_feedback};
pub use model::Feedback;
