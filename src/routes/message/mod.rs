mod handler;
mod model;

pub use handler::{generate_message, message_history, recent_messages};
pub use model::MessageRecord;
