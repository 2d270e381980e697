pub mod feedback;
pub mod message;
pub mod occasion;
pub mod user;
