mod handler;
mod model;

pub use handler::{
    check_token, login, register, settings, update_password, update_preference,
};
pub use model::User;
