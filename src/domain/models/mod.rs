mod attachment;
mod backend;
mod error;
mod event;
mod message;
mod session;
mod slash_commands;
mod storage;

pub use attachment::*;
pub use backend::*;
pub use error::*;
pub use event::*;
pub use message::*;
pub use session::*;
pub use slash_commands::*;
pub use storage::*;
