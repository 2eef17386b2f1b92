mod chat;
mod document;
mod mapping;
mod selection;
mod tool;

pub use chat::*;
pub use document::*;
pub use mapping::*;
pub use selection::*;
pub use tool::*;
