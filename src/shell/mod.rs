mod builtins;
mod core;
mod executor;
mod parser;
mod readline;
mod session;
mod signals;

pub use self::core::Shell;
pub use self::session::DEFAULT_HISTORY_LIMIT;
