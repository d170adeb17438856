mod errors;
#[allow(clippy::module_inception)]
mod executor;
mod io;
pub mod job_manager;
mod pipeline;
mod redirect;

pub use errors::ExecError;
pub use executor::{Executor, Outcome};
