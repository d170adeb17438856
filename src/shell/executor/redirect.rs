use std::fs::{File, OpenOptions};
use std::io;

use log::debug;

use super::errors::ExecError;
use super::io::{Input, Output, Streams};
use crate::shell::parser::{Redirect, RedirectKind};
use crate::shell::session::Session;

/// Opens the redirect target and swaps it into `streams`. Whatever handle
/// it replaces is dropped, which closes it.
pub fn apply(
    redirect: &Redirect,
    mut streams: Streams,
    session: &Session,
) -> Result<Streams, ExecError> {
    let path = session.resolve_path(&redirect.target);
    debug!("redirect {} {}", redirect.kind, path.display());

    let wrap = |source: io::Error| ExecError::Redirect {
        path: path.clone(),
        source,
    };

    match redirect.kind {
        RedirectKind::Output => {
            streams.stdout = Output::File(File::create(&path).map_err(wrap)?);
        }
        RedirectKind::Append => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(wrap)?;
            streams.stdout = Output::File(file);
        }
        RedirectKind::Input => {
            streams.stdin = Input::File(File::open(&path).map_err(wrap)?);
        }
        RedirectKind::Error => {
            streams.stderr = Output::File(File::create(&path).map_err(wrap)?);
        }
        RedirectKind::OutputError => {
            let file = File::create(&path).map_err(wrap)?;
            streams.stdout = Output::File(file.try_clone().map_err(wrap)?);
            streams.stderr = Output::File(file);
        }
    }
    Ok(streams)
}
