//! Exit status of apps run by [`crate::gui::run`].

use std::{convert::Infallible, fmt::Debug, process};

/// A [`process::Termination`] that can tell whether it represents success.
///
/// [`crate::gui::run`] never returns, so it has to pick the exit status itself.
pub trait Termination: process::Termination {
    fn is_success(&self) -> bool;
}

impl Termination for Infallible {
    fn is_success(&self) -> bool {
        match *self {}
    }
}

impl Termination for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn is_success(&self) -> bool {
        match self {
            Ok(term) => term.is_success(),
            Err(_) => false,
        }
    }
}
