// UI module.
// Interactive selection of libraries and versions.

pub mod selector;

use crate::context7::Library;
use crate::error::Result;

pub use selector::TerminalSelector;

/// Chooses among search candidates on the caller's behalf.
///
/// Implementations return [`crate::error::Ctx7Error::Cancelled`] when the
/// user backs out.
pub trait Presenter {
    /// Pick one library, returning its identifier.
    fn choose_library(&mut self, candidates: &[Library]) -> Result<String>;

    /// Pick one version string from a non-empty list.
    fn choose_version(&mut self, versions: &[String]) -> Result<String>;
}
