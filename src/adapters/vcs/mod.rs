//! Version-control provider adapters.

pub mod local_git;
pub mod remote_api;

pub use local_git::LocalGitVcs;
pub use remote_api::RemoteApiVcs;
