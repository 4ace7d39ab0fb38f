//! Run-scoped resources: the scratch directory and open install sessions

mod copy;
mod scratch;
mod sessions;

pub(crate) use copy::copy_into_session;
pub use scratch::ScratchDir;
pub(crate) use sessions::SessionSet;
