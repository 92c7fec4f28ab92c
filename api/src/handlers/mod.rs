//! Request handlers

mod hyperv;

pub use hyperv::*;
