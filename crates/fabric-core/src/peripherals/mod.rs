//! The concrete peripherals a fabric SoC can carry.
//!
//! Each one is a thin capability record: it declares what it needs and
//! returns an elaborated unit carrying pass-through parameters. The block
//! internals live in the HDL backend.

pub mod bridge;
pub mod dram;
pub mod identification;
pub mod status;
pub mod system;

pub use bridge::RegisterBridge;
pub use dram::{CacheConfig, DramController, DramPhy};
pub use identification::DeviceDna;
pub use status::LedStatus;
pub use system::{Identifier, SocController};

use crate::design::Port;
use crate::error::{ElaborationError, Result};
use crate::platform::{Signal, SignalBundle};

/// Bind a unit port to a claimed signal.
pub(crate) fn port(name: &str, signal: &Signal) -> Port {
    Port {
        name: name.into(),
        signal: signal.name.clone(),
        width: signal.width(),
        direction: signal.direction,
    }
}

/// Fetch the bundle at `position`, failing with the resource the
/// peripheral expected there.
pub(crate) fn bundle_at<'a>(
    resources: &'a [SignalBundle],
    position: usize,
    expected: &str,
) -> Result<&'a SignalBundle> {
    resources
        .get(position)
        .ok_or_else(|| ElaborationError::UnknownResource {
            name: expected.into(),
            index: None,
        })
}

/// Fetch a subsignal of a composite bundle.
pub(crate) fn subsignal<'a>(bundle: &'a SignalBundle, sub: &str) -> Result<&'a Signal> {
    bundle
        .signal(sub)
        .ok_or_else(|| ElaborationError::UnknownResource {
            name: format!("{}_{sub}", bundle.resource.name),
            index: Some(bundle.resource.index),
        })
}
