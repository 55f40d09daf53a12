// uncli-core: device selection, operation dispatch and key-value sync
//
// Sits between the controller client (`uncli-api`) and the CLI. Commands
// are expressed as matcher/action pairs and applied to one device listing.

pub mod dispatch;
pub mod error;
pub mod kv;

pub use dispatch::{
    Action, ApplyReport, Console, DeviceControl, DeviceFailure, DeviceFormat, MatchMode, Matcher,
    Operation, apply, plan,
};
pub use error::CoreError;
pub use kv::{BLOCKED_KEY, KvLists, ListName, ListStore, UNBLOCKED_KEY};
