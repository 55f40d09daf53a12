// ── Key-value list sync ──
//
// Two named lists live in the key-value store: terms to block and terms to
// unblock. `sync` turns them into non-greedy operations, so an empty list
// touches nothing.

use std::fmt;
use std::io::Write;

use tracing::{debug, info};
use uncli_api::ConsulKv;

use crate::dispatch::{Action, ApplyReport, Console, DeviceControl, Matcher, Operation, apply};
use crate::error::CoreError;

pub const BLOCKED_KEY: &str = "blocked";
pub const UNBLOCKED_KEY: &str = "unblocked";

/// Storage for named string lists.
///
/// A missing key reads as an empty list; `put` replaces the whole value.
#[allow(async_fn_in_trait)]
pub trait ListStore {
    async fn get(&self, key: &str) -> Result<Vec<String>, uncli_api::Error>;
    async fn put(&self, key: &str, values: &[String]) -> Result<(), uncli_api::Error>;
    async fn delete(&self, key: &str) -> Result<(), uncli_api::Error>;
}

impl ListStore for ConsulKv {
    async fn get(&self, key: &str) -> Result<Vec<String>, uncli_api::Error> {
        ConsulKv::get(self, key).await
    }

    async fn put(&self, key: &str, values: &[String]) -> Result<(), uncli_api::Error> {
        ConsulKv::put(self, key, values).await
    }

    async fn delete(&self, key: &str) -> Result<(), uncli_api::Error> {
        ConsulKv::delete(self, key).await
    }
}

/// Which of the two lists a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListName {
    Block,
    Unblock,
}

impl ListName {
    pub fn key(self) -> &'static str {
        match self {
            Self::Block => BLOCKED_KEY,
            Self::Unblock => UNBLOCKED_KEY,
        }
    }
}

impl fmt::Display for ListName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Block => "block",
            Self::Unblock => "unblock",
        })
    }
}

/// Snapshot of both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvLists {
    pub blocked: Vec<String>,
    pub unblocked: Vec<String>,
}

impl KvLists {
    pub async fn load<S: ListStore>(store: &S) -> Result<Self, CoreError> {
        let blocked = store
            .get(BLOCKED_KEY)
            .await
            .map_err(|e| CoreError::store("read", BLOCKED_KEY, e))?;
        let unblocked = store
            .get(UNBLOCKED_KEY)
            .await
            .map_err(|e| CoreError::store("read", UNBLOCKED_KEY, e))?;
        debug!(
            blocked = blocked.len(),
            unblocked = unblocked.len(),
            "loaded key-value lists"
        );
        Ok(Self { blocked, unblocked })
    }

    /// Block pass first, then unblock. A device on both lists ends unblocked.
    pub fn operations(&self) -> Vec<Operation> {
        vec![
            Operation::new(Matcher::non_greedy(self.blocked.clone()), Action::Block),
            Operation::new(Matcher::non_greedy(self.unblocked.clone()), Action::Unblock),
        ]
    }
}

impl fmt::Display for KvLists {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "KV Config:")?;
        writeln!(f, "  block [{}]", self.blocked.join(" "))?;
        write!(f, "  unblock [{}]", self.unblocked.join(" "))
    }
}

/// Overwrite one list with `terms`.
pub async fn replace<S: ListStore>(
    store: &S,
    list: ListName,
    terms: &[String],
) -> Result<(), CoreError> {
    store
        .put(list.key(), terms)
        .await
        .map_err(|e| CoreError::store("write", list.key(), e))?;
    info!(list = %list, count = terms.len(), "replaced key-value list");
    Ok(())
}

/// Remove one list entirely.
pub async fn clear<S: ListStore>(store: &S, list: ListName) -> Result<(), CoreError> {
    store
        .delete(list.key())
        .await
        .map_err(|e| CoreError::store("delete", list.key(), e))?;
    info!(list = %list, "cleared key-value list");
    Ok(())
}

/// Apply the stored lists to the controller's devices.
pub async fn sync<S, C, O, E>(
    store: &S,
    control: &mut C,
    console: &mut Console<O, E>,
) -> Result<ApplyReport, CoreError>
where
    S: ListStore,
    C: DeviceControl,
    O: Write,
    E: Write,
{
    let lists = KvLists::load(store).await?;
    apply(control, &lists.operations(), console).await
}
