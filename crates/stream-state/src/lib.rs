//! Incremental state synchronization for streamed assistant runs.
//!
//! A [`StateStore`] owns a JSON-like tree. Callers mutate it through a
//! [`StateProxy`], which turns each mutation into the smallest batch of
//! [`Operation`]s (`set` or `append-text`) that expresses it. The store
//! applies each batch atomically and forwards it to registered sinks,
//! typically as one `update-state` [`AssistantStreamChunk`].
//!
//! Replaying a store's log against an empty root reproduces its tree:
//!
//! ```
//! use serde_json::json;
//! use stream_state::{replay, StateStore};
//!
//! let mut store = StateStore::new();
//! let mut root = store.root();
//! root.set("items", json!([])).unwrap();
//! root.at("items").unwrap().extend(["x", "y"]).unwrap();
//!
//! assert_eq!(&replay(store.log()).unwrap(), store.state());
//! ```

pub mod chunk;
pub mod cli;
pub mod error;
pub mod graph_events;
pub mod operation;
pub mod options;
pub mod proxy;
pub mod sink;
pub mod store;

pub use stream_state_path::{path, Key, Path, PathError};

pub use chunk::AssistantStreamChunk;
pub use error::{ErrorKind, RejectReason, Result, StateError};
pub use graph_events::{append_graph_event, GraphEvent};
pub use operation::Operation;
pub use options::StoreOptions;
pub use proxy::{Entry, MapProxy, SeqProxy, StateProxy, TextProxy};
pub use sink::{ChunkSender, OperationSink};
pub use store::{replay, StateStore};

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
