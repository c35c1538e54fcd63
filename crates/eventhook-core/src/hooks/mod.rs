pub mod definition;
pub mod engine;
pub mod invoker;
pub mod store;

pub use definition::{HookDefinition, HookDocument, ScriptKind};
pub use engine::{CompiledScript, ScriptEngine, StoredScripts};
pub use invoker::HookInvoker;
pub use store::{HookSearch, HookStore, HookStoreGateway, StoreError};
