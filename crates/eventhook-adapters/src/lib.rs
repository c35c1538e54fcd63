pub mod shell_engine;

pub use shell_engine::{ShellScriptEngine, SHELL_LANGS};
