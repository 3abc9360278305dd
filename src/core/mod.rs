// Core modules: error model, store container, record schema, and the loadout codec.
pub mod accessor;
pub mod error;
pub mod export;
pub mod format;
pub mod list_codec;
pub mod merge;
pub mod ops;
pub mod persist;
pub mod record;
pub mod store;
