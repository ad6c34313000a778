//! Query configuration
//!
//! # Features
//!
//! - Immutable [`QueryOptions`] hashed and compared by value
//! - Typed extension options via [`OptionKey`]
//! - Layer ordering and filtering via [`DataSelector`]

pub mod data;
pub mod flag;
pub mod options;

pub use data::{
    DataQueryOrder, DataQueryOrderFunction, DataSelector, DataType, DataTypeFilter,
    DataTypeFilterFunction,
};
pub use flag::{Flag, FlagSet};
pub use options::{
    OptionKey, QueryMode, QueryOptions, QueryOptionsBuilder, CONTEXT_SATISFY_MODE,
    DATA_QUERY_ORDER, DATA_TYPE_FILTER,
};
