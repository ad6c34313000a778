//! Data layer selection
//!
//! Every holder owns a normal (persisted) and a transient (session-only)
//! node layer. [`DataSelector`] turns a query's order and filter options into
//! the ordered list of layers to consult for a given holder.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::options::{QueryOptions, DATA_QUERY_ORDER, DATA_TYPE_FILTER};
use crate::holder_id::HolderId;

/// A holder's node layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Normal,
    Transient,
}

/// Fixed ordering policy for the two layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataQueryOrder {
    #[default]
    TransientFirst,
    NormalFirst,
}

impl DataQueryOrder {
    pub fn order(self) -> [DataType; 2] {
        match self {
            DataQueryOrder::TransientFirst => [DataType::Transient, DataType::Normal],
            DataQueryOrder::NormalFirst => [DataType::Normal, DataType::Transient],
        }
    }
}

/// Fixed filter policy for the two layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataTypeFilter {
    #[default]
    All,
    NormalOnly,
    TransientOnly,
}

impl DataTypeFilter {
    pub fn includes(self, data_type: DataType) -> bool {
        match self {
            DataTypeFilter::All => true,
            DataTypeFilter::NormalOnly => data_type == DataType::Normal,
            DataTypeFilter::TransientOnly => data_type == DataType::Transient,
        }
    }
}

type OrderFn = dyn Fn(&HolderId) -> DataQueryOrder + Send + Sync;
type FilterFn = dyn Fn(&HolderId, DataType) -> bool + Send + Sync;

/// Per-holder ordering of the layers
///
/// Fixed policies compare by value; custom closures compare by identity, so
/// reusing the same `Arc` keeps query options equal.
#[derive(Clone)]
pub enum DataQueryOrderFunction {
    Fixed(DataQueryOrder),
    Custom(Arc<OrderFn>),
}

impl DataQueryOrderFunction {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&HolderId) -> DataQueryOrder + Send + Sync + 'static,
    {
        DataQueryOrderFunction::Custom(Arc::new(f))
    }

    pub fn order_for(&self, holder: &HolderId) -> [DataType; 2] {
        match self {
            DataQueryOrderFunction::Fixed(order) => order.order(),
            DataQueryOrderFunction::Custom(f) => f(holder).order(),
        }
    }
}

impl Default for DataQueryOrderFunction {
    fn default() -> Self {
        DataQueryOrderFunction::Fixed(DataQueryOrder::default())
    }
}

impl PartialEq for DataQueryOrderFunction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Fixed(a), Self::Fixed(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for DataQueryOrderFunction {}

impl Hash for DataQueryOrderFunction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Fixed(order) => {
                0u8.hash(state);
                order.hash(state);
            }
            Self::Custom(f) => {
                1u8.hash(state);
                (Arc::as_ptr(f) as *const () as usize).hash(state);
            }
        }
    }
}

impl fmt::Debug for DataQueryOrderFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(order) => write!(f, "Fixed({:?})", order),
            Self::Custom(func) => write!(f, "Custom({:p})", Arc::as_ptr(func) as *const ()),
        }
    }
}

/// Per-holder inclusion of the layers
#[derive(Clone)]
pub enum DataTypeFilterFunction {
    Fixed(DataTypeFilter),
    Custom(Arc<FilterFn>),
}

impl DataTypeFilterFunction {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&HolderId, DataType) -> bool + Send + Sync + 'static,
    {
        DataTypeFilterFunction::Custom(Arc::new(f))
    }

    pub fn includes(&self, holder: &HolderId, data_type: DataType) -> bool {
        match self {
            DataTypeFilterFunction::Fixed(filter) => filter.includes(data_type),
            DataTypeFilterFunction::Custom(f) => f(holder, data_type),
        }
    }
}

impl Default for DataTypeFilterFunction {
    fn default() -> Self {
        DataTypeFilterFunction::Fixed(DataTypeFilter::default())
    }
}

impl PartialEq for DataTypeFilterFunction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Fixed(a), Self::Fixed(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for DataTypeFilterFunction {}

impl Hash for DataTypeFilterFunction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Fixed(filter) => {
                0u8.hash(state);
                filter.hash(state);
            }
            Self::Custom(f) => {
                1u8.hash(state);
                (Arc::as_ptr(f) as *const () as usize).hash(state);
            }
        }
    }
}

impl fmt::Debug for DataTypeFilterFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(filter) => write!(f, "Fixed({:?})", filter),
            Self::Custom(func) => write!(f, "Custom({:p})", Arc::as_ptr(func) as *const ()),
        }
    }
}

/// Chooses which layers to consult, and in which order
pub struct DataSelector;

impl DataSelector {
    /// Returns the ordered, filtered layers for `holder`
    ///
    /// # Arguments
    ///
    /// * `options` - Query options carrying the order and filter functions
    /// * `holder` - The holder whose nodes are being assembled
    ///
    /// # Returns
    ///
    /// The order function's full two-layer order with excluded layers
    /// removed. Defaults to transient before normal, both included.
    pub fn select_order(options: &QueryOptions, holder: &HolderId) -> Vec<DataType> {
        let order = options
            .option(&DATA_QUERY_ORDER)
            .map_or_else(|| DataQueryOrder::default().order(), |f| f.order_for(holder));

        match options.option(&DATA_TYPE_FILTER) {
            Some(filter) => order
                .into_iter()
                .filter(|data_type| filter.includes(holder, *data_type))
                .collect(),
            None => order.to_vec(),
        }
    }
}
