//! The TPC-C dataset: scale, key encoding, record layout, population and transactions.
//!
//! ## Configuration Format
//!
//! The dataset is configured in a dictionary named `tpcc`. All fields are optional:
//!
//! ```toml
//! [tpcc]
//! warehouses = 2            # number of warehouses, the base unit of scaling
//! districts = 10            # districts per warehouse
//! customers = 3000          # customers per district, also the initial orders per district
//! items = 100000            # items, and stock rows per warehouse
//! order_id_space = 16777216 # order ids available per district, bounds NewOrder growth
//! now = 1700000000000       # load timestamp in milliseconds since epoch, default: now
//! bulk_load = false         # route population writes through the bulk-load path
//! ```
//!
//! The defaults of `districts`, `customers` and `items` are the values mandated by the TPC-C
//! standard. Smaller values are useful for tests only.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod keys;
pub mod populate;
pub mod random;
pub mod schema;
pub mod txn;

pub const DEFAULT_WAREHOUSES: u64 = 2;
pub const DEFAULT_DISTRICTS_PER_WAREHOUSE: u64 = 10;
pub const DEFAULT_CUSTOMERS_PER_DISTRICT: u64 = 3_000;
pub const DEFAULT_ITEMS: u64 = 100_000;
pub const DEFAULT_ORDER_ID_SPACE: u64 = 1 << 24;

/// Tenths of the initial orders of a district that are already delivered.
pub const DELIVERED_TENTHS: u64 = 7;

pub const MIN_OL_CNT: u64 = 5;
pub const MAX_OL_CNT: u64 = 15;
pub const MIN_CARRIER_ID: u64 = 1;
pub const MAX_CARRIER_ID: u64 = 10;

/// The scale constants of a dataset. Every key encoding is a function of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub warehouses: u64,
    pub districts: u64,
    pub customers: u64,
    pub items: u64,
    pub order_id_space: u64,
}

impl Scale {
    pub fn new(warehouses: u64) -> Self {
        Self {
            warehouses,
            districts: DEFAULT_DISTRICTS_PER_WAREHOUSE,
            customers: DEFAULT_CUSTOMERS_PER_DISTRICT,
            items: DEFAULT_ITEMS,
            order_id_space: DEFAULT_ORDER_ID_SPACE,
        }
    }

    /// Orders with an id up to this value are loaded as delivered; the rest are new orders.
    pub fn last_delivered_order(&self) -> u64 {
        self.customers * DELIVERED_TENTHS / 10
    }

    /// Checks that every scale constant is usable and that no table's key space overflows the
    /// width left for table-local keys.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("warehouses", self.warehouses),
            ("districts", self.districts),
            ("customers", self.customers),
            ("items", self.items),
        ] {
            if v == 0 {
                return Err(Error::Config(format!("{} should be positive", name)));
            }
        }
        if self.order_id_space <= self.customers {
            return Err(Error::Config(format!(
                "order_id_space {} should be greater than customers {}",
                self.order_id_space, self.customers
            )));
        }
        keys::check_capacity(self)
    }
}

/// Options of the `[tpcc]` section.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TpccOpt {
    pub warehouses: Option<u64>,
    pub districts: Option<u64>,
    pub customers: Option<u64>,
    pub items: Option<u64>,
    pub order_id_space: Option<u64>,
    pub now: Option<u64>,
    pub bulk_load: Option<bool>,
}

/// The immutable dataset configuration handed to the loader and the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct TpccConfig {
    pub scale: Scale,
    /// Load timestamp, milliseconds since the Unix epoch.
    pub now: u64,
    pub bulk_load: bool,
}

impl TpccConfig {
    pub fn new(opt: &TpccOpt) -> Result<Self> {
        let scale = Scale {
            warehouses: opt.warehouses.unwrap_or(DEFAULT_WAREHOUSES),
            districts: opt.districts.unwrap_or(DEFAULT_DISTRICTS_PER_WAREHOUSE),
            customers: opt.customers.unwrap_or(DEFAULT_CUSTOMERS_PER_DISTRICT),
            items: opt.items.unwrap_or(DEFAULT_ITEMS),
            order_id_space: opt.order_id_space.unwrap_or(DEFAULT_ORDER_ID_SPACE),
        };
        scale.validate()?;
        Ok(Self {
            scale,
            now: opt.now.unwrap_or_else(now_millis),
            bulk_load: opt.bulk_load.unwrap_or(false),
        })
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_follow_tpcc() {
        let config = TpccConfig::new(&TpccOpt {
            warehouses: Some(4),
            now: Some(1),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.scale, Scale::new(4));
        assert_eq!(config.scale.last_delivered_order(), 2100);
        assert!(!config.bulk_load);

        let config = TpccConfig::new(&TpccOpt::default()).unwrap();
        assert_eq!(config.scale, Scale::new(DEFAULT_WAREHOUSES));
        assert_eq!(config.scale.warehouses, 2);
    }

    #[test]
    fn zero_scale_is_rejected() {
        let e = TpccConfig::new(&TpccOpt {
            warehouses: Some(0),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);

        let e = TpccConfig::new(&TpccOpt {
            customers: Some(10),
            order_id_space: Some(10),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
    }

    #[test]
    fn overflowing_scale_is_rejected() {
        let mut scale = Scale::new(1 << 20);
        scale.order_id_space = 1 << 40;
        assert_eq!(scale.validate().unwrap_err().kind(), ErrorKind::KeyEncoding);
    }
}
