//! The transaction mix of a benchmark run.
//!
//! ## Configuration Format
//!
//! The mix is configured in a dictionary named `mix`, one percentage per transaction type. The
//! percentages must sum to exactly 100. All fields are optional and default to the TPC-C mix:
//!
//! ```toml
//! [mix]
//! new_order = 45
//! payment = 43
//! order_status = 4
//! delivery = 4
//! stock_level = 4
//! ```

use crate::error::{Error, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

/// Number of slots of the lookup table, one per percent.
pub const MIX_SLOTS: usize = 100;

/// The five transaction types, in the canonical order used to lay out the mix table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnType {
    NewOrder,
    Payment,
    OrderStatus,
    Delivery,
    StockLevel,
}

impl TxnType {
    pub const ALL: [TxnType; 5] = [
        TxnType::NewOrder,
        TxnType::Payment,
        TxnType::OrderStatus,
        TxnType::Delivery,
        TxnType::StockLevel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TxnType::NewOrder => "new_order",
            TxnType::Payment => "payment",
            TxnType::OrderStatus => "order_status",
            TxnType::Delivery => "delivery",
            TxnType::StockLevel => "stock_level",
        }
    }

    /// Position in [`TxnType::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

fn default_new_order() -> u8 {
    45
}

fn default_payment() -> u8 {
    43
}

fn default_minor() -> u8 {
    4
}

/// Percentages of each transaction type, deserialized from the `[mix]` section.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MixOpt {
    #[serde(default = "default_new_order")]
    pub new_order: u8,
    #[serde(default = "default_payment")]
    pub payment: u8,
    #[serde(default = "default_minor")]
    pub order_status: u8,
    #[serde(default = "default_minor")]
    pub delivery: u8,
    #[serde(default = "default_minor")]
    pub stock_level: u8,
}

impl Default for MixOpt {
    fn default() -> Self {
        Self {
            new_order: default_new_order(),
            payment: default_payment(),
            order_status: default_minor(),
            delivery: default_minor(),
            stock_level: default_minor(),
        }
    }
}

impl MixOpt {
    fn percentage(&self, t: TxnType) -> u8 {
        match t {
            TxnType::NewOrder => self.new_order,
            TxnType::Payment => self.payment,
            TxnType::OrderStatus => self.order_status,
            TxnType::Delivery => self.delivery,
            TxnType::StockLevel => self.stock_level,
        }
    }
}

/// A lookup table from a uniform draw in `0..100` to a transaction type. Types occupy consecutive
/// slots in canonical order, so the first `new_order` slots are NewOrder, the next `payment`
/// slots are Payment and so on.
#[derive(Debug, Clone)]
pub struct WorkloadMix {
    table: Vec<TxnType>,
}

impl WorkloadMix {
    pub fn new(opt: &MixOpt) -> Result<Self> {
        let total: u32 = TxnType::ALL
            .iter()
            .map(|t| u32::from(opt.percentage(*t)))
            .sum();
        if total != MIX_SLOTS as u32 {
            return Err(Error::Config(format!(
                "sum of transactions in a mix should be 100, got {}",
                total
            )));
        }
        let mut table = Vec::with_capacity(MIX_SLOTS);
        for t in TxnType::ALL {
            for _ in 0..opt.percentage(t) {
                table.push(t);
            }
        }
        Ok(Self { table })
    }

    pub fn new_from_toml_str(text: &str) -> Result<Self> {
        let opt: MixOpt = Figment::new()
            .merge(Toml::string(text))
            .merge(Env::raw())
            .extract()?;
        Self::new(&opt)
    }

    /// Maps a raw draw to a transaction type. Only `draw % 100` matters.
    pub fn sample(&self, draw: u64) -> Result<TxnType> {
        let slot = (draw % MIX_SLOTS as u64) as usize;
        self.table
            .get(slot)
            .copied()
            .ok_or_else(|| Error::Dispatch(format!("mix slot {} is empty", slot)))
    }

    pub fn table(&self) -> &[TxnType] {
        &self.table
    }
}
