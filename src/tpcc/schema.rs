//! Record layouts of every table.
//!
//! Records are plain serde structs encoded with [`bincode`]'s fixed-int configuration, so the
//! numeric prefix of every record has a fixed layout and the strings follow as length-prefixed
//! bytes. Money amounts are stored as `f64` dollars and timestamps as milliseconds since the Unix
//! epoch (`0` meaning "not set").

use super::keys::Table;
use crate::error::{Error, Result};
use crate::{KVMapHandle, Key};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A row of one of the dataset's tables.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: Table;

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Reads and decodes the record at `key`. An absent record is an error.
pub fn read<R: Record>(handle: &mut dyn KVMapHandle, key: Key) -> Result<R> {
    match handle.get(key) {
        Some(bytes) => R::decode(&bytes),
        None => Err(Error::MissingRecord {
            table: R::TABLE.name(),
            key,
        }),
    }
}

/// Reads and decodes the record at `key`, if there is one.
pub fn try_read<R: Record>(handle: &mut dyn KVMapHandle, key: Key) -> Result<Option<R>> {
    handle.get(key).map(|bytes| R::decode(&bytes)).transpose()
}

/// Encodes and writes a record, returning the number of newly inserted keys.
pub fn write<R: Record>(handle: &mut dyn KVMapHandle, key: Key, record: &R) -> Result<usize> {
    Ok(handle.put(key, &record.encode()?))
}

/// Street, city, state and zip shared by warehouses, districts and customers.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Address {
    pub street_1: String,
    pub street_2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Warehouse {
    pub w_tax: f64,
    pub w_ytd: f64,
    pub w_name: String,
    pub w_address: Address,
}

impl Record for Warehouse {
    const TABLE: Table = Table::Warehouse;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct District {
    pub d_tax: f64,
    pub d_ytd: f64,
    pub d_next_o_id: u64,
    /// The oldest order of this district that has not been delivered yet.
    pub d_next_delivery_o_id: u64,
    pub d_name: String,
    pub d_address: Address,
}

impl Record for District {
    const TABLE: Table = Table::District;
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Credit {
    Good,
    Bad,
}

impl Credit {
    pub fn as_str(self) -> &'static str {
        match self {
            Credit::Good => "GC",
            Credit::Bad => "BC",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Customer {
    pub c_discount: f64,
    pub c_credit: Credit,
    pub c_credit_lim: f64,
    pub c_balance: f64,
    pub c_ytd_payment: f64,
    pub c_payment_cnt: u64,
    pub c_delivery_cnt: u64,
    pub c_since: u64,
    pub c_first: String,
    pub c_middle: String,
    pub c_last: String,
    pub c_address: Address,
    pub c_phone: String,
    pub c_data: String,
}

impl Record for Customer {
    const TABLE: Table = Table::Customer;
}

/// Secondary index from `(w, d, last, first)` to a customer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CustomerIndex {
    pub c_id: u64,
}

impl Record for CustomerIndex {
    const TABLE: Table = Table::CustomerIndex;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct History {
    pub h_c_id: u64,
    pub h_c_d_id: u64,
    pub h_c_w_id: u64,
    pub h_d_id: u64,
    pub h_w_id: u64,
    pub h_date: u64,
    pub h_amount: f64,
    pub h_data: String,
}

impl Record for History {
    const TABLE: Table = Table::History;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Order {
    pub o_c_id: u64,
    /// `0` while the order is undelivered.
    pub o_carrier_id: u64,
    pub o_ol_cnt: u64,
    pub o_all_local: bool,
    pub o_entry_d: u64,
}

impl Record for Order {
    const TABLE: Table = Table::Order;
}

/// Secondary index from `(w, d, c, o)` to an order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderIndex {
    pub o_id: u64,
}

impl Record for OrderIndex {
    const TABLE: Table = Table::OrderIndex;
}

/// Marks an order as not yet delivered.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub no_o_id: u64,
}

impl Record for NewOrder {
    const TABLE: Table = Table::NewOrder;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderLine {
    pub ol_i_id: u64,
    pub ol_supply_w_id: u64,
    pub ol_quantity: u64,
    pub ol_amount: f64,
    /// `0` while the order is undelivered.
    pub ol_delivery_d: u64,
    pub ol_dist_info: String,
}

impl Record for OrderLine {
    const TABLE: Table = Table::OrderLine;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Stock {
    pub s_quantity: u64,
    pub s_ytd: u64,
    pub s_order_cnt: u64,
    pub s_remote_cnt: u64,
    pub s_dist: [String; 10],
    pub s_data: String,
}

impl Record for Stock {
    const TABLE: Table = Table::Stock;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Item {
    pub i_im_id: u64,
    pub i_price: f64,
    pub i_name: String,
    pub i_data: String,
}

impl Record for Item {
    const TABLE: Table = Table::Item;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryMap;
    use crate::KVMap;

    #[test]
    fn read_write_through_handle() {
        let map = MemoryMap::new(4);
        let mut handle = map.handle();
        let order = Order {
            o_c_id: 17,
            o_carrier_id: 0,
            o_ol_cnt: 7,
            o_all_local: true,
            o_entry_d: 1_676_725_200_000,
        };
        assert_eq!(write(&mut *handle, 5, &order).unwrap(), 1);
        assert_eq!(write(&mut *handle, 5, &order).unwrap(), 0);
        assert_eq!(read::<Order>(&mut *handle, 5).unwrap(), order);
        assert!(try_read::<Order>(&mut *handle, 6).unwrap().is_none());
        let e = read::<Item>(&mut *handle, 6).unwrap_err();
        assert!(matches!(e, Error::MissingRecord { table: "item", key: 6 }));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(Stock::decode(&[1, 2, 3]).is_err());
    }

    #[test]
    fn credit_codes() {
        assert_eq!(Credit::Good.as_str(), "GC");
        assert_eq!(Credit::Bad.as_str(), "BC");
    }
}
