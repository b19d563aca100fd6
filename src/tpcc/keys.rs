//! Composite key encoding.
//!
//! Every table packs its identifier tuple into the low 56 bits of a [`Key`]; the top 8 bits carry
//! the [`Table`] tag, so all tables can share a single key space. The table-local encodings are
//! mixed-radix numbers over the scale constants, so two distinct tuples within a validated
//! [`Scale`] never map to the same key.
//!
//! Identifiers are 1-based, as in TPC-C: warehouse ids are `1..=W`, district ids `1..=D`, and so
//! on. For the customer index, the surname is represented by its ordinal (see
//! [`TpccRng::surname_ordinal`]) and the first name by a 24-bit digest.

use super::random::{TpccRng, NUM_SURNAMES};
use super::{Scale, MAX_OL_CNT};
use crate::error::{Error, Result};
use crate::Key;
use rustc_hash::FxHasher;
use std::hash::Hasher;

const TAG_SHIFT: u32 = 56;
const LOCAL_MASK: u64 = (1 << TAG_SHIFT) - 1;

/// Line number slots per order. Line numbers are `1..=MAX_OL_CNT`.
pub const ORDER_LINE_SLOTS: u64 = MAX_OL_CNT + 1;

/// History rows addressable per customer before sequence numbers wrap.
pub const HISTORY_SLOTS: u64 = 1 << 20;

/// Width of the first-name digest in a customer index key.
pub const FIRST_NAME_DIGEST_BITS: u32 = 24;

/// The logical tables of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Warehouse = 1,
    District,
    Customer,
    CustomerIndex,
    History,
    Order,
    OrderIndex,
    NewOrder,
    OrderLine,
    Stock,
    Item,
}

impl Table {
    pub const ALL: [Table; 11] = [
        Table::Warehouse,
        Table::District,
        Table::Customer,
        Table::CustomerIndex,
        Table::History,
        Table::Order,
        Table::OrderIndex,
        Table::NewOrder,
        Table::OrderLine,
        Table::Stock,
        Table::Item,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Warehouse => "warehouse",
            Table::District => "district",
            Table::Customer => "customer",
            Table::CustomerIndex => "customer_index",
            Table::History => "history",
            Table::Order => "order",
            Table::OrderIndex => "order_index",
            Table::NewOrder => "new_order",
            Table::OrderLine => "order_line",
            Table::Stock => "stock",
            Table::Item => "item",
        }
    }

    /// The table a key belongs to.
    pub fn of(key: Key) -> Option<Table> {
        let tag = key >> TAG_SHIFT;
        Table::ALL.into_iter().find(|t| *t as u64 == tag)
    }
}

#[inline]
fn tag(table: Table, local: u64) -> Key {
    debug_assert!(local <= LOCAL_MASK, "{} key overflow", table.name());
    ((table as u64) << TAG_SHIFT) | local
}

/// The table-local part of a key.
pub fn local(key: Key) -> u64 {
    key & LOCAL_MASK
}

#[inline]
fn district_ordinal(scale: &Scale, w_id: u64, d_id: u64) -> u64 {
    debug_assert!(d_id >= 1 && d_id <= scale.districts);
    w_id * scale.districts + d_id
}

#[inline]
fn customer_ordinal(scale: &Scale, w_id: u64, d_id: u64, c_id: u64) -> u64 {
    debug_assert!(c_id >= 1 && c_id <= scale.customers);
    district_ordinal(scale, w_id, d_id) * scale.customers + c_id
}

#[inline]
fn order_ordinal(scale: &Scale, w_id: u64, d_id: u64, o_id: u64) -> u64 {
    debug_assert!(o_id >= 1 && o_id <= scale.order_id_space);
    district_ordinal(scale, w_id, d_id) * scale.order_id_space + o_id
}

pub fn warehouse(_scale: &Scale, w_id: u64) -> Key {
    tag(Table::Warehouse, w_id)
}

pub fn district(scale: &Scale, w_id: u64, d_id: u64) -> Key {
    tag(Table::District, district_ordinal(scale, w_id, d_id))
}

pub fn customer(scale: &Scale, w_id: u64, d_id: u64, c_id: u64) -> Key {
    tag(Table::Customer, customer_ordinal(scale, w_id, d_id, c_id))
}

/// The 24-bit digest of a first name used in customer index keys.
pub fn first_name_digest(first: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(first.as_bytes());
    hasher.finish() & ((1 << FIRST_NAME_DIGEST_BITS) - 1)
}

/// Key of the customer index entry for `(w, d, last, first)`. Only surnames built from the TPC-C
/// syllables are indexable.
pub fn customer_index(scale: &Scale, w_id: u64, d_id: u64, last: &str, first: &str) -> Result<Key> {
    let ordinal = TpccRng::surname_ordinal(last)
        .ok_or_else(|| Error::KeyEncoding(format!("{:?} is not a TPC-C surname", last)))?;
    Ok(customer_index_by_ordinal(
        scale,
        w_id,
        d_id,
        ordinal,
        first_name_digest(first),
    ))
}

/// Key of the customer index entry for a surname ordinal and a first-name digest.
pub fn customer_index_by_ordinal(
    scale: &Scale,
    w_id: u64,
    d_id: u64,
    surname: u64,
    digest: u64,
) -> Key {
    debug_assert!(surname < NUM_SURNAMES);
    debug_assert!(digest < 1 << FIRST_NAME_DIGEST_BITS);
    let local = (district_ordinal(scale, w_id, d_id) * NUM_SURNAMES + surname)
        << FIRST_NAME_DIGEST_BITS
        | digest;
    tag(Table::CustomerIndex, local)
}

/// Key of the `seq`-th history row of a customer. Sequence numbers wrap after
/// [`HISTORY_SLOTS`].
pub fn history(scale: &Scale, w_id: u64, d_id: u64, c_id: u64, seq: u64) -> Key {
    tag(
        Table::History,
        customer_ordinal(scale, w_id, d_id, c_id) * HISTORY_SLOTS + seq % HISTORY_SLOTS,
    )
}

pub fn order(scale: &Scale, w_id: u64, d_id: u64, o_id: u64) -> Key {
    tag(Table::Order, order_ordinal(scale, w_id, d_id, o_id))
}

pub fn new_order(scale: &Scale, w_id: u64, d_id: u64, o_id: u64) -> Key {
    tag(Table::NewOrder, order_ordinal(scale, w_id, d_id, o_id))
}

pub fn order_index(scale: &Scale, w_id: u64, d_id: u64, c_id: u64, o_id: u64) -> Key {
    debug_assert!(o_id >= 1 && o_id <= scale.order_id_space);
    tag(
        Table::OrderIndex,
        customer_ordinal(scale, w_id, d_id, c_id) * scale.order_id_space + o_id,
    )
}

pub fn order_line(scale: &Scale, w_id: u64, d_id: u64, o_id: u64, ol_number: u64) -> Key {
    debug_assert!(ol_number >= 1 && ol_number < ORDER_LINE_SLOTS);
    tag(
        Table::OrderLine,
        order_ordinal(scale, w_id, d_id, o_id) * ORDER_LINE_SLOTS + ol_number,
    )
}

pub fn stock(scale: &Scale, w_id: u64, i_id: u64) -> Key {
    debug_assert!(i_id >= 1 && i_id <= scale.items);
    tag(Table::Stock, w_id * scale.items + i_id)
}

pub fn item(_scale: &Scale, i_id: u64) -> Key {
    tag(Table::Item, i_id)
}

/// Verifies that the largest table-local key of every table fits in the local key width.
pub(crate) fn check_capacity(scale: &Scale) -> Result<()> {
    fn mul_add(table: Table, base: u64, radix: u64, digit: u64) -> Result<u64> {
        base.checked_mul(radix)
            .and_then(|x| x.checked_add(digit))
            .filter(|x| *x <= LOCAL_MASK)
            .ok_or_else(|| {
                Error::KeyEncoding(format!(
                    "scale overflows the {} key space: {} * {} + {}",
                    table.name(),
                    base,
                    radix,
                    digit
                ))
            })
    }

    let w = scale.warehouses;
    let district = mul_add(Table::District, w, scale.districts, scale.districts)?;
    let customer = mul_add(Table::Customer, district, scale.customers, scale.customers)?;
    mul_add(
        Table::CustomerIndex,
        mul_add(Table::CustomerIndex, district, NUM_SURNAMES, NUM_SURNAMES - 1)?,
        1 << FIRST_NAME_DIGEST_BITS,
        (1 << FIRST_NAME_DIGEST_BITS) - 1,
    )?;
    mul_add(Table::History, customer, HISTORY_SLOTS, HISTORY_SLOTS - 1)?;
    let order = mul_add(Table::Order, district, scale.order_id_space, scale.order_id_space)?;
    mul_add(
        Table::OrderIndex,
        customer,
        scale.order_id_space,
        scale.order_id_space,
    )?;
    mul_add(Table::OrderLine, order, ORDER_LINE_SLOTS, MAX_OL_CNT)?;
    mul_add(Table::Stock, w, scale.items, scale.items)?;
    mul_add(Table::Item, 0, 1, scale.items)?;
    Ok(())
}
