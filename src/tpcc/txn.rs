//! The five TPC-C transactions.
//!
//! [`Executor`] is the seam between the benchmark driver and the transaction logic. Each
//! operation returns `Ok(true)` if it committed, `Ok(false)` if it aborted by design (the 1% of
//! NewOrder transactions that name an unused item), and an error if the store holds something it
//! cannot read back.
//!
//! [`TpccTxn`] is the reference executor. It runs every transaction as a sequence of point
//! reads and blind writes on one [`KVMapHandle`], with no isolation between concurrent workers.
//! Customers are always selected by id, as the customer index only supports exact-name lookups.

use super::keys;
use super::random::{TpccRng, C_ID, C_OL_I_ID};
use super::schema::*;
use super::{now_millis, Scale, TpccConfig, MAX_CARRIER_ID, MAX_OL_CNT, MIN_CARRIER_ID, MIN_OL_CNT};
use crate::error::{Error, Result};
use crate::workload::TxnType;
use crate::KVMapHandle;
use hashbrown::HashSet;
use log::debug;

/// Orders examined by StockLevel.
pub const STOCK_LEVEL_ORDERS: u64 = 20;

/// Maximum length of `C_DATA` after a bad-credit payment.
const C_DATA_MAX: usize = 500;

pub trait Executor {
    fn new_order(&mut self, handle: &mut dyn KVMapHandle, rng: &mut TpccRng) -> Result<bool>;

    fn payment(&mut self, handle: &mut dyn KVMapHandle, rng: &mut TpccRng) -> Result<bool>;

    fn order_status(&mut self, handle: &mut dyn KVMapHandle, rng: &mut TpccRng) -> Result<bool>;

    fn delivery(&mut self, handle: &mut dyn KVMapHandle, rng: &mut TpccRng) -> Result<bool>;

    fn stock_level(&mut self, handle: &mut dyn KVMapHandle, rng: &mut TpccRng) -> Result<bool>;

    fn execute(
        &mut self,
        txn: TxnType,
        handle: &mut dyn KVMapHandle,
        rng: &mut TpccRng,
    ) -> Result<bool> {
        match txn {
            TxnType::NewOrder => self.new_order(handle, rng),
            TxnType::Payment => self.payment(handle, rng),
            TxnType::OrderStatus => self.order_status(handle, rng),
            TxnType::Delivery => self.delivery(handle, rng),
            TxnType::StockLevel => self.stock_level(handle, rng),
        }
    }
}

/// The reference executor over the dataset written by [`Loader`](super::populate::Loader).
#[derive(Debug, Clone)]
pub struct TpccTxn {
    scale: Scale,
}

struct Line {
    i_id: u64,
    supply_w_id: u64,
    quantity: u64,
}

impl TpccTxn {
    pub fn new(config: &TpccConfig) -> Self {
        Self {
            scale: config.scale,
        }
    }

    fn warehouse_id(&self, rng: &mut TpccRng) -> u64 {
        rng.uniform_int(1, self.scale.warehouses)
    }

    fn district_id(&self, rng: &mut TpccRng) -> u64 {
        rng.uniform_int(1, self.scale.districts)
    }

    fn customer_id(&self, rng: &mut TpccRng) -> u64 {
        rng.nurand(1023, 1, self.scale.customers, C_ID)
    }

    /// A warehouse other than `home`, or `home` itself if it is the only one.
    fn remote_warehouse_id(&self, rng: &mut TpccRng, home: u64) -> u64 {
        if self.scale.warehouses == 1 {
            return home;
        }
        let w = rng.uniform_int(1, self.scale.warehouses - 1);
        if w >= home {
            w + 1
        } else {
            w
        }
    }
}

impl Executor for TpccTxn {
    fn new_order(&mut self, handle: &mut dyn KVMapHandle, rng: &mut TpccRng) -> Result<bool> {
        let scale = self.scale;
        let w = self.warehouse_id(rng);
        let d = self.district_id(rng);
        let c = self.customer_id(rng);
        let ol_cnt = rng.uniform_int(MIN_OL_CNT, MAX_OL_CNT);
        let rollback = rng.uniform_int(1, 100) == 1;
        let mut lines = Vec::with_capacity(ol_cnt as usize);
        for l in 1..=ol_cnt {
            let i_id = if rollback && l == ol_cnt {
                scale.items + 1
            } else {
                rng.nurand(8191, 1, scale.items, C_OL_I_ID)
            };
            let supply_w_id = if rng.uniform_int(1, 100) == 1 {
                self.remote_warehouse_id(rng, w)
            } else {
                w
            };
            lines.push(Line {
                i_id,
                supply_w_id,
                quantity: rng.uniform_int(1, 10),
            });
        }

        let warehouse: Warehouse = read(handle, keys::warehouse(&scale, w))?;
        let district_key = keys::district(&scale, w, d);
        let mut district: District = read(handle, district_key)?;
        let customer: Customer = read(handle, keys::customer(&scale, w, d, c))?;
        let o = district.d_next_o_id;
        if o > scale.order_id_space {
            return Err(Error::KeyEncoding(format!(
                "order id space of district ({}, {}) exhausted at {}",
                w, d, o
            )));
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in lines.iter() {
            if line.i_id > scale.items {
                debug!("new_order ({}, {}, {}) rolled back on unused item", w, d, o);
                return Ok(false);
            }
            items.push(read::<Item>(handle, keys::item(&scale, line.i_id))?);
        }

        // Children are written before their parents, and the district last, so a concurrent
        // reader that can see an order id can also read everything it refers to.
        let mut total = 0.0;
        for (l, (line, item)) in (1..).zip(lines.iter().zip(items.iter())) {
            let stock_key = keys::stock(&scale, line.supply_w_id, line.i_id);
            let mut stock: Stock = read(handle, stock_key)?;
            if stock.s_quantity >= line.quantity + 10 {
                stock.s_quantity -= line.quantity;
            } else {
                stock.s_quantity = stock.s_quantity + 91 - line.quantity;
            }
            stock.s_ytd += line.quantity;
            stock.s_order_cnt += 1;
            if line.supply_w_id != w {
                stock.s_remote_cnt += 1;
            }
            write(handle, stock_key, &stock)?;

            let ol_amount = line.quantity as f64 * item.i_price;
            total += ol_amount;
            let order_line = OrderLine {
                ol_i_id: line.i_id,
                ol_supply_w_id: line.supply_w_id,
                ol_quantity: line.quantity,
                ol_amount,
                ol_delivery_d: 0,
                ol_dist_info: stock.s_dist[(d - 1) as usize % stock.s_dist.len()].clone(),
            };
            write(handle, keys::order_line(&scale, w, d, o, l), &order_line)?;
        }
        write(handle, keys::order_index(&scale, w, d, c, o), &OrderIndex { o_id: o })?;
        write(handle, keys::new_order(&scale, w, d, o), &NewOrder { no_o_id: o })?;
        let order = Order {
            o_c_id: c,
            o_carrier_id: 0,
            o_ol_cnt: ol_cnt,
            o_all_local: lines.iter().all(|l| l.supply_w_id == w),
            o_entry_d: now_millis(),
        };
        write(handle, keys::order(&scale, w, d, o), &order)?;
        district.d_next_o_id += 1;
        write(handle, district_key, &district)?;

        let total = total * (1.0 - customer.c_discount) * (1.0 + warehouse.w_tax + district.d_tax);
        debug!("new_order ({}, {}, {}) total {:.2}", w, d, o, total);
        Ok(true)
    }

    fn payment(&mut self, handle: &mut dyn KVMapHandle, rng: &mut TpccRng) -> Result<bool> {
        let scale = self.scale;
        let w = self.warehouse_id(rng);
        let d = self.district_id(rng);
        let (c_w, c_d) = if rng.uniform_int(1, 100) <= 85 {
            (w, d)
        } else {
            (self.remote_warehouse_id(rng, w), self.district_id(rng))
        };
        let c = self.customer_id(rng);
        let amount = rng.uniform_int(100, 500_000) as f64 / 100.0;

        let warehouse_key = keys::warehouse(&scale, w);
        let mut warehouse: Warehouse = read(handle, warehouse_key)?;
        warehouse.w_ytd += amount;
        write(handle, warehouse_key, &warehouse)?;

        let district_key = keys::district(&scale, w, d);
        let mut district: District = read(handle, district_key)?;
        district.d_ytd += amount;
        write(handle, district_key, &district)?;

        let customer_key = keys::customer(&scale, c_w, c_d, c);
        let mut customer: Customer = read(handle, customer_key)?;
        customer.c_balance -= amount;
        customer.c_ytd_payment += amount;
        customer.c_payment_cnt += 1;
        if customer.c_credit == Credit::Bad {
            let mut data = format!("{} {} {} {} {} {:.2} ", c, c_d, c_w, d, w, amount);
            data.push_str(&customer.c_data);
            data.truncate(C_DATA_MAX);
            customer.c_data = data;
        }
        write(handle, customer_key, &customer)?;

        let history = History {
            h_c_id: c,
            h_c_d_id: c_d,
            h_c_w_id: c_w,
            h_d_id: d,
            h_w_id: w,
            h_date: now_millis(),
            h_amount: amount,
            h_data: format!("{}    {}", warehouse.w_name, district.d_name),
        };
        let key = keys::history(&scale, c_w, c_d, c, customer.c_payment_cnt);
        write(handle, key, &history)?;
        Ok(true)
    }

    /// Reads a random existing order of a district together with its customer and lines.
    fn order_status(&mut self, handle: &mut dyn KVMapHandle, rng: &mut TpccRng) -> Result<bool> {
        let scale = self.scale;
        let w = self.warehouse_id(rng);
        let d = self.district_id(rng);
        let district: District = read(handle, keys::district(&scale, w, d))?;
        let o = rng.uniform_int(1, district.d_next_o_id - 1);
        let order: Order = read(handle, keys::order(&scale, w, d, o))?;
        let customer: Customer = read(handle, keys::customer(&scale, w, d, order.o_c_id))?;
        read::<OrderIndex>(handle, keys::order_index(&scale, w, d, order.o_c_id, o))?;
        let mut total = 0.0;
        for l in 1..=order.o_ol_cnt {
            let line: OrderLine = read(handle, keys::order_line(&scale, w, d, o, l))?;
            total += line.ol_amount;
        }
        debug!(
            "order_status ({}, {}, {}) customer {} balance {:.2} lines {:.2}",
            w, d, o, customer.c_last, customer.c_balance, total
        );
        Ok(true)
    }

    /// Delivers the oldest undelivered order of every district of one warehouse. A district
    /// without undelivered orders is skipped.
    fn delivery(&mut self, handle: &mut dyn KVMapHandle, rng: &mut TpccRng) -> Result<bool> {
        let scale = self.scale;
        let w = self.warehouse_id(rng);
        let carrier = rng.uniform_int(MIN_CARRIER_ID, MAX_CARRIER_ID);
        let now = now_millis();
        for d in 1..=scale.districts {
            let district_key = keys::district(&scale, w, d);
            let mut district: District = read(handle, district_key)?;
            let o = district.d_next_delivery_o_id;
            if o >= district.d_next_o_id {
                continue;
            }
            district.d_next_delivery_o_id += 1;
            write(handle, district_key, &district)?;
            // NewOrder rows are never removed; the district cursor marks them as consumed.
            if try_read::<NewOrder>(handle, keys::new_order(&scale, w, d, o))?.is_none() {
                continue;
            }

            let order_key = keys::order(&scale, w, d, o);
            let mut order: Order = read(handle, order_key)?;
            order.o_carrier_id = carrier;
            write(handle, order_key, &order)?;

            let mut total = 0.0;
            for l in 1..=order.o_ol_cnt {
                let line_key = keys::order_line(&scale, w, d, o, l);
                let mut line: OrderLine = read(handle, line_key)?;
                line.ol_delivery_d = now;
                total += line.ol_amount;
                write(handle, line_key, &line)?;
            }

            let customer_key = keys::customer(&scale, w, d, order.o_c_id);
            let mut customer: Customer = read(handle, customer_key)?;
            customer.c_balance += total;
            customer.c_delivery_cnt += 1;
            write(handle, customer_key, &customer)?;
        }
        Ok(true)
    }

    /// Counts the distinct items of a district's last orders whose stock is below a threshold.
    fn stock_level(&mut self, handle: &mut dyn KVMapHandle, rng: &mut TpccRng) -> Result<bool> {
        let scale = self.scale;
        let w = self.warehouse_id(rng);
        let d = self.district_id(rng);
        let threshold = rng.uniform_int(10, 20);
        let district: District = read(handle, keys::district(&scale, w, d))?;
        let next = district.d_next_o_id;
        let mut items = HashSet::new();
        for o in next.saturating_sub(STOCK_LEVEL_ORDERS).max(1)..next {
            let order: Order = read(handle, keys::order(&scale, w, d, o))?;
            for l in 1..=order.o_ol_cnt {
                let line: OrderLine = read(handle, keys::order_line(&scale, w, d, o, l))?;
                items.insert(line.ol_i_id);
            }
        }
        let mut low = 0;
        for i in items {
            let stock: Stock = read(handle, keys::stock(&scale, w, i))?;
            if stock.s_quantity < threshold {
                low += 1;
            }
        }
        debug!("stock_level ({}, {}) below {}: {}", w, d, threshold, low);
        Ok(true)
    }
}
