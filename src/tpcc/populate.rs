//! Population of the initial dataset.
//!
//! [`Loader::load_all`] writes every table in a fixed order: Warehouse, District, Customer (with
//! CustomerIndex and History), Order (with OrderIndex, NewOrder and OrderLine), Stock and Item.
//! Each step draws from its own generator seeded with a fixed constant, so the same
//! [`TpccConfig`] always produces the same records in the same order.
//!
//! Population must be the only writer of the store. The secondary indexes are built with a
//! lookup-then-insert guard that is not atomic.

use super::keys::{self, Table};
use super::random::TpccRng;
use super::schema::*;
use super::{TpccConfig, MAX_CARRIER_ID, MAX_OL_CNT, MIN_CARRIER_ID, MIN_OL_CNT};
use crate::error::{Error, Result};
use crate::{KVMapHandle, Key};
use hashbrown::{HashMap, HashSet};
use log::{debug, info, warn};
use std::time::Duration;

pub const WAREHOUSE_SEED: u64 = 9324;
pub const DISTRICT_SEED: u64 = 129856349;
pub const CUSTOMER_SEED: u64 = 923587856425;
pub const ORDER_SEED: u64 = 2343352;
pub const STOCK_SEED: u64 = 89785943;
pub const ITEM_SEED: u64 = 235443;

pub const WAREHOUSE_YTD: f64 = 300_000.0;
pub const DISTRICT_YTD: f64 = 30_000.0;
pub const CUSTOMER_CREDIT_LIM: f64 = 50_000.0;
pub const CUSTOMER_BALANCE: f64 = -10.0;
pub const CUSTOMER_YTD_PAYMENT: f64 = 10.0;
pub const HISTORY_AMOUNT: f64 = 10.0;
pub const ORDER_LINE_QUANTITY: u64 = 5;

/// Amounts are compared at cent precision.
const MONEY_EPSILON: f64 = 0.005;

// {{{ report

/// Write counts of a single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLoad {
    pub table: Table,
    /// Records the store reported as newly inserted.
    pub inserted: u64,
    /// Records handed to the store.
    pub examined: u64,
    /// Records not written because their key was already present.
    pub skipped: u64,
}

impl TableLoad {
    fn new(table: Table) -> Self {
        Self {
            table,
            inserted: 0,
            examined: 0,
            skipped: 0,
        }
    }

    fn write<R: Record>(
        &mut self,
        handle: &mut dyn KVMapHandle,
        key: Key,
        record: &R,
        bulk: bool,
    ) -> Result<()> {
        debug_assert_eq!(Table::of(key), Some(self.table));
        let bytes = record.encode()?;
        let inserted = if bulk {
            handle.load(key, &bytes)
        } else {
            handle.put(key, &bytes)
        };
        self.inserted += inserted as u64;
        self.examined += 1;
        Ok(())
    }

    /// Writes `record` only if `key` is absent. Returns whether it was written.
    fn write_absent<R: Record>(
        &mut self,
        handle: &mut dyn KVMapHandle,
        key: Key,
        record: &R,
        bulk: bool,
    ) -> Result<bool> {
        if handle.get(key).is_some() {
            return Ok(false);
        }
        self.write(handle, key, record, bulk)?;
        Ok(true)
    }

    fn finish(self) -> Result<Self> {
        info!(
            "table {} inserted {} examined {} skipped {}",
            self.table.name(),
            self.inserted,
            self.examined,
            self.skipped
        );
        if self.inserted != self.examined {
            return Err(Error::Integrity {
                table: self.table.name(),
                inserted: self.inserted,
                examined: self.examined,
            });
        }
        Ok(self)
    }
}

/// The outcome of a full load.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub tables: Vec<TableLoad>,
    pub duration: Duration,
}

impl LoadReport {
    pub fn get(&self, table: Table) -> Option<&TableLoad> {
        self.tables.iter().find(|t| t.table == table)
    }

    pub fn total_inserted(&self) -> u64 {
        self.tables.iter().map(|t| t.inserted).sum()
    }
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "load duration {:.3} records {}",
            self.duration.as_secs_f64(),
            self.total_inserted()
        )?;
        for t in self.tables.iter() {
            write!(f, " {} {}", t.table.name(), t.inserted)?;
        }
        Ok(())
    }
}

/// A financial consistency rule that does not hold in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// `W_YTD` differs from the sum of the warehouse's `D_YTD`.
    WarehouseYtd { w_id: u64, w_ytd: f64, districts: f64 },
    /// `D_YTD` differs from the sum of the district's history amounts.
    DistrictYtd { w_id: u64, d_id: u64, d_ytd: f64, history: f64 },
}

// }}} report

// {{{ loader

pub struct Loader {
    config: TpccConfig,
}

impl Loader {
    pub fn new(config: TpccConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TpccConfig {
        &self.config
    }

    pub fn load_all(&self, handle: &mut dyn KVMapHandle) -> Result<LoadReport> {
        debug!("Loading dataset with {:?}", self.config);
        let start = quanta::Instant::now();
        let mut tables = Vec::with_capacity(Table::ALL.len());
        tables.push(self.populate_warehouse(handle)?);
        tables.push(self.populate_district(handle)?);
        tables.extend(self.populate_customer(handle)?);
        tables.extend(self.populate_order(handle)?);
        tables.push(self.populate_stock(handle)?);
        tables.push(self.populate_item(handle)?);
        let report = LoadReport {
            tables,
            duration: start.elapsed(),
        };
        info!("{}", report);
        Ok(report)
    }

    fn address(rng: &mut TpccRng, zip: Option<&str>) -> Address {
        Address {
            street_1: rng.rand_string_len(10, 20),
            street_2: rng.rand_string_len(10, 20),
            city: rng.rand_string_len(10, 20),
            state: rng.bounded_string(2),
            zip: match zip {
                Some(zip) => zip.to_string(),
                None => rng.zip(),
            },
        }
    }

    pub fn populate_warehouse(&self, handle: &mut dyn KVMapHandle) -> Result<TableLoad> {
        let scale = &self.config.scale;
        let mut rng = TpccRng::new(WAREHOUSE_SEED);
        let mut load = TableLoad::new(Table::Warehouse);
        for w in 1..=scale.warehouses {
            let w_tax = rng.tax();
            let w_name = rng.rand_string_len(6, 10);
            let warehouse = Warehouse {
                w_tax,
                w_ytd: WAREHOUSE_YTD,
                w_name,
                w_address: Self::address(&mut rng, Some("123456789")),
            };
            load.write(handle, keys::warehouse(scale, w), &warehouse, self.config.bulk_load)?;
        }
        load.finish()
    }

    pub fn populate_district(&self, handle: &mut dyn KVMapHandle) -> Result<TableLoad> {
        let scale = &self.config.scale;
        let mut rng = TpccRng::new(DISTRICT_SEED);
        let mut load = TableLoad::new(Table::District);
        for w in 1..=scale.warehouses {
            for d in 1..=scale.districts {
                let d_tax = rng.tax();
                let d_name = rng.rand_string_len(6, 10);
                let district = District {
                    d_tax,
                    d_ytd: DISTRICT_YTD,
                    d_next_o_id: scale.customers + 1,
                    d_next_delivery_o_id: scale.last_delivered_order() + 1,
                    d_name,
                    d_address: Self::address(&mut rng, Some("123456789")),
                };
                load.write(handle, keys::district(scale, w, d), &district, self.config.bulk_load)?;
            }
        }
        load.finish()
    }

    /// Populates Customer, CustomerIndex and History.
    ///
    /// The first third of each district's customers take the surnames `0..C/3` in order, so a
    /// district with at least 3000 customers covers all 1000 surnames. The rest are skewed.
    pub fn populate_customer(&self, handle: &mut dyn KVMapHandle) -> Result<[TableLoad; 3]> {
        let scale = &self.config.scale;
        let bulk = self.config.bulk_load;
        let now = self.config.now;
        let mut rng = TpccRng::new(CUSTOMER_SEED);
        let mut customers = TableLoad::new(Table::Customer);
        let mut index = TableLoad::new(Table::CustomerIndex);
        let mut history = TableLoad::new(Table::History);
        for w in 1..=scale.warehouses {
            for d in 1..=scale.districts {
                for c in 1..=scale.customers {
                    let c_discount = rng.uniform_int(1, 5000) as f64 / 10000.0;
                    let c_credit = if rng.uniform_int(1, 100) <= 10 {
                        Credit::Bad
                    } else {
                        Credit::Good
                    };
                    let c_last = if c <= scale.customers / 3 {
                        TpccRng::unique_surname_by_index(c - 1)
                    } else {
                        rng.skewed_surname()
                    };
                    let c_first = rng.rand_string_len(8, 16);
                    let c_address = Self::address(&mut rng, None);
                    let c_phone = rng.bounded_digit_string(16);
                    let c_data = rng.rand_string_len(300, 500);
                    let customer = Customer {
                        c_discount,
                        c_credit,
                        c_credit_lim: CUSTOMER_CREDIT_LIM,
                        c_balance: CUSTOMER_BALANCE,
                        c_ytd_payment: CUSTOMER_YTD_PAYMENT,
                        c_payment_cnt: 1,
                        c_delivery_cnt: 0,
                        c_since: now,
                        c_first,
                        c_middle: "OE".to_string(),
                        c_last,
                        c_address,
                        c_phone,
                        c_data,
                    };
                    customers.write(handle, keys::customer(scale, w, d, c), &customer, bulk)?;

                    let key = keys::customer_index(scale, w, d, &customer.c_last, &customer.c_first)?;
                    if !index.write_absent(handle, key, &CustomerIndex { c_id: c }, bulk)? {
                        index.skipped += 1;
                        warn!(
                            "customer index ({}, {}, {}, {}) already taken, skipping customer {}",
                            w, d, customer.c_last, customer.c_first, c
                        );
                    }

                    let record = History {
                        h_c_id: c,
                        h_c_d_id: d,
                        h_c_w_id: w,
                        h_d_id: d,
                        h_w_id: w,
                        h_date: now,
                        h_amount: HISTORY_AMOUNT,
                        h_data: rng.rand_string_len(12, 24),
                    };
                    history.write(handle, keys::history(scale, w, d, c, 1), &record, bulk)?;
                }
            }
        }
        Ok([customers.finish()?, index.finish()?, history.finish()?])
    }

    /// A permutation of `1..=n` built by rejection sampling.
    fn permutation(rng: &mut TpccRng, n: u64) -> Vec<u64> {
        let mut seen = HashSet::with_capacity(n as usize);
        let mut ids = Vec::with_capacity(n as usize);
        while ids.len() as u64 != n {
            let x = rng.uniform_int(1, n);
            if seen.insert(x) {
                ids.push(x);
            }
        }
        ids
    }

    /// Populates Order, OrderIndex, NewOrder and OrderLine.
    ///
    /// Each district gets one order per customer, in a random customer order. Orders up to
    /// [`Scale::last_delivered_order`](super::Scale::last_delivered_order) are delivered; the
    /// rest are new orders.
    pub fn populate_order(&self, handle: &mut dyn KVMapHandle) -> Result<[TableLoad; 4]> {
        let scale = &self.config.scale;
        let bulk = self.config.bulk_load;
        let now = self.config.now;
        let last_delivered = scale.last_delivered_order();
        let mut rng = TpccRng::new(ORDER_SEED);
        let mut orders = TableLoad::new(Table::Order);
        let mut index = TableLoad::new(Table::OrderIndex);
        let mut new_orders = TableLoad::new(Table::NewOrder);
        let mut lines = TableLoad::new(Table::OrderLine);
        for w in 1..=scale.warehouses {
            for d in 1..=scale.districts {
                let c_ids = Self::permutation(&mut rng, scale.customers);
                for (o, c) in (1..=scale.customers).zip(c_ids) {
                    let delivered = o <= last_delivered;
                    let o_carrier_id = if delivered {
                        rng.uniform_int(MIN_CARRIER_ID, MAX_CARRIER_ID)
                    } else {
                        0
                    };
                    let order = Order {
                        o_c_id: c,
                        o_carrier_id,
                        o_ol_cnt: rng.uniform_int(MIN_OL_CNT, MAX_OL_CNT),
                        o_all_local: true,
                        o_entry_d: now,
                    };
                    orders.write(handle, keys::order(scale, w, d, o), &order, bulk)?;

                    let key = keys::order_index(scale, w, d, c, o);
                    if !index.write_absent(handle, key, &OrderIndex { o_id: o }, bulk)? {
                        return Err(Error::KeyEncoding(format!(
                            "order index key {:#018x} of order ({}, {}, {}) is already taken",
                            key, w, d, o
                        )));
                    }

                    if !delivered {
                        let key = keys::new_order(scale, w, d, o);
                        new_orders.write(handle, key, &NewOrder { no_o_id: o }, bulk)?;
                    }

                    for l in 1..=order.o_ol_cnt {
                        let ol_i_id = rng.uniform_int(1, scale.items);
                        let (ol_amount, ol_delivery_d) = if delivered {
                            (0.0, order.o_entry_d)
                        } else {
                            (rng.uniform_int(1, 999_999) as f64 / 100.0, 0)
                        };
                        let line = OrderLine {
                            ol_i_id,
                            ol_supply_w_id: w,
                            ol_quantity: ORDER_LINE_QUANTITY,
                            ol_amount,
                            ol_delivery_d,
                            ol_dist_info: rng.bounded_string(24),
                        };
                        lines.write(handle, keys::order_line(scale, w, d, o, l), &line, bulk)?;
                    }
                }
            }
        }
        Ok([
            orders.finish()?,
            index.finish()?,
            new_orders.finish()?,
            lines.finish()?,
        ])
    }

    pub fn populate_stock(&self, handle: &mut dyn KVMapHandle) -> Result<TableLoad> {
        let scale = &self.config.scale;
        let mut rng = TpccRng::new(STOCK_SEED);
        let mut load = TableLoad::new(Table::Stock);
        for w in 1..=scale.warehouses {
            for i in 1..=scale.items {
                let s_quantity = rng.uniform_int(10, 100);
                let s_dist = std::array::from_fn(|_| rng.bounded_string(24));
                let stock = Stock {
                    s_quantity,
                    s_ytd: 0,
                    s_order_cnt: 0,
                    s_remote_cnt: 0,
                    s_dist,
                    s_data: rng.original_string(26, 50),
                };
                load.write(handle, keys::stock(scale, w, i), &stock, self.config.bulk_load)?;
            }
        }
        load.finish()
    }

    pub fn populate_item(&self, handle: &mut dyn KVMapHandle) -> Result<TableLoad> {
        let scale = &self.config.scale;
        let mut rng = TpccRng::new(ITEM_SEED);
        let mut load = TableLoad::new(Table::Item);
        for i in 1..=scale.items {
            let i_name = rng.rand_string_len(14, 24);
            let i_price = rng.uniform_int(100, 10_000) as f64 / 100.0;
            let i_data = rng.original_string(26, 50);
            let item = Item {
                i_im_id: rng.uniform_int(1, 10_000),
                i_price,
                i_name,
                i_data,
            };
            load.write(handle, keys::item(scale, i), &item, self.config.bulk_load)?;
        }
        load.finish()
    }

    /// Checks the TPC-C financial consistency rules `W_YTD = sum(D_YTD)` and
    /// `D_YTD = sum(H_AMOUNT)`. They are never enforced while loading: with a scale other than
    /// 10 districts of 3000 customers they do not hold even for a fresh load.
    ///
    /// A history row counts toward the district that received the payment (`h_w_id`, `h_d_id`),
    /// which differs from the paying customer's district for remote payments.
    pub fn verify(&self, handle: &mut dyn KVMapHandle) -> Result<Vec<Violation>> {
        let scale = &self.config.scale;
        let mut paid: HashMap<(u64, u64), f64> = HashMap::new();
        for w in 1..=scale.warehouses {
            for d in 1..=scale.districts {
                for c in 1..=scale.customers {
                    let customer: Customer = read(handle, keys::customer(scale, w, d, c))?;
                    for seq in 1..=customer.c_payment_cnt {
                        let key = keys::history(scale, w, d, c, seq);
                        if let Some(h) = try_read::<History>(handle, key)? {
                            *paid.entry((h.h_w_id, h.h_d_id)).or_default() += h.h_amount;
                        }
                    }
                }
            }
        }

        let mut violations = Vec::new();
        for w in 1..=scale.warehouses {
            let warehouse: Warehouse = read(handle, keys::warehouse(scale, w))?;
            let mut districts = 0.0;
            for d in 1..=scale.districts {
                let district: District = read(handle, keys::district(scale, w, d))?;
                districts += district.d_ytd;
                let history = paid.get(&(w, d)).copied().unwrap_or_default();
                if (district.d_ytd - history).abs() > MONEY_EPSILON {
                    violations.push(Violation::DistrictYtd {
                        w_id: w,
                        d_id: d,
                        d_ytd: district.d_ytd,
                        history,
                    });
                }
            }
            if (warehouse.w_ytd - districts).abs() > MONEY_EPSILON {
                violations.push(Violation::WarehouseYtd {
                    w_id: w,
                    w_ytd: warehouse.w_ytd,
                    districts,
                });
            }
        }
        for v in violations.iter() {
            warn!("consistency violation: {:?}", v);
        }
        Ok(violations)
    }
}

// }}} loader

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stores::memory::MemoryMap;
    use crate::tpcc::{Scale, TpccOpt};
    use crate::KVMap;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(warehouses: u64, districts: u64, customers: u64, items: u64) -> TpccConfig {
        TpccConfig::new(&TpccOpt {
            warehouses: Some(warehouses),
            districts: Some(districts),
            customers: Some(customers),
            items: Some(items),
            order_id_space: Some(1 << 16),
            now: Some(1_700_000_000_000),
            bulk_load: None,
        })
        .unwrap()
    }

    fn count(map: &MemoryMap, table: Table) -> usize {
        map.snapshot().keys().filter(|k| Table::of(**k) == Some(table)).count()
    }

    /// A memory store that records how often each key is written, and can drop the writes of one
    /// table.
    #[derive(Clone)]
    struct SpyMap {
        inner: MemoryMap,
        puts: Arc<Mutex<HashMap<Key, usize>>>,
        loads: Arc<AtomicUsize>,
        drop_table: Option<Table>,
    }

    impl SpyMap {
        fn new(drop_table: Option<Table>) -> Self {
            Self {
                inner: MemoryMap::new(8),
                puts: Arc::new(Mutex::new(HashMap::new())),
                loads: Arc::new(AtomicUsize::new(0)),
                drop_table,
            }
        }
    }

    impl KVMap for SpyMap {
        fn handle(&self) -> Box<dyn KVMapHandle> {
            Box::new(self.clone())
        }
    }

    impl KVMapHandle for SpyMap {
        fn put(&mut self, key: Key, value: &[u8]) -> usize {
            *self.puts.lock().entry(key).or_default() += 1;
            if self.drop_table.is_some() && Table::of(key) == self.drop_table {
                return 0;
            }
            self.inner.put(key, value)
        }

        fn get(&mut self, key: Key) -> Option<Box<[u8]>> {
            self.inner.get(key)
        }

        fn load(&mut self, key: Key, value: &[u8]) -> usize {
            self.loads.fetch_add(1, Ordering::Relaxed);
            self.put(key, value)
        }
    }

    #[test]
    fn districts_start_after_initial_orders() {
        let loader = Loader::new(config(2, 3, 30, 50));
        let map = MemoryMap::new(8);
        let mut handle = map.handle();
        loader.load_all(&mut *handle).unwrap();
        assert_eq!(count(&map, Table::District), 6);
        for w in 1..=2 {
            for d in 1..=3 {
                let district: District =
                    read(&mut *handle, keys::district(&loader.config().scale, w, d)).unwrap();
                assert_eq!(district.d_next_o_id, 31);
                assert_eq!(district.d_next_delivery_o_id, 22);
                assert_eq!(district.d_ytd, DISTRICT_YTD);
            }
        }
    }

    #[test]
    fn report_counts_every_table() {
        let loader = Loader::new(config(2, 3, 30, 50));
        let map = MemoryMap::new(8);
        let report = loader.load_all(&mut *map.handle()).unwrap();
        assert_eq!(report.tables.len(), Table::ALL.len());
        let get = |t| *report.get(t).unwrap();
        assert_eq!(get(Table::Warehouse).inserted, 2);
        assert_eq!(get(Table::District).inserted, 6);
        assert_eq!(get(Table::Customer).inserted, 180);
        assert_eq!(get(Table::History).inserted, 180);
        assert_eq!(get(Table::Order).inserted, 180);
        assert_eq!(get(Table::OrderIndex).inserted, 180);
        assert_eq!(get(Table::NewOrder).inserted, 6 * 9);
        assert_eq!(get(Table::Stock).inserted, 100);
        assert_eq!(get(Table::Item).inserted, 50);
        let ci = get(Table::CustomerIndex);
        assert_eq!(ci.inserted + ci.skipped, 180);
        assert_eq!(report.total_inserted() as usize, map.len());
        for t in Table::ALL {
            assert_eq!(count(&map, t) as u64, get(t).inserted, "{}", t.name());
        }
    }

    #[test]
    fn loads_are_deterministic() {
        let a = MemoryMap::new(4);
        let b = MemoryMap::new(16);
        Loader::new(config(1, 2, 30, 40)).load_all(&mut *a.handle()).unwrap();
        Loader::new(config(1, 2, 30, 40)).load_all(&mut *b.handle()).unwrap();
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn new_orders_follow_delivered_split() {
        let loader = Loader::new(config(1, 2, 20, 30));
        let scale = loader.config().scale;
        let map = MemoryMap::new(8);
        let mut handle = map.handle();
        loader.load_all(&mut *handle).unwrap();
        assert_eq!(scale.last_delivered_order(), 14);
        for d in 1..=2 {
            let mut new_orders = 0;
            for o in 1..=20 {
                let order: Order = read(&mut *handle, keys::order(&scale, 1, d, o)).unwrap();
                let marker =
                    try_read::<NewOrder>(&mut *handle, keys::new_order(&scale, 1, d, o)).unwrap();
                if o > 14 {
                    assert_eq!(marker, Some(NewOrder { no_o_id: o }));
                    assert_eq!(order.o_carrier_id, 0);
                    new_orders += 1;
                } else {
                    assert!(marker.is_none());
                    assert!((MIN_CARRIER_ID..=MAX_CARRIER_ID).contains(&order.o_carrier_id));
                }
                for l in 1..=order.o_ol_cnt {
                    let line: OrderLine =
                        read(&mut *handle, keys::order_line(&scale, 1, d, o, l)).unwrap();
                    assert!(line.ol_i_id >= 1 && line.ol_i_id <= 30);
                    if o > 14 {
                        assert_eq!(line.ol_delivery_d, 0);
                        assert!(line.ol_amount >= 0.01 && line.ol_amount <= 9999.99);
                    } else {
                        assert_eq!(line.ol_delivery_d, order.o_entry_d);
                        assert_eq!(line.ol_amount, 0.0);
                    }
                }
                let next = keys::order_line(&scale, 1, d, o, order.o_ol_cnt + 1);
                assert!(handle.get(next).is_none());
            }
            assert_eq!(new_orders, 6);
        }
    }

    #[test]
    fn orders_assign_each_customer_once() {
        let loader = Loader::new(config(1, 1, 50, 10));
        let scale = loader.config().scale;
        let map = MemoryMap::new(8);
        let mut handle = map.handle();
        loader.load_all(&mut *handle).unwrap();
        let mut customers: Vec<u64> = (1..=50)
            .map(|o| read::<Order>(&mut *handle, keys::order(&scale, 1, 1, o)).unwrap().o_c_id)
            .collect();
        for o in 1..=50 {
            let c = customers[o as usize - 1];
            let index: OrderIndex =
                read(&mut *handle, keys::order_index(&scale, 1, 1, c, o)).unwrap();
            assert_eq!(index.o_id, o);
        }
        customers.sort_unstable();
        assert_eq!(customers, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn first_third_cover_unique_surnames() {
        let loader = Loader::new(config(1, 1, 30, 10));
        let scale = loader.config().scale;
        let map = MemoryMap::new(8);
        let mut handle = map.handle();
        loader.populate_customer(&mut *handle).unwrap();
        for c in 1..=10 {
            let customer: Customer = read(&mut *handle, keys::customer(&scale, 1, 1, c)).unwrap();
            assert_eq!(customer.c_last, TpccRng::unique_surname_by_index(c - 1));
            assert_eq!(customer.c_middle, "OE");
            let key =
                keys::customer_index(&scale, 1, 1, &customer.c_last, &customer.c_first).unwrap();
            assert_eq!(read::<CustomerIndex>(&mut *handle, key).unwrap().c_id, c);
        }
    }

    #[test]
    fn index_keys_written_at_most_once() {
        let spy = SpyMap::new(None);
        Loader::new(config(1, 2, 300, 10)).load_all(&mut *spy.handle()).unwrap();
        let puts = spy.puts.lock();
        for (key, n) in puts.iter() {
            assert_eq!(*n, 1, "key {:#018x} of {:?} written {} times", key, Table::of(*key), n);
        }
        assert_eq!(spy.loads.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn duplicate_customer_index_is_skipped() {
        let loader = Loader::new(config(1, 1, 3, 10));
        let scale = loader.config().scale;
        let map = MemoryMap::new(8);
        let mut handle = map.handle();
        // Pre-claim the index entry of customer 1.
        let mut probe = MemoryMap::new(1);
        loader.populate_customer(&mut probe).unwrap();
        let first: Customer = read(&mut probe, keys::customer(&scale, 1, 1, 1)).unwrap();
        let key = keys::customer_index(&scale, 1, 1, &first.c_last, &first.c_first).unwrap();
        write(&mut *handle, key, &CustomerIndex { c_id: 99 }).unwrap();

        let [_, index, _] = loader.populate_customer(&mut *handle).unwrap();
        assert_eq!(index.skipped, 1);
        assert_eq!(index.inserted, 2);
        assert_eq!(read::<CustomerIndex>(&mut *handle, key).unwrap().c_id, 99);
    }

    #[test]
    fn taken_order_index_is_key_encoding_error() {
        let loader = Loader::new(config(1, 1, 3, 10));
        let scale = loader.config().scale;
        let map = MemoryMap::new(8);
        let mut handle = map.handle();
        for c in 1..=3 {
            write(&mut *handle, keys::order_index(&scale, 1, 1, c, 2), &OrderIndex { o_id: 2 })
                .unwrap();
        }
        let e = loader.populate_order(&mut *handle).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::KeyEncoding);
    }

    #[test]
    fn dropped_writes_are_integrity_errors() {
        let spy = SpyMap::new(Some(Table::Stock));
        let e = Loader::new(config(1, 1, 3, 10))
            .load_all(&mut *spy.handle())
            .unwrap_err();
        assert!(matches!(
            e,
            Error::Integrity {
                table: "stock",
                inserted: 0,
                examined: 10
            }
        ));
    }

    #[test]
    fn bulk_load_uses_load_path() {
        let mut config = config(1, 1, 3, 10);
        config.bulk_load = true;
        let spy = SpyMap::new(None);
        let report = Loader::new(config).load_all(&mut *spy.handle()).unwrap();
        assert_eq!(spy.loads.load(Ordering::Relaxed) as u64, report.total_inserted());
    }

    #[test]
    fn verify_reports_financial_rules() {
        // A full-size district set satisfies both rules on a fresh load.
        let loader = Loader::new(
            TpccConfig::new(&TpccOpt {
                warehouses: Some(1),
                items: Some(10),
                now: Some(0),
                ..Default::default()
            })
            .unwrap(),
        );
        assert_eq!(loader.config().scale.customers, 3000);
        let map = MemoryMap::new(64);
        let mut handle = map.handle();
        loader.populate_warehouse(&mut *handle).unwrap();
        loader.populate_district(&mut *handle).unwrap();
        loader.populate_customer(&mut *handle).unwrap();
        assert!(loader.verify(&mut *handle).unwrap().is_empty());

        // A reduced scale breaks both.
        let loader = Loader::new(config(1, 2, 3, 10));
        let map = MemoryMap::new(8);
        let mut handle = map.handle();
        loader.load_all(&mut *handle).unwrap();
        let violations = loader.verify(&mut *handle).unwrap();
        assert_eq!(violations.len(), 3);
        assert!(violations.contains(&Violation::WarehouseYtd {
            w_id: 1,
            w_ytd: WAREHOUSE_YTD,
            districts: 2.0 * DISTRICT_YTD,
        }));
        assert!(violations.contains(&Violation::DistrictYtd {
            w_id: 1,
            d_id: 2,
            d_ytd: DISTRICT_YTD,
            history: 3.0 * HISTORY_AMOUNT,
        }));
    }

    #[test]
    fn verify_credits_payments_to_receiving_district() {
        use crate::tpcc::random::TpccRng;
        use crate::tpcc::txn::{Executor, TpccTxn};

        let loader = Loader::new(
            TpccConfig::new(&TpccOpt {
                warehouses: Some(1),
                items: Some(10),
                now: Some(0),
                ..Default::default()
            })
            .unwrap(),
        );
        let map = MemoryMap::new(64);
        let mut handle = map.handle();
        loader.populate_warehouse(&mut *handle).unwrap();
        loader.populate_district(&mut *handle).unwrap();
        loader.populate_customer(&mut *handle).unwrap();

        let mut txn = TpccTxn::new(loader.config());
        let mut rng = TpccRng::new(42);
        for _ in 0..200 {
            assert!(txn.payment(&mut *handle, &mut rng).unwrap());
        }

        let remote = map
            .snapshot()
            .keys()
            .filter(|k| Table::of(**k) == Some(Table::History))
            .filter(|k| {
                let h: History = read(&mut *handle, **k).unwrap();
                (h.h_w_id, h.h_d_id) != (h.h_c_w_id, h.h_c_d_id)
            })
            .count();
        assert!(remote > 0);
        assert_eq!(loader.verify(&mut *handle).unwrap(), vec![]);
    }

    #[test]
    fn default_scale_fits() {
        assert!(Scale::new(1000).validate().is_ok());
    }
}
