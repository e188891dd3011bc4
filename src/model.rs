use crate::delivery_spec::DeliverySpec;
use crate::error::{ValidatorError, ValidatorResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of the master schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMaster {
    pub store_id: i64,
    pub name: String,
    pub zone: String,
    /// Allowed delivery days as typed by the operator, e.g. `"L, X, V"`.
    pub delivery_spec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_center: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl StoreMaster {
    pub fn new(
        store_id: i64,
        name: impl Into<String>,
        zone: impl Into<String>,
        delivery_spec: impl Into<String>,
    ) -> Self {
        Self {
            store_id,
            name: name.into(),
            zone: zone.into(),
            delivery_spec: delivery_spec.into(),
            distribution_center: None,
            format: None,
        }
    }
}

/// One row of an uploaded planning table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedDelivery {
    /// `None` when the store cell is blank or not a number; such rows are
    /// kept and reported as not in the master table.
    pub store_id: Option<i64>,
    #[serde(default)]
    pub raw_store_id: String,
    /// Parsed date; `None` when the raw value could not be parsed.
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub raw_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
}

impl PlannedDelivery {
    pub fn new(store_id: i64, date: NaiveDate) -> Self {
        Self {
            store_id: Some(store_id),
            raw_store_id: store_id.to_string(),
            date: Some(date),
            raw_date: date.format("%Y-%m-%d").to_string(),
            name: None,
            shipment_id: None,
            trip_id: None,
        }
    }
}

/// In-memory master table. Store ids are unique and row order is preserved.
/// Delivery specs are parsed once on insert and kept next to the raw rows.
#[derive(Debug, Clone, Default)]
pub struct MasterTable {
    stores: Vec<StoreMaster>,
    specs: Vec<DeliverySpec>,
    index: HashMap<i64, usize>,
}

impl MasterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stores<I>(stores: I) -> ValidatorResult<Self>
    where
        I: IntoIterator<Item = StoreMaster>,
    {
        let mut table = Self::new();
        for store in stores {
            table.add_store(store)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn stores(&self) -> &[StoreMaster] {
        &self.stores
    }

    pub fn get(&self, store_id: i64) -> Option<&StoreMaster> {
        self.index.get(&store_id).map(|&idx| &self.stores[idx])
    }

    pub fn contains(&self, store_id: i64) -> bool {
        self.index.contains_key(&store_id)
    }

    pub fn spec_of(&self, store_id: i64) -> Option<&DeliverySpec> {
        self.index.get(&store_id).map(|&idx| &self.specs[idx])
    }

    /// Stores paired with their parsed delivery spec, in table order.
    pub fn iter_with_specs(&self) -> impl Iterator<Item = (&StoreMaster, &DeliverySpec)> {
        self.stores.iter().zip(self.specs.iter())
    }

    pub fn add_store(&mut self, store: StoreMaster) -> ValidatorResult<&StoreMaster> {
        if self.index.contains_key(&store.store_id) {
            return Err(ValidatorError::DuplicateStoreId(store.store_id));
        }
        let idx = self.stores.len();
        self.index.insert(store.store_id, idx);
        self.specs.push(DeliverySpec::parse(&store.delivery_spec));
        self.stores.push(store);
        Ok(&self.stores[idx])
    }

    pub fn update_delivery_spec(
        &mut self,
        store_id: i64,
        delivery_spec: impl Into<String>,
    ) -> ValidatorResult<&StoreMaster> {
        let idx = *self
            .index
            .get(&store_id)
            .ok_or(ValidatorError::StoreNotFound(store_id))?;
        let raw = delivery_spec.into();
        self.specs[idx] = DeliverySpec::parse(&raw);
        self.stores[idx].delivery_spec = raw;
        Ok(&self.stores[idx])
    }

    pub fn next_store_id(&self) -> i64 {
        self.stores
            .iter()
            .map(|s| s.store_id)
            .max()
            .map(|m| m + 1)
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weekday::WeekdayCode;

    #[test]
    fn update_reparses_spec() {
        let mut table = MasterTable::from_stores([StoreMaster::new(7, "Centro", "Norte", "L")])
            .unwrap();
        table.update_delivery_spec(7, "x v").unwrap();
        let spec = table.spec_of(7).unwrap();
        assert!(spec.contains(WeekdayCode::Wed));
        assert!(!spec.contains(WeekdayCode::Mon));
        assert_eq!(table.get(7).unwrap().delivery_spec, "x v");
    }

    #[test]
    fn from_stores_rejects_duplicates() {
        let err = MasterTable::from_stores([
            StoreMaster::new(1, "A", "Z1", "L"),
            StoreMaster::new(1, "B", "Z2", "M"),
        ])
        .unwrap_err();
        assert!(matches!(err, ValidatorError::DuplicateStoreId(1)));
    }
}
