use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::location::CourierLocation;

/// Latest location per courier, with a secondary index by order. Entries older
/// than the validity window read as absent and are evicted on the spot; the
/// periodic sweep catches couriers nobody queries anymore.
pub struct LocationCache {
    by_courier: DashMap<Uuid, CourierLocation>,
    courier_by_order: DashMap<Uuid, Uuid>,
    ttl: Duration,
}

impl LocationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            by_courier: DashMap::new(),
            courier_by_order: DashMap::new(),
            ttl,
        }
    }

    pub fn put(&self, location: CourierLocation) {
        let courier_id = location.courier_id;
        let order_id = location.order_id;

        if let Some(previous) = self.by_courier.insert(courier_id, location) {
            if previous.order_id != order_id {
                self.courier_by_order
                    .remove_if(&previous.order_id, |_, mapped| *mapped == courier_id);
            }
        }
        self.courier_by_order.insert(order_id, courier_id);
    }

    pub fn get_by_courier(&self, courier_id: Uuid) -> Option<CourierLocation> {
        let location = self.by_courier.get(&courier_id)?.clone();
        if location.is_expired(self.ttl, Utc::now()) {
            self.remove_if_expired(courier_id, Utc::now());
            return None;
        }
        Some(location)
    }

    pub fn get_by_order(&self, order_id: Uuid) -> Option<CourierLocation> {
        let courier_id = *self.courier_by_order.get(&order_id)?;
        self.get_by_courier(courier_id)
    }

    pub fn remove(&self, courier_id: Uuid) {
        if let Some((_, location)) = self.by_courier.remove(&courier_id) {
            self.courier_by_order
                .remove_if(&location.order_id, |_, mapped| *mapped == courier_id);
        }
    }

    /// Drops every expired entry. Returns how many couriers were evicted.
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let candidates: Vec<Uuid> = self
            .by_courier
            .iter()
            .filter(|entry| entry.value().is_expired(self.ttl, now))
            .map(|entry| *entry.key())
            .collect();

        candidates
            .into_iter()
            .filter(|courier_id| self.remove_if_expired(*courier_id, now))
            .count()
    }

    /// Removal stays conditional on the entry still being stale: a push that
    /// lands between the staleness check and the removal must survive.
    fn remove_if_expired(&self, courier_id: Uuid, now: chrono::DateTime<Utc>) -> bool {
        match self
            .by_courier
            .remove_if(&courier_id, |_, location| location.is_expired(self.ttl, now))
        {
            Some((_, location)) => {
                self.courier_by_order
                    .remove_if(&location.order_id, |_, mapped| *mapped == courier_id);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.by_courier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_courier.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const TTL: Duration = Duration::from_secs(300);

    fn location(courier_id: Uuid, order_id: Uuid) -> CourierLocation {
        CourierLocation::new(courier_id, order_id, -23.56, -46.64, Some(90.0), Some(8.3)).unwrap()
    }

    #[test]
    fn put_indexes_by_courier_and_order() {
        let cache = LocationCache::new(TTL);
        let courier = Uuid::new_v4();
        let order = Uuid::new_v4();

        cache.put(location(courier, order));

        assert!(cache.get_by_courier(courier).is_some());
        assert!(cache.get_by_order(order).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_is_a_full_replace() {
        let cache = LocationCache::new(TTL);
        let courier = Uuid::new_v4();
        let order = Uuid::new_v4();

        let mut first = location(courier, order);
        first.latitude = -23.0;
        cache.put(first);

        let mut second = location(courier, order);
        second.latitude = -24.0;
        second.heading = None;
        cache.put(second);

        let stored = cache.get_by_courier(courier).unwrap();
        assert_eq!(stored.latitude, -24.0);
        assert_eq!(stored.heading, None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn moving_to_a_new_order_drops_the_old_index_entry() {
        let cache = LocationCache::new(TTL);
        let courier = Uuid::new_v4();
        let old_order = Uuid::new_v4();
        let new_order = Uuid::new_v4();

        cache.put(location(courier, old_order));
        cache.put(location(courier, new_order));

        assert!(cache.get_by_order(old_order).is_none());
        assert!(cache.get_by_order(new_order).is_some());
    }

    #[test]
    fn stale_entries_read_as_absent_before_any_sweep() {
        let cache = LocationCache::new(TTL);
        let courier = Uuid::new_v4();
        let order = Uuid::new_v4();

        let mut stale = location(courier, order);
        stale.recorded_at = Utc::now() - ChronoDuration::seconds(301);
        cache.put(stale);

        assert!(cache.get_by_courier(courier).is_none());
        assert!(cache.get_by_order(order).is_none());
        // The failed read evicted the entry as well.
        assert!(cache.is_empty());
    }

    #[test]
    fn entries_just_inside_the_window_still_read() {
        let cache = LocationCache::new(TTL);
        let courier = Uuid::new_v4();

        let mut fresh = location(courier, Uuid::new_v4());
        fresh.recorded_at = Utc::now() - ChronoDuration::seconds(299);
        cache.put(fresh);

        assert!(cache.get_by_courier(courier).is_some());
    }

    #[test]
    fn sweep_evicts_only_the_expired() {
        let cache = LocationCache::new(TTL);
        let stale_courier = Uuid::new_v4();
        let fresh_courier = Uuid::new_v4();

        let mut stale = location(stale_courier, Uuid::new_v4());
        stale.recorded_at = Utc::now() - ChronoDuration::seconds(600);
        cache.put(stale);
        cache.put(location(fresh_courier, Uuid::new_v4()));

        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_by_courier(fresh_courier).is_some());
    }

    #[test]
    fn eviction_spares_entries_refreshed_after_the_staleness_check() {
        let cache = LocationCache::new(TTL);
        let courier = Uuid::new_v4();
        let order = Uuid::new_v4();

        let mut stale = location(courier, order);
        stale.recorded_at = Utc::now() - ChronoDuration::seconds(600);
        cache.put(stale);

        // The sweep saw the entry stale at this instant...
        let checked_at = Utc::now();
        // ...but a fresh push lands before it gets to the removal.
        cache.put(location(courier, order));

        assert!(!cache.remove_if_expired(courier, checked_at));
        assert!(cache.get_by_courier(courier).is_some());
        assert!(cache.get_by_order(order).is_some());
    }

    #[test]
    fn remove_clears_both_maps_and_is_idempotent() {
        let cache = LocationCache::new(TTL);
        let courier = Uuid::new_v4();
        let order = Uuid::new_v4();

        cache.put(location(courier, order));
        cache.remove(courier);
        cache.remove(courier);

        assert!(cache.get_by_courier(courier).is_none());
        assert!(cache.get_by_order(order).is_none());
    }
}
