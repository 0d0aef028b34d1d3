use std::collections::{BTreeMap, HashMap};

use crate::model::*;

/// A row type held by a [`Table`].
pub trait Record: Clone {
    const KIND: EntityKind;

    fn id(&self) -> Id;

    /// Value of the column that must be unique across the table, if any.
    fn unique_key(&self) -> Option<&str> {
        None
    }
}

impl Record for House {
    const KIND: EntityKind = EntityKind::House;

    fn id(&self) -> Id {
        self.id
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.name)
    }
}

impl Record for Client {
    const KIND: EntityKind = EntityKind::Client;

    fn id(&self) -> Id {
        self.id
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.phone_number)
    }
}

impl Record for Service {
    const KIND: EntityKind = EntityKind::Service;

    fn id(&self) -> Id {
        self.id
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.name)
    }
}

impl Record for Rental {
    const KIND: EntityKind = EntityKind::Rental;

    fn id(&self) -> Id {
        self.id
    }
}

impl Record for RentalService {
    const KIND: EntityKind = EntityKind::RentalService;

    fn id(&self) -> Id {
        self.id
    }
}

/// One entity collection: rows in id order plus the unique-key index.
#[derive(Debug, Clone)]
pub struct Table<T: Record> {
    rows: BTreeMap<Id, T>,
    unique: HashMap<String, Id>,
    next_id: Id,
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Table<T> {
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            unique: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn get(&self, id: Id) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn find_unique(&self, key: &str) -> Option<&T> {
        self.unique.get(key).and_then(|id| self.rows.get(id))
    }

    /// Full scan in id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// Full scan sorted by `key`, ties broken by id.
    pub fn sorted_by<K: Ord>(&self, mut key: impl FnMut(&T) -> K) -> Vec<T> {
        let mut rows: Vec<T> = self.rows.values().cloned().collect();
        rows.sort_by_cached_key(|r| (key(r), r.id()));
        rows
    }

    /// Id the next inserted row will receive.
    pub fn next_id(&self) -> Id {
        self.next_id
    }

    /// Insert or replace a row, keeping the unique index in step.
    pub fn put(&mut self, row: T) {
        let id = row.id();
        if let Some(old) = self.rows.get(&id)
            && let Some(old_key) = old.unique_key()
        {
            self.unique.remove(old_key);
        }
        if let Some(key) = row.unique_key() {
            self.unique.insert(key.to_string(), id);
        }
        self.rows.insert(id, row);
        self.next_id = self.next_id.max(id + 1);
    }

    pub fn remove(&mut self, id: Id) -> Option<T> {
        let row = self.rows.remove(&id)?;
        if let Some(key) = row.unique_key() {
            self.unique.remove(key);
        }
        Some(row)
    }

    pub fn advance_sequence(&mut self, next_id: Id) {
        self.next_id = self.next_id.max(next_id);
    }
}

/// The whole entity store. Guarded by one lock in the engine so every
/// mutation sees and writes a consistent snapshot.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub houses: Table<House>,
    pub clients: Table<Client>,
    pub services: Table<Service>,
    pub rentals: Table<Rental>,
    pub rental_services: Table<RentalService>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event; the caller holds the write lock.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::HouseSaved { house } => self.houses.put(house.clone()),
            Event::HouseDeleted { id } => {
                self.houses.remove(*id);
            }
            Event::ClientSaved { client } => self.clients.put(client.clone()),
            Event::ClientDeleted { id } => {
                self.clients.remove(*id);
            }
            Event::ServiceSaved { service } => self.services.put(service.clone()),
            Event::ServiceDeleted { id } => {
                self.services.remove(*id);
            }
            Event::RentalSaved { rental } => self.rentals.put(rental.clone()),
            Event::RentalDeleted { id, rental_services } => {
                for link in rental_services {
                    self.rental_services.remove(*link);
                }
                self.rentals.remove(*id);
            }
            Event::RentalServiceSaved { rental_service } => {
                self.rental_services.put(rental_service.clone())
            }
            Event::RentalServiceDeleted { id } => {
                self.rental_services.remove(*id);
            }
            Event::SequenceAdvanced { kind, next_id } => match kind {
                EntityKind::House => self.houses.advance_sequence(*next_id),
                EntityKind::Client => self.clients.advance_sequence(*next_id),
                EntityKind::Service => self.services.advance_sequence(*next_id),
                EntityKind::Rental => self.rentals.advance_sequence(*next_id),
                EntityKind::RentalService => self.rental_services.advance_sequence(*next_id),
            },
        }
    }

    /// Minimal event list that recreates this state, sequences included.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(
            self.houses.len()
                + self.clients.len()
                + self.services.len()
                + self.rentals.len()
                + self.rental_services.len()
                + 5,
        );
        events.extend(self.houses.iter().map(|h| Event::HouseSaved { house: h.clone() }));
        events.extend(self.clients.iter().map(|c| Event::ClientSaved { client: c.clone() }));
        events.extend(self.services.iter().map(|s| Event::ServiceSaved { service: s.clone() }));
        events.extend(self.rentals.iter().map(|r| Event::RentalSaved { rental: r.clone() }));
        events.extend(self.rental_services.iter().map(|rs| Event::RentalServiceSaved {
            rental_service: rs.clone(),
        }));
        events.extend([
            Event::SequenceAdvanced { kind: EntityKind::House, next_id: self.houses.next_id() },
            Event::SequenceAdvanced { kind: EntityKind::Client, next_id: self.clients.next_id() },
            Event::SequenceAdvanced { kind: EntityKind::Service, next_id: self.services.next_id() },
            Event::SequenceAdvanced { kind: EntityKind::Rental, next_id: self.rentals.next_id() },
            Event::SequenceAdvanced {
                kind: EntityKind::RentalService,
                next_id: self.rental_services.next_id(),
            },
        ]);
        events
    }
}
