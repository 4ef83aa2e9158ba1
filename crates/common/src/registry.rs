//! Registered image list and its persistence

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::form::{Rejection, RegistrationForm};
use crate::storage::StorageArea;
use crate::types::{Field, ImageRecord, SubmitTrigger, STORAGE_KEY};
use crate::Result;

/// Persisted list of registered images for one origin.
///
/// The whole list is stored as a JSON array under [`STORAGE_KEY`].
#[derive(Clone)]
pub struct RegistrationStore {
    area: StorageArea,
}

impl RegistrationStore {
    pub fn new(area: StorageArea) -> Self {
        Self { area }
    }

    pub fn area(&self) -> &StorageArea {
        &self.area
    }

    /// Read the persisted list.
    ///
    /// A missing key or a value that is not a JSON array reads as an empty
    /// list, and array items that are not records are skipped, the same way
    /// the served page reads it.
    pub fn load(&self) -> Result<Vec<ImageRecord>> {
        let Some(raw) = self.area.get_item(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };

        let items = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(
                    "Ignoring unreadable {} for {}: {}",
                    STORAGE_KEY,
                    self.area.origin(),
                    e
                );
                return Ok(Vec::new());
            }
        };

        let total = items.len();
        let records: Vec<ImageRecord> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        if records.len() != total {
            warn!(
                "Skipped {} malformed item(s) under {} for {}",
                total - records.len(),
                STORAGE_KEY,
                self.area.origin()
            );
        }
        Ok(records)
    }

    /// Persist a full list, replacing the previous one
    pub fn save(&self, records: &[ImageRecord]) -> Result<()> {
        let raw = serde_json::to_string(records)?;
        self.area.set_item(STORAGE_KEY, &raw)
    }

}

/// Result of a submit attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Accepted {
        record: ImageRecord,
        position: usize,
    },
    Rejected(Rejection),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }
}

/// The registration widget: form state, rendered list, and durable store
pub struct Registrar {
    form: RegistrationForm,
    records: Vec<ImageRecord>,
    store: RegistrationStore,
}

impl Registrar {
    /// Load the persisted list for the store's origin
    pub fn open(store: RegistrationStore) -> Result<Self> {
        let records = store.load()?;
        debug!(
            "Loaded {} registered image(s) for {}",
            records.len(),
            store.area().origin()
        );
        Ok(Self {
            form: RegistrationForm::new(),
            records,
            store,
        })
    }

    pub fn form(&self) -> &RegistrationForm {
        &self.form
    }

    /// Records in display order
    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn store(&self) -> &RegistrationStore {
        &self.store
    }

    /// Type text into a field
    pub fn input(&mut self, field: Field, text: &str) {
        self.form.type_text(field, text);
    }

    /// Replace a field's value
    pub fn fill(&mut self, field: Field, text: &str) {
        self.form.set_value(field, text);
    }

    /// Attempt to register the current form values.
    ///
    /// Accepted records are persisted before they are shown; if persisting
    /// fails nothing changes and the inputs keep their values.
    pub fn submit(&mut self, trigger: SubmitTrigger) -> Result<SubmitOutcome> {
        let record = match self.form.submit() {
            Ok(record) => record,
            Err(rejection) => {
                debug!(
                    "Submit via {} rejected: {} invalid field(s)",
                    trigger,
                    rejection.errors.len()
                );
                return Ok(SubmitOutcome::Rejected(rejection));
            }
        };

        let mut next = self.records.clone();
        next.push(record.clone());
        self.store.save(&next)?;
        self.records = next;
        self.form.reset();

        let position = self.records.len() - 1;
        info!(
            "Registered \"{}\" via {} ({} image(s) total)",
            record.title,
            trigger,
            self.records.len()
        );
        Ok(SubmitOutcome::Accepted { record, position })
    }

    /// Discard in-memory state and reload from the store
    pub fn reload(&mut self) -> Result<()> {
        self.records = self.store.load()?;
        self.form.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Validity;
    use crate::storage::LocalStorage;
    use crate::types::Origin;

    const URL: &str = "https://cdn.mos.cms.futurecdn.net/eM9EvWyDxXcnQTTyH8c8p5-1200-80.jpg";

    fn registrar(storage: &LocalStorage) -> Registrar {
        let origin = Origin::from_url("http://127.0.0.1:8080").unwrap();
        Registrar::open(RegistrationStore::new(storage.area(origin))).unwrap()
    }

    #[test]
    fn test_accepted_submit_persists_and_clears() {
        let storage = LocalStorage::open_memory().unwrap();
        let mut reg = registrar(&storage);

        reg.input(Field::Title, "Alien BR");
        reg.input(Field::ImageUrl, URL);
        let outcome = reg.submit(SubmitTrigger::EnterKey).unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(reg.records(), &[ImageRecord::new("Alien BR", URL)]);
        assert_eq!(
            reg.store().load().unwrap().last(),
            Some(&ImageRecord::new("Alien BR", URL))
        );
        assert_eq!(reg.form().value(Field::Title), "");
        assert_eq!(reg.form().value(Field::ImageUrl), "");
        assert_eq!(reg.form().validity(Field::Title), Validity::Pristine);
    }

    #[test]
    fn test_rejected_submit_leaves_store_untouched() {
        let storage = LocalStorage::open_memory().unwrap();
        let mut reg = registrar(&storage);

        let outcome = reg.submit(SubmitTrigger::Button).unwrap();
        assert!(!outcome.is_accepted());
        assert!(reg.records().is_empty());
        assert!(reg.store().area().keys().unwrap().is_empty());
    }

    #[test]
    fn test_triggers_are_equivalent() {
        let outcomes: Vec<_> = [SubmitTrigger::Button, SubmitTrigger::EnterKey]
            .into_iter()
            .map(|trigger| {
                let storage = LocalStorage::open_memory().unwrap();
                let mut reg = registrar(&storage);
                reg.input(Field::Title, "BR Alien");
                reg.input(Field::ImageUrl, URL);
                let outcome = reg.submit(trigger).unwrap();
                (outcome, reg.store().area().get_item(STORAGE_KEY).unwrap())
            })
            .collect();

        assert_eq!(outcomes[0], outcomes[1]);
    }

    #[test]
    fn test_reload_restores_without_writing() {
        let storage = LocalStorage::open_memory().unwrap();
        let mut reg = registrar(&storage);
        reg.input(Field::Title, "Aliens");
        reg.input(Field::ImageUrl, URL);
        reg.submit(SubmitTrigger::Button).unwrap();

        let before = storage.snapshot_all().unwrap();
        reg.reload().unwrap();
        let mut reopened = registrar(&storage);
        reopened.reload().unwrap();

        assert_eq!(storage.snapshot_all().unwrap(), before);
        assert_eq!(reopened.records(), &[ImageRecord::new("Aliens", URL)]);
    }

    #[test]
    fn test_unreadable_store_reads_as_empty() {
        let storage = LocalStorage::open_memory().unwrap();
        let origin = Origin::from_url("http://127.0.0.1:8080").unwrap();
        let store = RegistrationStore::new(storage.area(origin.clone()));

        for raw in ["{not json", "{\"title\":\"x\"}", "42"] {
            storage.set_item(&origin, STORAGE_KEY, raw).unwrap();
            assert!(store.load().unwrap().is_empty(), "{} should read as empty", raw);
        }

        storage
            .set_item(
                &origin,
                STORAGE_KEY,
                &format!(r#"[{{"title":"Aliens","imageUrl":"{}"}}, 7, {{"title":1}}]"#, URL),
            )
            .unwrap();
        assert_eq!(store.load().unwrap(), vec![ImageRecord::new("Aliens", URL)]);

        // Loading never rewrites what is stored
        assert!(storage.get_item(&origin, STORAGE_KEY).unwrap().unwrap().contains(", 7, "));
    }

    #[test]
    fn test_submit_extends_the_shown_list() {
        let storage = LocalStorage::open_memory().unwrap();
        let mut reg = registrar(&storage);

        reg.input(Field::Title, "Aliens");
        reg.input(Field::ImageUrl, URL);
        reg.submit(SubmitTrigger::Button).unwrap();

        // Storage cleared behind the open page
        storage.clear_all().unwrap();

        reg.input(Field::Title, "BR Alien");
        reg.input(Field::ImageUrl, URL);
        let outcome = reg.submit(SubmitTrigger::EnterKey).unwrap();

        let expected = vec![ImageRecord::new("Aliens", URL), ImageRecord::new("BR Alien", URL)];
        assert_eq!(
            outcome,
            SubmitOutcome::Accepted {
                record: ImageRecord::new("BR Alien", URL),
                position: 1,
            }
        );
        assert_eq!(reg.records(), expected.as_slice());
        assert_eq!(reg.store().load().unwrap(), expected);
    }
}
