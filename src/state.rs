use std::sync::Arc;

use sqlx::PgPool;

use crate::repository::{BookingLedger, EventCatalog, PgStore, UserDirectory};
use crate::service::{InventoryService, QueryService};

#[derive(Clone)]
pub struct AppState {
    pub inventory: InventoryService,
    pub queries: QueryService,
}

impl AppState {
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_store(Arc::new(PgStore::new(pool)))
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: EventCatalog + BookingLedger + UserDirectory + 'static,
    {
        let catalog: Arc<dyn EventCatalog> = store.clone();
        let ledger: Arc<dyn BookingLedger> = store.clone();
        let users: Arc<dyn UserDirectory> = store;

        Self {
            inventory: InventoryService::new(catalog.clone(), ledger.clone(), users),
            queries: QueryService::new(catalog, ledger),
        }
    }
}
