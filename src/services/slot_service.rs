use crate::{
    dao::models::{DailySongEntity, SlotKey},
    error::ServiceError,
    state::SharedState,
};

/// Both daily song slots as currently stored.
#[derive(Debug, Clone, Default)]
pub struct SlotsView {
    pub current: Option<DailySongEntity>,
    pub next: Option<DailySongEntity>,
}

/// Read the `current` and `next` slots for inspection.
pub async fn read_slots(state: &SharedState) -> Result<SlotsView, ServiceError> {
    let store = state.require_store().await?;
    let current = store.find_slot(SlotKey::Current).await?;
    let next = store.find_slot(SlotKey::Next).await?;
    Ok(SlotsView { current, next })
}
