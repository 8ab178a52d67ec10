//! The add-item entry form's store.
//!
//! Owns the ranked suggestion list, the unit catalog, and the session-local
//! dismissal set. The visible suggestion slice is always recomputed from
//! the full ranked list minus dismissals, capped at the configured display
//! limit, so dismissing one suggestion pulls the next one up.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::gateway::PrepGateway;
use crate::model::{
    Context, ItemDraft, NewDismissal, NewPrepItem, Suggestion, SuggestionRanker, Unit,
    format_quantity_raw,
};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Snapshot of the entry form's state, published after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrepEntryState {
    /// The visible slice: ranked, not dismissed, capped at the display
    /// limit.
    pub suggestions: Vec<Suggestion>,
    /// Every ranked suggestion for the loaded scope, dismissed or not.
    pub all_ranked_suggestions: Vec<Suggestion>,
    /// The kitchen's unit catalog.
    pub all_units: Vec<Unit>,
    /// Kitchen item IDs dismissed this session.
    pub dismissed_suggestion_ids: HashSet<String>,
    pub suggestions_loading: bool,
    pub units_loading: bool,
    /// True from the moment a compound add passes validation until its
    /// last gateway call resolves.
    pub adding_item: bool,
    /// Message of the most recent failure.
    pub error: Option<String>,
}

/// Inputs for the compound add: one form submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AddItemRequest {
    pub kitchen_id: String,
    pub station_id: String,
    pub shift_date: NaiveDate,
    pub shift_id: String,
    /// Free-text item name; matched against the catalog after trimming.
    pub description: String,
    pub unit_id: Option<String>,
    pub quantity: Option<f64>,
    pub user_id: String,
}

/// Store behind the add-item form.
pub struct PrepEntryStore {
    gateway: Arc<dyn PrepGateway>,
    ranker: Arc<dyn SuggestionRanker>,
    config: StoreConfig,
    state: watch::Sender<PrepEntryState>,
}

impl PrepEntryStore {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PrepGateway>,
        ranker: Arc<dyn SuggestionRanker>,
        config: StoreConfig,
    ) -> Self {
        let (state, _) = watch::channel(PrepEntryState::default());
        Self {
            gateway,
            ranker,
            config,
            state,
        }
    }

    /// Watch the state. Receivers see every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PrepEntryState> {
        self.state.subscribe()
    }

    /// The current state, by value.
    #[must_use]
    pub fn snapshot(&self) -> PrepEntryState {
        self.state.borrow().clone()
    }

    /// Fetch suggestions and the unit catalog concurrently.
    ///
    /// The two queries resolve independently: each clears its own loading
    /// flag and publishes its own result as it lands. A failed arm records
    /// its message without touching the other arm's data; when both fail,
    /// the later completion's message is the one kept.
    ///
    /// Suggestions are scoped to a fully-selected `(station, date, shift)`.
    /// With no scope the suggestion query still runs but returns nothing,
    /// leaving an empty ranked list.
    pub async fn load_suggestions_and_units(&self, kitchen_id: &str, scope: Option<&Context>) {
        self.state.send_modify(|state| {
            state.suggestions_loading = true;
            state.units_loading = true;
        });

        let fetch_limit = if scope.is_some() {
            self.config.suggestions.fetch_limit
        } else {
            0
        };
        let display_limit = self.config.suggestions.display_limit;

        let suggestions = async {
            match self.gateway.list_suggestions(scope, fetch_limit).await {
                Ok(rows) => {
                    let ranked = self.ranker.rank(&rows);
                    self.state.send_modify(|state| {
                        state.all_ranked_suggestions = ranked;
                        state.suggestions_loading = false;
                        Self::refill(state, display_limit);
                    });
                }
                Err(error) => {
                    warn!("suggestion load failed: {error}");
                    self.state.send_modify(|state| {
                        state.suggestions_loading = false;
                        state.error = Some(error.to_string());
                    });
                }
            }
        };

        let units = async {
            match self.gateway.list_units(kitchen_id).await {
                Ok(all_units) => {
                    self.state.send_modify(|state| {
                        state.all_units = all_units;
                        state.units_loading = false;
                    });
                }
                Err(error) => {
                    warn!("unit load failed: {error}");
                    self.state.send_modify(|state| {
                        state.units_loading = false;
                        state.error = Some(error.to_string());
                    });
                }
            }
        };

        tokio::join!(suggestions, units);
    }

    /// Hide a suggestion for the rest of the session. Synchronous; the
    /// next-ranked suggestion takes the freed display slot.
    pub fn dismiss_suggestion(&self, kitchen_item_id: &str) {
        let display_limit = self.config.suggestions.display_limit;
        self.state.send_modify(|state| {
            state
                .dismissed_suggestion_ids
                .insert(kitchen_item_id.to_string());
            Self::refill(state, display_limit);
        });
    }

    /// Hide a suggestion and record the dismissal server-side.
    ///
    /// The local dismissal always sticks: a persistence failure is
    /// reported but not rolled back, since hiding again costs the user
    /// nothing and un-hiding unasked would.
    ///
    /// # Errors
    ///
    /// [`StoreError::Gateway`] when the dismissal row cannot be written.
    pub async fn dismiss_suggestion_persistent(
        &self,
        dismissal: NewDismissal,
    ) -> Result<(), StoreError> {
        self.dismiss_suggestion(&dismissal.kitchen_item_id);

        match self.gateway.insert_dismissal(&dismissal).await {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!("dismissal persistence failed: {error}");
                Err(error.into())
            }
        }
    }

    /// Forget all session dismissals and restore the full visible slice.
    pub fn clear_dismissals(&self) {
        let display_limit = self.config.suggestions.display_limit;
        self.state.send_modify(|state| {
            state.dismissed_suggestion_ids.clear();
            Self::refill(state, display_limit);
        });
    }

    /// Inject a unit created elsewhere in the session, so its name
    /// resolves without a catalog refetch.
    pub fn add_unit(&self, unit: Unit) {
        self.state.send_modify(|state| state.all_units.push(unit));
    }

    /// The compound add behind the entry form: resolve or create the
    /// catalog item for `description`, then insert a prep item referencing
    /// it.
    ///
    /// The `adding_item` flag is raised for the whole sequence and lowered
    /// when it resolves either way.
    ///
    /// # Errors
    ///
    /// [`StoreError::UserIdRequired`] when `user_id` is empty; nothing is
    /// called and no state changes. [`StoreError::Gateway`] when any step
    /// fails; steps already taken (a created catalog item) are kept.
    pub async fn add_item_with_updates(&self, request: AddItemRequest) -> Result<(), StoreError> {
        if request.user_id.is_empty() {
            return Err(StoreError::UserIdRequired);
        }

        self.state.send_modify(|state| state.adding_item = true);

        let result = self.insert_new_item(&request).await;

        let failure = result.as_ref().err().map(ToString::to_string);
        self.state.send_modify(|state| {
            state.adding_item = false;
            if let Some(message) = failure {
                state.error = Some(message);
            }
        });
        result
    }

    async fn insert_new_item(&self, request: &AddItemRequest) -> Result<(), StoreError> {
        let name = request.description.trim();

        let existing = self.gateway.find_kitchen_item(&request.kitchen_id, name).await?;
        let kitchen_item = match existing {
            Some(item) => item,
            None => {
                self.gateway
                    .create_kitchen_item(&request.kitchen_id, name)
                    .await?
            }
        };

        let unit_name = {
            let state = self.state.borrow();
            request.unit_id.as_deref().and_then(|unit_id| {
                state
                    .all_units
                    .iter()
                    .find(|unit| unit.id == unit_id)
                    .map(|unit| unit.name.clone())
            })
        };
        let quantity_raw = format_quantity_raw(request.quantity, unit_name.as_deref());

        let draft = ItemDraft {
            station_id: request.station_id.clone(),
            shift_id: request.shift_id.clone(),
            shift_date: request.shift_date,
            kitchen_item_id: kitchen_item.id,
            unit_id: request.unit_id.clone(),
            quantity: request.quantity,
            quantity_raw,
        };
        self.gateway
            .insert_prep_item(NewPrepItem::from_draft(
                draft,
                Some(request.user_id.clone()),
            ))
            .await?;
        Ok(())
    }

    /// Recompute the visible slice from the ranked list and dismissals.
    fn refill(state: &mut PrepEntryState, display_limit: usize) {
        state.suggestions = state
            .all_ranked_suggestions
            .iter()
            .filter(|suggestion| !state.dismissed_suggestion_ids.contains(&suggestion.id))
            .take(display_limit)
            .cloned()
            .collect();
    }
}
