//! services/portal/src/store/universities.rs
//!
//! The University Selection Store: up to five picks with ranked program choices,
//! mirrored to the local cache on every mutation. Nothing here talks to the server.

use pcas_core::domain::{CheckoutItem, CheckoutSummary, UniPick, University};
use pcas_core::ports::LocalCache;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::persistence::{self, PICKS_KEY};

pub const MAX_PICKS: usize = 5;
pub const PLATFORM_FEE_PKR: u64 = 250;
pub const NADRA_FEE_PKR: u64 = 50;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub picks: Vec<UniPick>,
    /// Last-seen search results by university id. Memory only.
    pub catalog: HashMap<String, University>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFeeItem {
    pub uni_id: String,
    pub name: String,
    #[serde(rename = "feePKR")]
    pub fee_pkr: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub items: Vec<ApplicationFeeItem>,
    #[serde(rename = "subtotalPKR")]
    pub subtotal_pkr: u64,
    #[serde(rename = "platformFeePKR")]
    pub platform_fee_pkr: u64,
    #[serde(rename = "nadraFeePKR")]
    pub nadra_fee_pkr: u64,
    #[serde(rename = "grandTotalPKR")]
    pub grand_total_pkr: u64,
}

pub struct UniversitySelection {
    cache: Arc<dyn LocalCache>,
    state: Mutex<SelectionState>,
}

impl UniversitySelection {
    /// Restores any picks saved by an earlier run.
    pub fn new(cache: Arc<dyn LocalCache>) -> Self {
        let picks: Vec<UniPick> =
            persistence::read_json(cache.as_ref(), PICKS_KEY).unwrap_or_default();
        debug!(picks = picks.len(), "Restored university picks");
        Self {
            cache,
            state: Mutex::new(SelectionState {
                picks,
                catalog: HashMap::new(),
            }),
        }
    }

    pub fn snapshot(&self) -> SelectionState {
        self.lock().clone()
    }

    pub fn picks(&self) -> Vec<UniPick> {
        self.lock().picks.clone()
    }

    pub fn cache_results(&self, universities: impl IntoIterator<Item = University>) {
        let mut state = self.lock();
        for university in universities {
            state.catalog.insert(university.id.clone(), university);
        }
    }

    /// Returns whether the pick was added. Duplicates and a sixth pick are ignored.
    pub fn add_pick(&self, uni_id: &str) -> bool {
        self.mutate(|picks| {
            if picks.len() >= MAX_PICKS || picks.iter().any(|p| p.uni_id == uni_id) {
                return false;
            }
            picks.push(UniPick::new(uni_id));
            true
        })
    }

    pub fn remove_pick(&self, uni_id: &str) {
        self.mutate(|picks| picks.retain(|p| p.uni_id != uni_id));
    }

    /// Sets the field of study. Ranked programs belong to a field, so they are
    /// always cleared, even when the field is unchanged.
    pub fn set_field(&self, uni_id: &str, field: &str) {
        self.mutate(|picks| {
            if let Some(pick) = find(picks, uni_id) {
                pick.field_of_study = Some(field.to_string());
                pick.ranked_program_ids.clear();
            }
        });
    }

    /// Appends the program to the ranking, or removes it if already ranked.
    pub fn toggle_ranked_program(&self, uni_id: &str, program_id: &str) {
        self.mutate(|picks| {
            if let Some(pick) = find(picks, uni_id) {
                let ranked = &mut pick.ranked_program_ids;
                match ranked.iter().position(|id| id == program_id) {
                    Some(index) => {
                        ranked.remove(index);
                    }
                    None => ranked.push(program_id.to_string()),
                }
            }
        });
    }

    /// Moves the ranked program at `from` to `to`. An out-of-range `from` is
    /// ignored; `to` is clamped to the end of the list.
    pub fn move_rank(&self, uni_id: &str, from: usize, to: usize) {
        self.mutate(|picks| {
            if let Some(pick) = find(picks, uni_id) {
                let ranked = &mut pick.ranked_program_ids;
                if from >= ranked.len() {
                    return;
                }
                let item = ranked.remove(from);
                let to = to.min(ranked.len());
                ranked.insert(to, item);
            }
        });
    }

    /// Clears the picks. The catalog is kept.
    pub fn reset(&self) {
        self.mutate(Vec::clear);
    }

    /// At least one pick, and every pick has a field and a ranked program.
    pub fn can_send_application(&self) -> bool {
        let state = self.lock();
        !state.picks.is_empty()
            && state.picks.iter().all(|p| {
                p.field_of_study.as_deref().is_some_and(|f| !f.is_empty())
                    && !p.ranked_program_ids.is_empty()
            })
    }

    /// Tuition line items for every ranked program. Programs missing from the
    /// catalog are skipped.
    pub fn build_checkout(&self) -> CheckoutSummary {
        let state = self.lock();
        let items: Vec<CheckoutItem> = state
            .picks
            .iter()
            .flat_map(|pick| {
                let programs = state
                    .catalog
                    .get(&pick.uni_id)
                    .and_then(|u| u.programs_by_field.get(pick.field_of_study.as_deref().unwrap_or("")));
                pick.ranked_program_ids.iter().filter_map(move |id| {
                    let program = programs?.iter().find(|p| &p.id == id)?;
                    Some(CheckoutItem {
                        uni_id: pick.uni_id.clone(),
                        program_id: id.clone(),
                        sem_fee_pkr: program.avg_semester_fee_pkr,
                    })
                })
            })
            .collect();
        let total_pkr = items.iter().map(|i| i.sem_fee_pkr).sum();
        CheckoutSummary { items, total_pkr }
    }

    /// Application fees per picked university plus the fixed platform and NADRA fees.
    pub fn fee_summary(&self) -> FeeSummary {
        let state = self.lock();
        let items: Vec<ApplicationFeeItem> = state
            .picks
            .iter()
            .map(|pick| {
                let university = state.catalog.get(&pick.uni_id);
                ApplicationFeeItem {
                    uni_id: pick.uni_id.clone(),
                    name: university
                        .map(|u| u.name.clone())
                        .unwrap_or_else(|| pick.uni_id.clone()),
                    fee_pkr: university.and_then(|u| u.application_fee_pkr).unwrap_or(0),
                }
            })
            .collect();
        let subtotal_pkr = items.iter().map(|i| i.fee_pkr).sum::<u64>();
        FeeSummary {
            items,
            subtotal_pkr,
            platform_fee_pkr: PLATFORM_FEE_PKR,
            nadra_fee_pkr: NADRA_FEE_PKR,
            grand_total_pkr: subtotal_pkr + PLATFORM_FEE_PKR + NADRA_FEE_PKR,
        }
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<UniPick>) -> T) -> T {
        let mut state = self.lock();
        let out = f(&mut state.picks);
        persistence::write_json(self.cache.as_ref(), PICKS_KEY, &state.picks);
        out
    }

    fn lock(&self) -> MutexGuard<'_, SelectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn find<'a>(picks: &'a mut [UniPick], uni_id: &str) -> Option<&'a mut UniPick> {
    picks.iter_mut().find(|p| p.uni_id == uni_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryCache;
    use pcas_core::domain::Program;
    use rstest::{fixture, rstest};

    #[fixture]
    fn cache() -> Arc<dyn LocalCache> {
        Arc::new(MemoryCache::new())
    }

    fn university(id: &str, fee: Option<u64>) -> University {
        let mut programs_by_field = HashMap::new();
        programs_by_field.insert(
            "Engineering".to_string(),
            vec![
                Program {
                    id: format!("{id}-ee"),
                    name: "Electrical".to_string(),
                    avg_semester_fee_pkr: 150_000,
                },
                Program {
                    id: format!("{id}-me"),
                    name: "Mechanical".to_string(),
                    avg_semester_fee_pkr: 120_000,
                },
            ],
        );
        University {
            id: id.to_string(),
            name: format!("University {id}"),
            city: "Lahore".to_string(),
            province: "Punjab".to_string(),
            established: None,
            website: None,
            rating: None,
            blurb: None,
            application_fee_pkr: fee,
            deadline_iso: None,
            programs_by_field,
        }
    }

    #[rstest]
    fn sixth_pick_is_ignored(cache: Arc<dyn LocalCache>) {
        let selection = UniversitySelection::new(cache);
        for id in ["u1", "u2", "u3", "u4", "u5"] {
            assert!(selection.add_pick(id));
        }
        assert!(!selection.add_pick("u6"), "a sixth pick must be rejected");
        assert!(!selection.add_pick("u1"), "duplicates must be rejected");
        assert_eq!(selection.picks().len(), MAX_PICKS);
    }

    #[rstest]
    #[case::new_field("Medicine")]
    #[case::same_field("Engineering")]
    fn setting_a_field_clears_the_ranking(cache: Arc<dyn LocalCache>, #[case] field: &str) {
        let selection = UniversitySelection::new(cache);
        selection.add_pick("u1");
        selection.set_field("u1", "Engineering");
        selection.toggle_ranked_program("u1", "u1-ee");
        assert_eq!(selection.picks()[0].ranked_program_ids, vec!["u1-ee"]);

        selection.set_field("u1", field);
        assert!(selection.picks()[0].ranked_program_ids.is_empty());
    }

    #[rstest]
    fn toggling_and_moving_ranks(cache: Arc<dyn LocalCache>) {
        let selection = UniversitySelection::new(cache);
        selection.add_pick("u1");
        for id in ["a", "b", "c"] {
            selection.toggle_ranked_program("u1", id);
        }
        selection.move_rank("u1", 2, 0);
        assert_eq!(selection.picks()[0].ranked_program_ids, vec!["c", "a", "b"]);

        selection.move_rank("u1", 9, 0);
        selection.move_rank("u1", 0, 9);
        assert_eq!(selection.picks()[0].ranked_program_ids, vec!["a", "b", "c"]);

        selection.toggle_ranked_program("u1", "b");
        assert_eq!(selection.picks()[0].ranked_program_ids, vec!["a", "c"]);
    }

    #[rstest]
    fn picks_survive_a_restart(cache: Arc<dyn LocalCache>) {
        let first = UniversitySelection::new(cache.clone());
        first.add_pick("u1");
        first.set_field("u1", "Engineering");

        let second = UniversitySelection::new(cache);
        assert_eq!(second.picks(), first.picks());
    }

    #[rstest]
    fn application_needs_a_field_and_a_ranked_program(cache: Arc<dyn LocalCache>) {
        let selection = UniversitySelection::new(cache);
        assert!(!selection.can_send_application(), "no picks");
        selection.add_pick("u1");
        selection.set_field("u1", "Engineering");
        assert!(!selection.can_send_application(), "nothing ranked");
        selection.toggle_ranked_program("u1", "u1-ee");
        assert!(selection.can_send_application());
    }

    #[rstest]
    fn checkout_and_fees_use_the_catalog(cache: Arc<dyn LocalCache>) {
        let selection = UniversitySelection::new(cache);
        selection.cache_results(vec![university("u1", Some(2_000))]);
        selection.add_pick("u1");
        selection.add_pick("u2");
        selection.set_field("u1", "Engineering");
        selection.toggle_ranked_program("u1", "u1-me");
        selection.toggle_ranked_program("u1", "u1-ee");
        selection.toggle_ranked_program("u1", "gone");

        let checkout = selection.build_checkout();
        assert_eq!(checkout.items.len(), 2, "unknown programs are skipped");
        assert_eq!(checkout.items[0].program_id, "u1-me");
        assert_eq!(checkout.total_pkr, 270_000);

        let fees = selection.fee_summary();
        assert_eq!(fees.subtotal_pkr, 2_000);
        assert_eq!(fees.items[1].name, "u2");
        assert_eq!(fees.grand_total_pkr, 2_300);
    }

    #[rstest]
    fn reset_keeps_the_catalog(cache: Arc<dyn LocalCache>) {
        let selection = UniversitySelection::new(cache.clone());
        selection.cache_results(vec![university("u1", None)]);
        selection.add_pick("u1");
        selection.reset();

        let state = selection.snapshot();
        assert!(state.picks.is_empty());
        assert!(state.catalog.contains_key("u1"));
        assert_eq!(cache.get(PICKS_KEY).expect("get").as_deref(), Some("[]"));
    }
}
