//! In-process store for tests, demos and local development.
//!
//! All three tables sit behind one lock, so every guarded write is checked and
//! applied atomically with respect to every other call.

use crate::domain::model::{
    AssigneeSummary, InstanceGuard, InstanceId, InstancePatch, InstanceSummary, NewSwapRequest,
    OpenSwap, RequesterSummary, RoutineEntry, ShiftInstance, SwapGuard, SwapId, SwapPatch,
    SwapRequest, SwapStatus, Volunteer, VolunteerId,
};
use crate::domain::ports::{RegistryStore, ScheduleStore, SwapStore};
use crate::utils::error::{Result, RosterError};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// India Standard Time, the zone the roster's "today" is defined in.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

#[derive(Debug, Default)]
struct Tables {
    volunteers: HashMap<VolunteerId, Volunteer>,
    instances: BTreeMap<InstanceId, ShiftInstance>,
    swaps: BTreeMap<SwapId, SwapRequest>,
    next_swap_id: i64,
}

#[derive(Debug, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    utc_offset_minutes: i32,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_utc_offset(DEFAULT_UTC_OFFSET_MINUTES)
    }

    pub fn with_utc_offset(utc_offset_minutes: i32) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables {
                next_swap_id: 1,
                ..Default::default()
            })),
            utc_offset_minutes,
        }
    }

    pub async fn add_volunteer(&self, volunteer: Volunteer) {
        let mut tables = self.tables.lock().await;
        tables.volunteers.insert(volunteer.id.clone(), volunteer);
    }

    pub async fn add_instance(&self, instance: ShiftInstance) {
        let mut tables = self.tables.lock().await;
        tables.instances.insert(instance.id, instance);
    }

    pub async fn volunteer(&self, id: &VolunteerId) -> Option<Volunteer> {
        self.tables.lock().await.volunteers.get(id).cloned()
    }

    pub async fn instance(&self, id: InstanceId) -> Option<ShiftInstance> {
        self.tables.lock().await.instances.get(&id).cloned()
    }

    pub async fn swaps(&self) -> Vec<SwapRequest> {
        self.tables.lock().await.swaps.values().cloned().collect()
    }
}

#[async_trait]
impl RegistryStore for InMemoryStore {
    async fn fetch_volunteer(&self, id: &VolunteerId) -> Result<Option<Volunteer>> {
        Ok(self.volunteer(id).await)
    }

    async fn find_by_roll_number(&self, roll_number: &str) -> Result<Option<Volunteer>> {
        let wanted = roll_number.trim().to_lowercase();
        let tables = self.tables.lock().await;
        Ok(tables
            .volunteers
            .values()
            .find(|v| {
                v.roll_number
                    .as_deref()
                    .is_some_and(|r| r.trim().to_lowercase() == wanted)
            })
            .cloned())
    }

    async fn increment_attendance(&self, id: &VolunteerId) -> Result<u32> {
        let mut tables = self.tables.lock().await;
        let volunteer = tables
            .volunteers
            .get_mut(id)
            .ok_or_else(|| RosterError::not_found("volunteer", id))?;
        volunteer.total_attendance = volunteer
            .total_attendance
            .checked_add(1)
            .ok_or_else(|| RosterError::BackendError {
                status: 500,
                message: format!("attendance counter for volunteer {} is at its maximum", id),
            })?;
        Ok(volunteer.total_attendance)
    }
}

#[async_trait]
impl ScheduleStore for InMemoryStore {
    async fn fetch_instance(&self, id: InstanceId) -> Result<Option<ShiftInstance>> {
        Ok(self.instance(id).await)
    }

    async fn fetch_routine(&self, date: NaiveDate) -> Result<Vec<RoutineEntry>> {
        let tables = self.tables.lock().await;
        let mut routine: Vec<RoutineEntry> = tables
            .instances
            .values()
            .filter(|i| i.date == date)
            .map(|i| RoutineEntry {
                instance: i.clone(),
                assignee: tables.volunteers.get(&i.assigned_volunteer_id).map(|v| {
                    AssigneeSummary {
                        name: v.name.clone(),
                        position: v.position.clone(),
                        contact: v.contact.clone(),
                    }
                }),
            })
            .collect();
        routine.sort_by(|a, b| a.instance.location.cmp(&b.instance.location));
        Ok(routine)
    }

    async fn update_instance_if(
        &self,
        id: InstanceId,
        guard: &InstanceGuard,
        patch: &InstancePatch,
    ) -> Result<Option<ShiftInstance>> {
        let mut tables = self.tables.lock().await;
        match tables.instances.get_mut(&id) {
            Some(instance) if guard.matches(instance) => {
                patch.apply_to(instance);
                Ok(Some(instance.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn current_date(&self) -> Result<NaiveDate> {
        let local = Utc::now() + Duration::minutes(i64::from(self.utc_offset_minutes));
        Ok(local.date_naive())
    }
}

#[async_trait]
impl SwapStore for InMemoryStore {
    async fn fetch_swap(&self, id: SwapId) -> Result<Option<SwapRequest>> {
        Ok(self.tables.lock().await.swaps.get(&id).cloned())
    }

    async fn open_swap_for_instance(&self, instance_id: InstanceId) -> Result<Option<SwapRequest>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .swaps
            .values()
            .find(|s| s.instance_id == instance_id && s.status == SwapStatus::Open)
            .cloned())
    }

    async fn insert_swap(&self, request: &NewSwapRequest) -> Result<SwapRequest> {
        let mut tables = self.tables.lock().await;
        // same rule as the partial unique index on the hosted table
        let duplicate = request.status == SwapStatus::Open
            && tables
                .swaps
                .values()
                .any(|s| s.instance_id == request.instance_id && s.status == SwapStatus::Open);
        if duplicate {
            return Err(RosterError::conflict(
                "swap request",
                request.instance_id,
                "no other open swap for the shift",
            ));
        }

        let id = SwapId(tables.next_swap_id);
        tables.next_swap_id += 1;
        let swap = SwapRequest {
            id,
            instance_id: request.instance_id,
            requester_id: request.requester_id.clone(),
            status: request.status,
            new_assigned_id: None,
        };
        tables.swaps.insert(id, swap.clone());
        Ok(swap)
    }

    async fn fetch_open_swaps(&self) -> Result<Vec<OpenSwap>> {
        let tables = self.tables.lock().await;
        let mut open = Vec::new();
        for swap in tables.swaps.values().filter(|s| s.status == SwapStatus::Open) {
            let requester = tables.volunteers.get(&swap.requester_id);
            let instance = tables.instances.get(&swap.instance_id);
            let (Some(requester), Some(instance)) = (requester, instance) else {
                tracing::warn!(swap = %swap.id, "open swap references a missing volunteer or shift");
                continue;
            };
            open.push(OpenSwap {
                swap_id: swap.id,
                status: swap.status,
                requester: RequesterSummary {
                    id: requester.id.clone(),
                    name: requester.name.clone(),
                    position: requester.position.clone(),
                },
                instance: InstanceSummary {
                    id: instance.id,
                    date: instance.date,
                    location: instance.location.clone(),
                },
            });
        }
        Ok(open)
    }

    async fn update_swap_if(
        &self,
        id: SwapId,
        guard: &SwapGuard,
        patch: &SwapPatch,
    ) -> Result<Option<SwapRequest>> {
        let mut tables = self.tables.lock().await;
        match tables.swaps.get_mut(&id) {
            Some(swap) if guard.matches(swap) => {
                patch.apply_to(swap);
                Ok(Some(swap.clone()))
            }
            _ => Ok(None),
        }
    }
}
