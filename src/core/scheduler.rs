use crate::core::session::{Session, SessionScheduler};
use crate::core::transitions::{self, InstanceWrite, SwapWrite};
use crate::domain::model::{
    AttendanceStatus, InstanceId, NewSwapRequest, OpenSwap, RoutineEntry, ShiftInstance, SwapId,
    SwapRequest, SwapStatus, VolunteerId,
};
use crate::domain::ports::{RegistryStore, ScheduleStore, SwapStore};
use crate::utils::error::{Result, RosterError};
use chrono::{NaiveDate, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct CheckInOutcome {
    pub instance: ShiftInstance,
    pub total_attendance: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClaimOutcome {
    pub swap: SwapRequest,
    pub instance: ShiftInstance,
}

/// Volunteer scheduling operations over the registry, schedule and swap stores.
///
/// Holds no state of its own; every operation reads what it needs, decides via
/// [`transitions`], and issues guarded writes. Multi-write operations undo their
/// first write if the second one fails.
pub struct Scheduler<R, S, W> {
    registry: R,
    schedule: S,
    swaps: W,
}

impl<R: RegistryStore, S: ScheduleStore, W: SwapStore> Scheduler<R, S, W> {
    pub fn new(registry: R, schedule: S, swaps: W) -> Self {
        Self {
            registry,
            schedule,
            swaps,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn for_session<'a>(&'a self, session: &'a Session) -> SessionScheduler<'a, R, S, W> {
        SessionScheduler::new(self, session)
    }

    pub async fn shift(&self, instance_id: InstanceId) -> Result<ShiftInstance> {
        self.schedule
            .fetch_instance(instance_id)
            .await?
            .ok_or_else(|| RosterError::not_found("shift instance", instance_id))
    }

    async fn write_instance(&self, id: InstanceId, write: &InstanceWrite) -> Result<ShiftInstance> {
        self.schedule
            .update_instance_if(id, &write.guard, &write.patch)
            .await?
            .ok_or_else(|| RosterError::conflict("shift instance", id, write.guard.to_string()))
    }

    async fn write_swap(&self, id: SwapId, write: &SwapWrite) -> Result<SwapRequest> {
        self.swaps
            .update_swap_if(id, &write.guard, &write.patch)
            .await?
            .ok_or_else(|| RosterError::conflict("swap request", id, write.guard.to_string()))
    }

    /// Best-effort undo; returns whether the prior state was restored.
    async fn undo_instance(&self, id: InstanceId, write: InstanceWrite) -> bool {
        match self.write_instance(id, &write).await {
            Ok(_) => {
                tracing::info!(instance = %id, "rolled back shift instance");
                true
            }
            Err(e) => {
                tracing::error!(instance = %id, error = %e, "rollback of shift instance failed");
                false
            }
        }
    }

    async fn undo_swap(&self, id: SwapId, write: SwapWrite) -> bool {
        match self.write_swap(id, &write).await {
            Ok(_) => {
                tracing::info!(swap = %id, "reopened swap request");
                true
            }
            Err(e) => {
                tracing::error!(swap = %id, error = %e, "rollback of swap request failed");
                false
            }
        }
    }

    pub async fn check_in(
        &self,
        instance_id: InstanceId,
        volunteer_id: &VolunteerId,
    ) -> Result<CheckInOutcome> {
        let current = self.shift(instance_id).await?;
        self.check_in_from(&current, volunteer_id).await
    }

    /// Check-in decided against an already-read `current`; the write fails with
    /// `Conflict` if the shift moved since.
    pub(crate) async fn check_in_from(
        &self,
        current: &ShiftInstance,
        volunteer_id: &VolunteerId,
    ) -> Result<CheckInOutcome> {
        let instance_id = current.id;
        let write = transitions::check_in(current, Utc::now())?;

        if current.assigned_volunteer_id != *volunteer_id {
            tracing::debug!(
                instance = %instance_id,
                assigned = %current.assigned_volunteer_id,
                counted = %volunteer_id,
                "check-in counted for a volunteer other than the assignee"
            );
        }

        let instance = self.write_instance(instance_id, &write).await?;

        match self.registry.increment_attendance(volunteer_id).await {
            Ok(total_attendance) => {
                tracing::info!(
                    instance = %instance_id,
                    volunteer = %volunteer_id,
                    total_attendance,
                    "checked in"
                );
                Ok(CheckInOutcome {
                    instance,
                    total_attendance,
                })
            }
            Err(e) => {
                tracing::warn!(instance = %instance_id, error = %e, "attendance count update failed");
                let rolled_back = self.undo_instance(instance_id, transitions::undo_check_in()).await;
                Err(RosterError::StepFailed {
                    operation: "check_in",
                    step: 2,
                    description: "increment volunteer attendance count",
                    rolled_back,
                    source: Box::new(e),
                })
            }
        }
    }

    pub async fn mark_absent(&self, instance_id: InstanceId) -> Result<ShiftInstance> {
        let current = self.shift(instance_id).await?;
        let write = transitions::mark_absent(&current)?;
        let instance = self.write_instance(instance_id, &write).await?;
        tracing::info!(instance = %instance_id, "marked absent");
        Ok(instance)
    }

    pub async fn request_swap(
        &self,
        instance_id: InstanceId,
        requester_id: &VolunteerId,
    ) -> Result<SwapRequest> {
        let current = self.shift(instance_id).await?;
        self.request_swap_from(&current, requester_id).await
    }

    pub(crate) async fn request_swap_from(
        &self,
        current: &ShiftInstance,
        requester_id: &VolunteerId,
    ) -> Result<SwapRequest> {
        let instance_id = current.id;
        let write = transitions::request_swap(current)?;

        if let Some(existing) = self.swaps.open_swap_for_instance(instance_id).await? {
            return Err(RosterError::InvalidTransition {
                entity: "shift instance",
                id: instance_id.to_string(),
                action: "drop",
                state: format!("already offered in open swap {}", existing.id),
            });
        }

        self.write_instance(instance_id, &write).await?;

        let request = NewSwapRequest {
            instance_id,
            requester_id: requester_id.clone(),
            status: SwapStatus::Open,
        };
        match self.swaps.insert_swap(&request).await {
            Ok(swap) => {
                tracing::info!(
                    instance = %instance_id,
                    swap = %swap.id,
                    requester = %requester_id,
                    "shift offered in marketplace"
                );
                Ok(swap)
            }
            Err(e) => {
                tracing::warn!(instance = %instance_id, error = %e, "swap request insert failed");
                let rolled_back = self
                    .undo_instance(instance_id, transitions::undo_request_swap())
                    .await;
                Err(RosterError::StepFailed {
                    operation: "request_swap",
                    step: 2,
                    description: "create open swap request",
                    rolled_back,
                    source: Box::new(e),
                })
            }
        }
    }

    pub async fn cancel_shift(&self, instance_id: InstanceId) -> Result<ShiftInstance> {
        let current = self.shift(instance_id).await?;
        let write = transitions::cancel(&current)?;
        let instance = self.write_instance(instance_id, &write).await?;
        tracing::info!(instance = %instance_id, "shift cancelled");
        Ok(instance)
    }

    pub async fn list_open_swaps(&self) -> Result<Vec<OpenSwap>> {
        let mut swaps = self.swaps.fetch_open_swaps().await?;
        swaps.retain(|s| s.status == SwapStatus::Open);
        tracing::debug!(count = swaps.len(), "open swaps listed");
        Ok(swaps)
    }

    pub async fn accept_swap(
        &self,
        swap_id: SwapId,
        instance_id: InstanceId,
        new_volunteer_id: &VolunteerId,
    ) -> Result<ClaimOutcome> {
        let current = self
            .swaps
            .fetch_swap(swap_id)
            .await?
            .ok_or_else(|| RosterError::not_found("swap request", swap_id))?;
        let claim = transitions::claim_swap(&current, instance_id, new_volunteer_id)?;

        // Only one claimant can move the swap out of `open`.
        let swap = self.write_swap(swap_id, &claim).await?;

        match self
            .write_instance(instance_id, &transitions::reassign(new_volunteer_id))
            .await
        {
            Ok(instance) => {
                if instance.attendance_status != AttendanceStatus::Pending {
                    tracing::warn!(
                        instance = %instance_id,
                        attendance = %instance.attendance_status,
                        "claimed shift still carries attendance recorded for the previous assignee"
                    );
                }
                tracing::info!(
                    swap = %swap_id,
                    instance = %instance_id,
                    volunteer = %new_volunteer_id,
                    "swap claimed"
                );
                Ok(ClaimOutcome { swap, instance })
            }
            Err(e) => {
                tracing::warn!(swap = %swap_id, error = %e, "reassigning claimed shift failed");
                let rolled_back = self
                    .undo_swap(swap_id, transitions::undo_claim(new_volunteer_id))
                    .await;
                Err(RosterError::StepFailed {
                    operation: "accept_swap",
                    step: 2,
                    description: "reassign shift instance",
                    rolled_back,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Shifts for `date`, or for the backend's today when `None`.
    pub async fn daily_routine(&self, date: Option<NaiveDate>) -> Result<Vec<RoutineEntry>> {
        let date = match date {
            Some(d) => d,
            None => self.schedule.current_date().await?,
        };
        let routine = self.schedule.fetch_routine(date).await?;
        tracing::debug!(%date, shifts = routine.len(), "routine loaded");
        Ok(routine)
    }
}
