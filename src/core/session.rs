use crate::core::scheduler::{CheckInOutcome, ClaimOutcome, Scheduler};
use crate::domain::model::{InstanceId, ShiftInstance, SwapId, SwapRequest, VolunteerId};
use crate::domain::ports::{RegistryStore, ScheduleStore, Storage, SwapStore};
use crate::utils::error::{Result, RosterError};
use serde::{Deserialize, Serialize};

/// The logged-in volunteer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub volunteer_id: VolunteerId,
    pub name: String,
    pub position: String,
}

/// Login, reload and logout of the volunteer session, persisted through a [`Storage`].
pub struct SessionManager<St: Storage> {
    storage: St,
    file_name: String,
}

impl<St: Storage> SessionManager<St> {
    pub fn new(storage: St, file_name: impl Into<String>) -> Self {
        Self {
            storage,
            file_name: file_name.into(),
        }
    }

    pub async fn login<R: RegistryStore>(&self, registry: &R, roll_number: &str) -> Result<Session> {
        let roll_number = roll_number.trim();
        if roll_number.is_empty() {
            return Err(RosterError::not_found("volunteer with roll number", "''"));
        }

        let volunteer = registry
            .find_by_roll_number(roll_number)
            .await?
            .ok_or_else(|| RosterError::not_found("volunteer with roll number", roll_number))?;

        let session = Session {
            volunteer_id: volunteer.id,
            name: volunteer.name,
            position: volunteer.position,
        };
        let data = serde_json::to_vec_pretty(&session)?;
        self.storage.write_file(&self.file_name, &data).await?;

        tracing::info!(volunteer = %session.volunteer_id, "logged in");
        Ok(session)
    }

    pub async fn current(&self) -> Result<Session> {
        match self.storage.read_file(&self.file_name).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(RosterError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RosterError::NotLoggedIn)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn logout(&self) -> Result<()> {
        self.storage.remove_file(&self.file_name).await?;
        tracing::info!("logged out");
        Ok(())
    }
}

/// Scheduling operations on behalf of one session.
///
/// Acting on your own shift (check-in, drop) requires owning it; claiming uses
/// the session's volunteer as the new assignee.
pub struct SessionScheduler<'a, R, S, W> {
    scheduler: &'a Scheduler<R, S, W>,
    session: &'a Session,
}

impl<'a, R: RegistryStore, S: ScheduleStore, W: SwapStore> SessionScheduler<'a, R, S, W> {
    pub(crate) fn new(scheduler: &'a Scheduler<R, S, W>, session: &'a Session) -> Self {
        Self { scheduler, session }
    }

    async fn owned_shift(&self, instance_id: InstanceId) -> Result<ShiftInstance> {
        let shift = self.scheduler.shift(instance_id).await?;
        if shift.assigned_volunteer_id != self.session.volunteer_id {
            return Err(RosterError::Forbidden {
                reason: format!(
                    "shift {} is assigned to another volunteer",
                    instance_id
                ),
            });
        }
        Ok(shift)
    }

    // The writes below are guarded on the assignee seen by `owned_shift`, so a
    // reassignment in between surfaces as `Conflict`.
    pub async fn check_in(&self, instance_id: InstanceId) -> Result<CheckInOutcome> {
        let shift = self.owned_shift(instance_id).await?;
        self.scheduler
            .check_in_from(&shift, &self.session.volunteer_id)
            .await
    }

    pub async fn drop_shift(&self, instance_id: InstanceId) -> Result<SwapRequest> {
        let shift = self.owned_shift(instance_id).await?;
        self.scheduler
            .request_swap_from(&shift, &self.session.volunteer_id)
            .await
    }

    pub async fn claim(&self, swap_id: SwapId, instance_id: InstanceId) -> Result<ClaimOutcome> {
        self.scheduler
            .accept_swap(swap_id, instance_id, &self.session.volunteer_id)
            .await
    }
}
