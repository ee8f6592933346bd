use crate::domain::model::{
    InstanceGuard, InstanceId, InstancePatch, NewSwapRequest, OpenSwap, RoutineEntry,
    ShiftInstance, SwapGuard, SwapId, SwapPatch, SwapRequest, Volunteer, VolunteerId,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Removing a file that does not exist is not an error.
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn fetch_volunteer(&self, id: &VolunteerId) -> Result<Option<Volunteer>>;

    /// Case-insensitive exact match on roll number.
    async fn find_by_roll_number(&self, roll_number: &str) -> Result<Option<Volunteer>>;

    /// Adds one to `total_attendance` in place and returns the new count.
    async fn increment_attendance(&self, id: &VolunteerId) -> Result<u32>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn fetch_instance(&self, id: InstanceId) -> Result<Option<ShiftInstance>>;

    /// Shifts on `date` joined with their assignee, ordered by location.
    async fn fetch_routine(&self, date: NaiveDate) -> Result<Vec<RoutineEntry>>;

    /// Applies `patch` only if the row still satisfies `guard`.
    /// `Ok(None)` means the guard no longer held (or the row is gone).
    async fn update_instance_if(
        &self,
        id: InstanceId,
        guard: &InstanceGuard,
        patch: &InstancePatch,
    ) -> Result<Option<ShiftInstance>>;

    /// The backend's calendar date for "today".
    async fn current_date(&self) -> Result<NaiveDate>;
}

#[async_trait]
pub trait SwapStore: Send + Sync {
    async fn fetch_swap(&self, id: SwapId) -> Result<Option<SwapRequest>>;

    async fn open_swap_for_instance(&self, instance_id: InstanceId) -> Result<Option<SwapRequest>>;

    async fn insert_swap(&self, request: &NewSwapRequest) -> Result<SwapRequest>;

    async fn fetch_open_swaps(&self) -> Result<Vec<OpenSwap>>;

    /// Same contract as [`ScheduleStore::update_instance_if`].
    async fn update_swap_if(
        &self,
        id: SwapId,
        guard: &SwapGuard,
        patch: &SwapPatch,
    ) -> Result<Option<SwapRequest>>;
}
