//! Hosted backend over the PostgREST API exposed by Supabase.
//!
//! Guarded writes are `PATCH` requests whose row filter repeats the guard, sent
//! with `Prefer: return=representation`. PostgREST turns that into a single
//! `UPDATE ... WHERE ...`, so an empty representation means another session
//! changed the row first.

use crate::adapters::memory::DEFAULT_UTC_OFFSET_MINUTES;
use crate::domain::model::{
    InstanceGuard, InstanceId, InstancePatch, InstanceSummary, NewSwapRequest, OpenSwap,
    RequesterSummary, RoutineEntry, ShiftInstance, SwapGuard, SwapId, SwapPatch, SwapRequest,
    SwapStatus, Volunteer, VolunteerId,
};
use crate::domain::ports::{RegistryStore, ScheduleStore, SwapStore};
use crate::utils::error::{Result, RosterError};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const INSTANCES: &str = "routine_instances";
const SWAPS: &str = "swap_requests";
const VOLUNTEERS: &str = "volunteers_registry";

const INSTANCE_COLUMNS: &str =
    "id,actual_date,location,assigned_volunteer_id,attendance_status,status,check_in_time";
const SWAP_COLUMNS: &str = "id,instance_id,requester_id,status,new_assigned_id";
const VOLUNTEER_COLUMNS: &str = "id,name,position,whatsapp_number,roll_number,total_attendance";
const ROUTINE_SELECT: &str = "id,actual_date,location,assigned_volunteer_id,attendance_status,status,check_in_time,assigned_user:volunteers_registry!assigned_volunteer_id(name,position,whatsapp_number)";
const OPEN_SWAP_SELECT: &str = "id,status,requester:volunteers_registry!requester_id(id,name,position),instance:routine_instances!instance_id(id,actual_date,location)";

const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE from a PostgREST error body such as `{"code":"23503",...}`.
fn postgres_code(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        code: Option<String>,
    }
    serde_json::from_str::<ErrorBody>(body).ok()?.code
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

/// Embedded joins come back `null` when the referenced row is gone.
#[derive(Debug, Deserialize)]
struct OpenSwapRow {
    id: SwapId,
    status: SwapStatus,
    requester: Option<RequesterSummary>,
    instance: Option<InstanceSummary>,
}

#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    utc_offset_minutes: i32,
}

impl SupabaseStore {
    pub fn new(url: &str, anon_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(anon_key).map_err(|e| RosterError::ConfigError {
            message: format!("anon key is not a valid header value: {}", e),
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", anon_key)).map_err(|e| {
            RosterError::ConfigError {
                message: format!("anon key is not a valid header value: {}", e),
            }
        })?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        })
    }

    /// Offset used for "today" when the database has no `get_current_ist_date` function.
    pub fn with_utc_offset(mut self, utc_offset_minutes: i32) -> Self {
        self.utc_offset_minutes = utc_offset_minutes;
        self
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, name)
    }

    fn rpc(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        Self::read_json(response).await
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        tracing::debug!(%status, url = %response.url(), "backend response");
        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }
        let message = response.text().await.unwrap_or_default();
        let unique_violation = postgres_code(&message).as_deref() == Some(UNIQUE_VIOLATION);
        if status == StatusCode::CONFLICT && unique_violation {
            // the one-open-swap-per-shift index
            tracing::warn!(%message, "backend rejected write as conflicting");
            return Err(RosterError::Conflict {
                entity: "swap request",
                id: "for this shift".to_string(),
                expected: "no other open swap".to_string(),
            });
        }
        Err(RosterError::BackendError {
            status: status.as_u16(),
            message,
        })
    }

    async fn first<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let rows: Vec<T> = self.send(request).await?;
        Ok(rows.into_iter().next())
    }

    /// SQL the hosted database needs beyond the plain tables.
    pub fn migrations() -> &'static [&'static str] {
        &[
            r#"
CREATE OR REPLACE FUNCTION increment_attendance(p_volunteer_id uuid)
RETURNS integer
LANGUAGE sql
AS $$
    UPDATE volunteers_registry
       SET total_attendance = total_attendance + 1
     WHERE id = p_volunteer_id
 RETURNING total_attendance;
$$;
"#,
            r#"
CREATE OR REPLACE FUNCTION get_current_ist_date()
RETURNS date
LANGUAGE sql
STABLE
AS $$
    SELECT (NOW() AT TIME ZONE 'Asia/Kolkata')::date;
$$;
"#,
            r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_swap_requests_one_open_per_instance
    ON swap_requests (instance_id)
 WHERE status = 'open';
"#,
        ]
    }
}

#[async_trait]
impl RegistryStore for SupabaseStore {
    async fn fetch_volunteer(&self, id: &VolunteerId) -> Result<Option<Volunteer>> {
        let request = self
            .client
            .get(self.table(VOLUNTEERS))
            .query(&[("id", eq(id)), ("select", VOLUNTEER_COLUMNS.to_string())]);
        self.first(request).await
    }

    async fn find_by_roll_number(&self, roll_number: &str) -> Result<Option<Volunteer>> {
        let request = self.client.get(self.table(VOLUNTEERS)).query(&[
            ("roll_number", format!("ilike.{}", roll_number.trim())),
            ("select", VOLUNTEER_COLUMNS.to_string()),
            ("limit", "1".to_string()),
        ]);
        self.first(request).await
    }

    async fn increment_attendance(&self, id: &VolunteerId) -> Result<u32> {
        let request = self
            .client
            .post(self.rpc("increment_attendance"))
            .json(&serde_json::json!({ "p_volunteer_id": id }));
        let count: Option<u32> = self.send(request).await?;
        count.ok_or_else(|| RosterError::not_found("volunteer", id))
    }
}

#[async_trait]
impl ScheduleStore for SupabaseStore {
    async fn fetch_instance(&self, id: InstanceId) -> Result<Option<ShiftInstance>> {
        let request = self
            .client
            .get(self.table(INSTANCES))
            .query(&[("id", eq(id)), ("select", INSTANCE_COLUMNS.to_string())]);
        self.first(request).await
    }

    async fn fetch_routine(&self, date: NaiveDate) -> Result<Vec<RoutineEntry>> {
        let request = self.client.get(self.table(INSTANCES)).query(&[
            ("actual_date", eq(date.format("%Y-%m-%d"))),
            ("select", ROUTINE_SELECT.to_string()),
            ("order", "location.asc".to_string()),
        ]);
        self.send(request).await
    }

    async fn update_instance_if(
        &self,
        id: InstanceId,
        guard: &InstanceGuard,
        patch: &InstancePatch,
    ) -> Result<Option<ShiftInstance>> {
        let mut filters = vec![("id", eq(id))];
        if let Some(s) = guard.status {
            filters.push(("status", eq(s)));
        }
        if let Some(a) = guard.attendance_status {
            filters.push(("attendance_status", eq(a)));
        }
        if let Some(v) = &guard.assigned_volunteer_id {
            filters.push(("assigned_volunteer_id", eq(v)));
        }
        filters.push(("select", INSTANCE_COLUMNS.to_string()));

        let request = self
            .client
            .patch(self.table(INSTANCES))
            .query(&filters)
            .header("Prefer", "return=representation")
            .json(&patch.to_json());
        self.first(request).await
    }

    async fn current_date(&self) -> Result<NaiveDate> {
        let request = self
            .client
            .post(self.rpc("get_current_ist_date"))
            .json(&serde_json::json!({}));
        match self.send(request).await {
            Err(RosterError::BackendError { status: 404, .. }) => {
                tracing::warn!("get_current_ist_date is not installed, using local clock");
                let offset = chrono::Duration::minutes(i64::from(self.utc_offset_minutes));
                Ok((Utc::now() + offset).date_naive())
            }
            other => other,
        }
    }
}

#[async_trait]
impl SwapStore for SupabaseStore {
    async fn fetch_swap(&self, id: SwapId) -> Result<Option<SwapRequest>> {
        let request = self
            .client
            .get(self.table(SWAPS))
            .query(&[("id", eq(id)), ("select", SWAP_COLUMNS.to_string())]);
        self.first(request).await
    }

    async fn open_swap_for_instance(&self, instance_id: InstanceId) -> Result<Option<SwapRequest>> {
        let request = self.client.get(self.table(SWAPS)).query(&[
            ("instance_id", eq(instance_id)),
            ("status", eq("open")),
            ("select", SWAP_COLUMNS.to_string()),
            ("limit", "1".to_string()),
        ]);
        self.first(request).await
    }

    async fn insert_swap(&self, request: &NewSwapRequest) -> Result<SwapRequest> {
        let http = self
            .client
            .post(self.table(SWAPS))
            .query(&[("select", SWAP_COLUMNS)])
            .header("Prefer", "return=representation")
            .json(&[request]);
        self.first(http)
            .await?
            .ok_or_else(|| RosterError::BackendError {
                status: 201,
                message: "insert returned no swap request".to_string(),
            })
    }

    async fn fetch_open_swaps(&self) -> Result<Vec<OpenSwap>> {
        let request = self.client.get(self.table(SWAPS)).query(&[
            ("status", eq("open")),
            ("select", OPEN_SWAP_SELECT.to_string()),
        ]);
        let rows: Vec<OpenSwapRow> = self.send(request).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match (row.requester, row.instance) {
                (Some(requester), Some(instance)) => Some(OpenSwap {
                    swap_id: row.id,
                    status: row.status,
                    requester,
                    instance,
                }),
                _ => {
                    tracing::warn!(swap = %row.id, "open swap references a missing volunteer or shift");
                    None
                }
            })
            .collect())
    }

    async fn update_swap_if(
        &self,
        id: SwapId,
        guard: &SwapGuard,
        patch: &SwapPatch,
    ) -> Result<Option<SwapRequest>> {
        let mut filters = vec![("id", eq(id)), ("status", eq(guard.status))];
        if let Some(v) = &guard.new_assigned_id {
            filters.push(("new_assigned_id", eq(v)));
        }
        filters.push(("select", SWAP_COLUMNS.to_string()));

        let request = self
            .client
            .patch(self.table(SWAPS))
            .query(&filters)
            .header("Prefer", "return=representation")
            .json(&patch.to_json());
        self.first(request).await
    }
}
