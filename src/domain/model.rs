use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolunteerId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwapId(pub i64);

impl fmt::Display for VolunteerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<&str> for VolunteerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Pending,
    Present,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Scheduled,
    SwapRequested,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Open,
    Completed,
}

impl AttendanceStatus {
    /// Wire value, also used for PostgREST `eq.` filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::SwapRequested => "swap_requested",
            Self::Cancelled => "cancelled",
        }
    }
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A row of `volunteers_registry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volunteer {
    pub id: VolunteerId,
    pub name: String,
    pub position: String,
    #[serde(rename = "whatsapp_number", default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub roll_number: Option<String>,
    #[serde(default)]
    pub total_attendance: u32,
}

/// One volunteer's assignment to one location on one date (`routine_instances`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftInstance {
    pub id: InstanceId,
    #[serde(rename = "actual_date")]
    pub date: NaiveDate,
    pub location: String,
    pub assigned_volunteer_id: VolunteerId,
    pub attendance_status: AttendanceStatus,
    pub status: ShiftStatus,
    #[serde(default)]
    pub check_in_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub id: SwapId,
    pub instance_id: InstanceId,
    pub requester_id: VolunteerId,
    pub status: SwapStatus,
    #[serde(default)]
    pub new_assigned_id: Option<VolunteerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSwapRequest {
    pub instance_id: InstanceId,
    pub requester_id: VolunteerId,
    pub status: SwapStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequesterSummary {
    pub id: VolunteerId,
    pub name: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub id: InstanceId,
    #[serde(rename = "actual_date")]
    pub date: NaiveDate,
    pub location: String,
}

/// Marketplace row: an open swap joined with who dropped it and what it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenSwap {
    #[serde(rename = "id")]
    pub swap_id: SwapId,
    pub status: SwapStatus,
    pub requester: RequesterSummary,
    pub instance: InstanceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssigneeSummary {
    pub name: String,
    pub position: String,
    #[serde(rename = "whatsapp_number", default)]
    pub contact: Option<String>,
}

/// A shift on the daily routine board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineEntry {
    #[serde(flatten)]
    pub instance: ShiftInstance,
    #[serde(rename = "assigned_user", default)]
    pub assignee: Option<AssigneeSummary>,
}

/// Three-way update for nullable columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Keep => current,
            Patch::Clear => None,
            Patch::Set(v) => Some(v),
        }
    }
}

/// Expected prior state of a shift instance. Every `Some` field must still match
/// at write time or the write is refused.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceGuard {
    pub status: Option<ShiftStatus>,
    pub attendance_status: Option<AttendanceStatus>,
    pub assigned_volunteer_id: Option<VolunteerId>,
}

impl InstanceGuard {
    pub fn matches(&self, instance: &ShiftInstance) -> bool {
        self.status.map_or(true, |s| s == instance.status)
            && self
                .attendance_status
                .map_or(true, |a| a == instance.attendance_status)
            && self
                .assigned_volunteer_id
                .as_ref()
                .map_or(true, |v| *v == instance.assigned_volunteer_id)
    }
}

impl fmt::Display for InstanceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(s) = self.status {
            parts.push(format!("status {}", s));
        }
        if let Some(a) = self.attendance_status {
            parts.push(format!("attendance {}", a));
        }
        if let Some(v) = &self.assigned_volunteer_id {
            parts.push(format!("assignee {}", v));
        }
        f.write_str(&parts.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstancePatch {
    pub status: Option<ShiftStatus>,
    pub attendance_status: Option<AttendanceStatus>,
    pub assigned_volunteer_id: Option<VolunteerId>,
    pub check_in_time: Patch<DateTime<Utc>>,
}

impl InstancePatch {
    pub fn apply_to(&self, instance: &mut ShiftInstance) {
        if let Some(s) = self.status {
            instance.status = s;
        }
        if let Some(a) = self.attendance_status {
            instance.attendance_status = a;
        }
        if let Some(v) = &self.assigned_volunteer_id {
            instance.assigned_volunteer_id = v.clone();
        }
        instance.check_in_time = self.check_in_time.clone().apply(instance.check_in_time);
    }

    /// JSON body for a partial update; untouched columns are omitted.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        if let Some(s) = self.status {
            body.insert("status".into(), s.as_str().into());
        }
        if let Some(a) = self.attendance_status {
            body.insert("attendance_status".into(), a.as_str().into());
        }
        if let Some(v) = &self.assigned_volunteer_id {
            body.insert("assigned_volunteer_id".into(), v.0.clone().into());
        }
        match &self.check_in_time {
            Patch::Keep => {}
            Patch::Clear => {
                body.insert("check_in_time".into(), serde_json::Value::Null);
            }
            Patch::Set(t) => {
                body.insert("check_in_time".into(), t.to_rfc3339().into());
            }
        }
        serde_json::Value::Object(body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapGuard {
    pub status: SwapStatus,
    pub new_assigned_id: Option<VolunteerId>,
}

impl SwapGuard {
    pub fn open() -> Self {
        Self {
            status: SwapStatus::Open,
            new_assigned_id: None,
        }
    }

    pub fn matches(&self, swap: &SwapRequest) -> bool {
        self.status == swap.status
            && self
                .new_assigned_id
                .as_ref()
                .map_or(true, |v| swap.new_assigned_id.as_ref() == Some(v))
    }
}

impl fmt::Display for SwapGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(v) = &self.new_assigned_id {
            write!(f, ", claimed by {}", v)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwapPatch {
    pub status: Option<SwapStatus>,
    pub new_assigned_id: Patch<VolunteerId>,
}

impl SwapPatch {
    pub fn apply_to(&self, swap: &mut SwapRequest) {
        if let Some(s) = self.status {
            swap.status = s;
        }
        swap.new_assigned_id = self.new_assigned_id.clone().apply(swap.new_assigned_id.take());
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        if let Some(s) = self.status {
            body.insert("status".into(), s.as_str().into());
        }
        match &self.new_assigned_id {
            Patch::Keep => {}
            Patch::Clear => {
                body.insert("new_assigned_id".into(), serde_json::Value::Null);
            }
            Patch::Set(v) => {
                body.insert("new_assigned_id".into(), v.0.clone().into());
            }
        }
        serde_json::Value::Object(body)
    }
}
