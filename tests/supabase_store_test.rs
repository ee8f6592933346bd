use anyhow::Result;
use chrono::{NaiveDate, Utc};
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use serde_json::json;
use std::time::Duration;
use volunteer_roster::domain::model::{
    AttendanceStatus, InstanceId, NewSwapRequest, ShiftStatus, SwapId, SwapStatus, VolunteerId,
};
use volunteer_roster::domain::ports::{RegistryStore, ScheduleStore, SwapStore};
use volunteer_roster::{RosterError, Scheduler, SupabaseStore};

const KEY: &str = "test-anon-key";

fn store(server: &MockServer) -> SupabaseStore {
    SupabaseStore::new(&server.base_url(), KEY, Duration::from_secs(5)).unwrap()
}

fn instance_row(status: &str, attendance: &str, assignee: &str) -> serde_json::Value {
    json!({
        "id": 1,
        "actual_date": "2024-05-01",
        "location": "Library",
        "assigned_volunteer_id": assignee,
        "attendance_status": attendance,
        "status": status,
        "check_in_time": null
    })
}

#[tokio::test]
async fn test_fetch_instance_sends_credentials() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/routine_instances")
                .query_param("id", "eq.1")
                .header("apikey", KEY)
                .header("authorization", format!("Bearer {}", KEY));
            then.status(200)
                .json_body(json!([instance_row("scheduled", "pending", "volA")]));
        })
        .await;

    let instance = store(&server).fetch_instance(InstanceId(1)).await?.unwrap();
    mock.assert_async().await;
    assert_eq!(instance.location, "Library");
    assert_eq!(instance.status, ShiftStatus::Scheduled);
    assert_eq!(instance.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    Ok(())
}

#[tokio::test]
async fn test_missing_row_is_none() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/swap_requests");
            then.status(200).json_body(json!([]));
        })
        .await;

    assert!(store(&server).fetch_swap(SwapId(9)).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_check_in_patches_with_guard_and_increments() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/routine_instances");
            then.status(200)
                .json_body(json!([instance_row("scheduled", "pending", "volA")]));
        })
        .await;
    let patch = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/routine_instances")
                .query_param("id", "eq.1")
                .query_param("attendance_status", "eq.pending")
                .query_param("assigned_volunteer_id", "eq.volA")
                .header("prefer", "return=representation")
                .json_body_partial(r#"{"attendance_status": "present"}"#);
            let mut row = instance_row("scheduled", "present", "volA");
            row["check_in_time"] = json!(Utc::now().to_rfc3339());
            then.status(200).json_body(json!([row]));
        })
        .await;
    let rpc = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/rpc/increment_attendance")
                .json_body(json!({"p_volunteer_id": "volA"}));
            then.status(200).json_body(json!(11));
        })
        .await;

    let store = store(&server);
    let scheduler = Scheduler::new(store.clone(), store.clone(), store);
    let outcome = scheduler.check_in(InstanceId(1), &"volA".into()).await?;

    patch.assert_async().await;
    rpc.assert_async().await;
    assert_eq!(outcome.total_attendance, 11);
    assert_eq!(outcome.instance.attendance_status, AttendanceStatus::Present);
    assert!(outcome.instance.check_in_time.is_some());
    Ok(())
}

#[tokio::test]
async fn test_lost_claim_race_leaves_instance_alone() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/swap_requests")
                .query_param("id", "eq.7");
            then.status(200).json_body(json!([{
                "id": 7,
                "instance_id": 1,
                "requester_id": "volA",
                "status": "open",
                "new_assigned_id": null
            }]));
        })
        .await;
    // another session completed the swap between our read and our write
    let claim = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/swap_requests")
                .query_param("id", "eq.7")
                .query_param("status", "eq.open")
                .json_body(json!({"status": "completed", "new_assigned_id": "volB"}));
            then.status(200).json_body(json!([]));
        })
        .await;
    let reassign = server
        .mock_async(|when, then| {
            when.method(PATCH).path("/rest/v1/routine_instances");
            then.status(200)
                .json_body(json!([instance_row("scheduled", "pending", "volB")]));
        })
        .await;

    let store = store(&server);
    let scheduler = Scheduler::new(store.clone(), store.clone(), store);
    let err = scheduler
        .accept_swap(SwapId(7), InstanceId(1), &"volB".into())
        .await
        .unwrap_err();

    claim.assert_async().await;
    assert_eq!(reassign.hits_async().await, 0);
    assert!(err.is_conflict());
    assert_eq!(err.user_friendly_message(), "Someone else already took this shift.");
    Ok(())
}

#[tokio::test]
async fn test_duplicate_open_swap_maps_to_conflict() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/swap_requests")
                .header("prefer", "return=representation");
            then.status(409).json_body(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"idx_swap_requests_one_open_per_instance\""
            }));
        })
        .await;

    let request = NewSwapRequest {
        instance_id: InstanceId(1),
        requester_id: "volA".into(),
        status: SwapStatus::Open,
    };
    let err = store(&server).insert_swap(&request).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_server_error_is_backend_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rest/v1/rpc/increment_attendance");
            then.status(500).body("boom");
        })
        .await;

    let err = store(&server)
        .increment_attendance(&"volA".into())
        .await
        .unwrap_err();
    match err {
        RosterError::BackendError { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_open_swaps_parse_embedded_rows() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/swap_requests")
                .query_param("status", "eq.open");
            then.status(200).json_body(json!([{
                "id": 7,
                "status": "open",
                "requester": {"id": "volA", "name": "Asha", "position": "Lead"},
                "instance": {"id": 1, "actual_date": "2024-05-01", "location": "Library"}
            }]));
        })
        .await;

    let store = store(&server);
    let scheduler = Scheduler::new(store.clone(), store.clone(), store);
    let swaps = scheduler.list_open_swaps().await?;

    mock.assert_async().await;
    assert_eq!(swaps.len(), 1);
    assert_eq!(swaps[0].swap_id, SwapId(7));
    assert_eq!(swaps[0].requester.id, VolunteerId::from("volA"));
    assert_eq!(swaps[0].instance.location, "Library");
    Ok(())
}

#[tokio::test]
async fn test_routine_embeds_assignee() -> Result<()> {
    let server = MockServer::start_async().await;
    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/routine_instances")
                .query_param("actual_date", "eq.2024-05-01")
                .query_param("order", "location.asc");
            let mut row = instance_row("swap_requested", "pending", "volA");
            row["assigned_user"] =
                json!({"name": "Asha", "position": "Lead", "whatsapp_number": "+910000000000"});
            then.status(200).json_body(json!([row]));
        })
        .await;

    let routine = store(&server).fetch_routine(day).await?;
    assert_eq!(routine.len(), 1);
    assert_eq!(routine[0].instance.status, ShiftStatus::SwapRequested);
    let assignee = routine[0].assignee.as_ref().unwrap();
    assert_eq!(assignee.name, "Asha");
    assert_eq!(assignee.contact.as_deref(), Some("+910000000000"));
    Ok(())
}

#[tokio::test]
async fn test_current_date_from_backend() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rest/v1/rpc/get_current_ist_date");
            then.status(200).json_body(json!("2024-05-01"));
        })
        .await;

    let today = store(&server).current_date().await?;
    assert_eq!(today, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    Ok(())
}

#[tokio::test]
async fn test_current_date_falls_back_to_local_clock() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rest/v1/rpc/get_current_ist_date");
            then.status(404).json_body(json!({"code": "PGRST202"}));
        })
        .await;

    let today = store(&server).with_utc_offset(0).current_date().await?;
    let utc_today = Utc::now().date_naive();
    assert!((today - utc_today).num_days().abs() <= 1);
    Ok(())
}

#[tokio::test]
async fn test_roll_number_lookup_is_case_insensitive() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/volunteers_registry")
                .query_param("roll_number", "ilike.cs-101");
            then.status(200).json_body(json!([{
                "id": "volA",
                "name": "Asha",
                "position": "Lead",
                "whatsapp_number": null,
                "roll_number": "CS-101",
                "total_attendance": 4
            }]));
        })
        .await;

    let volunteer = store(&server).find_by_roll_number("  cs-101 ").await?.unwrap();
    mock.assert_async().await;
    assert_eq!(volunteer.name, "Asha");
    assert_eq!(volunteer.total_attendance, 4);
    Ok(())
}

#[tokio::test]
async fn test_foreign_key_violation_is_not_a_conflict() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/swap_requests");
            then.status(200).json_body(json!([{
                "id": 7,
                "instance_id": 1,
                "requester_id": "volA",
                "status": "open",
                "new_assigned_id": null
            }]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/swap_requests")
                .query_param("status", "eq.open");
            then.status(200).json_body(json!([{
                "id": 7,
                "instance_id": 1,
                "requester_id": "volA",
                "status": "completed",
                "new_assigned_id": "ghost"
            }]));
        })
        .await;
    let reopen = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/swap_requests")
                .query_param("status", "eq.completed")
                .query_param("new_assigned_id", "eq.ghost");
            then.status(200).json_body(json!([{
                "id": 7,
                "instance_id": 1,
                "requester_id": "volA",
                "status": "open",
                "new_assigned_id": null
            }]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PATCH).path("/rest/v1/routine_instances");
            then.status(409).json_body(json!({
                "code": "23503",
                "message": "insert or update on table \"routine_instances\" violates foreign key constraint"
            }));
        })
        .await;

    let store = store(&server);
    let scheduler = Scheduler::new(store.clone(), store.clone(), store);
    let err = scheduler
        .accept_swap(SwapId(7), InstanceId(1), &"ghost".into())
        .await
        .unwrap_err();

    reopen.assert_async().await;
    assert!(!err.is_conflict());
    match err {
        RosterError::StepFailed {
            rolled_back,
            source,
            ..
        } => {
            assert!(rolled_back);
            assert!(matches!(*source, RosterError::BackendError { status: 409, .. }));
        }
        other => panic!("unexpected error {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_open_swaps_skip_dangling_rows() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/swap_requests");
            then.status(200).json_body(json!([
                {
                    "id": 7,
                    "status": "open",
                    "requester": null,
                    "instance": {"id": 1, "actual_date": "2024-05-01", "location": "Library"}
                },
                {
                    "id": 8,
                    "status": "open",
                    "requester": {"id": "volB", "name": "Bilal", "position": "Volunteer"},
                    "instance": {"id": 2, "actual_date": "2024-05-01", "location": "Clinic"}
                }
            ]));
        })
        .await;

    let swaps = store(&server).fetch_open_swaps().await?;
    assert_eq!(swaps.len(), 1);
    assert_eq!(swaps[0].swap_id, SwapId(8));
    Ok(())
}
