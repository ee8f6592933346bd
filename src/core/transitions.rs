//! Lifecycle rules for shift instances and swap requests.
//!
//! Each function looks at the state read from the store and either rejects the
//! action or returns the guarded write that performs it. The guard repeats the
//! precondition so the store can refuse the write if another session moved the
//! row in the meantime.

use crate::domain::model::{
    AttendanceStatus, InstanceGuard, InstanceId, InstancePatch, Patch, ShiftInstance,
    ShiftStatus, SwapGuard, SwapPatch, SwapRequest, SwapStatus, VolunteerId,
};
use crate::utils::error::{Result, RosterError};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceWrite {
    pub guard: InstanceGuard,
    pub patch: InstancePatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapWrite {
    pub guard: SwapGuard,
    pub patch: SwapPatch,
}

fn invalid(entity: &'static str, id: impl ToString, action: &'static str, state: impl ToString) -> RosterError {
    RosterError::InvalidTransition {
        entity,
        id: id.to_string(),
        action,
        state: state.to_string(),
    }
}

fn require_pending(instance: &ShiftInstance, action: &'static str) -> Result<()> {
    if instance.attendance_status != AttendanceStatus::Pending {
        return Err(invalid(
            "shift instance",
            instance.id,
            action,
            instance.attendance_status,
        ));
    }
    Ok(())
}

fn require_scheduled(instance: &ShiftInstance, action: &'static str) -> Result<()> {
    if instance.status != ShiftStatus::Scheduled {
        return Err(invalid("shift instance", instance.id, action, instance.status));
    }
    Ok(())
}

/// pending -> present, stamping the check-in time.
///
/// The write only lands while the shift is still assigned to whoever held it
/// when `instance` was read.
pub fn check_in(instance: &ShiftInstance, now: DateTime<Utc>) -> Result<InstanceWrite> {
    require_pending(instance, "check in to")?;
    Ok(InstanceWrite {
        guard: InstanceGuard {
            attendance_status: Some(AttendanceStatus::Pending),
            assigned_volunteer_id: Some(instance.assigned_volunteer_id.clone()),
            ..Default::default()
        },
        patch: InstancePatch {
            attendance_status: Some(AttendanceStatus::Present),
            check_in_time: Patch::Set(now),
            ..Default::default()
        },
    })
}

/// Compensation for [`check_in`] when the counter could not be bumped.
pub fn undo_check_in() -> InstanceWrite {
    InstanceWrite {
        guard: InstanceGuard {
            attendance_status: Some(AttendanceStatus::Present),
            ..Default::default()
        },
        patch: InstancePatch {
            attendance_status: Some(AttendanceStatus::Pending),
            check_in_time: Patch::Clear,
            ..Default::default()
        },
    }
}

pub fn mark_absent(instance: &ShiftInstance) -> Result<InstanceWrite> {
    require_pending(instance, "mark absent")?;
    Ok(InstanceWrite {
        guard: InstanceGuard {
            attendance_status: Some(AttendanceStatus::Pending),
            ..Default::default()
        },
        patch: InstancePatch {
            attendance_status: Some(AttendanceStatus::Absent),
            check_in_time: Patch::Clear,
            ..Default::default()
        },
    })
}

pub fn request_swap(instance: &ShiftInstance) -> Result<InstanceWrite> {
    require_scheduled(instance, "drop")?;
    Ok(InstanceWrite {
        guard: InstanceGuard {
            status: Some(ShiftStatus::Scheduled),
            assigned_volunteer_id: Some(instance.assigned_volunteer_id.clone()),
            ..Default::default()
        },
        patch: InstancePatch {
            status: Some(ShiftStatus::SwapRequested),
            ..Default::default()
        },
    })
}

pub fn undo_request_swap() -> InstanceWrite {
    InstanceWrite {
        guard: InstanceGuard {
            status: Some(ShiftStatus::SwapRequested),
            ..Default::default()
        },
        patch: InstancePatch {
            status: Some(ShiftStatus::Scheduled),
            ..Default::default()
        },
    }
}

pub fn cancel(instance: &ShiftInstance) -> Result<InstanceWrite> {
    require_scheduled(instance, "cancel")?;
    Ok(InstanceWrite {
        guard: InstanceGuard {
            status: Some(ShiftStatus::Scheduled),
            ..Default::default()
        },
        patch: InstancePatch {
            status: Some(ShiftStatus::Cancelled),
            ..Default::default()
        },
    })
}

/// open -> completed for `claimant`.
///
/// The requester check comes first: a volunteer can never take back their own
/// dropped shift through the marketplace, whatever state the swap is in.
pub fn claim_swap(
    swap: &SwapRequest,
    instance_id: InstanceId,
    claimant: &VolunteerId,
) -> Result<SwapWrite> {
    if *claimant == swap.requester_id {
        return Err(RosterError::Forbidden {
            reason: format!("volunteer {} dropped this shift and cannot claim it back", claimant),
        });
    }
    if swap.status != SwapStatus::Open {
        return Err(invalid("swap request", swap.id, "claim", swap.status));
    }
    if swap.instance_id != instance_id {
        return Err(invalid(
            "swap request",
            swap.id,
            "claim",
            format!("for shift {}, not {}", swap.instance_id, instance_id),
        ));
    }
    Ok(SwapWrite {
        guard: SwapGuard::open(),
        patch: SwapPatch {
            status: Some(SwapStatus::Completed),
            new_assigned_id: Patch::Set(claimant.clone()),
        },
    })
}

/// Reopens a swap that `claimant` completed but whose shift could not be reassigned.
pub fn undo_claim(claimant: &VolunteerId) -> SwapWrite {
    SwapWrite {
        guard: SwapGuard {
            status: SwapStatus::Completed,
            new_assigned_id: Some(claimant.clone()),
        },
        patch: SwapPatch {
            status: Some(SwapStatus::Open),
            new_assigned_id: Patch::Clear,
        },
    }
}

/// swap_requested -> scheduled under the new assignee.
///
/// `attendance_status` is carried over unchanged.
pub fn reassign(claimant: &VolunteerId) -> InstanceWrite {
    InstanceWrite {
        guard: InstanceGuard {
            status: Some(ShiftStatus::SwapRequested),
            ..Default::default()
        },
        patch: InstancePatch {
            status: Some(ShiftStatus::Scheduled),
            assigned_volunteer_id: Some(claimant.clone()),
            ..Default::default()
        },
    }
}
