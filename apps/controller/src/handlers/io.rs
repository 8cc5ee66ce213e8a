use irrigation_types::point::PointKind;
use irrigation_types::runtime::PointRuntime;
use irrigation_types::{ControllerError, IoPointConfig, PointId};
use serde_json::{json, Value};

use crate::dispatch::ActionResponse;
use crate::state::AppState;

fn runtime_json(runtime: &PointRuntime) -> Value {
    json!({
        "rawValue": runtime.raw,
        "conditionedValue": runtime.conditioned,
        "digitalState": runtime.digital,
        "errorState": runtime.error,
        "lastUpdateTime": runtime.last_update_us,
        "updateCount": runtime.update_count,
        "errorCount": runtime.error_count,
        "alarmActive": runtime.alarm_active(),
    })
}

fn point_json(point: &IoPointConfig, runtime: &PointRuntime) -> Value {
    let mut body = json!({
        "id": point.id.as_str(),
        "name": point.name,
        "description": point.description,
        "type": kind_label(&point.kind),
        "isInverted": point.inverted,
        "runtime": runtime_json(runtime),
    });

    let object = body.as_object_mut().unwrap();
    match &point.kind {
        PointKind::GpioAnalogIn { pin } | PointKind::GpioBinaryIn { pin, .. } | PointKind::GpioBinaryOut { pin } => {
            object.insert("pin".to_string(), json!(pin));
        }
        PointKind::ShiftRegBinaryIn { chip_index, bit_index } => {
            object.insert("chipIndex".to_string(), json!(chip_index));
            object.insert("bitIndex".to_string(), json!(bit_index));
        }
        PointKind::ShiftRegBinaryOut {
            chip_index,
            bit_index,
            output_kind,
            calibration,
        } => {
            object.insert("chipIndex".to_string(), json!(chip_index));
            object.insert("bitIndex".to_string(), json!(bit_index));
            object.insert("boType".to_string(), json!(output_kind));
            object.insert(
                "flowRateMLPerSecond".to_string(),
                json!(calibration.flow_rate_ml_per_second),
            );
            object.insert(
                "isCalibrated".to_string(),
                json!(calibration.flow_rate_ml_per_second.is_some()),
            );
        }
    }

    body
}

fn kind_label(kind: &PointKind) -> &'static str {
    match kind {
        PointKind::GpioAnalogIn { .. } => "gpio_analog_in",
        PointKind::GpioBinaryIn { .. } => "gpio_binary_in",
        PointKind::GpioBinaryOut { .. } => "gpio_binary_out",
        PointKind::ShiftRegBinaryIn { .. } => "shift_reg_binary_in",
        PointKind::ShiftRegBinaryOut { .. } => "shift_reg_binary_out",
    }
}

pub fn list_points(state: &AppState) -> ActionResponse {
    let config = state.io.get_config();
    let mut points = Vec::with_capacity(config.points.len());
    for point in config.points.values() {
        match state.io.get_runtime(&point.id) {
            Ok(runtime) => points.push(point_json(point, &runtime)),
            Err(err) => return ActionResponse::error(err),
        }
    }
    let total_count = points.len();
    ActionResponse::ok(json!({
        "points": points,
        "totalCount": total_count,
        "status": "success",
    }))
}

pub fn get_point(state: &AppState, id: &PointId) -> ActionResponse {
    let config = state.io.get_config();
    let point = match config.points.get(id) {
        Some(point) => point,
        None => return ActionResponse::error(ControllerError::NotFound(id.to_string())),
    };
    match state.io.get_runtime(id) {
        Ok(runtime) => ActionResponse::ok(point_json(point, &runtime)),
        Err(err) => ActionResponse::error(err),
    }
}

pub fn set_point(state: &AppState, id: &PointId, desired: bool) -> ActionResponse {
    match state.io.set_binary_output(id, desired) {
        Ok(()) => ActionResponse::ok(json!({
            "status": "success",
            "pointId": id.as_str(),
            "state": desired,
            "message": "output updated",
        })),
        Err(err) => ActionResponse::error(err),
    }
}

pub fn statistics(state: &AppState) -> ActionResponse {
    let stats = state.io.statistics();
    ActionResponse::ok(json!({
        "status": "success",
        "updateCycles": stats.update_cycles,
        "totalErrors": stats.total_errors,
        "lastUpdateTime": stats.last_update_time_us,
        "pollingActive": stats.polling_active,
        "activePointCount": stats.active_point_count,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fixtures::test_state;

    #[test]
    fn list_points_includes_the_fixture_valve() {
        let state = test_state();
        let response = list_points(&state);
        assert_eq!(response.status, axum::http::StatusCode::OK);
        assert_eq!(response.body["points"][0]["id"], "valve-1");
    }

    #[test]
    fn get_point_returns_not_found_for_unknown_id() {
        let state = test_state();
        let id = PointId::new("missing").unwrap();
        let response = get_point(&state, &id);
        assert_eq!(response.status, axum::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn set_point_updates_digital_state_and_runtime_counters() {
        let state = test_state();
        let id = PointId::new("valve-1").unwrap();
        let response = set_point(&state, &id, true);
        assert_eq!(response.status, axum::http::StatusCode::OK);
        assert_eq!(state.io.get_runtime(&id).unwrap().update_count, 1);
    }

    #[test]
    fn statistics_reports_the_one_configured_point() {
        let state = test_state();
        let response = statistics(&state);
        assert_eq!(response.body["activePointCount"], 1);
    }
}
