use super::*;
use crate::testing::ScriptedRemote;
use shared::error::{ErrorKind, TransportError};

fn receiver() -> Device {
    Device::new(
        "receiver",
        "Receiver",
        &["on", "off", "input_tuner", "input_hdmi1", "mute"],
        vec!["power".to_string(), "input".to_string()],
    )
}

fn reconciler(remote: &Arc<ScriptedRemote>) -> Reconciler {
    Reconciler::new(remote.clone())
}

#[tokio::test]
async fn select_input_skips_write_when_already_selected() {
    let remote = Arc::new(
        ScriptedRemote::new()
            .reply("device_get_status", &["receiver", "input"], "hdmi1")
            .reply_any("device_press_button", Value::Nil),
    );

    let selection = reconciler(&remote)
        .select_input(&receiver(), "hdmi1")
        .await
        .expect("select input");

    assert_eq!(selection, InputSelection::AlreadySelected);
    assert_eq!(remote.count("device_get_status").await, 1);
    assert_eq!(remote.count("device_press_button").await, 0);
}

#[tokio::test]
async fn select_input_presses_prefixed_command_after_reading_status() {
    let remote = Arc::new(
        ScriptedRemote::new()
            .reply("device_get_status", &["receiver", "input"], "tuner")
            .reply("device_press_button", &["receiver", "input_hdmi1"], Value::Nil),
    );

    let selection = reconciler(&remote)
        .select_input(&receiver(), "hdmi1")
        .await
        .expect("select input");

    assert_eq!(
        selection,
        InputSelection::Switched {
            previous: "tuner".into()
        }
    );
    assert_eq!(
        remote.calls().await,
        vec![
            "device_get_status(receiver,input)",
            "device_press_button(receiver,input_hdmi1)",
        ]
    );
}

#[tokio::test]
async fn select_input_does_not_write_when_status_fails() {
    let remote = Arc::new(
        ScriptedRemote::new()
            .fail_any("device_get_status", || {
                TransportError::Timeout(std::time::Duration::from_secs(10))
            })
            .reply_any("device_press_button", Value::Nil),
    );

    let err = reconciler(&remote)
        .select_input(&receiver(), "hdmi1")
        .await
        .expect_err("status failure");

    assert_eq!(err.kind, ErrorKind::Unreachable);
    assert_eq!(remote.count("device_press_button").await, 0);
}

#[tokio::test]
async fn unsupported_status_queries_use_neutral_defaults_without_calls() {
    let remote = Arc::new(ScriptedRemote::new());
    let device = Device::new("lamp", "Lamp", &["on", "off"], Vec::new());
    let reconciler = reconciler(&remote);

    assert!(!reconciler.reconcile_power(&device).await.expect("power"));
    assert_eq!(reconciler.reconcile_input(&device).await.expect("input"), "");
    assert!(remote.calls().await.is_empty());
}

#[tokio::test]
async fn power_status_is_on_only_for_on() {
    let remote = Arc::new(
        ScriptedRemote::new().reply("device_get_status", &["receiver", "power"], "on"),
    );
    assert!(reconciler(&remote)
        .reconcile_power(&receiver())
        .await
        .expect("power"));

    let remote = Arc::new(
        ScriptedRemote::new().reply("device_get_status", &["receiver", "power"], "standby"),
    );
    assert!(!reconciler(&remote)
        .reconcile_power(&receiver())
        .await
        .expect("power"));
}

#[test]
fn control_state_reports_only_real_changes() {
    let device = Arc::new(receiver());
    let mut state = ControlState::default();
    let power = Command::GetStatus {
        device: device.clone(),
        query: StatusQuery::Power,
    };

    assert!(state.absorb(&power, &Ok(Value::from("on"))));
    assert!(!state.absorb(&power, &Ok(Value::from("on"))));
    assert_eq!(state.power, Some(true));

    let off = Command::PressButton {
        device: device.clone(),
        button: "off".into(),
    };
    assert!(state.absorb(&off, &Ok(Value::Nil)));
    assert_eq!(state.power, Some(false));

    let failed: TaskOutcome = Err(ClickerError::generic("boom"));
    assert!(!state.absorb(&power, &failed));
    assert_eq!(state.power, Some(false));
}

#[test]
fn unknown_reported_input_clears_selection() {
    let device = Arc::new(receiver());
    let mut state = ControlState::default();
    let input = Command::GetStatus {
        device: device.clone(),
        query: StatusQuery::Input,
    };

    assert!(state.absorb(&input, &Ok(Value::from("tuner"))));
    assert_eq!(state.selected_input.as_deref(), Some("tuner"));

    assert!(state.absorb(&input, &Ok(Value::from("aux"))));
    assert_eq!(state.selected_input, None);

    assert!(!state.absorb(&input, &Ok(Value::Nil)));
}

#[test]
fn successful_selection_updates_input() {
    let device = Arc::new(receiver());
    let mut state = ControlState::default();
    let select = Command::SelectInput {
        device,
        input: "hdmi1".into(),
    };

    assert!(state.absorb(&select, &Ok(Value::Bool(true))));
    assert_eq!(state.selected_input.as_deref(), Some("hdmi1"));
}
