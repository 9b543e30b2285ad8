use super::*;
use crate::testing::ScriptedRemote;
use shared::{error::ErrorKind, protocol::Value};

fn receiver_remote() -> ScriptedRemote {
    ScriptedRemote::new()
        .reply_any("device_list", vec!["receiver", "lamp"])
        .reply("device_info", &["receiver"], "Receiver")
        .reply(
            "device_list_buttons",
            &["receiver"],
            vec![
                "on",
                "off",
                "input_tuner",
                "input_hdmi1",
                "up",
                "down",
                "left",
                "right",
                "select",
            ],
        )
        .reply("device_list_status_cmds", &["receiver"], vec!["power", "input"])
        .reply("device_info", &["lamp"], "Lamp")
        .reply("device_list_buttons", &["lamp"], vec!["on", "off"])
        .reply("device_list_status_cmds", &["lamp"], Vec::<&str>::new())
        .reply_any("device_press_button", Value::Nil)
        .reply("device_get_status", &["receiver", "input"], "hdmi1")
}

async fn loaded(remote: &Arc<ScriptedRemote>) -> Clicker {
    let clicker = Clicker::new(remote.clone());
    let outcome = clicker.refresh().await;
    assert!(outcome.is_complete());
    clicker.apply(outcome.value).await;
    clicker
}

#[tokio::test]
async fn refresh_does_not_touch_registry_until_applied() {
    let remote = Arc::new(receiver_remote());
    let clicker = Clicker::new(remote.clone());

    let outcome = clicker.refresh().await;
    assert_eq!(outcome.value.len(), 2);
    assert!(clicker.registry().snapshot().await.is_empty());

    let registry = clicker.apply(outcome.value).await;
    assert_eq!(registry.len(), 2);
    assert!(clicker.device("lamp").await.is_some());
}

#[tokio::test]
async fn power_on_chains_input_status_for_devices_with_inputs() {
    let remote = Arc::new(receiver_remote());
    let clicker = loaded(&remote).await;
    let receiver = clicker.device("receiver").await.expect("receiver");

    let outcomes = clicker.set_power(receiver, true).wait_chain().await;

    assert_eq!(outcomes, vec![Ok(Value::Nil), Ok(Value::from("hdmi1"))]);
    let calls = remote.calls().await;
    assert_eq!(
        &calls[calls.len() - 2..],
        ["device_press_button(receiver,on)", "device_get_status(receiver,input)"]
    );
}

#[tokio::test]
async fn power_off_and_plain_devices_do_not_chain() {
    let remote = Arc::new(receiver_remote());
    let clicker = loaded(&remote).await;
    let receiver = clicker.device("receiver").await.expect("receiver");
    let lamp = clicker.device("lamp").await.expect("lamp");

    let off = clicker.set_power(receiver, false);
    assert!(off.chained().is_none());
    assert_eq!(off.wait_chain().await.len(), 1);

    let on = clicker.set_power(lamp, true);
    assert!(on.chained().is_none());
    assert_eq!(on.wait_chain().await, vec![Ok(Value::Nil)]);

    assert_eq!(remote.count("device_get_status").await, 0);
}

#[tokio::test]
async fn unsupported_media_and_navigation_are_rejected_without_calls() {
    let remote = Arc::new(receiver_remote());
    let clicker = loaded(&remote).await;
    let lamp = clicker.device("lamp").await.expect("lamp");
    let receiver = clicker.device("receiver").await.expect("receiver");
    let before = remote.calls().await.len();

    let err = clicker
        .media(Arc::clone(&receiver), MediaAction::Play)
        .expect_err("not a media player");
    assert_eq!(err.kind, ErrorKind::Generic);
    assert!(clicker.navigate(lamp, NavAction::Up).is_err());
    assert_eq!(remote.calls().await.len(), before);

    let mut handle = clicker
        .navigate(receiver, NavAction::Select)
        .expect("receiver has navigation");
    assert_eq!(handle.wait().await, Ok(Value::Nil));
    assert_eq!(remote.count("device_press_button").await, 1);
}

#[tokio::test]
async fn load_device_builds_single_device_when_not_registered() {
    let remote = Arc::new(receiver_remote());
    let clicker = Clicker::new(remote.clone());

    let lamp = clicker.load_device("lamp").await.expect("lamp");

    assert!(lamp.capabilities().has_power());
    assert_eq!(remote.count("device_list").await, 0);
    assert_eq!(remote.count("device_info").await, 1);
}

#[tokio::test]
async fn unconfigured_client_reports_config_missing() {
    let remote = Arc::new(ScriptedRemote::unconfigured());
    let clicker = Clicker::new(remote.clone());

    assert!(!clicker.is_configured());
    let err = clicker.load_device("lamp").await.expect_err("unconfigured");
    assert_eq!(err.kind, ErrorKind::ConfigMissing);
    let mut handle = clicker.power_off();
    assert_eq!(
        handle.wait().await.map_err(|err| err.kind),
        Err(ErrorKind::ConfigMissing)
    );
    assert!(remote.calls().await.is_empty());
}

#[test]
fn settings_without_address_build_an_unconfigured_client() {
    let clicker = Clicker::from_settings(&ClientSettings::default()).expect("client");
    assert!(!clicker.is_configured());

    let configured = ClientSettings::default().with_server_url("http://127.0.0.1:8000/clicker");
    assert!(Clicker::from_settings(&configured)
        .expect("client")
        .is_configured());
}
