use super::*;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("clicker").chain(args.iter().copied()))
        .expect("parse arguments")
}

#[test]
fn parses_global_flags_after_subcommand() {
    let cli = parse(&["devices", "--json", "--server-url", "http://hub:8000/clicker"]);

    assert!(cli.json);
    assert_eq!(cli.server_url.as_deref(), Some("http://hub:8000/clicker"));
    assert!(matches!(cli.command, Command::Devices));
}

#[test]
fn parses_typed_actions() {
    match parse(&["power", "receiver", "on"]).command {
        Command::Power { device, state } => {
            assert_eq!(device, "receiver");
            assert_eq!(state, PowerAction::On);
        }
        other => panic!("unexpected command {other:?}"),
    }

    match parse(&["media", "bluray", "rec"]).command {
        Command::Media { action, .. } => assert_eq!(action, MediaAction::Rec),
        other => panic!("unexpected command {other:?}"),
    }

    match parse(&["nav", "tv", "select"]).command {
        Command::Nav { action, .. } => assert_eq!(action, NavAction::Select),
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn rejects_unknown_actions() {
    assert!(Cli::try_parse_from(["clicker", "power", "receiver", "standby"]).is_err());
    assert!(Cli::try_parse_from(["clicker", "nav", "tv", "back"]).is_err());
}

#[test]
fn status_query_is_optional() {
    match parse(&["status", "receiver"]).command {
        Command::Status { device, query } => {
            assert_eq!(device, "receiver");
            assert_eq!(query, None);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn power_off_uses_kebab_case() {
    assert!(matches!(parse(&["power-off"]).command, Command::PowerOff));
}
