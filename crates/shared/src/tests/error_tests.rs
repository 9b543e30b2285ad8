use super::*;

#[test]
fn raw_404_maps_to_wrong_endpoint() {
    assert_eq!(
        classify_raw_error("HTTP status code: 404 != 200"),
        ErrorKind::WrongEndpoint
    );
}

#[test]
fn raw_unknown_host_maps_to_unreachable() {
    assert_eq!(
        classify_raw_error("java.net.UnknownHostException: tv.local"),
        ErrorKind::Unreachable
    );
    assert_eq!(
        classify_raw_error(
            "org.apache.http.conn.HttpHostConnectException: Connection to http://10.0.0.2 refused"
        ),
        ErrorKind::Unreachable
    );
}

#[test]
fn unmapped_raw_errors_fall_back_to_generic() {
    assert_eq!(classify_raw_error(""), ErrorKind::Generic);
    assert_eq!(
        classify_raw_error("HTTP status code: 500 != 200"),
        ErrorKind::Generic
    );
    assert_eq!(classify_raw_error("\u{0}garbage\u{ffff}"), ErrorKind::Generic);
}

#[test]
fn typed_transport_errors_classify_once() {
    assert_eq!(
        TransportError::HttpStatus { status: 404 }.kind(),
        ErrorKind::WrongEndpoint
    );
    assert_eq!(
        TransportError::HttpStatus { status: 503 }.kind(),
        ErrorKind::Generic
    );
    assert_eq!(
        TransportError::Timeout(Duration::from_secs(3)).kind(),
        ErrorKind::Unreachable
    );
    assert_eq!(TransportError::NotConfigured.kind(), ErrorKind::ConfigMissing);
    assert_eq!(
        TransportError::Fault {
            code: 1,
            message: "boom".into()
        }
        .kind(),
        ErrorKind::Generic
    );
}

#[test]
fn http_status_display_matches_raw_classifier() {
    let err = TransportError::HttpStatus { status: 404 };
    assert_eq!(classify_raw_error(&err.to_string()), err.kind());
}

#[test]
fn clicker_error_keeps_transport_message() {
    let err = ClickerError::from(TransportError::UnknownHost {
        host: "tv.local".into(),
    });
    assert_eq!(err.kind, ErrorKind::Unreachable);
    assert_eq!(err.message, "unknown host: tv.local");
    assert_eq!(err.to_string(), "unreachable: unknown host: tv.local");
}

#[test]
fn error_kind_serializes_snake_case() {
    let json = serde_json::to_string(&ErrorKind::ConfigMissing).expect("serialize");
    assert_eq!(json, "\"config_missing\"");
}
