use solis::error::{SolisError, TransientKind};

#[test]
fn constructors_produce_the_expected_variants() {
    assert!(matches!(
        SolisError::addressing("x"),
        SolisError::Addressing { .. }
    ));
    assert!(matches!(
        SolisError::transport_unavailable("x"),
        SolisError::TransportUnavailable { .. }
    ));
    assert!(matches!(SolisError::update("x"), SolisError::Update { .. }));
    assert!(matches!(SolisError::config("x"), SolisError::Config { .. }));
    assert!(matches!(SolisError::io("x"), SolisError::Io { .. }));
}

#[test]
fn transient_helpers_set_their_kind() {
    for (err, kind) in [
        (SolisError::framing("x"), TransientKind::Framing),
        (SolisError::decode("x"), TransientKind::Decode),
        (SolisError::timeout("x"), TransientKind::Timeout),
        (
            SolisError::connection_reset("x"),
            TransientKind::ConnectionReset,
        ),
    ] {
        match err {
            SolisError::Transient { kind: k, .. } => assert_eq!(k, kind),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}

#[test]
fn display_is_prefixed_by_category() {
    assert_eq!(
        SolisError::addressing("before first update").to_string(),
        "Addressing error: before first update"
    );
    assert_eq!(
        SolisError::transient(TransientKind::Decode, "short read").to_string(),
        "Transient decode error: short read"
    );
    assert_eq!(
        SolisError::transport_unavailable("no socket").to_string(),
        "Transport unavailable: no socket"
    );
}
