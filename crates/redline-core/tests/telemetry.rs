//! Subscriber installation for the `redline` binary's log output.

use redline_core::init_tracing;
use tracing::Level;

#[test]
fn second_init_keeps_first_subscriber() {
    assert!(init_tracing(false, Level::INFO));
    assert!(!init_tracing(true, Level::DEBUG));

    // Logging through the installed subscriber must not panic.
    redline_core::emit_document_committed(1, 42, "save");
}
