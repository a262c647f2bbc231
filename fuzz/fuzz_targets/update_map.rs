#![no_main]

use libfuzzer_sys::fuzz_target;
use umbra_transport::telegram::map_update;

fuzz_target!(|data: &[u8]| {
    let Ok(update) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    // Every JSON shape maps to exactly one event; unknown shapes land on the
    // raw fallback instead of being dropped or panicking.
    let event = map_update(&update);
    assert!(!event.kind().is_empty());
    if event.kind() == "raw" {
        let umbra_transport::InboundEvent::Raw { payload } = event else {
            panic!("raw kind must carry the raw variant");
        };
        assert_eq!(payload, update);
    }
});
