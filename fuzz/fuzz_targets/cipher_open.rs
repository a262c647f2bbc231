#![no_main]

use libfuzzer_sys::fuzz_target;
use umbra_cipher::CipherGate;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    let passthrough = CipherGate::passthrough();
    assert_eq!(passthrough.open(&raw).as_deref(), Ok(raw.as_ref()));
    assert_eq!(passthrough.seal(&raw).as_deref(), Ok(raw.as_ref()));

    // Keyed mode must reject arbitrary payloads without panicking, and must
    // round-trip anything it sealed itself.
    let keyed = CipherGate::new(Some("fuzz-key"));
    let _ = keyed.open(&raw);
    let sealed = keyed.seal(&raw).expect("seal must not fail");
    assert_eq!(keyed.open(&sealed).as_deref(), Ok(raw.as_ref()));
});
