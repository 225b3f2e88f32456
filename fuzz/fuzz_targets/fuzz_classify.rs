#![no_main]

use libfuzzer_sys::fuzz_target;
use squad_rcon::Classifier;

fuzz_target!(|data: &[u8]| {
    let body = String::from_utf8_lossy(data);
    let _ = Classifier::new().classify_body(&body);
});
