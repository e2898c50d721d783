#![no_main]

use libfuzzer_sys::fuzz_target;
use maa_commands::{parse_operator_command, resolve_task_alias, OperatorCommand};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    match parse_operator_command(&raw) {
        Ok(OperatorCommand::Bind { device_id }) => {
            assert!(!device_id.is_empty());
            assert!(!device_id.contains(char::is_whitespace));
        }
        Ok(OperatorCommand::Start { tasks }) => {
            for name in tasks.split(',') {
                if let Some(task_type) = resolve_task_alias(name) {
                    assert!(task_type.starts_with("LinkStart"));
                }
            }
        }
        Ok(_) => {}
        Err(error) => assert!(!error.to_string().is_empty()),
    }
});
