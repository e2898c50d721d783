#![no_main]

use libfuzzer_sys::fuzz_target;
use maa_dispatch::{
    image_payload, parse_get_task_request, parse_report_status_request, DispatchEndpoint,
};

fuzz_target!(|data: &[u8]| {
    match parse_get_task_request(data) {
        Ok(request) => assert!(!request.device.is_empty()),
        Err(error) => assert_eq!(error.endpoint, DispatchEndpoint::GetTask),
    }

    match parse_report_status_request(data) {
        Ok(request) => {
            assert!(!request.device.is_empty());
            assert!(!request.task.is_empty());
            if let Some(image) = image_payload(request.payload.as_deref()) {
                assert!(image.len() > 100);
            }
        }
        Err(error) => assert_eq!(error.endpoint, DispatchEndpoint::ReportStatus),
    }
});
