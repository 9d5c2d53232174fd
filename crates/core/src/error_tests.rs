// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn wire_tags_are_the_variant_names() {
    for (error, tag) in [
        (ControlError::AlreadyStarted, "\"AlreadyStarted\""),
        (ControlError::AlreadyStopped, "\"AlreadyStopped\""),
        (ControlError::PermissionDenied, "\"PermissionDenied\""),
        (ControlError::JobFailed, "\"JobFailed\""),
        (ControlError::EventFailed, "\"EventFailed\""),
        (ControlError::UnknownJob, "\"UnknownJob\""),
        (ControlError::UnknownInstance, "\"UnknownInstance\""),
        (ControlError::NoMemory, "\"NoMemory\""),
        (ControlError::InvalidArgument, "\"InvalidArgument\""),
    ] {
        assert_eq!(serde_json::to_string(&error).unwrap(), tag);
        assert_eq!(serde_json::from_str::<ControlError>(tag).unwrap(), error);
    }
}
